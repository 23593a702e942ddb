// ABOUTME: Time-boxed highlight set for recently changed fields
// ABOUTME: Each highlighted path expires a fixed window after its last change

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct HighlightTracker {
    window: Duration,
    expires_at: HashMap<String, Instant>,
}

impl HighlightTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            expires_at: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Highlight `paths` from `now` until `now + window`; re-marking extends it
    pub fn mark<I, S>(&mut self, paths: I, now: Instant)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let until = now + self.window;
        for path in paths {
            self.expires_at.insert(path.into(), until);
        }
    }

    pub fn is_highlighted(&self, path: &str, now: Instant) -> bool {
        self.expires_at
            .get(path)
            .is_some_and(|until| now < *until)
    }

    /// Drop expired entries and return what is still lit, sorted
    pub fn active(&mut self, now: Instant) -> Vec<String> {
        self.expires_at.retain(|_, until| now < *until);
        let mut paths: Vec<String> = self.expires_at.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// When the next highlight goes out, if any
    pub fn next_expiry(&self) -> Option<Instant> {
        self.expires_at.values().min().copied()
    }

    pub fn clear(&mut self) {
        self.expires_at.clear();
    }
}
