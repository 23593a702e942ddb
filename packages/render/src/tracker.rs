// ABOUTME: Folds store change notifications into highlight and streaming-cursor state
// ABOUTME: Clears the streaming field when an authoritative source replaces the document

use std::time::{Duration, Instant};

use crs_config::RenderConfig;
use crs_store::DocumentChange;
use serde_json::Value;
use tracing::{debug, warn};

use crate::differ::diff_content;
use crate::highlight::HighlightTracker;

/// What the document pane should show after one change
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderUpdate {
    pub changed_paths: Vec<String>,
    pub highlighted: Vec<String>,
    pub active_field: Option<String>,
}

/// Per-pane render state
#[derive(Debug, Clone)]
pub struct RenderTracker {
    previous: Option<Value>,
    highlights: HighlightTracker,
    active_field: Option<String>,
}

impl RenderTracker {
    pub fn new(highlight_window: Duration) -> Self {
        Self {
            previous: None,
            highlights: HighlightTracker::new(highlight_window),
            active_field: None,
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(config.highlight_window)
    }

    pub fn active_field(&self) -> Option<&str> {
        self.active_field.as_deref()
    }

    pub fn highlighted(&mut self, now: Instant) -> Vec<String> {
        self.highlights.active(now)
    }

    pub fn observe(&mut self, change: &DocumentChange, now: Instant) -> RenderUpdate {
        let Some(document) = &change.document else {
            self.previous = None;
            self.active_field = None;
            self.highlights.clear();
            return RenderUpdate::default();
        };

        let current = match document.parsed_content() {
            Ok(value) => value,
            Err(err) => {
                warn!(document_id = document.id, error = %err, "Skipping unparseable snapshot");
                return RenderUpdate {
                    highlighted: self.highlights.active(now),
                    active_field: self.active_field.clone(),
                    ..RenderUpdate::default()
                };
            }
        };

        let diff = diff_content(self.previous.as_ref(), &current);
        self.highlights.mark(diff.changed_paths.iter().cloned(), now);
        // Progress ticks that leave the content alone keep the cursor where it was
        if change.source.is_authoritative() {
            self.active_field = None;
        } else if !diff.is_empty() {
            self.active_field = diff.active_field;
        }
        self.previous = Some(current);

        debug!(
            document_id = document.id,
            source = ?change.source,
            changed = diff.changed_paths.len(),
            active_field = ?self.active_field,
            "Render diff computed"
        );

        RenderUpdate {
            changed_paths: diff.changed_paths,
            highlighted: self.highlights.active(now),
            active_field: self.active_field.clone(),
        }
    }
}
