// ABOUTME: Shared constants for CRS synchronization
// ABOUTME: Default content, highlight timing and channel sizing

/// Content used when a document is built with nothing to fill it
pub const EMPTY_CONTENT: &str = "{}";

/// How long a changed field stays highlighted after it changes
pub const DEFAULT_HIGHLIGHT_WINDOW_MS: u64 = 1500;

/// Capacity of the store's change notification channel
pub const DEFAULT_CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Capacity of the buffered telemetry sink
pub const DEFAULT_TELEMETRY_BUFFER: usize = 256;
