// ABOUTME: Environment variable name constants
// ABOUTME: Centralized definitions of all environment variable names used by the sync engine

// Backend Endpoints
pub const CRS_API_URL: &str = "CRS_API_URL";
pub const CRS_WS_URL: &str = "CRS_WS_URL";
pub const CRS_HTTP_TIMEOUT_SECS: &str = "CRS_HTTP_TIMEOUT_SECS";

// Generation Stream Reconnect Policy
pub const CRS_STREAM_MAX_RECONNECT_ATTEMPTS: &str = "CRS_STREAM_MAX_RECONNECT_ATTEMPTS";
pub const CRS_STREAM_INITIAL_BACKOFF_MS: &str = "CRS_STREAM_INITIAL_BACKOFF_MS";
pub const CRS_STREAM_MAX_BACKOFF_MS: &str = "CRS_STREAM_MAX_BACKOFF_MS";
pub const CRS_STREAM_DEGRADED_AFTER: &str = "CRS_STREAM_DEGRADED_AFTER";

// Rendering
pub const CRS_HIGHLIGHT_WINDOW_MS: &str = "CRS_HIGHLIGHT_WINDOW_MS";

// Channel Sizing
pub const CRS_TELEMETRY_BUFFER: &str = "CRS_TELEMETRY_BUFFER";
pub const CRS_STORE_CHANNEL_CAPACITY: &str = "CRS_STORE_CHANNEL_CAPACITY";
