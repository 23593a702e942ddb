// ABOUTME: Error types for document store and persistence operations
// ABOUTME: Keeps version conflicts and network failures distinct so callers can react differently

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Stale edit version: expected {expected}, server holds {actual:?}")]
    VersionConflict { expected: u64, actual: Option<u64> },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("No document is loaded")]
    NoDocument,
}

impl StoreError {
    /// The save was rejected because the local copy is out of date
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    /// The server could not be reached; local state was kept
    pub fn is_network_error(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
