// ABOUTME: Error types for individual patch operations
// ABOUTME: These never leave the applicator; they only explain why a fallback happened

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("Invalid JSON pointer: {0}")]
    InvalidPointer(String),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Index {index} out of bounds at {path} (len {len})")]
    IndexOutOfBounds {
        path: String,
        index: usize,
        len: usize,
    },

    #[error("Type conflict at {path}: expected {expected}")]
    TypeConflict {
        path: String,
        expected: &'static str,
    },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Current content is not a JSON object: {0}")]
    InvalidContent(String),
}

pub type Result<T> = std::result::Result<T, PatchError>;
