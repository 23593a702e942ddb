// ABOUTME: Core types and utilities for live CRS synchronization
// ABOUTME: Foundational package shared by the patch, store, transport and render packages

pub mod constants;
pub mod content;
pub mod events;
pub mod patch;
pub mod types;
pub mod utils;

// Re-export main types
pub use content::{CrsContent, FunctionalRequirement, TechnologyStack};
pub use events::{
    ChatMessage, DocumentUpdate, MessageRole, OutboundMessage, SocketEvent, StreamProgressEvent,
};
pub use patch::PatchOperation;
pub use types::{CrsDocument, CrsPattern, CrsStatus, DocumentMetadata, ParseEnumError};

// Re-export utilities
pub use utils::{escape_pointer_token, is_empty_value, join_pointer, serialized_len};
