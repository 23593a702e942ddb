//! Document state store for live CRS synchronization
//!
//! [`DocumentStore`] owns the one live document. The stream and socket
//! adapters, the manual editor and authoritative reloads all write through it,
//! and every write is published as a [`DocumentChange`].

pub mod client;
pub mod error;
pub mod events;
pub mod persistence;
pub mod store;

pub use client::RestPersistence;
pub use error::{Result, StoreError};
pub use events::{ChangeSource, DocumentChange, ReloadTarget};
pub use persistence::Persistence;
pub use store::DocumentStore;
