//! Update source adapters for live CRS synchronization
//!
//! [`StreamAdapter`] follows the progressive generation stream and
//! [`SocketAdapter`] follows the chat socket. Both write only through the
//! [`crs_store::DocumentStore`], apply events in receipt order, and converge on
//! an authoritative reload when generation completes.

pub mod error;
pub mod socket;
pub mod sse;
pub mod stream;
pub mod websocket;

pub use error::{Result, TransportError};
pub use socket::{SocketAdapter, SocketConnection, SocketNotice, SocketState, SocketTransport};
pub use sse::{SseBuffer, SseStreamSource};
pub use stream::{ConnectionState, StreamAdapter, StreamSource, StreamStatus};
pub use websocket::WebSocketTransport;
