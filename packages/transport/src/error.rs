// ABOUTME: Error types for the stream and socket adapters
// ABOUTME: Connection failures are retried internally, send-while-closed fails fast

use crs_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Cannot send while the socket is not open")]
    SendWhileClosed,

    #[error("Outbound queue is full")]
    OutboundFull,

    #[error("Adapter has been closed")]
    Closed,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self::Connection(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Connection(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
