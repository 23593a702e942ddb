// ABOUTME: WebSocket implementation of the chat session transport
// ABOUTME: JSON text frames in both directions over tokio-tungstenite

use async_trait::async_trait;
use crs_core::{OutboundMessage, SocketEvent};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Result, TransportError};
use crate::socket::{SocketConnection, SocketTransport};

const OUTBOUND_BUFFER: usize = 32;

/// Connects to `{base}/ws/chat/{chat_session_id}`
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    base_url: Url,
    access_token: Option<String>,
}

impl WebSocketTransport {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            access_token: None,
        }
    }

    /// Sent as the `token` query parameter
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn session_url(&self, chat_session_id: i64) -> Result<Url> {
        let mut url = self
            .base_url
            .join(&format!("ws/chat/{}", chat_session_id))
            .map_err(|e| TransportError::Protocol(e.to_string()))?;
        if let Some(token) = &self.access_token {
            url.query_pairs_mut().append_pair("token", token);
        }
        Ok(url)
    }
}

/// Decode one frame. Control frames and unknown payloads yield nothing.
fn decode_frame(frame: std::result::Result<WsMessage, WsError>) -> Option<Result<SocketEvent>> {
    match frame {
        Ok(WsMessage::Text(text)) => match serde_json::from_str::<SocketEvent>(&text) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                warn!(error = %e, "Skipping unrecognized socket frame");
                None
            }
        },
        Ok(WsMessage::Close(frame)) => {
            debug!(?frame, "Close frame received");
            None
        }
        Ok(_) => None,
        Err(e) => Some(Err(e.into())),
    }
}

#[async_trait]
impl SocketTransport for WebSocketTransport {
    async fn connect(&self, chat_session_id: i64) -> Result<SocketConnection> {
        let url = self.session_url(chat_session_id)?;
        info!(chat_session_id, "Connecting chat socket");

        let (ws_stream, _) = connect_async(url.as_str()).await?;
        let (mut write, read) = ws_stream.split();

        let (outbound, mut outbound_rx) = mpsc::channel::<OutboundMessage>(OUTBOUND_BUFFER);
        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "Failed to encode outbound message");
                        continue;
                    }
                };
                if let Err(e) = write.send(WsMessage::Text(text)).await {
                    warn!(chat_session_id, error = %e, "Socket write failed");
                    break;
                }
            }
            // Adapter dropped its sender
            let _ = write.close().await;
        });

        let inbound = read
            .filter_map(|frame| async move { decode_frame(frame) })
            .boxed();

        Ok(SocketConnection { outbound, inbound })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_session_url_carries_token() {
        let transport = WebSocketTransport::new(Url::parse("ws://localhost:8000/").unwrap())
            .with_access_token("abc");

        assert_eq!(
            transport.session_url(12).unwrap().as_str(),
            "ws://localhost:8000/ws/chat/12?token=abc"
        );
    }

    #[test]
    fn test_decode_text_frame() {
        let frame = Ok(WsMessage::Text(r#"{"type":"typing","is_typing":true}"#.to_string()));
        assert!(matches!(
            decode_frame(frame),
            Some(Ok(SocketEvent::Typing { is_typing: true }))
        ));
    }

    #[test]
    fn test_decode_update_with_unknown_operation() {
        let text = r#"{"type":"crs_update","patch_ops":[{"op":"move","from":"/a","path":"/b"}],"full_content":"{\"b\":1}"}"#;

        match decode_frame(Ok(WsMessage::Text(text.to_string()))) {
            Some(Ok(SocketEvent::CrsUpdate(update))) => {
                let ops = update.patch_ops.unwrap();
                assert_eq!(ops.len(), 1);
                assert_eq!(ops[0].kind(), "unsupported");
                assert_eq!(ops[0].path(), "/b");
                assert_eq!(update.full_content.as_deref(), Some(r#"{"b":1}"#));
            }
            other => panic!("Expected CrsUpdate, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_skips_unknown_and_control_frames() {
        assert!(decode_frame(Ok(WsMessage::Text(r#"{"type":"presence"}"#.to_string()))).is_none());
        assert!(decode_frame(Ok(WsMessage::Ping(vec![1]))).is_none());
        assert!(decode_frame(Ok(WsMessage::Close(None))).is_none());
    }
}
