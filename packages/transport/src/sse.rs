// ABOUTME: Server-sent events source for generation progress
// ABOUTME: Turns a chunked HTTP body into StreamProgressEvents

use async_trait::async_trait;
use crs_core::StreamProgressEvent;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Result, TransportError};
use crate::stream::StreamSource;

/// Opens `GET {base}/api/chat/{chat_session_id}/crs/stream`
#[derive(Clone)]
pub struct SseStreamSource {
    client: Client,
    base_url: Url,
    access_token: Option<String>,
}

impl SseStreamSource {
    pub fn new(base_url: Url, connect_timeout: Duration) -> Result<Self> {
        // No overall timeout: the response body stays open for the whole generation
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url,
            access_token: None,
        })
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn stream_url(&self, chat_session_id: i64) -> Result<Url> {
        self.base_url
            .join(&format!("api/chat/{}/crs/stream", chat_session_id))
            .map_err(|e| TransportError::Protocol(e.to_string()))
    }
}

#[async_trait]
impl StreamSource for SseStreamSource {
    async fn open(
        &self,
        chat_session_id: i64,
    ) -> Result<BoxStream<'static, Result<StreamProgressEvent>>> {
        let url = self.stream_url(chat_session_id)?;
        info!(chat_session_id, %url, "Opening generation stream");

        let mut request = self
            .client
            .get(url)
            .header("accept", "text/event-stream");
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TransportError::Connection(format!(
                "Stream returned {}: {}",
                status, error_text
            )));
        }

        let stream = async_stream::stream! {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = SseBuffer::default();

            while let Some(chunk_result) = byte_stream.next().await {
                match chunk_result {
                    Ok(bytes) => {
                        for event in buffer.push(&bytes) {
                            yield event;
                        }
                    }
                    Err(e) => {
                        yield Err(TransportError::Connection(e.to_string()));
                        return;
                    }
                }
            }
            debug!(chat_session_id, "Generation stream body ended");
        };

        Ok(stream.boxed())
    }
}

/// Accumulates raw body bytes and splits out complete SSE events.
///
/// Bytes are only decoded once a whole event has arrived, so a multi-byte
/// character split across network chunks survives intact.
#[derive(Debug, Default)]
pub struct SseBuffer {
    buffer: Vec<u8>,
}

impl SseBuffer {
    /// Feed a chunk and return every event it completes
    pub fn push(&mut self, chunk: impl AsRef<[u8]>) -> Vec<Result<StreamProgressEvent>> {
        // CR only ever ends a line in an event stream
        self.buffer
            .extend(chunk.as_ref().iter().copied().filter(|byte| *byte != b'\r'));

        let mut events = Vec::new();
        while let Some(event_end) = self.buffer.windows(2).position(|pair| pair == b"\n\n") {
            let raw: Vec<u8> = self.buffer.drain(..event_end + 2).collect();
            match std::str::from_utf8(&raw) {
                Ok(text) => {
                    if let Some(event) = parse_event(text) {
                        events.push(event);
                    }
                }
                Err(e) => warn!(error = %e, "Skipping event that is not valid UTF-8"),
            }
        }
        events
    }
}

/// Parse one blank-line terminated SSE event. Comment-only and data-less
/// events (keep-alives) yield nothing.
fn parse_event(raw: &str) -> Option<Result<StreamProgressEvent>> {
    let mut event_name = None;
    let mut data_lines = Vec::new();

    for line in raw.lines() {
        if line.starts_with(':') {
            continue;
        }
        if let Some(value) = line.strip_prefix("event:") {
            event_name = Some(value.trim());
        } else if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }

    if data_lines.is_empty() {
        return None;
    }
    let data = data_lines.join("\n");

    if event_name == Some("error") {
        return Some(Err(TransportError::Protocol(data)));
    }

    match serde_json::from_str::<StreamProgressEvent>(&data) {
        Ok(event) => Some(Ok(event)),
        Err(e) => {
            warn!(error = %e, "Skipping malformed progress event");
            None
        }
    }
}
