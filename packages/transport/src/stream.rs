// ABOUTME: Generation stream adapter with bounded reconnect and deterministic teardown
// ABOUTME: Forwards progress events to the store and reloads the document on completion

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use crs_config::StreamConfig;
use crs_core::StreamProgressEvent;
use crs_store::{DocumentStore, ReloadTarget};
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{Result, TransportError};

/// Producer of progress events for one chat session
#[async_trait]
pub trait StreamSource: Send + Sync {
    async fn open(
        &self,
        chat_session_id: i64,
    ) -> Result<BoxStream<'static, Result<StreamProgressEvent>>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Closed,
    Error,
}

/// What the UI shows about the stream
#[derive(Debug, Clone, PartialEq)]
pub struct StreamStatus {
    pub state: ConnectionState,
    /// Consecutive failed connection attempts
    pub retry_count: u32,
    pub degraded: bool,
    /// Reconnects are exhausted; only `retry()` restarts the adapter
    pub exhausted: bool,
    pub last_error: Option<String>,
}

impl Default for StreamStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Idle,
            retry_count: 0,
            degraded: false,
            exhausted: false,
            last_error: None,
        }
    }
}

enum StreamEnd {
    Completed,
    Cancelled,
}

struct StreamShared {
    chat_session_id: i64,
    source: Arc<dyn StreamSource>,
    store: Arc<DocumentStore>,
    config: StreamConfig,
    closed: AtomicBool,
    /// Held while an event mutates the store; `close()` waits on it
    dispatch_gate: Mutex<()>,
    status: watch::Sender<StreamStatus>,
}

impl StreamShared {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn set_status(&self, status: StreamStatus) {
        if self.is_closed() && status.state != ConnectionState::Closed {
            return;
        }
        self.status.send_replace(status);
    }

    fn backoff_policy(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.config.initial_backoff)
            .with_max_interval(self.config.max_backoff)
            .with_multiplier(2.0)
            .with_randomization_factor(0.0)
            .with_max_elapsed_time(None)
            .build()
    }

    /// Apply one event, then reload the authoritative document on completion
    async fn dispatch(&self, event: StreamProgressEvent) -> Option<StreamEnd> {
        let doc = {
            let _gate = self.dispatch_gate.lock().unwrap_or_else(|p| p.into_inner());
            if self.is_closed() {
                return Some(StreamEnd::Cancelled);
            }
            self.store.apply_stream_update(&event)
        };
        debug!(
            chat_session_id = self.chat_session_id,
            edit_version = doc.edit_version,
            step = %event.step,
            "Stream event applied"
        );

        if !event.is_complete {
            return None;
        }
        if let Some(document_id) = event.reload_target() {
            if self.is_closed() {
                return Some(StreamEnd::Cancelled);
            }
            let target = ReloadTarget::Document(document_id);
            match self.store.fetch_authoritative(target).await {
                Ok(fetched) => {
                    let _gate = self.dispatch_gate.lock().unwrap_or_else(|p| p.into_inner());
                    // close() may have returned while the fetch was in flight
                    if self.is_closed() {
                        return Some(StreamEnd::Cancelled);
                    }
                    self.store.install_reload(target, fetched);
                }
                Err(err) => warn!(document_id, error = %err, "Reload after generation failed"),
            }
        }
        Some(StreamEnd::Completed)
    }

    /// Drain `events` until completion, cancellation or failure.
    /// `delivered` is set once any event reaches the store.
    async fn consume(
        &self,
        events: &mut BoxStream<'static, Result<StreamProgressEvent>>,
        delivered: &mut bool,
    ) -> Result<StreamEnd> {
        while let Some(item) = events.next().await {
            if self.is_closed() {
                return Ok(StreamEnd::Cancelled);
            }
            let event = item?;
            *delivered = true;
            if let Some(end) = self.dispatch(event).await {
                return Ok(end);
            }
        }
        Err(TransportError::Connection(
            "stream ended before generation completed".to_string(),
        ))
    }
}

async fn run(shared: Arc<StreamShared>) {
    let mut backoff = shared.backoff_policy();
    let mut failures: u32 = 0;

    loop {
        if shared.is_closed() {
            return;
        }
        shared.set_status(StreamStatus {
            state: ConnectionState::Connecting,
            retry_count: failures,
            degraded: failures >= shared.config.degraded_after,
            ..StreamStatus::default()
        });

        let failure = match shared.source.open(shared.chat_session_id).await {
            Ok(mut events) => {
                info!(chat_session_id = shared.chat_session_id, "Generation stream connected");
                shared.set_status(StreamStatus {
                    state: ConnectionState::Connected,
                    retry_count: failures,
                    ..StreamStatus::default()
                });

                // A connection that drops before delivering anything still counts
                // against the attempt budget
                let mut delivered = false;
                let outcome = shared.consume(&mut events, &mut delivered).await;
                if delivered {
                    failures = 0;
                    backoff.reset();
                }

                match outcome {
                    Ok(StreamEnd::Completed) => {
                        info!(chat_session_id = shared.chat_session_id, "Generation stream completed");
                        shared.set_status(StreamStatus {
                            state: ConnectionState::Closed,
                            ..StreamStatus::default()
                        });
                        return;
                    }
                    Ok(StreamEnd::Cancelled) => return,
                    Err(err) => err,
                }
            }
            Err(err) => err,
        };

        if shared.is_closed() {
            return;
        }
        failures += 1;
        let degraded = failures >= shared.config.degraded_after;

        if failures > shared.config.max_reconnect_attempts {
            error!(
                chat_session_id = shared.chat_session_id,
                attempts = failures,
                error = %failure,
                "Generation stream giving up"
            );
            shared.set_status(StreamStatus {
                state: ConnectionState::Error,
                retry_count: failures,
                degraded: true,
                exhausted: true,
                last_error: Some(failure.to_string()),
            });
            return;
        }

        let delay = backoff
            .next_backoff()
            .unwrap_or(shared.config.max_backoff);
        warn!(
            chat_session_id = shared.chat_session_id,
            attempt = failures,
            delay_ms = delay.as_millis() as u64,
            error = %failure,
            "Generation stream failed, reconnecting"
        );
        shared.set_status(StreamStatus {
            state: ConnectionState::Error,
            retry_count: failures,
            degraded,
            exhausted: false,
            last_error: Some(failure.to_string()),
        });

        tokio::time::sleep(delay).await;
    }
}

/// Lifecycle object for the generation stream of one chat session
pub struct StreamAdapter {
    shared: Arc<StreamShared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl StreamAdapter {
    pub fn new(
        chat_session_id: i64,
        source: Arc<dyn StreamSource>,
        store: Arc<DocumentStore>,
        config: StreamConfig,
    ) -> Self {
        let (status, _) = watch::channel(StreamStatus::default());
        Self {
            shared: Arc::new(StreamShared {
                chat_session_id,
                source,
                store,
                config,
                closed: AtomicBool::new(false),
                dispatch_gate: Mutex::new(()),
                status,
            }),
            task: Mutex::new(None),
        }
    }

    pub fn chat_session_id(&self) -> i64 {
        self.shared.chat_session_id
    }

    pub fn status(&self) -> StreamStatus {
        self.shared.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<StreamStatus> {
        self.shared.status.subscribe()
    }

    /// Start the connection loop. A no-op while a loop is already running.
    pub fn open(&self) -> Result<()> {
        if self.shared.is_closed() {
            return Err(TransportError::Closed);
        }
        let mut task = self.task.lock().unwrap_or_else(|p| p.into_inner());
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }
        *task = Some(tokio::spawn(run(self.shared.clone())));
        Ok(())
    }

    /// Restart after reconnects were exhausted or the stream completed
    pub fn retry(&self) -> Result<()> {
        if self.shared.is_closed() {
            return Err(TransportError::Closed);
        }
        info!(chat_session_id = self.shared.chat_session_id, "Manual stream retry");
        self.shared.set_status(StreamStatus::default());
        self.open()
    }

    /// Tear down the connection. No stream event reaches the store after this
    /// returns, even if frames are still in flight.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        drop(
            self.shared
                .dispatch_gate
                .lock()
                .unwrap_or_else(|p| p.into_inner()),
        );
        if let Some(handle) = self
            .task
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take()
        {
            handle.abort();
        }
        self.shared.set_status(StreamStatus {
            state: ConnectionState::Closed,
            ..StreamStatus::default()
        });
        debug!(chat_session_id = self.shared.chat_session_id, "Stream adapter closed");
    }
}

impl Drop for StreamAdapter {
    fn drop(&mut self) {
        self.close();
    }
}
