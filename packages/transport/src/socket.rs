// ABOUTME: Chat socket adapter applying document deltas and forwarding chat traffic
// ABOUTME: Fails sends fast when the socket is not open and reloads on generation complete

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use crs_core::{ChatMessage, DocumentUpdate, OutboundMessage, SocketEvent};
use crs_store::{DocumentStore, ReloadTarget};
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};

/// Both halves of an established session channel
pub struct SocketConnection {
    pub outbound: mpsc::Sender<OutboundMessage>,
    pub inbound: BoxStream<'static, Result<SocketEvent>>,
}

/// Opens session channels
#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self, chat_session_id: i64) -> Result<SocketConnection>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Idle,
    Connecting,
    Open,
    Closed,
    Error,
}

/// Non-document traffic surfaced to the chat pane
#[derive(Debug, Clone, PartialEq)]
pub enum SocketNotice {
    Chat(ChatMessage),
    Typing(bool),
    ServerError(String),
    GenerationComplete,
}

struct SocketShared {
    chat_session_id: i64,
    store: Arc<DocumentStore>,
    closed: AtomicBool,
    dispatch_gate: Mutex<()>,
    state: watch::Sender<SocketState>,
    notices: broadcast::Sender<SocketNotice>,
}

impl SocketShared {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: SocketState) {
        if self.is_closed() && state != SocketState::Closed {
            return;
        }
        self.state.send_replace(state);
    }

    fn notify(&self, notice: SocketNotice) {
        // Nobody listening is fine
        let _ = self.notices.send(notice);
    }

    fn apply_update(&self, update: DocumentUpdate) {
        let _gate = self.dispatch_gate.lock().unwrap_or_else(|p| p.into_inner());
        if self.is_closed() {
            return;
        }
        let result = self.store.apply_remote_update(
            update.patch_ops.as_deref(),
            update.full_content.as_deref(),
            &update.metadata,
        );
        debug!(
            chat_session_id = self.chat_session_id,
            document_id = result.updated_document.id,
            edit_version = result.updated_document.edit_version,
            fallback = result.metrics.fallback_to_full,
            reduction_percent = result.metrics.size_reduction_percent,
            "Socket update applied"
        );
    }

    async fn handle(&self, event: SocketEvent) {
        match event {
            SocketEvent::CrsUpdate(update) => self.apply_update(update),
            SocketEvent::GenerationComplete {
                crs_document_id,
                project_id,
            } => {
                let target = match (crs_document_id.filter(|id| *id > 0), project_id) {
                    (Some(id), _) => Some(ReloadTarget::Document(id)),
                    (None, Some(project_id)) => Some(ReloadTarget::Project(project_id)),
                    (None, None) => None,
                };
                match target {
                    Some(target) if !self.is_closed() => {
                        match self.store.fetch_authoritative(target).await {
                            Ok(fetched) => {
                                let _gate =
                                    self.dispatch_gate.lock().unwrap_or_else(|p| p.into_inner());
                                // close() may have returned while the fetch was in flight
                                if self.is_closed() {
                                    return;
                                }
                                self.store.install_reload(target, fetched);
                            }
                            Err(err) => {
                                warn!(?target, error = %err, "Reload after generation failed")
                            }
                        }
                    }
                    Some(_) => return,
                    None => warn!(
                        chat_session_id = self.chat_session_id,
                        "Generation complete without a document or project id"
                    ),
                }
                self.notify(SocketNotice::GenerationComplete);
            }
            SocketEvent::ChatMessage { message } => self.notify(SocketNotice::Chat(message)),
            SocketEvent::Typing { is_typing } => self.notify(SocketNotice::Typing(is_typing)),
            SocketEvent::Error { message } => {
                warn!(chat_session_id = self.chat_session_id, %message, "Server reported error");
                self.notify(SocketNotice::ServerError(message));
            }
        }
    }
}

async fn read_loop(shared: Arc<SocketShared>, mut inbound: BoxStream<'static, Result<SocketEvent>>) {
    while let Some(item) = inbound.next().await {
        if shared.is_closed() {
            return;
        }
        match item {
            Ok(event) => shared.handle(event).await,
            Err(err) => {
                warn!(chat_session_id = shared.chat_session_id, error = %err, "Socket read failed");
                shared.set_state(SocketState::Error);
                return;
            }
        }
    }
    info!(chat_session_id = shared.chat_session_id, "Socket closed by server");
    shared.set_state(SocketState::Closed);
}

/// Lifecycle object for the chat socket of one session
pub struct SocketAdapter {
    shared: Arc<SocketShared>,
    transport: Arc<dyn SocketTransport>,
    outbound: Mutex<Option<mpsc::Sender<OutboundMessage>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SocketAdapter {
    pub fn new(
        chat_session_id: i64,
        transport: Arc<dyn SocketTransport>,
        store: Arc<DocumentStore>,
        notice_capacity: usize,
    ) -> Self {
        let (state, _) = watch::channel(SocketState::Idle);
        let (notices, _) = broadcast::channel(notice_capacity.max(1));
        Self {
            shared: Arc::new(SocketShared {
                chat_session_id,
                store,
                closed: AtomicBool::new(false),
                dispatch_gate: Mutex::new(()),
                state,
                notices,
            }),
            transport,
            outbound: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SocketState {
        *self.shared.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SocketState> {
        self.shared.state.subscribe()
    }

    pub fn notices(&self) -> broadcast::Receiver<SocketNotice> {
        self.shared.notices.subscribe()
    }

    /// Establish the channel and start reading
    pub async fn connect(&self) -> Result<()> {
        if self.shared.is_closed() {
            return Err(TransportError::Closed);
        }
        self.shared.set_state(SocketState::Connecting);

        let connection = match self.transport.connect(self.shared.chat_session_id).await {
            Ok(connection) => connection,
            Err(err) => {
                warn!(chat_session_id = self.shared.chat_session_id, error = %err, "Socket connect failed");
                self.shared.set_state(SocketState::Error);
                return Err(err);
            }
        };
        if self.shared.is_closed() {
            return Err(TransportError::Closed);
        }

        *self.outbound.lock().unwrap_or_else(|p| p.into_inner()) = Some(connection.outbound);
        // Open before the reader starts so an immediate hangup is not overwritten
        info!(chat_session_id = self.shared.chat_session_id, "Socket open");
        self.shared.set_state(SocketState::Open);
        let handle = tokio::spawn(read_loop(self.shared.clone(), connection.inbound));
        if let Some(previous) = self
            .task
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .replace(handle)
        {
            previous.abort();
        }
        Ok(())
    }

    /// Send a chat message. Never waits: fails unless the socket is open and
    /// the outbound queue has room.
    pub fn send_chat(&self, content: impl Into<String>) -> Result<()> {
        if self.state() != SocketState::Open {
            return Err(TransportError::SendWhileClosed);
        }
        let sender = self
            .outbound
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
            .ok_or(TransportError::SendWhileClosed)?;

        let message = OutboundMessage::SendMessage {
            content: content.into(),
        };
        match sender.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!(chat_session_id = self.shared.chat_session_id, "Outbound queue full");
                Err(TransportError::OutboundFull)
            }
            Err(TrySendError::Closed(_)) => {
                self.shared.set_state(SocketState::Closed);
                Err(TransportError::SendWhileClosed)
            }
        }
    }

    /// Tear down the channel. No socket event reaches the store after this returns.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        drop(
            self.shared
                .dispatch_gate
                .lock()
                .unwrap_or_else(|p| p.into_inner()),
        );
        if let Some(handle) = self.task.lock().unwrap_or_else(|p| p.into_inner()).take() {
            handle.abort();
        }
        self.outbound
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        self.shared.set_state(SocketState::Closed);
        debug!(chat_session_id = self.shared.chat_session_id, "Socket adapter closed");
    }
}

impl Drop for SocketAdapter {
    fn drop(&mut self) {
        self.close();
    }
}
