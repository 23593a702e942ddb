// ABOUTME: Shared doubles for adapter tests
// ABOUTME: Scripted stream sources, in-memory socket transport and a fixed-document server

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use crs_core::{CrsDocument, CrsStatus, OutboundMessage, SocketEvent, StreamProgressEvent};
use crs_store::{ChangeSource, DocumentChange, DocumentStore, Persistence, StoreError};
use crs_transport::{
    Result, SocketConnection, SocketTransport, StreamSource, TransportError,
};
use futures::channel::mpsc as fmpsc;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::json;
use tokio::sync::{broadcast, mpsc};

pub type EventSender = fmpsc::UnboundedSender<Result<StreamProgressEvent>>;

/// Server that always answers with `document`
pub struct FixedServer {
    pub document: CrsDocument,
    pub fetches: AtomicUsize,
    on_fetch: Mutex<Option<FetchHook>>,
}

type FetchHook = Box<dyn FnOnce() + Send>;

impl FixedServer {
    pub fn new(document: CrsDocument) -> Arc<Self> {
        Arc::new(Self {
            document,
            fetches: AtomicUsize::new(0),
            on_fetch: Mutex::new(None),
        })
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Run `hook` inside the next fetch, before it answers
    pub fn on_next_fetch(&self, hook: impl FnOnce() + Send + 'static) {
        *self.on_fetch.lock().unwrap() = Some(Box::new(hook));
    }

    fn record_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let hook = self.on_fetch.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
    }
}

/// Wait until `server` has answered at least one fetch
pub async fn wait_for_fetch(server: &FixedServer) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while server.fetch_count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for a fetch");
}

#[async_trait]
impl Persistence for FixedServer {
    async fn fetch_latest_document(&self, project_id: i64) -> crs_store::Result<Option<CrsDocument>> {
        self.record_fetch();
        Ok(Some(self.document.clone()).filter(|doc| doc.project_id == project_id))
    }

    async fn fetch_document(&self, document_id: i64) -> crs_store::Result<CrsDocument> {
        self.record_fetch();
        if document_id == self.document.id {
            Ok(self.document.clone())
        } else {
            Err(StoreError::NotFound(format!("document {}", document_id)))
        }
    }

    async fn save_content(&self, _: i64, _: &str, expected: u64) -> crs_store::Result<CrsDocument> {
        Err(StoreError::VersionConflict {
            expected,
            actual: Some(self.document.edit_version),
        })
    }

    async fn update_status(
        &self,
        _: i64,
        _: CrsStatus,
        _: Option<String>,
    ) -> crs_store::Result<CrsDocument> {
        Ok(self.document.clone())
    }
}

pub fn persisted_document() -> CrsDocument {
    CrsDocument {
        id: 42,
        project_id: 7,
        chat_session_id: Some(3),
        edit_version: 2,
        content: json!({"project_title": "Clinic booking", "project_description": "Build a tool"})
            .to_string(),
        ..CrsDocument::default()
    }
}

/// Stream source whose connections are handed out in order.
/// `None` entries fail to connect.
#[derive(Default)]
pub struct ScriptedSource {
    connections: Mutex<VecDeque<Option<fmpsc::UnboundedReceiver<Result<StreamProgressEvent>>>>>,
    pub opens: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a connection that succeeds and return its event sender
    pub fn push_connection(&self) -> EventSender {
        let (tx, rx) = fmpsc::unbounded();
        self.connections.lock().unwrap().push_back(Some(rx));
        tx
    }

    pub fn push_failure(&self) {
        self.connections.lock().unwrap().push_back(None);
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamSource for ScriptedSource {
    async fn open(
        &self,
        _chat_session_id: i64,
    ) -> Result<BoxStream<'static, Result<StreamProgressEvent>>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        match self.connections.lock().unwrap().pop_front() {
            Some(Some(rx)) => Ok(rx.boxed()),
            _ => Err(TransportError::Connection("refused".to_string())),
        }
    }
}

/// Test side of an in-memory socket
pub struct SocketPeer {
    pub inbound: fmpsc::UnboundedSender<Result<SocketEvent>>,
    pub outbound: mpsc::Receiver<OutboundMessage>,
}

/// Transport handing out a single pre-built connection
pub struct InMemoryTransport {
    connection: Mutex<Option<SocketConnection>>,
}

impl InMemoryTransport {
    pub fn new() -> (Arc<Self>, SocketPeer) {
        let (inbound_tx, inbound_rx) = fmpsc::unbounded();
        let (outbound_tx, outbound_rx) = mpsc::channel(8);
        let transport = Arc::new(Self {
            connection: Mutex::new(Some(SocketConnection {
                outbound: outbound_tx,
                inbound: inbound_rx.boxed(),
            })),
        });
        (
            transport,
            SocketPeer {
                inbound: inbound_tx,
                outbound: outbound_rx,
            },
        )
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            connection: Mutex::new(None),
        })
    }
}

#[async_trait]
impl SocketTransport for InMemoryTransport {
    async fn connect(&self, _chat_session_id: i64) -> Result<SocketConnection> {
        self.connection
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| TransportError::Connection("unreachable".to_string()))
    }
}

/// Wait for the next change from `source`
pub async fn next_change(
    changes: &mut broadcast::Receiver<DocumentChange>,
    source: ChangeSource,
) -> DocumentChange {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let change = changes.recv().await.expect("store channel closed");
            if change.source == source {
                return change;
            }
        }
    })
    .await
    .expect("timed out waiting for store change")
}

pub fn store_with(server: Arc<FixedServer>) -> Arc<DocumentStore> {
    Arc::new(DocumentStore::new(server, 64))
}
