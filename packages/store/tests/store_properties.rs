// ABOUTME: Consistency properties of the document store against an in-memory server
// ABOUTME: Monotonic edit versions, reload supremacy, no tearing and stale-save rejection

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use crs_core::{CrsDocument, CrsStatus, DocumentMetadata, PatchOperation, StreamProgressEvent};
use crs_store::{ChangeSource, DocumentStore, Persistence, ReloadTarget, Result, StoreError};
use pretty_assertions::assert_eq;
use serde_json::json;

/// Server double that enforces edit versions the way the backend does
#[derive(Default)]
struct InMemoryServer {
    documents: Mutex<HashMap<i64, CrsDocument>>,
}

impl InMemoryServer {
    fn with_document(doc: CrsDocument) -> Arc<Self> {
        let server = Self::default();
        server.documents.lock().unwrap().insert(doc.id, doc);
        Arc::new(server)
    }

    fn get(&self, id: i64) -> Option<CrsDocument> {
        self.documents.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl Persistence for InMemoryServer {
    async fn fetch_latest_document(&self, project_id: i64) -> Result<Option<CrsDocument>> {
        let documents = self.documents.lock().unwrap();
        Ok(documents
            .values()
            .filter(|doc| doc.project_id == project_id)
            .max_by_key(|doc| doc.id)
            .cloned())
    }

    async fn fetch_document(&self, document_id: i64) -> Result<CrsDocument> {
        self.get(document_id)
            .ok_or_else(|| StoreError::NotFound(format!("document {}", document_id)))
    }

    async fn save_content(
        &self,
        document_id: i64,
        content: &str,
        expected_edit_version: u64,
    ) -> Result<CrsDocument> {
        let mut documents = self.documents.lock().unwrap();
        let doc = documents
            .get_mut(&document_id)
            .ok_or_else(|| StoreError::NotFound(format!("document {}", document_id)))?;
        if doc.edit_version != expected_edit_version {
            return Err(StoreError::VersionConflict {
                expected: expected_edit_version,
                actual: Some(doc.edit_version),
            });
        }
        doc.content = content.to_string();
        doc.edit_version += 1;
        Ok(doc.clone())
    }

    async fn update_status(
        &self,
        document_id: i64,
        status: CrsStatus,
        _reason: Option<String>,
    ) -> Result<CrsDocument> {
        let mut documents = self.documents.lock().unwrap();
        let doc = documents
            .get_mut(&document_id)
            .ok_or_else(|| StoreError::NotFound(format!("document {}", document_id)))?;
        doc.status = status;
        doc.structural_version += 1;
        Ok(doc.clone())
    }
}

fn server_doc(edit_version: u64) -> CrsDocument {
    CrsDocument {
        id: 42,
        project_id: 7,
        edit_version,
        content: json!({"project_title": "Clinic booking"}).to_string(),
        ..CrsDocument::default()
    }
}

#[tokio::test]
async fn test_edit_version_strictly_increases_across_writers() {
    let server = InMemoryServer::with_document(server_doc(1));
    let store = DocumentStore::new(server.clone(), 64);
    store.reload(ReloadTarget::Document(42)).await.unwrap();

    let mut versions = vec![store.current().unwrap().edit_version];

    store.apply_stream_update(
        &StreamProgressEvent::progress("drafting", 20.0)
            .with_template(json!({"project_title": "Clinic booking v2"})),
    );
    versions.push(store.current().unwrap().edit_version);

    let ops = vec![PatchOperation::add("/risks", json!(["Data privacy"]))];
    store.apply_remote_update(Some(&ops), None, &DocumentMetadata::default());
    versions.push(store.current().unwrap().edit_version);

    // Failing patch without full content still counts as a mutation
    let bad = vec![PatchOperation::remove("/nope")];
    store.apply_remote_update(Some(&bad), None, &DocumentMetadata::default());
    versions.push(store.current().unwrap().edit_version);

    // The server only saw the reload; local ticks ran ahead of it
    store
        .apply_manual_edit(r#"{"project_title":"Edited"}"#, 1)
        .await
        .unwrap();
    assert_eq!(server.get(42).unwrap().edit_version, 2);
    versions.push(store.current().unwrap().edit_version);

    store.apply_stream_update(&StreamProgressEvent::progress("drafting", 30.0));
    versions.push(store.current().unwrap().edit_version);

    for pair in versions.windows(2) {
        assert!(pair[1] > pair[0], "edit versions must increase: {:?}", versions);
    }
}

#[tokio::test]
async fn test_save_after_local_ticks_keeps_version_ahead() {
    let server = InMemoryServer::with_document(server_doc(1));
    let store = DocumentStore::new(server.clone(), 64);
    store.reload(ReloadTarget::Document(42)).await.unwrap();
    store.apply_stream_update(&StreamProgressEvent::progress("drafting", 10.0));
    store.apply_stream_update(&StreamProgressEvent::progress("drafting", 20.0));
    let before = store.current().unwrap().edit_version;
    assert_eq!(before, 3);
    let mut changes = store.subscribe();

    let saved = store
        .apply_manual_edit(r#"{"project_title":"Edited"}"#, 1)
        .await
        .unwrap();

    assert_eq!(server.get(42).unwrap().edit_version, 2);
    assert!(saved.edit_version > before);
    assert_eq!(store.current().unwrap().edit_version, saved.edit_version);
    assert_eq!(
        saved.parsed_content().unwrap(),
        json!({"project_title": "Edited"})
    );
    let change = changes.try_recv().unwrap();
    assert_eq!(change.source, ChangeSource::ManualEdit);
    assert_eq!(change.edit_version(), Some(saved.edit_version));
}

#[tokio::test]
async fn test_reload_wins_even_with_lower_edit_version() {
    let server = InMemoryServer::with_document(server_doc(3));
    let store = DocumentStore::new(server, 64);

    for i in 0..10 {
        store.apply_stream_update(
            &StreamProgressEvent::progress("drafting", i as f64 * 10.0)
                .with_template(json!({"project_title": format!("Draft {}", i)})),
        );
    }
    assert_eq!(store.current().unwrap().edit_version, 10);

    let reloaded = store
        .reload(ReloadTarget::Document(42))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(reloaded.edit_version, 3);
    assert_eq!(store.current().unwrap().as_ref(), &server_doc(3));
}

#[tokio::test]
async fn test_reload_by_project_picks_latest() {
    let server = InMemoryServer::with_document(server_doc(2));
    let mut older = server_doc(9);
    older.id = 41;
    server.documents.lock().unwrap().insert(41, older);
    let store = DocumentStore::new(server, 64);

    let doc = store.reload(ReloadTarget::Project(7)).await.unwrap().unwrap();
    assert_eq!(doc.id, 42);
}

#[tokio::test]
async fn test_subscribers_never_see_unparseable_content() {
    let server = InMemoryServer::with_document(server_doc(1));
    let store = DocumentStore::new(server, 256);
    let mut changes = store.subscribe();

    store.apply_stream_update(
        &StreamProgressEvent::progress("a", 1.0).with_template(json!({"a": "B"})),
    );
    store.apply_remote_update(None, Some("{\"a\": \"Bu"), &DocumentMetadata::default());
    store.apply_remote_update(
        Some(&[PatchOperation::replace("/a", json!("Build"))]),
        Some("not json"),
        &DocumentMetadata::default(),
    );
    store.apply_remote_update(
        Some(&[PatchOperation::replace("/missing/x", json!(1))]),
        Some("[]"),
        &DocumentMetadata::default(),
    );
    store.apply_stream_update(&StreamProgressEvent::progress("b", 2.0).with_template(json!(7)));
    let _ = store.apply_manual_edit("{}", 99).await;
    store.reload(ReloadTarget::Document(42)).await.unwrap();

    let mut seen = 0;
    while let Ok(change) = changes.try_recv() {
        let doc = change.document.expect("every change here carries a document");
        assert!(
            doc.parsed_content().is_ok(),
            "torn content published: {}",
            doc.content
        );
        seen += 1;
    }
    assert_eq!(seen, 6);
}

#[tokio::test]
async fn test_stale_save_is_rejected_without_local_change() {
    let server = InMemoryServer::with_document(server_doc(5));
    let store = DocumentStore::new(server.clone(), 64);
    store.reload(ReloadTarget::Document(42)).await.unwrap();
    let before = store.current().unwrap();
    let mut changes = store.subscribe();

    let err = store
        .apply_manual_edit(r#"{"project_title":"Overwrite"}"#, 4)
        .await
        .unwrap_err();

    assert!(err.is_version_conflict());
    assert!(matches!(
        err,
        StoreError::VersionConflict {
            expected: 4,
            actual: Some(5)
        }
    ));
    assert_eq!(store.current().unwrap(), before);
    assert!(changes.try_recv().is_err());
    assert_eq!(server.get(42).unwrap().edit_version, 5);
}

#[tokio::test]
async fn test_status_update_flows_through_store() {
    let server = InMemoryServer::with_document(server_doc(5));
    let store = DocumentStore::new(server, 64);
    store.reload(ReloadTarget::Document(42)).await.unwrap();
    let mut changes = store.subscribe();

    let doc = store
        .update_status(CrsStatus::UnderReview, Some("Ready".to_string()))
        .await
        .unwrap();

    assert_eq!(doc.status, CrsStatus::UnderReview);
    assert_eq!(doc.structural_version, 1);
    let change = changes.try_recv().unwrap();
    assert_eq!(change.source, ChangeSource::StatusUpdate);
    assert_eq!(change.edit_version(), Some(5));
}
