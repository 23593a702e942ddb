// ABOUTME: Document state store holding the single live CRS document
// ABOUTME: Every writer mutates through here and every mutation is broadcast to subscribers

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crs_core::{CrsDocument, CrsStatus, DocumentMetadata, PatchOperation, StreamProgressEvent};
use crs_patch::{apply_update, PatchApplicationResult, TelemetrySink};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::events::{ChangeSource, DocumentChange, ReloadTarget};
use crate::persistence::Persistence;

#[derive(Default)]
struct StoreState {
    document: Option<Arc<CrsDocument>>,
    overall_summary: Option<String>,
}

/// Single source of truth for the document pane.
///
/// Snapshots are immutable `Arc`s: a mutation builds a complete new document
/// and swaps it in, so readers never see a half-applied update. The lock is
/// never held across an `.await`.
pub struct DocumentStore {
    state: RwLock<StoreState>,
    persistence: Arc<dyn Persistence>,
    telemetry: Option<Arc<dyn TelemetrySink>>,
    changes: broadcast::Sender<DocumentChange>,
}

impl DocumentStore {
    pub fn new(persistence: Arc<dyn Persistence>, channel_capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            state: RwLock::new(StoreState::default()),
            persistence,
            telemetry: None,
            changes,
        }
    }

    /// Record metrics for every remote update on `sink`
    pub fn with_telemetry(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(sink);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DocumentChange> {
        self.changes.subscribe()
    }

    pub fn current(&self) -> Option<Arc<CrsDocument>> {
        self.read_state().document.clone()
    }

    /// Narrative summary from the latest generation tick
    pub fn overall_summary(&self) -> Option<String> {
        self.read_state().overall_summary.clone()
    }

    /// Fold one generation tick into the document, creating it if needed
    pub fn apply_stream_update(&self, event: &StreamProgressEvent) -> Arc<CrsDocument> {
        let mut state = self.write_state();

        let mut next = state
            .document
            .as_deref()
            .cloned()
            .unwrap_or_default();

        if let Some(template) = &event.crs_template {
            match template {
                Value::Object(_) => next.content = template.to_string(),
                _ => debug!(step = %event.step, "Ignoring non-object content template"),
            }
        }
        if let Some(points) = &event.summary_points {
            next.summary_points = points.clone();
        }
        if let Some(id) = event.crs_document_id {
            if !next.is_persisted() && id > 0 {
                next.id = id;
            }
        }
        next.edit_version += 1;

        if event.overall_summary.is_some() {
            state.overall_summary = event.overall_summary.clone();
        }

        debug!(
            document_id = next.id,
            edit_version = next.edit_version,
            step = %event.step,
            progress = event.progress_percent,
            "Applied stream update"
        );
        let next = Arc::new(next);
        self.replace(&mut state, Some(next.clone()), ChangeSource::Stream);
        next
    }

    /// Apply a socket-delivered delta through the patch applicator
    pub fn apply_remote_update(
        &self,
        patch_ops: Option<&[PatchOperation]>,
        full_content: Option<&str>,
        overlay: &DocumentMetadata,
    ) -> PatchApplicationResult {
        let result = {
            let mut state = self.write_state();
            let result = apply_update(state.document.as_deref(), patch_ops, full_content, overlay);
            self.replace(
                &mut state,
                Some(Arc::new(result.updated_document.clone())),
                ChangeSource::Remote,
            );
            result
        };

        if let Some(sink) = &self.telemetry {
            sink.record(&result.metrics);
        }

        debug!(
            document_id = result.updated_document.id,
            edit_version = result.updated_document.edit_version,
            fallback = result.metrics.fallback_to_full,
            "Applied remote update"
        );
        result
    }

    /// Save `new_content` guarded by `expected_edit_version`.
    ///
    /// The server's response replaces the local document, with its
    /// `edit_version` raised past the local one when local ticks ran ahead of
    /// the server. On any error the local document is left exactly as it was.
    pub async fn apply_manual_edit(
        &self,
        new_content: &str,
        expected_edit_version: u64,
    ) -> Result<Arc<CrsDocument>> {
        let document_id = self.persisted_id()?;

        let mut saved = match self
            .persistence
            .save_content(document_id, new_content, expected_edit_version)
            .await
        {
            Ok(saved) => saved,
            Err(err) => {
                warn!(document_id, expected_edit_version, error = %err, "Manual edit not saved");
                return Err(err);
            }
        };

        let mut state = self.write_state();
        if let Some(local) = state.document.as_deref() {
            if saved.edit_version <= local.edit_version {
                debug!(
                    document_id,
                    server_edit_version = saved.edit_version,
                    local_edit_version = local.edit_version,
                    "Server version behind local ticks, advancing"
                );
                saved.edit_version = local.edit_version + 1;
            }
        }

        info!(
            document_id,
            edit_version = saved.edit_version,
            "Manual edit saved"
        );
        let saved = Arc::new(saved);
        self.replace(&mut state, Some(saved.clone()), ChangeSource::ManualEdit);
        Ok(saved)
    }

    /// Authoritative refetch. Replaces the local document unconditionally.
    pub async fn reload(&self, target: ReloadTarget) -> Result<Option<Arc<CrsDocument>>> {
        let fetched = self.fetch_authoritative(target).await?;
        Ok(self.install_reload(target, fetched))
    }

    /// First half of [`Self::reload`]: fetch without touching local state.
    /// Callers that can be torn down mid-fetch check their own state before
    /// handing the result to [`Self::install_reload`].
    pub async fn fetch_authoritative(&self, target: ReloadTarget) -> Result<Option<CrsDocument>> {
        match target {
            ReloadTarget::Document(id) => Ok(Some(self.persistence.fetch_document(id).await?)),
            ReloadTarget::Project(id) => self.persistence.fetch_latest_document(id).await,
        }
    }

    /// Second half of [`Self::reload`]: swap in a fetched document
    pub fn install_reload(
        &self,
        target: ReloadTarget,
        fetched: Option<CrsDocument>,
    ) -> Option<Arc<CrsDocument>> {
        let fetched = fetched.map(Arc::new);
        info!(
            ?target,
            document_id = ?fetched.as_ref().map(|doc| doc.id),
            edit_version = ?fetched.as_ref().map(|doc| doc.edit_version),
            "Reloaded authoritative document"
        );
        let mut state = self.write_state();
        self.replace(&mut state, fetched.clone(), ChangeSource::Reload);
        fetched
    }

    /// Move the document through the review workflow
    pub async fn update_status(
        &self,
        status: CrsStatus,
        reason: Option<String>,
    ) -> Result<Arc<CrsDocument>> {
        let document_id = self.persisted_id()?;
        let updated = self
            .persistence
            .update_status(document_id, status, reason)
            .await?;

        info!(document_id, %status, "Document status updated");
        let updated = Arc::new(updated);
        let mut state = self.write_state();
        self.replace(&mut state, Some(updated.clone()), ChangeSource::StatusUpdate);
        Ok(updated)
    }

    /// Drop the document when leaving a chat session
    pub fn clear(&self) {
        let mut state = self.write_state();
        state.overall_summary = None;
        self.replace(&mut state, None, ChangeSource::Cleared);
    }

    fn persisted_id(&self) -> Result<i64> {
        match self.read_state().document.as_deref() {
            Some(doc) if doc.is_persisted() => Ok(doc.id),
            _ => Err(StoreError::NoDocument),
        }
    }

    /// Swap in `document` and notify subscribers while still holding the lock,
    /// so notifications go out in mutation order
    fn replace(
        &self,
        state: &mut StoreState,
        document: Option<Arc<CrsDocument>>,
        source: ChangeSource,
    ) {
        state.document = document.clone();

        // No receivers is not an error
        let _ = self.changes.send(DocumentChange { document, source });
    }

    fn read_state(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
