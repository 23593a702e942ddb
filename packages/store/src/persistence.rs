// ABOUTME: Persistence collaborator contract used by the document store
// ABOUTME: Fetches authoritative documents and performs version-checked saves

use async_trait::async_trait;
use crs_core::{CrsDocument, CrsStatus};

use crate::error::Result;

/// Server-side source of truth for CRS documents.
///
/// `save_content` must reject the write with `StoreError::VersionConflict`
/// when the server's edit version differs from `expected_edit_version`.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Latest document for a project, `None` when nothing has been drafted yet
    async fn fetch_latest_document(&self, project_id: i64) -> Result<Option<CrsDocument>>;

    async fn fetch_document(&self, document_id: i64) -> Result<CrsDocument>;

    async fn save_content(
        &self,
        document_id: i64,
        content: &str,
        expected_edit_version: u64,
    ) -> Result<CrsDocument>;

    async fn update_status(
        &self,
        document_id: i64,
        status: CrsStatus,
        reason: Option<String>,
    ) -> Result<CrsDocument>;
}
