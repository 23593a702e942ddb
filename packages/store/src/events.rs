// ABOUTME: Change notifications published after every store mutation
// ABOUTME: Carries the new snapshot and which writer produced it

use std::sync::Arc;

use crs_core::CrsDocument;

/// Writer responsible for a change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSource {
    Stream,
    Remote,
    ManualEdit,
    Reload,
    StatusUpdate,
    Cleared,
}

impl ChangeSource {
    /// Authoritative sources end any in-progress streaming of a field
    pub fn is_authoritative(&self) -> bool {
        matches!(self, Self::ManualEdit | Self::Reload | Self::Cleared)
    }
}

/// Snapshot published to subscribers.
///
/// `document` is `None` after a clear or a reload that found nothing.
#[derive(Debug, Clone)]
pub struct DocumentChange {
    pub document: Option<Arc<CrsDocument>>,
    pub source: ChangeSource,
}

impl DocumentChange {
    pub fn edit_version(&self) -> Option<u64> {
        self.document.as_ref().map(|doc| doc.edit_version)
    }

    pub fn document_id(&self) -> Option<i64> {
        self.document.as_ref().map(|doc| doc.id)
    }
}

/// What an authoritative reload should fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadTarget {
    Document(i64),
    /// Latest document of a project
    Project(i64),
}
