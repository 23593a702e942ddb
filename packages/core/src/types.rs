// ABOUTME: CRS document types shared by every synchronization package
// ABOUTME: Defines the document record, workflow status, template pattern and metadata overlay

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::constants::EMPTY_CONTENT;
use crate::content::CrsContent;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseEnumError {
    #[error("Unknown CRS status: {0}")]
    Status(String),
    #[error("Unknown CRS pattern: {0}")]
    Pattern(String),
}

/// Workflow status of a CRS document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrsStatus {
    #[default]
    Draft,
    UnderReview,
    Approved,
    Rejected,
}

impl CrsStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::UnderReview => "under_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Human readable label for status badges
    pub fn label(&self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::UnderReview => "Under Review",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }

    /// Whether the manual editor should be offered for this status.
    /// Reviewers own the document while it is under review or approved.
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Draft | Self::Rejected)
    }
}

impl fmt::Display for CrsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CrsStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "under_review" => Ok(Self::UnderReview),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(ParseEnumError::Status(s.to_string())),
        }
    }
}

/// Structural template the content schema follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrsPattern {
    #[default]
    IsoIecIeee29148,
    Ieee830,
    Babok,
    AgileUserStories,
}

impl CrsPattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IsoIecIeee29148 => "iso_iec_ieee_29148",
            Self::Ieee830 => "ieee_830",
            Self::Babok => "babok",
            Self::AgileUserStories => "agile_user_stories",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::IsoIecIeee29148 => "ISO/IEC/IEEE 29148",
            Self::Ieee830 => "IEEE 830",
            Self::Babok => "BABOK",
            Self::AgileUserStories => "Agile User Stories",
        }
    }
}

impl fmt::Display for CrsPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CrsPattern {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "iso_iec_ieee_29148" => Ok(Self::IsoIecIeee29148),
            "ieee_830" => Ok(Self::Ieee830),
            "babok" => Ok(Self::Babok),
            "agile_user_stories" => Ok(Self::AgileUserStories),
            _ => Err(ParseEnumError::Pattern(s.to_string())),
        }
    }
}

/// Client Requirements Specification document as held in view state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrsDocument {
    /// 0 until the server persists the document
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub project_id: i64,
    #[serde(default)]
    pub chat_session_id: Option<i64>,
    #[serde(default)]
    pub status: CrsStatus,
    #[serde(default)]
    pub pattern: CrsPattern,
    /// Bumped only on workflow-significant events (submission, approval cycles)
    #[serde(rename = "version", default)]
    pub structural_version: u64,
    /// Bumped on every content mutation
    #[serde(default)]
    pub edit_version: u64,
    /// Serialized JSON object
    #[serde(default = "default_content")]
    pub content: String,
    #[serde(default)]
    pub summary_points: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_content() -> String {
    EMPTY_CONTENT.to_string()
}

impl Default for CrsDocument {
    fn default() -> Self {
        Self {
            id: 0,
            project_id: 0,
            chat_session_id: None,
            status: CrsStatus::Draft,
            pattern: CrsPattern::default(),
            structural_version: 0,
            edit_version: 0,
            content: default_content(),
            summary_points: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }
}

impl CrsDocument {
    /// Whether the server has assigned an id yet
    pub fn is_persisted(&self) -> bool {
        self.id > 0
    }

    pub fn parsed_content(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.content)
    }

    /// Schema-on-read view of the content. Unparseable content reads as empty.
    pub fn typed_content(&self) -> CrsContent {
        serde_json::from_str(&self.content).unwrap_or_default()
    }

    /// Build a fresh document from metadata and a content string
    pub fn from_overlay(overlay: &DocumentMetadata, content: String) -> Self {
        let mut doc = Self {
            content,
            ..Self::default()
        };
        overlay.apply_to(&mut doc);
        if let Some(edit_version) = overlay.edit_version {
            doc.edit_version = edit_version;
        }
        doc
    }
}

/// Partial document carrying authoritative metadata for one update.
///
/// Fields left as `None` keep whatever the current document holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentMetadata {
    pub id: Option<i64>,
    pub project_id: Option<i64>,
    pub chat_session_id: Option<i64>,
    pub status: Option<CrsStatus>,
    pub pattern: Option<CrsPattern>,
    #[serde(rename = "version")]
    pub structural_version: Option<u64>,
    pub edit_version: Option<u64>,
    pub summary_points: Option<Vec<String>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl DocumentMetadata {
    /// Merge every field except `edit_version` into `doc`.
    ///
    /// The structural version only moves forward; the edit version is owned by
    /// whoever produces the next document.
    pub fn apply_to(&self, doc: &mut CrsDocument) {
        if let Some(id) = self.id {
            doc.id = id;
        }
        if let Some(project_id) = self.project_id {
            doc.project_id = project_id;
        }
        if self.chat_session_id.is_some() {
            doc.chat_session_id = self.chat_session_id;
        }
        if let Some(status) = self.status {
            doc.status = status;
        }
        if let Some(pattern) = self.pattern {
            doc.pattern = pattern;
        }
        if let Some(version) = self.structural_version {
            doc.structural_version = doc.structural_version.max(version);
        }
        if let Some(points) = &self.summary_points {
            doc.summary_points = points.clone();
        }
        if self.created_at.is_some() {
            doc.created_at = self.created_at;
        }
        if self.updated_at.is_some() {
            doc.updated_at = self.updated_at;
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("draft", CrsStatus::Draft)]
    #[case("under_review", CrsStatus::UnderReview)]
    #[case("APPROVED", CrsStatus::Approved)]
    #[case("rejected", CrsStatus::Rejected)]
    fn test_status_from_str(#[case] input: &str, #[case] expected: CrsStatus) {
        assert_eq!(input.parse::<CrsStatus>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let err = "archived".parse::<CrsStatus>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown CRS status: archived");
    }

    #[test]
    fn test_only_draft_and_rejected_are_editable() {
        assert!(CrsStatus::Draft.is_editable());
        assert!(CrsStatus::Rejected.is_editable());
        assert!(!CrsStatus::UnderReview.is_editable());
        assert!(!CrsStatus::Approved.is_editable());
    }

    #[test]
    fn test_document_wire_format_uses_version_for_structural_version() {
        let json = r#"{
            "id": 7,
            "project_id": 3,
            "status": "under_review",
            "pattern": "babok",
            "version": 2,
            "edit_version": 11,
            "content": "{\"project_title\":\"Portal\"}",
            "summary_points": ["Customer portal"]
        }"#;

        let doc: CrsDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.id, 7);
        assert_eq!(doc.structural_version, 2);
        assert_eq!(doc.edit_version, 11);
        assert_eq!(doc.status, CrsStatus::UnderReview);
        assert_eq!(doc.pattern, CrsPattern::Babok);
        assert_eq!(doc.typed_content().project_title.as_deref(), Some("Portal"));
        assert!(doc.chat_session_id.is_none());
    }

    #[test]
    fn test_missing_content_defaults_to_empty_object() {
        let doc: CrsDocument = serde_json::from_str(r#"{"id": 1}"#).unwrap();
        assert_eq!(doc.content, "{}");
        assert!(doc.parsed_content().unwrap().is_object());
    }

    #[test]
    fn test_metadata_never_lowers_structural_version() {
        let mut doc = CrsDocument {
            structural_version: 4,
            ..CrsDocument::default()
        };
        let overlay = DocumentMetadata {
            structural_version: Some(2),
            status: Some(CrsStatus::Approved),
            summary_points: Some(vec!["one".to_string()]),
            ..DocumentMetadata::default()
        };

        overlay.apply_to(&mut doc);

        assert_eq!(doc.structural_version, 4);
        assert_eq!(doc.status, CrsStatus::Approved);
        assert_eq!(doc.summary_points, vec!["one".to_string()]);
    }

    #[test]
    fn test_metadata_does_not_touch_edit_version() {
        let mut doc = CrsDocument {
            edit_version: 9,
            ..CrsDocument::default()
        };
        let overlay = DocumentMetadata {
            edit_version: Some(1),
            ..DocumentMetadata::default()
        };

        overlay.apply_to(&mut doc);
        assert_eq!(doc.edit_version, 9);
    }

    #[test]
    fn test_from_overlay_takes_edit_version() {
        let overlay = DocumentMetadata {
            id: Some(5),
            edit_version: Some(3),
            ..DocumentMetadata::default()
        };
        let doc = CrsDocument::from_overlay(&overlay, "{}".to_string());
        assert_eq!(doc.id, 5);
        assert_eq!(doc.edit_version, 3);
        assert!(doc.is_persisted());
    }
}
