// ABOUTME: Produces the next CRS document from a patch or full-content update
// ABOUTME: Falls back to full replacement whenever any patch operation cannot be applied

use std::time::Instant;

use crs_core::constants::EMPTY_CONTENT;
use crs_core::utils::serialized_len;
use crs_core::{CrsDocument, DocumentMetadata, PatchOperation};
use serde_json::Value;
use tracing::debug;

use crate::error::PatchError;
use crate::metrics::{size_reduction_percent, ApplicationMode, PatchMetrics};
use crate::ops::apply_all;

/// Outcome of one update cycle
#[derive(Debug, Clone, PartialEq)]
pub struct PatchApplicationResult {
    pub updated_document: CrsDocument,
    pub metrics: PatchMetrics,
}

/// Compute the next document.
///
/// Never fails: a patch that does not fit the current content is discarded as a
/// whole and the update falls back to `full_content`, or to the current content
/// when no usable full content was sent. Inputs are never mutated.
pub fn apply_update(
    current: Option<&CrsDocument>,
    patch_ops: Option<&[PatchOperation]>,
    full_content: Option<&str>,
    overlay: &DocumentMetadata,
) -> PatchApplicationResult {
    let started = Instant::now();
    let ops = patch_ops.unwrap_or_default();
    let patch_size_bytes = if ops.is_empty() { 0 } else { serialized_len(ops) };

    let valid_full = full_content.filter(|content| is_json_object(content));
    let rejected_full = full_content.is_some() && valid_full.is_none();
    if rejected_full {
        debug!("Ignoring full content that is not a JSON object");
    }

    let (mut document, mode, success, failure_reason) = match current {
        None => {
            let content = valid_full.unwrap_or(EMPTY_CONTENT).to_string();
            let mode = if ops.is_empty() {
                ApplicationMode::FullReplace
            } else {
                ApplicationMode::Fallback
            };
            let mut doc = CrsDocument::from_overlay(overlay, content);
            if overlay.edit_version.is_none() {
                doc.edit_version = 1;
            }
            (doc, mode, !rejected_full, None)
        }
        Some(current) => {
            let next_edit_version = match overlay.edit_version {
                Some(v) => v.max(current.edit_version + 1),
                None => current.edit_version + 1,
            };

            let (content, mode, success, failure_reason) = if ops.is_empty() {
                match valid_full {
                    Some(full) => (full.to_string(), ApplicationMode::FullReplace, true, None),
                    None => (
                        current.content.clone(),
                        ApplicationMode::FullReplace,
                        !rejected_full,
                        None,
                    ),
                }
            } else {
                match patch_content(&current.content, ops) {
                    Ok(patched) => (patched, ApplicationMode::Patched, true, None),
                    Err(err) => {
                        debug!(
                            document_id = current.id,
                            error = %err,
                            "Patch rejected, falling back to full content"
                        );
                        match valid_full {
                            Some(full) => (
                                full.to_string(),
                                ApplicationMode::Fallback,
                                true,
                                Some(err.to_string()),
                            ),
                            None => (
                                current.content.clone(),
                                ApplicationMode::Fallback,
                                false,
                                Some(err.to_string()),
                            ),
                        }
                    }
                }
            };

            let mut doc = CrsDocument {
                content,
                ..current.clone()
            };
            doc.edit_version = next_edit_version;
            (doc, mode, success, failure_reason)
        }
    };

    overlay.apply_to(&mut document);

    let full_size_bytes = match valid_full {
        Some(full) => full.len(),
        None => document.content.len(),
    };

    let metrics = PatchMetrics {
        document_id: document.id,
        application_time_ms: started.elapsed().as_secs_f64() * 1000.0,
        patch_operation_count: ops.len(),
        patch_size_bytes,
        full_size_bytes,
        size_reduction_percent: size_reduction_percent(patch_size_bytes, full_size_bytes),
        success,
        fallback_to_full: mode != ApplicationMode::Patched,
        mode,
        failure_reason,
    };

    PatchApplicationResult {
        updated_document: document,
        metrics,
    }
}

/// Apply `ops` to a scratch copy of `content` and serialize the result
fn patch_content(content: &str, ops: &[PatchOperation]) -> Result<String, PatchError> {
    let mut scratch: Value =
        serde_json::from_str(content).map_err(|e| PatchError::InvalidContent(e.to_string()))?;
    if !scratch.is_object() {
        return Err(PatchError::InvalidContent("root is not an object".to_string()));
    }

    apply_all(&mut scratch, ops)?;

    if !scratch.is_object() {
        return Err(PatchError::TypeConflict {
            path: String::new(),
            expected: "object root after patch",
        });
    }
    serde_json::to_string(&scratch).map_err(|e| PatchError::InvalidContent(e.to_string()))
}

fn is_json_object(content: &str) -> bool {
    serde_json::from_str::<Value>(content)
        .map(|value| value.is_object())
        .unwrap_or(false)
}
