// ABOUTME: Per-update metrics produced by the patch applicator
// ABOUTME: Sizes, timing and the patch-versus-full decision for telemetry

use serde::{Deserialize, Serialize};

/// How the next document was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationMode {
    /// Every patch operation applied cleanly
    Patched,
    /// No patch was offered; content came from the full payload or stayed as is
    FullReplace,
    /// A patch was offered but could not be used
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchMetrics {
    pub document_id: i64,
    pub application_time_ms: f64,
    pub patch_operation_count: usize,
    pub patch_size_bytes: usize,
    pub full_size_bytes: usize,
    pub size_reduction_percent: f64,
    pub success: bool,
    pub fallback_to_full: bool,
    pub mode: ApplicationMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

/// Percentage of bytes saved by sending the patch instead of the full content
pub fn size_reduction_percent(patch_size_bytes: usize, full_size_bytes: usize) -> f64 {
    if patch_size_bytes == 0 || full_size_bytes == 0 {
        return 0.0;
    }
    let saved = full_size_bytes as f64 - patch_size_bytes as f64;
    (saved / full_size_bytes as f64) * 100.0
}
