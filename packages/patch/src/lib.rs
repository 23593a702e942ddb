//! Patch application for live CRS content
//!
//! Takes the currently rendered document plus an incoming update (JSON patch
//! operations, full content, or both) and produces the next document. A patch
//! that does not fit the current content is abandoned as a whole in favour of
//! the full payload, so the caller always gets a complete, parseable document.

pub mod applicator;
pub mod error;
pub mod metrics;
pub mod ops;
pub mod pointer;
pub mod telemetry;

pub use applicator::{apply_update, PatchApplicationResult};
pub use error::{PatchError, Result};
pub use metrics::{ApplicationMode, PatchMetrics};
pub use telemetry::{ChannelTelemetrySink, FanoutTelemetrySink, TelemetrySink, TracingTelemetrySink};
