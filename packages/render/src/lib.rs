//! Render-side change detection for the live CRS pane
//!
//! Works on generic JSON so new content sections need no changes here.

pub mod differ;
pub mod highlight;
pub mod tracker;

pub use differ::{diff_content, RenderDiff};
pub use highlight::HighlightTracker;
pub use tracker::{RenderTracker, RenderUpdate};
