//! Session watcher wiring the CRS synchronization pipeline end to end
//!
//! Builds the store, both adapters and a render tracker for one chat
//! session and logs every document change until interrupted.

pub mod args;
pub mod watch;

pub use args::Args;
pub use watch::run;
