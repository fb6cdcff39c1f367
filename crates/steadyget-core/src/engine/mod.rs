//! Transfer Engine
//!
//! This module implements the single-task downloader:
//! - Resumable transfer through byte-range requests
//! - Throughput watchdog that reconnects stalled streams
//! - Classified, bounded retries
//! - Pluggable validation and atomic publish

mod attempt;
pub mod retry;
mod transfer;
pub mod watchdog;

pub use attempt::AttemptReport;
pub use retry::{RetryState, Transition};
pub use transfer::*;
pub use watchdog::ThroughputWatchdog;
