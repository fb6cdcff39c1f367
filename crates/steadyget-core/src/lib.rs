//! Steadyget Core - Transfer Engine
//!
//! This crate fetches lists of URLs over flaky links. Each task resumes
//! through byte ranges, reconnects when throughput drops below a floor,
//! retries by error class, validates the finished body and publishes it
//! with an atomic rename. A scheduler runs many tasks on a bounded worker
//! pool and returns one outcome per task in submission order.

pub mod client;
pub mod config_store;
pub mod engine;
mod error;
pub mod progress;
pub mod scheduler;
pub mod summary;
pub mod task;
pub mod validator;

pub use client::build_client;
pub use config_store::{default_config_path, load_config, load_or_default, save_config};
pub use engine::TransferEngine;
pub use error::*;
pub use progress::{NoopSink, ProgressSink};
pub use scheduler::{CancelHandle, Scheduler};
pub use summary::{RunSummary, Verdict};
pub use task::{Destination, DownloadTask, SharedFile};
pub use validator::{multipart_etag, MultipartEtagValidator, Validator};

pub use steadyget_types as types;
