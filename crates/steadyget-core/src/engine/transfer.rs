//! Transfer engine - materializes one URL at one destination
//!
//! Drives the attempt loop (connect, stream, classify, retry), runs the
//! validator on a complete body and publishes the temp file atomically.
//! A task never leaves a half-written destination or a stray temp file.

use crate::engine::retry::{RetryState, Transition};
use crate::error::SteadygetError;
use crate::progress::{NoopSink, ProgressSink};
use crate::task::{temp_path, Destination, DownloadTask};
use crate::validator::{MultipartEtagValidator, Validator};
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::io::{Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;
use steadyget_types::{
    DownloadOutcome, EngineConfig, ErrorClass, ProgressEvent, TransferState, TransferStatus,
};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

pub const STATUS_STARTING: &str = "Starting";
pub const STATUS_MOVING_FILE: &str = "Moving file";
pub const STATUS_DONE: &str = "Done";
pub const STATUS_VALIDATION_FAILED: &str = "validation failed";

/// Downloads a single task with retry, resume and validation
pub struct TransferEngine {
    pub(crate) task: DownloadTask,
    pub(crate) config: Arc<EngineConfig>,
    pub(crate) client: Client,
    pub(crate) state: TransferState,
    /// Set once the first successful response told us about range support
    pub(crate) resume_learned: bool,
    validator: Arc<dyn Validator>,
    sink: Arc<dyn ProgressSink>,
}

impl TransferEngine {
    /// Create an engine bound to a worker's client
    pub fn new(task: DownloadTask, config: Arc<EngineConfig>, client: Client) -> Self {
        Self {
            task,
            config,
            client,
            state: TransferState::default(),
            resume_learned: false,
            validator: Arc::new(MultipartEtagValidator),
            sink: Arc::new(NoopSink),
        }
    }

    /// Replace the default multipart ETag check
    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Run the task to a terminal outcome. Never panics on transfer errors.
    pub async fn run(mut self) -> DownloadOutcome {
        info!("Starting transfer {}: {} -> {:?}", self.task.id, self.task.url, self.task.destination);

        self.state.status = TransferStatus::Running;
        self.set_status_text(STATUS_STARTING);

        let destination = self.task.destination.clone();
        let result = match check_url(&self.task.url) {
            Err(e) => Err(e),
            Ok(()) => match &destination {
                Destination::Path(path) => self.run_to_path(path).await,
                Destination::File(shared) => {
                    let mut file = shared.lock().await;
                    self.transfer(&mut file).await
                }
            },
        };

        let id = self.task.id;
        match result {
            Ok(true) => {
                self.state.status = TransferStatus::Done;
                self.set_status_text(STATUS_DONE);
                info!("Transfer {} complete ({} bytes)", id, self.state.bytes_downloaded);
                DownloadOutcome::done(id, STATUS_DONE)
            }
            Ok(false) => {
                self.state.status = TransferStatus::Failed;
                self.emit();
                warn!("Transfer {} failed: {}", id, self.state.status_text);
                DownloadOutcome::failed(id, self.state.status_text.clone())
            }
            Err(e) => {
                error!("Transfer {} aborted: {}", id, e);
                self.state.status = TransferStatus::Failed;
                self.set_status_text(e.to_string());
                DownloadOutcome::failed(id, self.state.status_text.clone())
            }
        }
    }

    /// Download into the sibling temp file, then rename it into place
    async fn run_to_path(&mut self, path: &Path) -> Result<bool, SteadygetError> {
        let temp = temp_path(path, &self.config.temp_suffix);
        let result = self.publish_via_temp(path, &temp).await;

        match fs::remove_file(&temp).await {
            Ok(()) => debug!("Removed temp file {}", temp.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove temp file {}: {}", temp.display(), e),
        }

        result
    }

    async fn publish_via_temp(&mut self, path: &Path, temp: &Path) -> Result<bool, SteadygetError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(temp)
            .await?;

        let ok = self.transfer(&mut file).await?;
        file.sync_all().await?;
        drop(file);

        if !ok {
            return Ok(false);
        }

        self.set_status_text(STATUS_MOVING_FILE);
        fs::rename(temp, path).await?;
        Ok(true)
    }

    /// The attempt loop. Ok(false) means the retry budget ran out; the
    /// reason is left in the status text.
    async fn transfer(&mut self, file: &mut File) -> Result<bool, SteadygetError> {
        let mut retry = RetryState::new();

        loop {
            self.set_status_text(retry.status_text());

            let report = self.fetch_once(file).await?;

            // Without range support a broken connection loses its progress
            let class = match report.class {
                ErrorClass::Transient if !self.state.can_resume => ErrorClass::Soft,
                class => class,
            };

            if class == ErrorClass::Hard {
                self.discard(file).await?;
            }

            match retry.after_attempt(report.complete, class, self.config.max_connect_retries) {
                Transition::Complete => {}
                Transition::RetryNow => {
                    debug!("Reconnecting {} after {} bytes", self.task.url, report.received);
                    continue;
                }
                Transition::RetryAfterDelay => {
                    warn!(
                        "{}: {} error, retry #{}/{} in {}s",
                        self.task.url,
                        class.label(),
                        retry.connect_retries,
                        self.config.max_connect_retries,
                        self.config.retry_delay_secs
                    );
                    self.set_status_text(retry.status_text());
                    tokio::time::sleep(self.config.retry_delay()).await;
                    continue;
                }
                Transition::GiveUp(class) => {
                    self.state.status_text = format!("retry count exceeded ({} error)", class.label());
                    return Ok(false);
                }
            }

            if self.validate(file, &report.headers).await? {
                return Ok(true);
            }

            self.discard(file).await?;
            if !retry.after_validation_failure(self.config.max_validate_retries) {
                self.state.status_text = STATUS_VALIDATION_FAILED.to_string();
                return Ok(false);
            }
            warn!(
                "{}: validation failed, retry #{}/{}",
                self.task.url, retry.validate_retries, self.config.max_validate_retries
            );
            self.set_status_text(retry.status_text());
        }
    }

    /// Hand the finished body to the validator on the blocking pool
    async fn validate(&self, file: &mut File, headers: &HeaderMap) -> Result<bool, SteadygetError> {
        if !self.config.use_validator {
            return Ok(true);
        }
        let validator = self.validator.clone();

        file.flush().await?;
        let mut reader = file.try_clone().await?.into_std().await;
        let headers = headers.clone();
        let chunk_size = self.config.validator_chunk_size;

        let valid = tokio::task::spawn_blocking(move || -> std::io::Result<bool> {
            reader.seek(SeekFrom::Start(0))?;
            validator.validate(&mut reader, &headers, chunk_size)
        })
        .await
        .map_err(|e| SteadygetError::Unknown(format!("Validator task failed: {}", e)))??;

        Ok(valid)
    }

    /// Throw away everything written so far
    async fn discard(&mut self, file: &mut File) -> Result<(), SteadygetError> {
        file.set_len(0).await?;
        self.state.bytes_downloaded = 0;
        Ok(())
    }

    pub(crate) fn emit(&self) {
        self.sink
            .on_progress(&ProgressEvent::from_state(self.task.id, &self.state));
    }

    fn set_status_text(&mut self, text: impl Into<String>) {
        self.state.status_text = text.into();
        self.emit();
    }
}

/// Only http and https URLs are fetched
fn check_url(raw: &str) -> Result<(), SteadygetError> {
    let parsed = url::Url::parse(raw).map_err(|_| SteadygetError::InvalidUrl(raw.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(SteadygetError::InvalidUrl(raw.to_string())),
    }
}
