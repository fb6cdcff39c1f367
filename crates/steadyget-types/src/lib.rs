//! Shared types for Steadyget
//!
//! This crate contains the plain data structures exchanged between
//! the transfer engine, the scheduler and the CLI.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

// ============================================================================
// Transfer Types
// ============================================================================

/// Lifecycle of a single transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    #[default]
    Idle,
    Running,
    Done,
    Failed,
}

/// How a failed attempt is treated by the retry loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorClass {
    /// The attempt received the whole body
    #[default]
    None,
    /// Connection broke after making progress; retried at once, free of charge
    Transient,
    /// No usable connection or no progress; counts against the retry budget
    Soft,
    /// The server rejected the resource; partial content is discarded
    Hard,
}

impl ErrorClass {
    /// Whether this class spends one unit of the connect-retry budget
    pub fn counts_against_budget(&self) -> bool {
        matches!(self, ErrorClass::Soft | ErrorClass::Hard)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ErrorClass::None => "none",
            ErrorClass::Transient => "transient",
            ErrorClass::Soft => "soft",
            ErrorClass::Hard => "hard",
        }
    }
}

/// Mutable record owned by one transfer engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferState {
    pub status: TransferStatus,
    pub bytes_downloaded: u64,
    /// Total size of the resource, if the server declared one
    pub bytes_total: Option<u64>,
    /// Learned from the first successful response
    pub can_resume: bool,
    pub status_text: String,
}

/// Terminal result for one submitted task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOutcome {
    pub task_id: usize,
    pub status: TransferStatus,
    pub success: bool,
    pub message: String,
}

impl DownloadOutcome {
    pub fn done(task_id: usize, message: impl Into<String>) -> Self {
        Self {
            task_id,
            status: TransferStatus::Done,
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(task_id: usize, message: impl Into<String>) -> Self {
        Self {
            task_id,
            status: TransferStatus::Failed,
            success: false,
            message: message.into(),
        }
    }

    /// Placeholder for a task that was never dequeued
    pub fn not_attempted(task_id: usize) -> Self {
        Self {
            task_id,
            status: TransferStatus::Idle,
            success: false,
            message: "not attempted".to_string(),
        }
    }

    pub fn was_attempted(&self) -> bool {
        self.status != TransferStatus::Idle
    }
}

// ============================================================================
// Event Types
// ============================================================================

/// Snapshot emitted on every state change of a transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub task_id: usize,
    pub status: TransferStatus,
    pub bytes_downloaded: u64,
    pub bytes_total: Option<u64>,
    pub status_text: String,
}

impl ProgressEvent {
    pub fn from_state(task_id: usize, state: &TransferState) -> Self {
        Self {
            task_id,
            status: state.status,
            bytes_downloaded: state.bytes_downloaded,
            bytes_total: state.bytes_total,
            status_text: state.status_text.clone(),
        }
    }
}

// ============================================================================
// Settings Types
// ============================================================================

/// How the scheduler reports progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressMode {
    /// One bar per worker plus an overall bar
    #[default]
    Aggregated,
    /// One line per status change
    Messages,
    /// No output at all
    Silent,
}

/// Engine and scheduler options, immutable for the duration of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bytes written per iteration of the body loop
    pub chunk_size: usize,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    /// Throughput floor in bytes per second, 0 disables the watchdog
    pub min_rate: u64,
    pub headers: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
    pub proxy: ProxySettings,
    pub temp_suffix: String,
    pub max_connect_retries: u32,
    pub use_validator: bool,
    pub validator_chunk_size: usize,
    pub max_validate_retries: u32,
    /// Delay in seconds between counted retries
    pub retry_delay_secs: u64,
    pub worker_count: usize,
    pub progress_mode: ProgressMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 10 * 1024,
            connect_timeout_secs: 10,
            read_timeout_secs: 10,
            min_rate: 128,
            headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
            proxy: ProxySettings::default(),
            temp_suffix: ".download".to_string(),
            max_connect_retries: 3,
            use_validator: true,
            validator_chunk_size: 10 * 1024 * 1024,
            max_validate_retries: 1,
            retry_delay_secs: 1,
            worker_count: 1,
            progress_mode: ProgressMode::Aggregated,
        }
    }
}

impl EngineConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// Reject values the engine cannot work with
    pub fn check(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be greater than zero".to_string());
        }
        if self.validator_chunk_size == 0 {
            return Err("validator_chunk_size must be greater than zero".to_string());
        }
        if self.worker_count == 0 {
            return Err("worker_count must be at least 1".to_string());
        }
        if self.temp_suffix.is_empty() {
            return Err("temp_suffix must not be empty".to_string());
        }
        Ok(())
    }
}

/// Proxy configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySettings {
    /// Proxy mode: "none", "system", or "manual"
    #[serde(default = "default_proxy_mode")]
    pub mode: String,
    /// HTTP proxy URL (for manual mode)
    #[serde(default)]
    pub http_proxy: Option<String>,
    /// HTTPS proxy URL (for manual mode)
    #[serde(default)]
    pub https_proxy: Option<String>,
    /// Bypass proxy for these hosts (comma-separated)
    #[serde(default)]
    pub no_proxy: Option<String>,
    /// Proxy authentication username
    #[serde(default)]
    pub username: Option<String>,
    /// Proxy authentication password
    #[serde(default)]
    pub password: Option<String>,
}

fn default_proxy_mode() -> String {
    "system".to_string()
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            mode: default_proxy_mode(),
            http_proxy: None,
            https_proxy: None,
            no_proxy: None,
            username: None,
            password: None,
        }
    }
}
