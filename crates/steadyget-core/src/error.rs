//! Error types for Steadyget core

use steadyget_types::ErrorClass;
use thiserror::Error;

/// Errors that can occur in Steadyget core
#[derive(Debug, Error)]
pub enum SteadygetError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Timeout")]
    Timeout,

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl SteadygetError {
    /// Classify a failure that ended an attempt after `received` bytes.
    ///
    /// Returns `None` for local failures, which are never retried.
    pub fn class(&self, received: u64) -> Option<ErrorClass> {
        match self {
            SteadygetError::ServerError { .. } => Some(ErrorClass::Hard),
            SteadygetError::Network(_) | SteadygetError::Timeout => {
                if received > 0 {
                    Some(ErrorClass::Transient)
                } else {
                    Some(ErrorClass::Soft)
                }
            }
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SteadygetError {
    fn from(error: serde_json::Error) -> Self {
        SteadygetError::Serialization(error.to_string())
    }
}

impl From<SteadygetError> for String {
    fn from(error: SteadygetError) -> Self {
        error.to_string()
    }
}
