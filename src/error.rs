use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the frontier itself.
///
/// Only caller mistakes (blank or malformed URLs) and setup problems are
/// errors. Routine admission outcomes such as duplicates or an exhausted queue
/// are reported through [`crate::Admission`] instead.
#[derive(Debug, Clone, Error)]
pub enum FrontierError {
    #[error("URL argument is missing or blank")]
    MissingUrl,

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("URL has no host: {0}")]
    MissingHost(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl FrontierError {
    /// True when the error was caused by the argument passed in, as opposed to
    /// the environment the frontier runs in.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            FrontierError::MissingUrl | FrontierError::InvalidUrl { .. } | FrontierError::MissingHost(_)
        )
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            FrontierError::MissingUrl => ErrorSeverity::Low,
            FrontierError::InvalidUrl { .. } => ErrorSeverity::Low,
            FrontierError::MissingHost(_) => ErrorSeverity::Low,
            FrontierError::Configuration(_) => ErrorSeverity::High,
            _ => ErrorSeverity::Medium,
        }
    }
}

/// Failures reported by a [`crate::PageFetcher`].
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Unreadable body: {0}")]
    Body(String),
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network(_) | FetchError::Timeout(_) => true,
            FetchError::Status(code) => *code == 429 || *code >= 500,
            FetchError::Body(_) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl From<std::io::Error> for FrontierError {
    fn from(err: std::io::Error) -> Self {
        FrontierError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for FrontierError {
    fn from(err: serde_json::Error) -> Self {
        FrontierError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else if err.is_body() || err.is_decode() {
            FetchError::Body(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}
