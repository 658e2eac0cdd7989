//! Fetch Error Types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FetchError>;

/// Failure of a single upstream fetch.
///
/// Absence of data is an expected outcome for callers, so this type is
/// `Clone` and carries no borrowed state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Upstream returned HTTP {0}")]
    Http(u16),

    #[error("Upstream timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Source not configured: {0}")]
    NotConfigured(&'static str),
}

impl FetchError {
    /// Short label for structured logging
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Http(_) => "http",
            FetchError::Timeout => "timeout",
            FetchError::Network(_) => "network",
            FetchError::Malformed(_) => "malformed",
            FetchError::NotConfigured(_) => "not_configured",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_decode() {
            FetchError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::Http(status.as_u16())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Malformed(err.to_string())
    }
}
