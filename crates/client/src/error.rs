//! Error types for cloud API and shard operations.

use cirrus_core::ShardCategory;
use thiserror::Error;

/// Cloud client errors.
///
/// Cloneable so a single failed cache refresh can be handed to every caller
/// waiting on it; transport errors are flattened to messages at the boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CloudError {
    /// Server answered with a non-success status.
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    /// Body could not be parsed or did not match the request.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("no shard available for category {0}")]
    ShardUnavailable(ShardCategory),

    /// Missing credentials or unusable settings. Never retried.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl CloudError {
    /// Whether another attempt (possibly on another shard) may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, CloudError::Configuration(_))
    }
}

impl From<reqwest::Error> for CloudError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CloudError::Timeout(e.to_string())
        } else if e.is_builder() {
            CloudError::Configuration(e.to_string())
        } else if let Some(status) = e.status() {
            CloudError::Http {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else if e.is_decode() {
            CloudError::InvalidResponse(e.to_string())
        } else {
            CloudError::Connection(e.to_string())
        }
    }
}

impl From<url::ParseError> for CloudError {
    fn from(e: url::ParseError) -> Self {
        CloudError::Configuration(format!("invalid URL: {e}"))
    }
}

impl From<cirrus_core::Error> for CloudError {
    fn from(e: cirrus_core::Error) -> Self {
        match e {
            cirrus_core::Error::InvalidShardUrl(msg) => CloudError::InvalidResponse(msg),
            cirrus_core::Error::Config(msg) => CloudError::Configuration(msg),
            other => CloudError::Configuration(other.to_string()),
        }
    }
}

/// Result type for cloud operations.
pub type CloudResult<T> = std::result::Result<T, CloudError>;
