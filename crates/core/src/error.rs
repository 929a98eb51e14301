//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("logical file has no parts")]
    EmptyFile,

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("invalid public link: {0}")]
    InvalidPublicLink(String),

    #[error("invalid shard url: {0}")]
    InvalidShardUrl(String),

    #[error("unknown shard category: {0}")]
    UnknownShardCategory(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
