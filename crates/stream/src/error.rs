//! Stream error types.

use cirrus_client::CloudError;
use std::io;
use thiserror::Error;

/// Errors surfaced by a download stream.
///
/// Cloneable because a fault is stored in the buffer and returned to every
/// later read.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// A segment ran out of retries; the stream is aborted.
    #[error("part {index} failed after {attempts} attempts: {last_error}")]
    SegmentFailed {
        index: usize,
        attempts: u32,
        last_error: CloudError,
    },

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("cannot seek to {position}: buffered window is {low}..={high}")]
    InvalidSeek { position: u64, low: u64, high: u64 },

    /// The consumer closed the stream.
    #[error("stream closed")]
    Closed,

    /// The background fetch task panicked.
    #[error("fetch task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Cloud(#[from] CloudError),
}

impl From<cirrus_core::Error> for StreamError {
    fn from(e: cirrus_core::Error) -> Self {
        match e {
            cirrus_core::Error::InvalidRange(msg) => StreamError::InvalidRange(msg),
            other => StreamError::Cloud(other.into()),
        }
    }
}

impl From<StreamError> for io::Error {
    fn from(e: StreamError) -> Self {
        let kind = match &e {
            StreamError::InvalidSeek { .. } | StreamError::InvalidRange(_) => {
                io::ErrorKind::InvalidInput
            }
            StreamError::Closed => io::ErrorKind::BrokenPipe,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, e)
    }
}

/// Result type for stream operations.
pub type StreamResult<T> = std::result::Result<T, StreamError>;
