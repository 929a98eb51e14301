//! Inclusive byte ranges.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive byte range `[start, end]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByteRange {
    start: u64,
    end: u64,
}

impl ByteRange {
    /// Create a range. Fails if `end < start`.
    pub fn new(start: u64, end: u64) -> Result<Self> {
        if end < start {
            return Err(Error::InvalidRange(format!("end ({end}) < start ({start})")));
        }
        Ok(Self { start, end })
    }

    /// Resolve a request against a file of `total` bytes.
    ///
    /// `end` is inclusive and clamped to the last byte of the file. A missing
    /// `end` reads through the end of the file, and a `0-0` request is treated
    /// as a request for the whole file. Returns `None` when there is nothing to
    /// read (empty file).
    pub fn resolve(start: Option<u64>, end: Option<u64>, total: u64) -> Result<Option<Self>> {
        let start = start.unwrap_or(0);

        if total == 0 {
            if start == 0 {
                return Ok(None);
            }
            return Err(Error::InvalidRange(format!(
                "start ({start}) beyond empty file"
            )));
        }

        if start >= total {
            return Err(Error::InvalidRange(format!(
                "start ({start}) beyond end of file ({total} bytes)"
            )));
        }

        let last = total - 1;
        let end = match end {
            Some(0) if start == 0 => last,
            Some(end) => end.min(last),
            None => last,
        };

        Self::new(start, end).map(Some)
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of bytes covered. Never zero.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Range` header value, e.g. `bytes=0-1023`.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }

    /// The remainder of this range after the first `consumed` bytes, if any.
    pub fn skip(&self, consumed: u64) -> Option<Self> {
        let start = self.start.checked_add(consumed)?;
        (start <= self.end).then_some(Self {
            start,
            end: self.end,
        })
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
