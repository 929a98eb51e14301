//! Logical files and the physical parts that back them.
//!
//! Large files are stored as several physical objects. A logical file is the
//! concatenation of its parts in order; byte `k` of the logical file lives in
//! exactly one part, found with a running prefix sum over part sizes.

use crate::range::ByteRange;
use crate::shard::{ShardCategory, ShardEndpoint};
use crate::{Error, Result};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use url::Url;

/// Escape everything except RFC 3986 unreserved characters, `/` included.
const PATH_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Prefix stripped from public link paths before appending to a shard URL.
const PUBLIC_PREFIX: &str = "/public";

/// Where a part's bytes are fetched from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PartSource {
    /// A file in the account's own tree, addressed by full path.
    Private { path: String },
    /// A file shared through a public link.
    Public { link: String },
}

/// One stored object contributing a contiguous slice of a logical file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPart")]
pub struct PhysicalPart {
    source: PartSource,
    size: u64,
}

impl PhysicalPart {
    pub fn private(path: impl Into<String>, size: u64) -> Self {
        Self {
            source: PartSource::Private { path: path.into() },
            size,
        }
    }

    /// A part reachable through a public link such as
    /// `https://cloud.example/public/AbCd/file.bin`.
    pub fn public(link: impl Into<String>, size: u64) -> Result<Self> {
        let link = link.into();
        let url = Url::parse(&link).map_err(|e| Error::InvalidPublicLink(format!("{link}: {e}")))?;
        if !url.path().starts_with(PUBLIC_PREFIX) {
            return Err(Error::InvalidPublicLink(format!(
                "{link}: path does not start with {PUBLIC_PREFIX}"
            )));
        }
        Ok(Self {
            source: PartSource::Public { link },
            size,
        })
    }

    pub fn source(&self) -> &PartSource {
        &self.source
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Shard category this part is downloaded from.
    pub fn category(&self) -> ShardCategory {
        match self.source {
            PartSource::Private { .. } => ShardCategory::Get,
            PartSource::Public { .. } => ShardCategory::WeblinkGet,
        }
    }

    /// Build the download URL for this part against `endpoint`.
    ///
    /// Private parts append the fully escaped path to the shard URL. Public
    /// parts append the link path without its `/public` prefix and carry the
    /// download token as `?key=`.
    pub fn download_url(&self, endpoint: &ShardEndpoint, download_token: Option<&str>) -> Result<Url> {
        let raw = match &self.source {
            PartSource::Private { path } => {
                format!("{}{}", endpoint.url(), utf8_percent_encode(path, PATH_ESCAPE))
            }
            PartSource::Public { link } => {
                let token = download_token.ok_or_else(|| {
                    Error::Config("download token required for public link parts".to_string())
                })?;
                let link = Url::parse(link)
                    .map_err(|e| Error::InvalidPublicLink(format!("{link}: {e}")))?;
                let path = link.path().strip_prefix(PUBLIC_PREFIX).ok_or_else(|| {
                    Error::InvalidPublicLink(format!(
                        "{link}: path does not start with {PUBLIC_PREFIX}"
                    ))
                })?;
                let base = if path.starts_with('/') {
                    endpoint.url().trim_end_matches('/')
                } else {
                    endpoint.url()
                };
                format!(
                    "{base}{path}?key={}",
                    utf8_percent_encode(token, PATH_ESCAPE)
                )
            }
        };
        Url::parse(&raw).map_err(|e| Error::InvalidShardUrl(format!("{raw}: {e}")))
    }

    /// Short human-readable identifier for logs.
    pub fn describe(&self) -> &str {
        match &self.source {
            PartSource::Private { path } => path,
            PartSource::Public { link } => link,
        }
    }
}

/// Unvalidated wire form of [`PhysicalPart`].
#[derive(Deserialize)]
struct RawPart {
    source: PartSource,
    size: u64,
}

impl TryFrom<RawPart> for PhysicalPart {
    type Error = Error;

    fn try_from(raw: RawPart) -> Result<Self> {
        match raw.source {
            PartSource::Private { path } => Ok(Self::private(path, raw.size)),
            PartSource::Public { link } => Self::public(link, raw.size),
        }
    }
}

/// The slice of one part covered by a logical range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartSegment<'a> {
    /// Position of the part in the file.
    pub index: usize,
    pub part: &'a PhysicalPart,
    /// Part-local inclusive range.
    pub range: ByteRange,
}

/// A file as the consumer sees it: an ordered, non-empty list of parts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFile")]
pub struct LogicalFile {
    name: String,
    parts: Vec<PhysicalPart>,
}

impl LogicalFile {
    pub fn new(name: impl Into<String>, parts: Vec<PhysicalPart>) -> Result<Self> {
        if parts.is_empty() {
            return Err(Error::EmptyFile);
        }
        Ok(Self {
            name: name.into(),
            parts,
        })
    }

    /// A file stored as one object, named after its source.
    pub fn single(part: PhysicalPart) -> Self {
        Self {
            name: part.describe().to_string(),
            parts: vec![part],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parts(&self) -> &[PhysicalPart] {
        &self.parts
    }

    pub fn is_split(&self) -> bool {
        self.parts.len() > 1
    }

    pub fn total_size(&self) -> u64 {
        self.parts.iter().map(PhysicalPart::size).sum()
    }

    /// Map a logical range onto per-part local ranges, in file order.
    ///
    /// Zero-sized parts and parts outside the range are skipped.
    pub fn segments(&self, range: ByteRange) -> Vec<PartSegment<'_>> {
        let mut segments = Vec::new();
        let mut part_start = 0u64;

        for (index, part) in self.parts.iter().enumerate() {
            if part_start > range.end() {
                break;
            }
            let size = part.size();
            let part_end = part_start + size; // exclusive

            if size > 0 && range.start() < part_end {
                let local_start = range.start().saturating_sub(part_start);
                let local_end = range.end().min(part_end - 1) - part_start;
                if let Ok(range) = ByteRange::new(local_start, local_end) {
                    segments.push(PartSegment { index, part, range });
                }
            }

            part_start = part_end;
        }

        segments
    }
}

/// Unvalidated wire form of [`LogicalFile`].
#[derive(Deserialize)]
struct RawFile {
    name: String,
    parts: Vec<PhysicalPart>,
}

impl TryFrom<RawFile> for LogicalFile {
    type Error = Error;

    fn try_from(raw: RawFile) -> Result<Self> {
        Self::new(raw.name, raw.parts)
    }
}
