//! Shard categories and endpoints.
//!
//! A shard is one of several interchangeable backend hosts that serve a given
//! kind of operation. The dispatcher reports one endpoint per category; the
//! category decides how download URLs are built and whether a download token
//! must be attached.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operation type an endpoint serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardCategory {
    /// Authenticated download of a private file.
    Get,
    /// Download through a public link.
    WeblinkGet,
    Upload,
    Video,
    WeblinkVideo,
    ViewDirect,
    WeblinkView,
    Thumbnails,
    WeblinkThumbnails,
    Auth,
}

impl ShardCategory {
    /// Every category the dispatcher may report.
    pub const ALL: [ShardCategory; 10] = [
        Self::Get,
        Self::WeblinkGet,
        Self::Upload,
        Self::Video,
        Self::WeblinkVideo,
        Self::ViewDirect,
        Self::WeblinkView,
        Self::Thumbnails,
        Self::WeblinkThumbnails,
        Self::Auth,
    ];

    /// Key used by the dispatcher response.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::WeblinkGet => "weblink_get",
            Self::Upload => "upload",
            Self::Video => "video",
            Self::WeblinkVideo => "weblink_video",
            Self::ViewDirect => "view_direct",
            Self::WeblinkView => "weblink_view",
            Self::Thumbnails => "thumbnails",
            Self::WeblinkThumbnails => "weblink_thumbnails",
            Self::Auth => "auth",
        }
    }

    /// Whether requests against this category carry `?key=<download token>`.
    pub fn requires_download_token(&self) -> bool {
        matches!(
            self,
            Self::WeblinkGet | Self::WeblinkVideo | Self::WeblinkView | Self::WeblinkThumbnails
        )
    }
}

impl FromStr for ShardCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::UnknownShardCategory(s.to_string()))
    }
}

impl fmt::Display for ShardCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete shard host for one category.
///
/// Equality and hashing cover both fields, so the same host serving two
/// categories is banned independently per category.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardEndpoint {
    category: ShardCategory,
    url: String,
}

impl ShardEndpoint {
    /// Create an endpoint. The base URL must be absolute http(s).
    pub fn new(category: ShardCategory, url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let parsed = url::Url::parse(&url).map_err(|e| Error::InvalidShardUrl(format!("{url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::InvalidShardUrl(format!(
                "{url}: unsupported scheme {}",
                parsed.scheme()
            )));
        }
        Ok(Self { category, url })
    }

    pub fn category(&self) -> ShardCategory {
        self.category
    }

    /// Base URL exactly as reported by the dispatcher.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for ShardEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.category, self.url)
    }
}
