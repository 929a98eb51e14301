//! Cloud JSON API: token acquisition and the shard dispatcher.

use crate::error::{CloudError, CloudResult};
use async_trait::async_trait;
use cirrus_core::{ShardCategory, ShardEndpoint};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Current endpoint per shard category.
pub type ShardMap = HashMap<ShardCategory, ShardEndpoint>;

/// Authenticated requests that feed the credential and directory caches.
///
/// Every call is idempotent and safe to re-issue.
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// Obtain a fresh auth token for the session.
    async fn fetch_auth_token(&self) -> CloudResult<String>;

    /// Obtain a download token, derived from `auth_token`.
    async fn fetch_download_token(&self, auth_token: &str) -> CloudResult<String>;

    /// Fetch the endpoint of every shard category in one request.
    async fn fetch_shard_directory(&self, auth_token: &str) -> CloudResult<ShardMap>;
}

#[derive(Deserialize)]
struct Envelope<T> {
    body: T,
}

#[derive(Deserialize)]
struct TokenBody {
    token: String,
}

#[derive(Deserialize)]
struct DispatcherEntry {
    url: String,
}

/// [`CloudApi`] over HTTP.
#[derive(Clone, Debug)]
pub struct HttpCloudApi {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpCloudApi {
    pub fn new(http: reqwest::Client, base_url: &str, timeout: Duration) -> CloudResult<Self> {
        Url::parse(base_url)?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn url(&self, path: &str, token: Option<&str>) -> CloudResult<Url> {
        let mut url = Url::parse(&format!("{}{path}", self.base_url))?;
        if let Some(token) = token {
            url.query_pairs_mut().append_pair("token", token);
        }
        Ok(url)
    }

    async fn post_json<T: DeserializeOwned>(&self, url: Url) -> CloudResult<T> {
        debug!(path = url.path(), "cloud API request");
        let response = self.http.post(url).timeout(self.timeout).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(CloudError::Http {
                status: status.as_u16(),
                message: body,
            });
        }
        let envelope: Envelope<T> = serde_json::from_str(&body)
            .map_err(|e| CloudError::InvalidResponse(format!("unexpected API response: {e}")))?;
        Ok(envelope.body)
    }
}

#[async_trait]
impl CloudApi for HttpCloudApi {
    async fn fetch_auth_token(&self) -> CloudResult<String> {
        let body: TokenBody = self.post_json(self.url("/tokens/csrf", None)?).await?;
        Ok(body.token)
    }

    async fn fetch_download_token(&self, auth_token: &str) -> CloudResult<String> {
        let body: TokenBody = self
            .post_json(self.url("/tokens/download", Some(auth_token))?)
            .await?;
        Ok(body.token)
    }

    async fn fetch_shard_directory(&self, auth_token: &str) -> CloudResult<ShardMap> {
        let body: HashMap<String, Vec<DispatcherEntry>> = self
            .post_json(self.url("/dispatcher", Some(auth_token))?)
            .await?;
        parse_directory(body)
    }
}

fn parse_directory(body: HashMap<String, Vec<DispatcherEntry>>) -> CloudResult<ShardMap> {
    let mut shards = ShardMap::new();
    for (key, entries) in body {
        let Ok(category) = key.parse::<ShardCategory>() else {
            debug!(key = %key, "ignoring unknown shard category");
            continue;
        };
        let Some(first) = entries.into_iter().next() else {
            warn!(%category, "dispatcher listed no endpoint");
            continue;
        };
        shards.insert(category, ShardEndpoint::new(category, first.url)?);
    }
    Ok(shards)
}
