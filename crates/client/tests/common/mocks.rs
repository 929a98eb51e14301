use async_trait::async_trait;
use cirrus_client::{CloudApi, CloudError, CloudResult, ShardMap};
use cirrus_core::{ShardCategory, ShardEndpoint};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::time::Duration;

/// In-memory cloud API.
///
/// Every directory request hands out the next `get` URL in `get_urls`, so
/// forcing a refresh rotates to another shard. Tokens are numbered by the
/// call that produced them.
#[allow(dead_code)]
pub struct MockCloudApi {
    pub get_urls: Vec<String>,
    pub weblink_url: String,
    pub latency: Duration,
    pub fail_directory: AtomicBool,
    pub auth_calls: AtomicUsize,
    pub download_calls: AtomicUsize,
    pub directory_calls: AtomicUsize,
}

#[allow(dead_code)]
impl MockCloudApi {
    pub fn new(get_urls: &[&str]) -> Arc<Self> {
        Arc::new(Self::build(get_urls, Duration::ZERO))
    }

    pub fn with_latency(get_urls: &[&str], latency: Duration) -> Arc<Self> {
        Arc::new(Self::build(get_urls, latency))
    }

    fn build(get_urls: &[&str], latency: Duration) -> Self {
        Self {
            get_urls: get_urls.iter().map(|u| u.to_string()).collect(),
            weblink_url: "https://weblink.example/weblink/get/".to_string(),
            latency,
            fail_directory: AtomicBool::new(false),
            auth_calls: AtomicUsize::new(0),
            download_calls: AtomicUsize::new(0),
            directory_calls: AtomicUsize::new(0),
        }
    }

    pub fn auth_calls(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
    }

    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    pub fn directory_calls(&self) -> usize {
        self.directory_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl CloudApi for MockCloudApi {
    async fn fetch_auth_token(&self) -> CloudResult<String> {
        self.pause().await;
        let n = self.auth_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("auth-{n}"))
    }

    async fn fetch_download_token(&self, auth_token: &str) -> CloudResult<String> {
        self.pause().await;
        let n = self.download_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("dl-{n}-{auth_token}"))
    }

    async fn fetch_shard_directory(&self, _auth_token: &str) -> CloudResult<ShardMap> {
        self.pause().await;
        let n = self.directory_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_directory.load(Ordering::SeqCst) {
            return Err(CloudError::Http {
                status: 500,
                message: "dispatcher down".to_string(),
            });
        }
        let mut shards = ShardMap::new();
        if !self.get_urls.is_empty() {
            let url = &self.get_urls[n % self.get_urls.len()];
            shards.insert(
                ShardCategory::Get,
                ShardEndpoint::new(ShardCategory::Get, url.as_str())?,
            );
        }
        shards.insert(
            ShardCategory::WeblinkGet,
            ShardEndpoint::new(ShardCategory::WeblinkGet, self.weblink_url.as_str())?,
        );
        Ok(shards)
    }
}
