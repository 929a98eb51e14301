//! Cached shard directory.

use crate::api::{CloudApi, ShardMap};
use crate::cache::ExpiringValue;
use crate::credentials::Credentials;
use crate::error::{CloudError, CloudResult};
use cirrus_core::{ShardCategory, ShardEndpoint};
use std::sync::Arc;
use std::time::Duration;

/// Category to endpoint mapping, fetched in one authenticated request and
/// replaced wholesale on refresh.
#[derive(Debug)]
pub struct ShardDirectory {
    cache: ExpiringValue<Arc<ShardMap>>,
}

impl ShardDirectory {
    pub fn new(api: Arc<dyn CloudApi>, credentials: Arc<Credentials>, ttl: Duration) -> Self {
        let cache = ExpiringValue::new("shard_directory", ttl, move || {
            let api = api.clone();
            let credentials = credentials.clone();
            async move {
                let auth_token = credentials.auth_token().await?;
                let shards = api.fetch_shard_directory(&auth_token).await?;
                tracing::debug!(categories = shards.len(), "shard directory refreshed");
                Ok(Arc::new(shards))
            }
        });
        Self { cache }
    }

    /// Endpoint currently listed for `category`.
    pub async fn lookup(&self, category: ShardCategory) -> CloudResult<ShardEndpoint> {
        self.snapshot()
            .await?
            .get(&category)
            .cloned()
            .ok_or(CloudError::ShardUnavailable(category))
    }

    /// The whole current mapping.
    pub async fn snapshot(&self) -> CloudResult<Arc<ShardMap>> {
        self.cache.get().await
    }

    /// Refetch the mapping on the next lookup.
    pub fn force_refresh(&self) {
        self.cache.expire();
    }
}
