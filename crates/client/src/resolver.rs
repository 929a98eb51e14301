//! Shard resolution with failover.

use crate::blacklist::ShardBlacklist;
use crate::credentials::TokenSource;
use crate::directory::ShardDirectory;
use crate::error::{CloudError, CloudResult};
use crate::metrics;
use async_trait::async_trait;
use cirrus_core::config::ShardConfig;
use cirrus_core::{ShardCategory, ShardEndpoint};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument};

/// Hands out shard endpoints and accepts failure reports about them.
#[async_trait]
pub trait ShardSource: Send + Sync {
    /// An endpoint for `category`, preferably one that is not banned.
    async fn resolve(&self, category: ShardCategory) -> CloudResult<ShardEndpoint>;

    /// Report that a request against `endpoint` failed.
    fn report_failure(&self, endpoint: &ShardEndpoint);
}

/// [`ShardSource`] over the account's directory and blacklist.
///
/// Resolution never fails because every candidate is banned: after the last
/// attempt the most recently listed endpoint is returned anyway, and the
/// exhaustion is only logged and counted.
pub struct ShardResolver {
    directory: Arc<ShardDirectory>,
    blacklist: Arc<ShardBlacklist>,
    tokens: Arc<dyn TokenSource>,
    attempts: u32,
    backoff_step: Duration,
}

impl ShardResolver {
    pub fn new(
        directory: Arc<ShardDirectory>,
        blacklist: Arc<ShardBlacklist>,
        tokens: Arc<dyn TokenSource>,
        config: &ShardConfig,
    ) -> Self {
        Self {
            directory,
            blacklist,
            tokens,
            attempts: config.resolve_attempts.max(1),
            backoff_step: config.backoff_step(),
        }
    }
}

#[async_trait]
impl ShardSource for ShardResolver {
    #[instrument(skip(self))]
    async fn resolve(&self, category: ShardCategory) -> CloudResult<ShardEndpoint> {
        let mut last = None;
        for attempt in 0..self.attempts {
            if attempt > 0 {
                tokio::time::sleep(self.backoff_step * attempt).await;
            }

            let endpoint = self.directory.lookup(category).await?;
            if !self.blacklist.is_banned(&endpoint) {
                if attempt > 0 {
                    // The download token is tied to the shard it was issued for.
                    self.tokens.invalidate_download_token();
                }
                return Ok(endpoint);
            }

            debug!(%endpoint, attempt, "shard is banned, refreshing directory");
            self.directory.force_refresh();
            last = Some(endpoint);
        }

        metrics::SHARD_RESOLVE_EXHAUSTED.inc();
        error!(
            %category,
            attempts = self.attempts,
            "no unbanned shard after all attempts, using a banned one"
        );
        last.ok_or(CloudError::ShardUnavailable(category))
    }

    fn report_failure(&self, endpoint: &ShardEndpoint) {
        self.blacklist.ban(endpoint);
    }
}

impl std::fmt::Debug for ShardResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardResolver")
            .field("attempts", &self.attempts)
            .field("backoff_step", &self.backoff_step)
            .finish_non_exhaustive()
    }
}
