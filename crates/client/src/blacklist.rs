//! Temporary shard bans.

use crate::metrics;
use cirrus_core::ShardEndpoint;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

/// Shards excluded from resolution for a fixed window after a failure.
///
/// Entries are never removed; an entry older than the window is treated as
/// absent and overwritten by the next ban.
#[derive(Debug)]
pub struct ShardBlacklist {
    window: Duration,
    entries: DashMap<ShardEndpoint, Instant>,
}

impl ShardBlacklist {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: DashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Ban `endpoint` from now on. Returns `true` if the ban is new; an
    /// endpoint that is already actively banned keeps its original timestamp.
    pub fn ban(&self, endpoint: &ShardEndpoint) -> bool {
        let now = Instant::now();
        let inserted = match self.entries.entry(endpoint.clone()) {
            Entry::Occupied(mut entry) => {
                if now.duration_since(*entry.get()) < self.window {
                    false
                } else {
                    entry.insert(now);
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        };
        if inserted {
            metrics::SHARD_BANS.inc();
            warn!(
                category = %endpoint.category(),
                url = endpoint.url(),
                window_secs = self.window.as_secs(),
                "shard banned"
            );
        }
        inserted
    }

    pub fn is_banned(&self, endpoint: &ShardEndpoint) -> bool {
        self.entries
            .get(endpoint)
            .is_some_and(|banned_at| banned_at.elapsed() < self.window)
    }

    /// Endpoints currently banned.
    pub fn active(&self) -> Vec<ShardEndpoint> {
        self.entries
            .iter()
            .filter(|entry| entry.value().elapsed() < self.window)
            .map(|entry| entry.key().clone())
            .collect()
    }
}
