//! Prometheus metrics for shard failover and stream delivery.
//!
//! Resolver exhaustion is never raised to callers; these counters (together
//! with the error logs) are where it becomes visible.

use prometheus::{self, Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static SHARD_BANS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "cirrus_shard_bans_total",
        "Total number of shards temporarily banned after a failure",
    )
    .expect("metric creation failed")
});

pub static SHARD_RESOLVE_EXHAUSTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "cirrus_shard_resolve_exhausted_total",
        "Resolutions that ran out of attempts and returned a possibly banned shard",
    )
    .expect("metric creation failed")
});

pub static CACHE_REFRESHES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "cirrus_cache_refreshes_total",
            "Cache recomputations by cached value",
        ),
        &["cache"],
    )
    .expect("metric creation failed")
});

pub static SEGMENT_RETRIES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "cirrus_segment_retries_total",
        "Segment requests retried after a transport failure",
    )
    .expect("metric creation failed")
});

pub static STREAM_FAULTS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "cirrus_stream_faults_total",
        "Streams aborted because a segment exhausted its retries",
    )
    .expect("metric creation failed")
});

pub static STREAM_BYTES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "cirrus_stream_bytes_total",
        "Bytes delivered into stream buffers",
    )
    .expect("metric creation failed")
});

static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Idempotent; later calls are no-ops.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(SHARD_BANS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(SHARD_RESOLVE_EXHAUSTED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(CACHE_REFRESHES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(SEGMENT_RETRIES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(STREAM_FAULTS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(STREAM_BYTES.clone()))
            .expect("metric registration failed");
    });
}

/// Render the registry in the Prometheus text exposition format.
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        register_metrics();
        register_metrics();
        SHARD_BANS.inc();
        let text = render().unwrap();
        assert!(text.contains("cirrus_shard_bans_total"));
    }
}
