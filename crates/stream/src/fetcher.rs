//! Background pipeline that fills a stream buffer part by part.

use crate::buffer::BoundedByteBuffer;
use crate::error::{StreamError, StreamResult};
use crate::transport::RangeTransport;
use cirrus_client::metrics;
use cirrus_client::{CloudError, ShardSource, TokenSource};
use cirrus_core::{ByteRange, LogicalFile, PartSegment, ShardEndpoint};
use futures::{FutureExt, StreamExt};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Why one attempt at a segment stopped.
enum AttemptError {
    /// The consumer closed the buffer.
    Closed,
    Failed {
        error: CloudError,
        /// Shard the request went to, if it got that far.
        endpoint: Option<ShardEndpoint>,
    },
}

impl AttemptError {
    fn before_request(error: CloudError) -> Self {
        AttemptError::Failed {
            error,
            endpoint: None,
        }
    }

    fn at(endpoint: &ShardEndpoint) -> impl FnOnce(CloudError) -> Self + '_ {
        move |error| AttemptError::Failed {
            error,
            endpoint: Some(endpoint.clone()),
        }
    }
}

/// Fetches a logical range segment by segment, in file order, into a
/// [`BoundedByteBuffer`].
///
/// A failed request bans its shard and is retried against a freshly
/// resolved one, resuming after the bytes already delivered. When a segment
/// exhausts its attempts the buffer is faulted.
pub struct SegmentedRangeFetcher {
    file: Arc<LogicalFile>,
    range: ByteRange,
    shards: Arc<dyn ShardSource>,
    tokens: Arc<dyn TokenSource>,
    transport: Arc<dyn RangeTransport>,
    buffer: Arc<BoundedByteBuffer>,
    max_attempts: u32,
}

impl SegmentedRangeFetcher {
    /// `segment_retries` is the number of retries after a segment's first
    /// failed attempt.
    pub fn new(
        file: Arc<LogicalFile>,
        range: ByteRange,
        shards: Arc<dyn ShardSource>,
        tokens: Arc<dyn TokenSource>,
        transport: Arc<dyn RangeTransport>,
        buffer: Arc<BoundedByteBuffer>,
        segment_retries: u32,
    ) -> Self {
        Self {
            file,
            range,
            shards,
            tokens,
            transport,
            buffer,
            max_attempts: segment_retries.saturating_add(1),
        }
    }

    /// Run to completion and signal the outcome on the buffer.
    ///
    /// Returns the number of bytes delivered. A panic in a collaborator
    /// faults the buffer like any other error.
    pub async fn run(self) -> StreamResult<u64> {
        let result = match AssertUnwindSafe(self.fetch_all()).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(StreamError::Task(format!(
                "fetch pipeline panicked: {}",
                panic_message(&*panic)
            ))),
        };
        match &result {
            Ok(total) => {
                debug!(file = self.file.name(), range = %self.range, bytes = total, "stream complete");
                self.buffer.complete();
            }
            Err(StreamError::Closed) => {
                debug!(file = self.file.name(), "stream closed by consumer");
            }
            Err(e) => {
                metrics::STREAM_FAULTS.inc();
                error!(file = self.file.name(), range = %self.range, error = %e, "stream aborted");
                self.buffer.fault(e.clone());
            }
        }
        result
    }

    async fn fetch_all(&self) -> StreamResult<u64> {
        let mut total = 0;
        for segment in self.file.segments(self.range) {
            total += self.fetch_segment(&segment).await?;
        }
        Ok(total)
    }

    async fn fetch_segment(&self, segment: &PartSegment<'_>) -> StreamResult<u64> {
        let mut delivered = 0u64;
        let mut attempt = 0u32;

        while let Some(remaining) = segment.range.skip(delivered) {
            attempt += 1;
            let (error, endpoint) = match self.attempt(segment, remaining, &mut delivered).await {
                Ok(()) => continue,
                Err(AttemptError::Closed) => return Err(StreamError::Closed),
                Err(AttemptError::Failed { error, endpoint }) => (error, endpoint),
            };

            if let Some(endpoint) = &endpoint {
                if error.is_retryable() {
                    self.shards.report_failure(endpoint);
                }
            }

            if !error.is_retryable() || attempt >= self.max_attempts {
                return Err(StreamError::SegmentFailed {
                    index: segment.index,
                    attempts: attempt,
                    last_error: error,
                });
            }

            metrics::SEGMENT_RETRIES.inc();
            warn!(
                part = segment.index,
                attempt,
                delivered,
                shard = endpoint.as_ref().map(ShardEndpoint::url),
                error = %error,
                "segment request failed, retrying"
            );
        }

        Ok(delivered)
    }

    /// One request for `range`, the not yet delivered tail of `segment`.
    async fn attempt(
        &self,
        segment: &PartSegment<'_>,
        range: ByteRange,
        delivered: &mut u64,
    ) -> Result<(), AttemptError> {
        let part = segment.part;
        let endpoint = self
            .shards
            .resolve(part.category())
            .await
            .map_err(AttemptError::before_request)?;

        let token = if endpoint.category().requires_download_token() {
            Some(
                self.tokens
                    .download_token()
                    .await
                    .map_err(AttemptError::before_request)?,
            )
        } else {
            None
        };

        let url = part
            .download_url(&endpoint, token.as_deref())
            .map_err(|e| AttemptError::before_request(e.into()))?;

        debug!(part = segment.index, %range, shard = endpoint.url(), "requesting segment");
        let response = self
            .transport
            .open(url, range)
            .await
            .map_err(AttemptError::at(&endpoint))?;

        let whole_part = range.start() == 0 && range.len() == part.size();
        if !response.partial && !whole_part {
            return Err(AttemptError::at(&endpoint)(CloudError::InvalidResponse(
                "server ignored the range request".to_string(),
            )));
        }

        let mut remaining = range.len();
        let mut body = response.body;
        while remaining > 0 {
            let Some(chunk) = body.next().await else {
                break;
            };
            let chunk = chunk.map_err(AttemptError::at(&endpoint))?;
            let take = remaining.min(chunk.len() as u64) as usize;
            if take < chunk.len() {
                warn!(
                    part = segment.index,
                    extra = chunk.len() - take,
                    "dropping bytes beyond requested range"
                );
            }

            self.buffer
                .write_all(&chunk[..take])
                .await
                .map_err(|_| AttemptError::Closed)?;
            remaining -= take as u64;
            *delivered += take as u64;
            metrics::STREAM_BYTES.inc_by(take as u64);
        }

        if remaining > 0 {
            return Err(AttemptError::at(&endpoint)(CloudError::InvalidResponse(
                format!("body ended {remaining} bytes short"),
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for SegmentedRangeFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentedRangeFetcher")
            .field("file", &self.file.name())
            .field("range", &self.range)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
