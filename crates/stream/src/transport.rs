//! Ranged GET requests against shard URLs.

use async_trait::async_trait;
use bytes::Bytes;
use cirrus_client::{CloudError, CloudResult};
use cirrus_core::ByteRange;
use futures::{Stream, StreamExt};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, ACCEPT_RANGES, CONTENT_TYPE, RANGE};
use std::pin::Pin;
use std::time::Duration;
use tracing::instrument;
use url::Url;

/// A boxed stream of body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = CloudResult<Bytes>> + Send>>;

/// An opened range response.
pub struct RangeBody {
    /// `true` for `206 Partial Content`, `false` for a full `200 OK` body.
    pub partial: bool,
    pub body: ByteStream,
}

impl std::fmt::Debug for RangeBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeBody")
            .field("partial", &self.partial)
            .finish_non_exhaustive()
    }
}

/// Issues one range request per segment.
#[async_trait]
pub trait RangeTransport: Send + Sync {
    /// Request `range` of the object at `url`. Non-success statuses are errors.
    async fn open(&self, url: Url, range: ByteRange) -> CloudResult<RangeBody>;
}

/// [`RangeTransport`] over the account's reqwest client.
///
/// `timeout` bounds the wait for the response head and separately the wait
/// for every body chunk, so a slow but progressing download is not cut off.
#[derive(Clone, Debug)]
pub struct HttpRangeTransport {
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpRangeTransport {
    pub fn new(http: reqwest::Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }
}

#[async_trait]
impl RangeTransport for HttpRangeTransport {
    #[instrument(skip(self, url, range), fields(host = ?url.host_str(), %range))]
    async fn open(&self, url: Url, range: ByteRange) -> CloudResult<RangeBody> {
        let request = self
            .http
            .get(url)
            .header(RANGE, range.header_value())
            .header(ACCEPT_RANGES, "bytes")
            .header(ACCEPT, "*/*")
            .header(CONTENT_TYPE, "application/octet-stream");

        let timeout = self.timeout;
        let response = tokio::time::timeout(timeout, request.send())
            .await
            .map_err(|_| CloudError::Timeout(format!("no response within {timeout:?}")))??;

        let status = response.status();
        let partial = match status {
            StatusCode::PARTIAL_CONTENT => true,
            StatusCode::OK => false,
            _ => {
                let message = response.text().await.unwrap_or_default();
                return Err(CloudError::Http {
                    status: status.as_u16(),
                    message,
                });
            }
        };

        let mut chunks = Box::pin(response.bytes_stream());
        let body = async_stream::stream! {
            loop {
                match tokio::time::timeout(timeout, chunks.next()).await {
                    Ok(Some(chunk)) => yield chunk.map_err(CloudError::from),
                    Ok(None) => break,
                    Err(_) => {
                        yield Err(CloudError::Timeout(format!("body stalled for {timeout:?}")));
                        break;
                    }
                }
            }
        };

        Ok(RangeBody {
            partial,
            body: Box::pin(body),
        })
    }
}
