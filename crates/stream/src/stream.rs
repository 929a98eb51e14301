//! Seekable read-only stream over a logical file range.

use crate::buffer::BoundedByteBuffer;
use crate::error::{StreamError, StreamResult};
use crate::fetcher::SegmentedRangeFetcher;
use crate::transport::{HttpRangeTransport, RangeTransport};
use cirrus_client::{Account, ShardSource, TokenSource};
use cirrus_core::config::StreamConfig;
use cirrus_core::{ByteRange, LogicalFile};
use std::io::{self, SeekFrom};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};
use tokio::task::JoinHandle;
use tracing::debug;

/// A byte-exact view of `[start, end]` of a [`LogicalFile`].
///
/// Opening spawns the fetch pipeline on the current tokio runtime and returns
/// immediately; reads wait only on the internal buffer. Positions reported by
/// [`AsyncSeek`] are relative to the start of the requested range.
///
/// A read returns as soon as any bytes are buffered, so it may fill less
/// than the caller's buffer before the end of the range. A zero-length read
/// means end of stream. Callers that need an exact count should use
/// `read_exact` or `read_to_end`. A pipeline failure is returned as an
/// error, never as an early end of stream.
pub struct DownloadStream {
    name: String,
    range: Option<ByteRange>,
    len: u64,
    buffer: Arc<BoundedByteBuffer>,
    task: Option<JoinHandle<StreamResult<u64>>>,
    seek_result: Option<io::Result<u64>>,
}

impl DownloadStream {
    /// Open a stream over `file` using the account's shards, tokens and HTTP
    /// client.
    ///
    /// `start` defaults to 0 and `end` (inclusive) to the last byte.
    pub fn open(
        account: &Account,
        file: LogicalFile,
        start: Option<u64>,
        end: Option<u64>,
    ) -> StreamResult<Self> {
        let config = account.config();
        let transport = Arc::new(HttpRangeTransport::new(
            account.http().clone(),
            config.client.request_timeout(),
        ));
        Self::open_with(
            file,
            start,
            end,
            account.shard_source(),
            account.token_source(),
            transport,
            &config.stream,
        )
    }

    /// Open a stream with explicit collaborators.
    pub fn open_with(
        file: LogicalFile,
        start: Option<u64>,
        end: Option<u64>,
        shards: Arc<dyn ShardSource>,
        tokens: Arc<dyn TokenSource>,
        transport: Arc<dyn RangeTransport>,
        config: &StreamConfig,
    ) -> StreamResult<Self> {
        let range = ByteRange::resolve(start, end, file.total_size())?;
        let buffer = Arc::new(BoundedByteBuffer::new(config.buffer_capacity));
        let name = file.name().to_string();

        let task = match range {
            Some(range) => {
                debug!(file = %name, %range, parts = file.parts().len(), "opening stream");
                let fetcher = SegmentedRangeFetcher::new(
                    Arc::new(file),
                    range,
                    shards,
                    tokens,
                    transport,
                    buffer.clone(),
                    config.segment_retries,
                );
                Some(tokio::spawn(fetcher.run()))
            }
            None => {
                buffer.complete();
                None
            }
        };

        Ok(Self {
            name,
            range,
            len: range.map_or(0, |r| r.len()),
            buffer,
            task,
            seek_result: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Exact number of bytes the stream yields.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Resolved logical range, `None` for an empty file.
    pub fn range(&self) -> Option<ByteRange> {
        self.range
    }

    /// Current read position relative to the range start.
    pub fn position(&self) -> u64 {
        self.buffer.position()
    }

    /// Stop the pipeline and wait until it has terminated.
    ///
    /// Returns the fault if the pipeline failed before it was stopped.
    pub async fn close(mut self) -> StreamResult<()> {
        self.buffer.close();
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        task.abort();
        match task.await {
            Ok(Ok(_)) | Ok(Err(StreamError::Closed)) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => Err(StreamError::Task(e.to_string())),
        }
    }

    fn target(&self, pos: SeekFrom) -> io::Result<u64> {
        let (base, offset) = match pos {
            SeekFrom::Start(n) => return Ok(n),
            SeekFrom::Current(d) => (self.buffer.position(), d),
            SeekFrom::End(d) => (self.len, d),
        };
        base.checked_add_signed(offset).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative or overflowing position",
            )
        })
    }
}

impl AsyncRead for DownloadStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let out = buf.initialize_unfilled();
        match this.buffer.poll_read(cx, out) {
            Poll::Ready(Ok(n)) => {
                buf.advance(n);
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Err(e)) => Poll::Ready(Err(e.into())),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl AsyncSeek for DownloadStream {
    fn start_seek(self: Pin<&mut Self>, pos: SeekFrom) -> io::Result<()> {
        let this = self.get_mut();
        let target = this.target(pos)?;
        this.seek_result = Some(this.buffer.seek(target).map_err(io::Error::from));
        Ok(())
    }

    fn poll_complete(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        let this = self.get_mut();
        Poll::Ready(
            this.seek_result
                .take()
                .unwrap_or_else(|| Ok(this.buffer.position())),
        )
    }
}

impl Drop for DownloadStream {
    fn drop(&mut self) {
        self.buffer.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for DownloadStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadStream")
            .field("name", &self.name)
            .field("range", &self.range)
            .field("len", &self.len)
            .field("buffer", &self.buffer)
            .finish_non_exhaustive()
    }
}
