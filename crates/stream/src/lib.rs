//! Segmented range streams for Cirrus.
//!
//! A [`DownloadStream`] exposes a byte range of a logical file, possibly
//! split across several stored parts, as one seekable `AsyncRead`. Behind it
//! a [`SegmentedRangeFetcher`] issues one range request per part in file
//! order, with shard failover, into a [`BoundedByteBuffer`].

pub mod buffer;
pub mod error;
pub mod fetcher;
pub mod stream;
pub mod transport;

pub use buffer::BoundedByteBuffer;
pub use error::{StreamError, StreamResult};
pub use fetcher::SegmentedRangeFetcher;
pub use stream::DownloadStream;
pub use transport::{ByteStream, HttpRangeTransport, RangeBody, RangeTransport};
