//! Range fetch port: the capability to read one byte range of a remote file.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;

use super::DownloadError;

/// A stream of body bytes for one range request.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, DownloadError>> + Send>>;

/// Fetches byte ranges of a remote resource.
///
/// Implementations return a stream that yields exactly `size` bytes; the
/// offset writer treats any other length as a transport failure.
#[async_trait]
pub trait RangeFetcher: Send + Sync {
    /// Starts fetching `size` bytes of `url` beginning at `offset`.
    ///
    /// # Errors
    ///
    /// Returns a transport error ([`DownloadError::Network`],
    /// [`DownloadError::Timeout`], [`DownloadError::HttpStatus`] or
    /// [`DownloadError::LengthMismatch`]) when the range cannot be served.
    async fn fetch_range(&self, url: &str, offset: u64, size: u64)
    -> Result<ByteStream, DownloadError>;
}

/// Wraps an in-memory buffer as a single-item [`ByteStream`].
#[must_use]
pub fn bytes_stream(data: impl Into<Bytes>) -> ByteStream {
    Box::pin(futures_util::stream::iter([Ok(data.into())]))
}
