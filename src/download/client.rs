//! HTTP client wrapper for metadata discovery and byte-range fetches.
//!
//! This module provides the `HttpClient` struct, the reqwest-backed
//! implementation of both [`MetadataSource`] and [`RangeFetcher`].

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{
    ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_TYPE, ETAG, HeaderMap, HeaderName, RANGE,
};
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use super::fetch::{ByteStream, RangeFetcher};
use super::filename::filename_from_url;
use super::metadata::{DEFAULT_CONTENT_TYPE, FileMeta, MetadataSource, normalize_signature};
use crate::user_agent;

/// HTTP client for HEAD metadata requests and ranged GETs.
///
/// This client is designed to be created once and shared by every worker,
/// taking advantage of connection pooling.
///
/// # Example
///
/// ```no_run
/// use chunky_core::download::{HttpClient, MetadataSource};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new()?;
/// let meta = client.head_meta("https://example.com/big.iso").await?;
/// println!("{} is {} bytes", meta.file_name, meta.content_size);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a new HTTP client with default timeouts.
    ///
    /// Default configuration:
    /// - Connect timeout: 30 seconds
    /// - Read timeout: 5 minutes per request
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidInput`] if the client cannot be built.
    pub fn new() -> Result<Self, DownloadError> {
        Self::with_timeouts(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            Duration::from_secs(READ_TIMEOUT_SECS),
        )
    }

    /// Creates a new HTTP client with explicit timeout values.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidInput`] if the client cannot be built.
    #[instrument(level = "debug")]
    pub fn with_timeouts(
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .user_agent(user_agent::default_user_agent())
            .build()
            .map_err(|e| DownloadError::invalid_input(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<reqwest::Response, DownloadError> {
        request.send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })
    }
}

#[async_trait]
impl MetadataSource for HttpClient {
    #[instrument(skip(self), fields(url = %url))]
    async fn head_meta(&self, url: &str) -> Result<FileMeta, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DownloadError::invalid_url(url));
        }
        let file_name = filename_from_url(&parsed)
            .ok_or_else(|| DownloadError::metadata(url, "missing file name in URL"))?;

        let response = self.send(self.client.head(url), url).await?;
        if response.status() != StatusCode::OK {
            return Err(DownloadError::http_status(url, response.status().as_u16()));
        }

        let meta = meta_from_headers(url, response.headers(), file_name)?;
        debug!(
            size = meta.content_size,
            signature = %meta.signature,
            content_type = %meta.content_type,
            "resolved file metadata"
        );
        Ok(meta)
    }
}

#[async_trait]
impl RangeFetcher for HttpClient {
    #[instrument(level = "debug", skip(self), fields(url = %url))]
    async fn fetch_range(
        &self,
        url: &str,
        offset: u64,
        size: u64,
    ) -> Result<ByteStream, DownloadError> {
        if size == 0 {
            return Err(DownloadError::invalid_input("range size must be positive"));
        }
        let last = offset + size - 1;
        let request = self.client.get(url).header(RANGE, format!("bytes={offset}-{last}"));
        let response = self.send(request, url).await?;

        let status = response.status();
        // A plain 200 is only acceptable when the range is the whole entity.
        let whole_entity = status == StatusCode::OK
            && offset == 0
            && response.content_length() == Some(size);
        if status != StatusCode::PARTIAL_CONTENT && !whole_entity {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        if let Some(announced) = response.content_length()
            && announced != size
        {
            return Err(DownloadError::length_mismatch(offset, size, announced));
        }

        let url = url.to_string();
        let stream = response
            .bytes_stream()
            .map(move |piece| piece.map_err(|e| DownloadError::network(url.clone(), e)));
        Ok(Box::pin(stream))
    }
}

/// Builds [`FileMeta`] from HEAD response headers.
fn meta_from_headers(
    url: &str,
    headers: &HeaderMap,
    file_name: String,
) -> Result<FileMeta, DownloadError> {
    let header_str = move |name: HeaderName| headers.get(name).and_then(|v| v.to_str().ok());

    let content_size = header_str(CONTENT_LENGTH)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .ok_or_else(|| DownloadError::metadata(url, "missing or invalid Content-Length"))?;

    let content_type = header_str(CONTENT_TYPE)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    let signature = header_str(ETAG).map(normalize_signature).unwrap_or_default();

    let supports_byte_ranges = header_str(ACCEPT_RANGES)
        .is_some_and(|v| v.split(',').any(|unit| unit.trim().eq_ignore_ascii_case("bytes")));

    let meta = FileMeta {
        content_type,
        content_size,
        file_name,
        signature,
        supports_byte_ranges,
    };
    meta.ensure_downloadable(url)?;
    Ok(meta)
}
