//! Metadata discovery port and the preconditions the pipeline places on it.

use async_trait::async_trait;

use super::DownloadError;

/// Fallback content type when the server does not send one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// What a HEAD exchange tells us about the remote file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    /// `Content-Type` of the resource.
    pub content_type: String,
    /// Total size in bytes from `Content-Length`.
    pub content_size: u64,
    /// File name to save under (already sanitized).
    pub file_name: String,
    /// Expected content fingerprint (normalized `ETag`).
    pub signature: String,
    /// Whether the server advertised `Accept-Ranges: bytes`.
    pub supports_byte_ranges: bool,
}

impl FileMeta {
    /// Checks the preconditions for a chunked download.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Metadata`] when byte ranges are unsupported,
    /// the size is zero, or the signature or file name is empty.
    pub fn ensure_downloadable(&self, url: &str) -> Result<(), DownloadError> {
        if !self.supports_byte_ranges {
            return Err(DownloadError::metadata(
                url,
                "server does not support byte ranges",
            ));
        }
        if self.content_size == 0 {
            return Err(DownloadError::metadata(url, "content length is zero"));
        }
        if self.signature.trim().is_empty() {
            return Err(DownloadError::metadata(url, "missing ETag signature"));
        }
        if self.file_name.trim().is_empty() {
            return Err(DownloadError::metadata(url, "missing file name in URL"));
        }
        Ok(())
    }
}

/// Resolves [`FileMeta`] for a URL.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Discovers name, size, signature and range support for `url`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidUrl`], [`DownloadError::Metadata`] or a
    /// transport error when discovery fails.
    async fn head_meta(&self, url: &str) -> Result<FileMeta, DownloadError>;
}

/// Turns a raw `ETag` header value into a bare fingerprint.
///
/// `W/"abc"` and `"abc"` both become `abc`.
#[must_use]
pub fn normalize_signature(raw: &str) -> String {
    let trimmed = raw.trim();
    let strong = trimmed
        .strip_prefix("W/")
        .or_else(|| trimmed.strip_prefix("w/"))
        .unwrap_or(trimmed);
    strong.trim_matches('"').trim().to_string()
}
