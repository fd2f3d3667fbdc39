//! Error types for the download module.
//!
//! This module defines structured errors for every stage of a chunked
//! download, providing context-rich error messages for debugging and user
//! feedback, plus an [`ErrorKind`] view that groups them by how the pipeline
//! reacts to them.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while planning, fetching, writing or verifying a download.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// A size, count or other caller-supplied value is out of range.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// What was wrong with the input.
        reason: String,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// Metadata discovery returned something the pipeline cannot work with.
    #[error("metadata error for {url}: {reason}")]
    Metadata {
        /// The URL whose metadata was rejected.
        url: String,
        /// Which precondition was not met.
        reason: String,
    },

    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Unexpected HTTP status for a metadata or range request.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned the status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// A range response carried a different number of bytes than requested.
    #[error("length mismatch for range at offset {offset}: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        /// Start of the requested range.
        offset: u64,
        /// Requested byte count.
        expected: u64,
        /// Byte count seen (or announced) so far.
        actual: u64,
    },

    /// File system error while creating, sizing, writing, reading or removing the output.
    #[error("IO error on {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A write targeted a region outside the pre-sized file.
    #[error("offset {offset} with {len} bytes is outside file of {file_size} bytes")]
    OutOfRange {
        /// Requested write offset.
        offset: u64,
        /// Requested write length.
        len: u64,
        /// Size the file was pre-allocated to.
        file_size: u64,
    },

    /// The offset writer was already closed or cleaned up.
    #[error("writer for {path} is already closed")]
    AlreadyClosed {
        /// Path of the writer's file.
        path: PathBuf,
    },

    /// The download was cancelled before it could finish.
    #[error("download cancelled")]
    Cancelled,

    /// A task was submitted after the worker pool started draining.
    #[error("task submission rejected: worker pool is cancelled")]
    SubmissionCancelled,

    /// A chunk failed on every allowed attempt.
    #[error("chunk {chunk} failed after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        /// Index of the failing chunk.
        chunk: usize,
        /// Number of attempts made.
        attempts: u32,
        /// Error from the final attempt.
        #[source]
        source: Box<DownloadError>,
    },

    /// A worker task panicked.
    #[error("worker task panicked: {message}")]
    WorkerPanicked {
        /// Panic description from the join error.
        message: String,
    },

    /// The assembled file's digest does not match the expected signature.
    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// The file that failed verification.
        path: PathBuf,
        /// Signature announced by the server.
        expected: String,
        /// Digest computed over the assembled file.
        actual: String,
    },
}

/// Coarse classification of [`DownloadError`] values.
///
/// Callers use this to tell "gave up after N attempts" ([`ErrorKind::Transport`]
/// or [`ErrorKind::Write`]) apart from "asked to stop" ([`ErrorKind::Cancellation`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad sizes or URLs; fatal, never retried.
    InvalidInput,
    /// Unusable metadata; fatal, no file is created.
    Metadata,
    /// Network failure or unexpected status/length for a range.
    Transport,
    /// Disk failure while writing the output.
    Write,
    /// External signal or first-failure pool cancellation.
    Cancellation,
    /// Post-assembly digest mismatch.
    Checksum,
    /// Programming errors and panics.
    Internal,
}

impl DownloadError {
    /// Creates an invalid input error.
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a metadata error.
    pub fn metadata(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Metadata {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a length mismatch error.
    #[must_use]
    pub fn length_mismatch(offset: u64, expected: u64, actual: u64) -> Self {
        Self::LengthMismatch {
            offset,
            expected,
            actual,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an out-of-range write error.
    #[must_use]
    pub fn out_of_range(offset: u64, len: u64, file_size: u64) -> Self {
        Self::OutOfRange {
            offset,
            len,
            file_size,
        }
    }

    /// Creates an already-closed error.
    pub fn already_closed(path: impl Into<PathBuf>) -> Self {
        Self::AlreadyClosed { path: path.into() }
    }

    /// Wraps the final attempt's error of a chunk that ran out of retries.
    #[must_use]
    pub fn retries_exhausted(chunk: usize, attempts: u32, last: DownloadError) -> Self {
        Self::RetriesExhausted {
            chunk,
            attempts,
            source: Box::new(last),
        }
    }

    /// Creates a checksum mismatch error.
    pub fn checksum_mismatch(
        path: impl Into<PathBuf>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::ChecksumMismatch {
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Returns the pipeline-level classification of this error.
    ///
    /// [`DownloadError::RetriesExhausted`] reports the kind of the error it wraps.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. } | Self::InvalidUrl { .. } => ErrorKind::InvalidInput,
            Self::Metadata { .. } => ErrorKind::Metadata,
            Self::Network { .. }
            | Self::Timeout { .. }
            | Self::HttpStatus { .. }
            | Self::LengthMismatch { .. } => ErrorKind::Transport,
            Self::Io { .. } | Self::OutOfRange { .. } => ErrorKind::Write,
            Self::Cancelled | Self::SubmissionCancelled => ErrorKind::Cancellation,
            Self::RetriesExhausted { source, .. } => source.kind(),
            Self::ChecksumMismatch { .. } => ErrorKind::Checksum,
            Self::AlreadyClosed { .. } | Self::WorkerPanicked { .. } => ErrorKind::Internal,
        }
    }

    /// Returns true when the error means "stopped on request" rather than "failed".
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        self.kind() == ErrorKind::Cancellation
    }
}

// No From<reqwest::Error> / From<std::io::Error>: every variant needs the url,
// path or offset the source error does not carry.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_http_status_display() {
        let error = DownloadError::http_status("https://example.com/file.iso", 416);
        let msg = error.to_string();
        assert!(msg.contains("416"), "Expected '416' in: {msg}");
        assert!(
            msg.contains("https://example.com/file.iso"),
            "Expected URL in: {msg}"
        );
    }

    #[test]
    fn test_download_error_io_display() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let error = DownloadError::io(PathBuf::from("/tmp/test.iso"), io_error);
        let msg = error.to_string();
        assert!(msg.contains("/tmp/test.iso"), "Expected path in: {msg}");
    }

    #[test]
    fn test_download_error_length_mismatch_display() {
        let error = DownloadError::length_mismatch(4, 4, 3);
        let msg = error.to_string();
        assert!(msg.contains("offset 4"), "Expected offset in: {msg}");
        assert!(msg.contains("got 3"), "Expected actual length in: {msg}");
    }

    #[test]
    fn test_download_error_checksum_mismatch_display() {
        let error = DownloadError::checksum_mismatch("/tmp/a.bin", "abc", "def");
        let msg = error.to_string();
        assert!(msg.contains("checksum mismatch"));
        assert!(msg.contains("expected abc"));
        assert!(msg.contains("got def"));
    }

    #[test]
    fn test_kind_classifies_transport_and_write_errors() {
        assert_eq!(
            DownloadError::timeout("https://example.com").kind(),
            ErrorKind::Transport
        );
        assert_eq!(
            DownloadError::http_status("https://example.com", 500).kind(),
            ErrorKind::Transport
        );
        assert_eq!(
            DownloadError::length_mismatch(0, 1, 2).kind(),
            ErrorKind::Transport
        );
        let io_error = std::io::Error::other("disk full");
        assert_eq!(
            DownloadError::io("/tmp/x", io_error).kind(),
            ErrorKind::Write
        );
        assert_eq!(
            DownloadError::out_of_range(10, 1, 10).kind(),
            ErrorKind::Write
        );
    }

    #[test]
    fn test_retries_exhausted_reports_inner_kind() {
        let error =
            DownloadError::retries_exhausted(1, 3, DownloadError::http_status("u", 503));
        assert_eq!(error.kind(), ErrorKind::Transport);
        assert!(!error.is_cancellation());
        let msg = error.to_string();
        assert!(msg.contains("chunk 1"), "Expected chunk index in: {msg}");
        assert!(msg.contains("3 attempt"), "Expected attempts in: {msg}");
    }

    #[test]
    fn test_cancellation_is_distinct_from_failure() {
        assert!(DownloadError::Cancelled.is_cancellation());
        assert!(DownloadError::SubmissionCancelled.is_cancellation());
        assert!(!DownloadError::invalid_input("x").is_cancellation());
        assert_eq!(
            DownloadError::checksum_mismatch("p", "a", "b").kind(),
            ErrorKind::Checksum
        );
    }
}
