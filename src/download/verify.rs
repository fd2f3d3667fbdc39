//! Integrity verification of an assembled file against its expected signature.
//!
//! The file is streamed through an incremental hasher in bounded reads, so
//! memory use depends on the read size and not on the file size.

use std::fmt;
use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tracing::{debug, info, instrument};

use super::error::DownloadError;
use super::metadata::normalize_signature;

/// Hash function used to fingerprint a downloaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    /// MD5, the usual `ETag` fingerprint of object stores.
    Md5,
    /// SHA-256.
    Sha256,
}

impl DigestAlgorithm {
    /// Picks the algorithm whose hex digest length matches `expected`.
    ///
    /// 64 hex characters means SHA-256; anything else falls back to MD5.
    #[must_use]
    pub fn for_signature(expected: &str) -> Self {
        let bare = normalize_signature(expected);
        if bare.len() == 64 && bare.chars().all(|c| c.is_ascii_hexdigit()) {
            Self::Sha256
        } else {
            Self::Md5
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Md5 => write!(f, "md5"),
            Self::Sha256 => write!(f, "sha256"),
        }
    }
}

enum Hasher {
    Md5(md5::Context),
    Sha256(Sha256),
}

impl Hasher {
    fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Md5 => Self::Md5(md5::Context::new()),
            DigestAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(ctx) => ctx.consume(data),
            Self::Sha256(hasher) => hasher.update(data),
        }
    }

    fn finish(self) -> String {
        match self {
            Self::Md5(ctx) => format!("{:x}", ctx.compute()),
            Self::Sha256(hasher) => hex::encode(hasher.finalize()),
        }
    }
}

/// Streams `path` through `algorithm` and returns the lowercase hex digest.
///
/// # Errors
///
/// Returns [`DownloadError::InvalidInput`] for a zero `read_size` and
/// [`DownloadError::Io`] if the file cannot be opened or read.
#[instrument(level = "debug", fields(path = %path.display()))]
pub async fn digest_file(
    path: &Path,
    read_size: usize,
    algorithm: DigestAlgorithm,
) -> Result<String, DownloadError> {
    if read_size == 0 {
        return Err(DownloadError::invalid_input("verify read size must be positive"));
    }

    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| DownloadError::io(path, e))?;
    let mut buffer = vec![0u8; read_size];
    let mut hasher = Hasher::new(algorithm);
    let mut total = 0u64;

    loop {
        let read = file
            .read(&mut buffer)
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        total += read as u64;
    }

    let digest = hasher.finish();
    debug!(bytes = total, %algorithm, %digest, "computed digest");
    Ok(digest)
}

/// Compares two fingerprints, ignoring `ETag` quoting and hex case.
#[must_use]
pub fn signatures_match(expected: &str, actual: &str) -> bool {
    normalize_signature(expected).eq_ignore_ascii_case(&normalize_signature(actual))
}

/// Digests `path` and checks it against `expected`.
///
/// # Errors
///
/// Returns [`DownloadError::ChecksumMismatch`] when the digests differ and
/// [`DownloadError::Io`] if the file cannot be read back.
#[instrument(level = "debug", skip(expected), fields(path = %path.display()))]
pub async fn verify_file(
    path: &Path,
    expected: &str,
    read_size: usize,
) -> Result<(), DownloadError> {
    let algorithm = DigestAlgorithm::for_signature(expected);
    let actual = digest_file(path, read_size, algorithm).await?;

    if !signatures_match(expected, &actual) {
        return Err(DownloadError::checksum_mismatch(
            path,
            normalize_signature(expected),
            actual,
        ));
    }
    info!(%algorithm, "checksum verified");
    Ok(())
}
