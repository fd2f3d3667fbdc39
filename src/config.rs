//! Tunables for one download run.

use std::time::Duration;

use crate::download::constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_RETRIES, DEFAULT_PARALLELISM,
    DEFAULT_RETRY_BASE_DELAY, DEFAULT_VERIFY_READ_SIZE, MAX_PARALLELISM, MAX_RETRIES,
    READ_TIMEOUT_SECS,
};
use crate::download::{DownloadError, RetryPolicy};

/// Settings for a [`Downloader`](crate::Downloader) run.
///
/// ```
/// use chunky_core::DownloadConfig;
///
/// let config = DownloadConfig::default()
///     .with_parallelism(8)
///     .with_chunk_size(4 * 1024 * 1024);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadConfig {
    /// Number of concurrent workers.
    pub parallelism: usize,
    /// Bytes per chunk; the last chunk may be shorter.
    pub chunk_size: u64,
    /// Additional attempts per chunk after its first failure.
    pub max_retries: u32,
    /// Backoff before the first retry; zero retries immediately.
    pub retry_base_delay: Duration,
    /// Buffer size used when re-reading the file for verification.
    pub verify_read_size: usize,
    /// HTTP connect timeout.
    pub connect_timeout: Duration,
    /// HTTP per-request timeout.
    pub read_timeout: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            parallelism: DEFAULT_PARALLELISM,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            verify_read_size: DEFAULT_VERIFY_READ_SIZE,
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
        }
    }
}

impl DownloadConfig {
    /// Sets the worker count.
    #[must_use]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Sets the chunk size in bytes.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets the per-chunk retry budget.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the base backoff delay.
    #[must_use]
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Sets the verification read buffer size.
    #[must_use]
    pub fn with_verify_read_size(mut self, size: usize) -> Self {
        self.verify_read_size = size;
        self
    }

    /// Checks every value against its supported range.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidInput`] naming the first bad field.
    pub fn validate(&self) -> Result<(), DownloadError> {
        if !(1..=MAX_PARALLELISM).contains(&self.parallelism) {
            return Err(DownloadError::invalid_input(format!(
                "parallelism must be between 1 and {MAX_PARALLELISM}, got {}",
                self.parallelism
            )));
        }
        if self.chunk_size == 0 {
            return Err(DownloadError::invalid_input("chunk size must be positive"));
        }
        if self.max_retries > MAX_RETRIES {
            return Err(DownloadError::invalid_input(format!(
                "retries must be at most {MAX_RETRIES}, got {}",
                self.max_retries
            )));
        }
        if self.verify_read_size == 0 {
            return Err(DownloadError::invalid_input(
                "verify read size must be positive",
            ));
        }
        if self.connect_timeout.is_zero() || self.read_timeout.is_zero() {
            return Err(DownloadError::invalid_input("timeouts must be positive"));
        }
        Ok(())
    }

    /// Retry policy derived from `max_retries` and `retry_base_delay`.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries).with_base_delay(self.retry_base_delay)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DownloadConfig::default();
        assert_eq!(config.parallelism, 4);
        assert_eq!(config.chunk_size, 1024 * 1024);
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.read_timeout, Duration::from_secs(300));
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_out_of_range_values() {
        let bad = [
            DownloadConfig::default().with_parallelism(0),
            DownloadConfig::default().with_parallelism(MAX_PARALLELISM + 1),
            DownloadConfig::default().with_chunk_size(0),
            DownloadConfig::default().with_max_retries(MAX_RETRIES + 1),
            DownloadConfig::default().with_verify_read_size(0),
            DownloadConfig {
                read_timeout: Duration::ZERO,
                ..DownloadConfig::default()
            },
        ];
        for config in bad {
            let err = config.validate().unwrap_err();
            assert!(
                matches!(err, DownloadError::InvalidInput { .. }),
                "{config:?} gave {err}"
            );
        }
    }

    #[test]
    fn test_retry_policy_follows_config() {
        let policy = DownloadConfig::default().with_max_retries(3).retry_policy();
        assert_eq!(policy.max_retries(), 3);
        assert_eq!(policy.max_attempts(), 4);
    }
}
