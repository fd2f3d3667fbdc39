//! Constants for the download module (defaults, limits, timeouts).

use std::time::Duration;

/// Default number of concurrent workers.
pub const DEFAULT_PARALLELISM: usize = 4;

/// Default chunk size (1 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;

/// Default number of additional attempts per chunk after the first failure.
pub const DEFAULT_MAX_RETRIES: u32 = 0;

/// Default read buffer for post-download digesting (1 MiB).
pub const DEFAULT_VERIFY_READ_SIZE: usize = 1024 * 1024;

/// Maximum allowed parallelism.
pub const MAX_PARALLELISM: usize = 64;

/// Maximum allowed retries per chunk.
pub const MAX_RETRIES: u32 = 20;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes per range request).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Default base delay between attempts of the same chunk.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

/// Cap on the exponential retry delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Maximum jitter added to a retry delay.
pub const MAX_RETRY_JITTER: Duration = Duration::from_millis(100);
