//! Per-chunk retry policy with optional exponential backoff.
//!
//! A chunk gets `max_retries` additional attempts after its first failure
//! (`max_retries + 1` in total). Transport and write failures are treated
//! alike: the whole fetch-and-write attempt is repeated.
//!
//! # Example
//!
//! ```
//! use chunky_core::download::{RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::new(2);
//! match policy.should_retry(1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Retrying in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument};

use super::constants::{
    DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BASE_DELAY, MAX_RETRY_DELAY, MAX_RETRY_JITTER,
};

/// Default backoff multiplier (doubles each attempt).
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Decision on whether to run another attempt for a failed chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Run another attempt after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Give up on the chunk.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Configuration for retry behavior.
///
/// # Delay Calculation
///
/// ```text
/// delay = min(base_delay * multiplier^(attempt - 1), max_delay) + jitter
/// ```
///
/// A zero base delay disables waiting (and jitter) entirely.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure.
    max_retries: u32,

    /// Base delay for the first retry.
    base_delay: Duration,

    /// Maximum delay cap.
    max_delay: Duration,

    /// Multiplier applied each attempt.
    backoff_multiplier: f64,

    /// Upper bound of the random jitter.
    max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

impl RetryPolicy {
    /// Creates a policy with `max_retries` additional attempts and default backoff.
    #[must_use]
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: DEFAULT_RETRY_BASE_DELAY,
            max_delay: MAX_RETRY_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_jitter: MAX_RETRY_JITTER,
        }
    }

    /// Creates a policy that retries immediately, without any delay.
    #[must_use]
    pub fn immediate(max_retries: u32) -> Self {
        Self::new(max_retries).with_base_delay(Duration::ZERO)
    }

    /// Overrides the base delay; `Duration::ZERO` disables backoff.
    #[must_use]
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Returns the number of additional attempts allowed after a failure.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the total number of attempts a chunk may get.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Determines whether to run another attempt.
    ///
    /// `attempt` is the 1-indexed attempt that just failed.
    #[instrument(level = "trace", skip(self), fields(max_attempts = self.max_attempts()))]
    pub fn should_retry(&self, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts() {
            debug!(attempt, max = self.max_attempts(), "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts()),
            };
        }

        RetryDecision::Retry {
            delay: self.calculate_delay(attempt),
            attempt: attempt + 1,
        }
    }

    /// Delay before the attempt following `attempt`.
    fn calculate_delay(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay_secs = self.base_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()));

        capped + self.calculate_jitter()
    }

    /// Random jitter between 0 and `max_jitter`, so workers that failed
    /// together do not retry in lockstep.
    fn calculate_jitter(&self) -> Duration {
        let max_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        let mut rng = rand::thread_rng();
        Duration::from_millis(rng.gen_range(0..=max_ms))
    }
}
