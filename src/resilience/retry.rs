//! Bounded retry schedule
//!
//! Backoff timing comes from the exponential policy shipped with
//! `reqwest-retry`; the attempt budget is enforced here as well so a call is
//! never made more than `max_attempts` times.

use std::time::{Duration, SystemTime};

use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::{Jitter, RetryDecision, RetryPolicy as _};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: ExponentialBackoff,
}

impl RetryPolicy {
    /// `max_attempts` counts the first call. `min_backoff` must not exceed `max_backoff`.
    #[must_use]
    pub fn new(max_attempts: u32, min_backoff: Duration, max_backoff: Duration) -> Self {
        let max_attempts = max_attempts.max(1);
        let backoff = ExponentialBackoff::builder()
            .retry_bounds(min_backoff, max_backoff.max(min_backoff))
            .jitter(Jitter::Bounded)
            .build_with_max_retries(max_attempts - 1);
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Single attempt, no retries
    #[must_use]
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the next attempt, or `None` once the budget is spent.
    ///
    /// `failed_attempts` is the number of attempts that have already failed.
    #[must_use]
    pub fn delay_after(&self, started: SystemTime, failed_attempts: u32) -> Option<Duration> {
        if failed_attempts == 0 || failed_attempts >= self.max_attempts {
            return None;
        }
        match self.backoff.should_retry(started, failed_attempts - 1) {
            RetryDecision::Retry { execute_after } => Some(
                execute_after
                    .duration_since(SystemTime::now())
                    .unwrap_or_default(),
            ),
            RetryDecision::DoNotRetry => None,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(200), Duration::from_secs(2))
    }
}
