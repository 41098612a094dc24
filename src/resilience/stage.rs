//! One guarded external call: breaker admission, per-call timeout and
//! bounded retry, composed in that order for every attempt.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use super::{CircuitBreaker, RetryPolicy};
use crate::Result;
use crate::error::{PlaylistError, Stage};

/// Resilience policy for one provider
#[derive(Debug, Clone)]
pub struct ResilientStage {
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl ResilientStage {
    pub fn new(breaker: Arc<CircuitBreaker>, retry: RetryPolicy, call_timeout: Duration) -> Self {
        Self {
            breaker,
            retry,
            call_timeout,
        }
    }

    #[must_use]
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Run `operation` under the breaker, retrying retryable failures.
    ///
    /// Each attempt needs its own breaker permit, so an open breaker stops a
    /// retry loop midway. Dropping the returned future cancels the attempt in
    /// flight without booking it.
    pub async fn call<T, F, Fut>(&self, stage: Stage, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = SystemTime::now();
        let mut failed_attempts = 0u32;

        loop {
            let Some(permit) = self.breaker.try_acquire() else {
                warn!(%stage, breaker = self.breaker.name(), "Circuit open, failing fast");
                let message = match self.breaker.remaining_open() {
                    Some(remaining) => format!(
                        "{} circuit is open for another {}s",
                        self.breaker.name(),
                        remaining.as_secs()
                    ),
                    None => format!("{} circuit is open", self.breaker.name()),
                };
                return Err(PlaylistError::breaker_open(stage, message));
            };

            let result = match timeout(self.call_timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(PlaylistError::transient(
                    stage,
                    format!("no response within {:?}", self.call_timeout),
                )),
            };

            let error = match result {
                Ok(value) => {
                    permit.record_success();
                    if failed_attempts > 0 {
                        debug!(%stage, "Succeeded after {} attempts", failed_attempts + 1);
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if error.kind.counts_as_failure() {
                permit.record_failure();
            } else {
                permit.record_success();
            }

            if !error.kind.is_retryable() {
                debug!(%stage, %error, "Non-retryable error");
                return Err(error);
            }

            failed_attempts += 1;
            match self.retry.delay_after(started, failed_attempts) {
                Some(delay) => {
                    warn!(
                        %stage,
                        "Attempt {} failed: {}. Retrying in {:?}",
                        failed_attempts,
                        error,
                        delay
                    );
                    sleep(delay).await;
                }
                None => {
                    warn!(
                        %stage,
                        "Giving up after {} attempts. Last error: {}",
                        failed_attempts,
                        error
                    );
                    return Err(error);
                }
            }
        }
    }
}
