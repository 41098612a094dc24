//! Per-provider circuit breaker
//!
//! Closed: every call is admitted and its result lands in a count-based
//! sliding window. Once the window holds at least `minimum_calls` results and
//! the failure rate reaches the threshold, the breaker opens.
//!
//! Open: calls are refused without touching the network until the cool-down
//! passes.
//!
//! Half-open: up to `half_open_probes` calls are admitted. One failed probe
//! reopens the breaker, all probes succeeding closes it.
//!
//! Results are reported through a [`CallPermit`]. A permit dropped without a
//! result (the caller was cancelled) books nothing and frees its probe slot.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

/// Breaker thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerConfig {
    /// Number of most recent results considered
    pub window_size: usize,
    /// Results needed in the window before the rate is evaluated
    pub minimum_calls: usize,
    /// Failure percentage (0..=100) at which the breaker opens
    pub failure_rate_threshold: f64,
    /// Cool-down before the first probe is let through
    pub open_duration: Duration,
    /// Probes admitted while half-open
    pub half_open_probes: usize,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            minimum_calls: 3,
            failure_rate_threshold: 50.0,
            open_duration: Duration::from_secs(30),
            half_open_probes: 1,
        }
    }
}

/// Externally visible breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
enum Phase {
    Closed,
    Open { until: Instant },
    HalfOpen { in_flight: usize, succeeded: usize },
}

#[derive(Debug)]
struct Inner {
    phase: Phase,
    // true marks a failure
    window: VecDeque<bool>,
}

pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            inner: Mutex::new(Inner {
                phase: Phase::Closed,
                window: VecDeque::with_capacity(config.window_size),
            }),
            config,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn state(&self) -> BreakerState {
        match self.lock().phase {
            Phase::Closed => BreakerState::Closed,
            Phase::Open { until } if Instant::now() >= until => BreakerState::HalfOpen,
            Phase::Open { .. } => BreakerState::Open,
            Phase::HalfOpen { .. } => BreakerState::HalfOpen,
        }
    }

    /// Failure percentage of the current window
    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        failure_rate(&self.lock().window)
    }

    /// Results currently held in the sliding window
    #[must_use]
    pub fn recorded_calls(&self) -> usize {
        self.lock().window.len()
    }

    /// Time left before an open breaker admits a probe
    #[must_use]
    pub fn remaining_open(&self) -> Option<Duration> {
        match self.lock().phase {
            Phase::Open { until } => Some(until.saturating_duration_since(Instant::now())),
            _ => None,
        }
    }

    /// Ask to make a call. `None` means the call must not be attempted.
    pub fn try_acquire(self: &Arc<Self>) -> Option<CallPermit> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let probe = match &mut inner.phase {
            Phase::Closed => false,
            Phase::Open { until } => {
                if Instant::now() < *until {
                    return None;
                }
                info!(breaker = %self.name, "Circuit half-open, letting a probe through");
                inner.phase = Phase::HalfOpen {
                    in_flight: 1,
                    succeeded: 0,
                };
                true
            }
            Phase::HalfOpen { in_flight, succeeded } => {
                if *in_flight + *succeeded >= self.config.half_open_probes {
                    return None;
                }
                *in_flight += 1;
                true
            }
        };
        Some(CallPermit {
            breaker: Arc::clone(self),
            probe,
            settled: false,
        })
    }

    fn settle(&self, probe: bool, failed: bool) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        match &mut inner.phase {
            Phase::Closed => {
                inner.window.push_back(failed);
                while inner.window.len() > self.config.window_size {
                    inner.window.pop_front();
                }
                let rate = failure_rate(&inner.window);
                if inner.window.len() >= self.config.minimum_calls
                    && rate >= self.config.failure_rate_threshold
                {
                    warn!(
                        breaker = %self.name,
                        failure_rate = rate,
                        "Circuit opened for {:?}",
                        self.config.open_duration
                    );
                    self.trip(inner);
                }
            }
            Phase::HalfOpen { in_flight, succeeded } if probe => {
                *in_flight = in_flight.saturating_sub(1);
                if failed {
                    warn!(breaker = %self.name, "Probe failed, circuit reopened");
                    self.trip(inner);
                } else {
                    *succeeded += 1;
                    if *succeeded >= self.config.half_open_probes {
                        info!(breaker = %self.name, "Circuit closed");
                        inner.phase = Phase::Closed;
                        inner.window.clear();
                    }
                }
            }
            // late result of a call admitted before the last transition
            Phase::HalfOpen { .. } | Phase::Open { .. } => {}
        }
    }

    fn release(&self, probe: bool) {
        if !probe {
            return;
        }
        if let Phase::HalfOpen { in_flight, .. } = &mut self.lock().phase {
            *in_flight = in_flight.saturating_sub(1);
        }
    }

    fn trip(&self, inner: &mut Inner) {
        inner.phase = Phase::Open {
            until: Instant::now() + self.config.open_duration,
        };
        inner.window.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn failure_rate(window: &VecDeque<bool>) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    let failures = window.iter().filter(|failed| **failed).count();
    failures as f64 * 100.0 / window.len() as f64
}

/// Admission for one call. Report the result with
/// [`record_success`](Self::record_success) or
/// [`record_failure`](Self::record_failure).
#[must_use = "a permit records nothing unless a result is reported"]
pub struct CallPermit {
    breaker: Arc<CircuitBreaker>,
    probe: bool,
    settled: bool,
}

impl CallPermit {
    pub fn record_success(mut self) {
        self.settled = true;
        self.breaker.settle(self.probe, false);
    }

    pub fn record_failure(mut self) {
        self.settled = true;
        self.breaker.settle(self.probe, true);
    }
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.release(self.probe);
        }
    }
}
