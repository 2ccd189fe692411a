//! A generic three-state circuit breaker.
//!
//! Wraps an async operation; consecutive failures open the circuit, a
//! cooldown moves it to a probing state, and enough successful probes close
//! it again. While open, calls are refused with a sentinel instead of being
//! invoked, so the caller can fail open without paying for a doomed call.
//! The counters sit behind a mutex because the serving runtime is
//! multi-threaded; the lock is only held to decide and to record, never
//! across the operation itself.

use std::future::Future;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

#[derive(Clone, Debug)]
pub struct BreakerPolicy {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before probing.
    pub reset_timeout: Duration,
    /// Successful probes required to close again; also bounds concurrent
    /// probes while half-open.
    pub half_open_max_attempts: u32,
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_millis(30_000),
            half_open_max_attempts: 1,
        }
    }
}

/// Outcome of a guarded call: either the operation ran, or the breaker
/// refused to invoke it.
#[derive(Debug)]
pub enum Guarded<T> {
    Ran(T),
    Rejected,
}

impl<T> Guarded<T> {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Guarded::Rejected)
    }
}

#[derive(Debug)]
enum Phase {
    Closed,
    Open { since: Instant },
    HalfOpen { successes: u32, in_flight: u32 },
}

#[derive(Debug)]
struct Inner {
    phase: Phase,
    failures: u32,
}

pub struct CircuitBreaker {
    policy: BreakerPolicy,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(policy: BreakerPolicy) -> Self {
        Self {
            policy,
            inner: Mutex::new(Inner {
                phase: Phase::Closed,
                failures: 0,
            }),
        }
    }

    /// Run `op` under the breaker. Errors are counted against the circuit
    /// and then re-raised to the caller.
    pub async fn run<F, Fut, T, E>(&self, op: F) -> Result<Guarded<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.try_acquire() {
            return Ok(Guarded::Rejected);
        }
        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(Guarded::Ran(value))
            }
            Err(err) => {
                self.record_failure();
                Err(err)
            }
        }
    }

    /// Force the breaker back to closed with cleared counters.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.phase = Phase::Closed;
        inner.failures = 0;
    }

    pub fn state(&self) -> CircuitState {
        match self.inner.lock().phase {
            Phase::Closed => CircuitState::Closed,
            Phase::Open { .. } => CircuitState::Open,
            Phase::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failures
    }

    fn try_acquire(&self) -> bool {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match &mut inner.phase {
            Phase::Closed => true,
            Phase::Open { since } => {
                let since = *since;
                if since.elapsed() < self.policy.reset_timeout {
                    false
                } else {
                    // Cooldown elapsed: this call becomes the first probe.
                    inner.phase = Phase::HalfOpen {
                        successes: 0,
                        in_flight: 1,
                    };
                    true
                }
            }
            Phase::HalfOpen {
                successes,
                in_flight,
            } => {
                if *successes + *in_flight >= self.policy.half_open_max_attempts {
                    false
                } else {
                    *in_flight += 1;
                    true
                }
            }
        }
    }

    fn record_success(&self) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match &mut inner.phase {
            Phase::Closed => {
                if inner.failures > 0 {
                    inner.failures = 0;
                }
            }
            Phase::HalfOpen {
                successes,
                in_flight,
            } => {
                *in_flight = in_flight.saturating_sub(1);
                *successes += 1;
                if *successes >= self.policy.half_open_max_attempts {
                    inner.phase = Phase::Closed;
                    inner.failures = 0;
                }
            }
            // A probe that raced a reopen; the failure already won.
            Phase::Open { .. } => {}
        }
    }

    fn record_failure(&self) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.failures = inner.failures.saturating_add(1);
        let reopen = match inner.phase {
            Phase::Closed => inner.failures >= self.policy.failure_threshold,
            Phase::HalfOpen { .. } | Phase::Open { .. } => true,
        };
        if reopen {
            inner.phase = Phase::Open {
                since: Instant::now(),
            };
        }
    }
}
