//! Consecutive-failure circuit breaker.
//!
//! ```text
//! Closed --(threshold consecutive failures)--> Open
//! Open   --(cool-down elapsed, next call)----> HalfOpen (one trial in flight)
//! HalfOpen --(trial succeeds)----------------> Closed, failures reset
//! HalfOpen --(trial fails)-------------------> Open, cool-down restarts
//! ```
//!
//! Only connectivity failures ([`TransferError::is_connectivity`]) count.
//! A call whose future is dropped before completing (e.g. cut off by an
//! outer timeout) is recorded as a failure.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::config::BreakerConfig;
use crate::error::TransferError;

/// Returned instead of attempting a call while the breaker is open.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("circuit open, retry after {retry_after:?}")]
pub struct CircuitOpen {
    pub retry_after: Duration,
}

/// Externally visible breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Closed,
    Open { until: Instant },
    HalfOpen,
}

#[derive(Debug)]
struct Inner {
    state: State,
    consecutive_failures: u32,
}

pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: State::Closed,
                consecutive_failures: 0,
            }),
        }
    }

    /// Run `op` through the breaker.
    pub async fn call<T, Fut>(&self, op: Fut) -> Result<T, TransferError>
    where
        Fut: Future<Output = Result<T, TransferError>>,
    {
        self.admit()?;
        let mut guard = CallGuard {
            breaker: self,
            settled: false,
        };
        let result = op.await;
        guard.settled = true;
        match &result {
            Err(e) if e.is_connectivity() => self.on_failure(),
            _ => self.on_success(),
        }
        result
    }

    /// Fail fast without waiting, as the pool does before queueing.
    pub fn check(&self) -> Result<(), CircuitOpen> {
        let inner = self.lock();
        match inner.state {
            State::Open { until } if Instant::now() < until => Err(CircuitOpen {
                retry_after: until - Instant::now(),
            }),
            _ => Ok(()),
        }
    }

    pub fn state(&self) -> BreakerState {
        match self.lock().state {
            State::Closed => BreakerState::Closed,
            State::Open { until } if Instant::now() < until => BreakerState::Open,
            State::Open { .. } | State::HalfOpen => BreakerState::HalfOpen,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    // ---- private helpers ----

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Decide whether a call may proceed. Moving from open to half-open
    /// happens here so exactly one caller becomes the trial.
    fn admit(&self) -> Result<(), CircuitOpen> {
        let mut inner = self.lock();
        match inner.state {
            State::Closed => Ok(()),
            State::Open { until } => {
                let now = Instant::now();
                if now < until {
                    return Err(CircuitOpen {
                        retry_after: until - now,
                    });
                }
                inner.state = State::HalfOpen;
                tracing::info!("Circuit breaker half-open, allowing one trial call");
                Ok(())
            }
            State::HalfOpen => Err(CircuitOpen {
                retry_after: Duration::ZERO,
            }),
        }
    }

    fn on_success(&self) {
        let mut inner = self.lock();
        if !matches!(inner.state, State::Closed) {
            tracing::info!("Circuit breaker closed");
        }
        inner.state = State::Closed;
        inner.consecutive_failures = 0;
    }

    fn on_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        let open = match inner.state {
            State::HalfOpen => true,
            State::Closed => inner.consecutive_failures >= self.config.failure_threshold,
            State::Open { .. } => false,
        };
        if open {
            inner.state = State::Open {
                until: Instant::now() + self.config.cooldown,
            };
            tracing::warn!(
                failures = inner.consecutive_failures,
                cooldown_secs = self.config.cooldown.as_secs(),
                "Circuit breaker opened"
            );
        }
    }
}

/// Records a failure if the wrapped call never completes.
struct CallGuard<'a> {
    breaker: &'a CircuitBreaker,
    settled: bool,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.on_failure();
        }
    }
}
