//! Bounded pool of long-lived transfer sessions.
//!
//! [`TransferPool`] is constructed once per process and shared as
//! `Arc<TransferPool>`. Callers `acquire()` a [`PooledSession`], use it,
//! then hand it back with [`TransferPool::release`] (healthy) or
//! [`TransferPool::discard`] (after a connectivity failure). A session
//! dropped without either is released if it is still healthy.
//!
//! Every remote operation on a pooled session goes through the shared
//! [`CircuitBreaker`]; once it opens, `acquire()` fails fast instead of
//! queueing behind the semaphore. Control-channel operations are bounded
//! by `PoolConfig::op_timeout`; one that overruns counts as a breaker
//! failure and the session is not reused.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

use crate::breaker::{BreakerState, CircuitBreaker};
use crate::config::{BreakerConfig, PoolConfig};
use crate::error::TransferError;
use crate::session::{SessionFactory, TransferSession};

/// Point-in-time view of the pool for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct PoolSnapshot {
    pub max_sessions: usize,
    /// Sessions currently connected (idle + checked out).
    pub open: usize,
    pub idle: usize,
    pub in_use: usize,
    pub breaker_state: BreakerState,
    pub consecutive_failures: u32,
}

struct IdleSession {
    session: Box<dyn TransferSession>,
    idle_since: Instant,
}

pub struct TransferPool {
    factory: Arc<dyn SessionFactory>,
    breaker: CircuitBreaker,
    config: PoolConfig,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<IdleSession>>,
    open: AtomicUsize,
}

impl TransferPool {
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        config: PoolConfig,
        breaker: BreakerConfig,
    ) -> Arc<Self> {
        let config = config.clamped();
        Arc::new(Self {
            factory,
            breaker: CircuitBreaker::new(breaker),
            permits: Arc::new(Semaphore::new(config.max_sessions)),
            idle: Mutex::new(Vec::with_capacity(config.max_sessions)),
            open: AtomicUsize::new(0),
            config,
        })
    }

    pub fn max_sessions(&self) -> usize {
        self.config.max_sessions
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Check out a session, waiting while all sessions are in use.
    ///
    /// Reuses an idle session that answers a liveness probe, otherwise
    /// opens a new one through the breaker.
    pub async fn acquire(self: &Arc<Self>) -> Result<PooledSession, TransferError> {
        self.breaker.check()?;
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| TransferError::PoolClosed)?;

        let limit = self.config.op_timeout;
        while let Some(mut candidate) = self.pop_idle() {
            match bounded(limit, candidate.session.noop()).await {
                Ok(()) => return Ok(self.wrap(candidate.session, permit)),
                Err(e) => {
                    tracing::debug!(error = %e, "Dropping stale idle session");
                    quit_bounded(limit, candidate.session.as_mut()).await;
                    self.open.fetch_sub(1, Ordering::SeqCst);
                }
            }
        }

        let session = self.breaker.call(self.factory.connect()).await?;
        let opened = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(open = opened, "Opened transfer session");
        Ok(self.wrap(session, permit))
    }

    /// Return a healthy session to the idle set.
    pub fn release(&self, mut session: PooledSession) {
        if let Some(inner) = session.session.take() {
            if session.broken {
                self.close_detached(inner);
            } else {
                self.push_idle(inner);
            }
        }
    }

    /// Close a session that is known or suspected to be broken.
    pub fn discard(&self, mut session: PooledSession) {
        if let Some(inner) = session.session.take() {
            self.close_detached(inner);
        }
    }

    /// Close idle sessions unused for longer than the idle timeout.
    /// Returns how many were closed.
    pub async fn reap_idle(&self) -> usize {
        let expired: Vec<IdleSession> = {
            let mut idle = self.idle_guard();
            let (expired, keep): (Vec<_>, Vec<_>) = idle
                .drain(..)
                .partition(|s| s.idle_since.elapsed() >= self.config.idle_timeout);
            *idle = keep;
            expired
        };
        let count = expired.len();
        for mut s in expired {
            quit_bounded(self.config.op_timeout, s.session.as_mut()).await;
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
        count
    }

    /// Stop handing out sessions and close every idle one.
    pub async fn shutdown(&self) {
        self.permits.close();
        let idle: Vec<IdleSession> = self.idle_guard().drain(..).collect();
        for mut s in idle {
            quit_bounded(self.config.op_timeout, s.session.as_mut()).await;
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
        tracing::info!("Transfer pool shut down");
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        let idle = self.idle_guard().len();
        PoolSnapshot {
            max_sessions: self.config.max_sessions,
            open: self.open.load(Ordering::SeqCst),
            idle,
            in_use: self
                .config
                .max_sessions
                .saturating_sub(self.permits.available_permits()),
            breaker_state: self.breaker.state(),
            consecutive_failures: self.breaker.consecutive_failures(),
        }
    }

    // ---- private helpers ----

    fn wrap(
        self: &Arc<Self>,
        session: Box<dyn TransferSession>,
        permit: OwnedSemaphorePermit,
    ) -> PooledSession {
        PooledSession {
            pool: Arc::clone(self),
            session: Some(session),
            broken: false,
            _permit: permit,
        }
    }

    fn idle_guard(&self) -> MutexGuard<'_, Vec<IdleSession>> {
        self.idle.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Most recently used first, so older sessions age out.
    fn pop_idle(&self) -> Option<IdleSession> {
        self.idle_guard().pop()
    }

    fn push_idle(&self, session: Box<dyn TransferSession>) {
        let mut idle = self.idle_guard();
        if idle.len() >= self.config.max_sessions {
            drop(idle);
            self.close_detached(session);
            return;
        }
        idle.push(IdleSession {
            session,
            idle_since: Instant::now(),
        });
    }

    /// Close a session outside of an async context.
    fn close_detached(&self, mut session: Box<dyn TransferSession>) {
        self.open.fetch_sub(1, Ordering::SeqCst);
        let limit = self.config.op_timeout;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { quit_bounded(limit, session.as_mut()).await });
            }
            Err(_) => drop(session),
        }
    }
}

/// Run one control-channel operation under `limit`.
async fn bounded<T>(
    limit: Duration,
    op: impl Future<Output = Result<T, TransferError>>,
) -> Result<T, TransferError> {
    tokio::time::timeout(limit, op)
        .await
        .unwrap_or_else(|_| Err(TransferError::Timeout(limit)))
}

async fn quit_bounded(limit: Duration, session: &mut dyn TransferSession) {
    if tokio::time::timeout(limit, session.quit()).await.is_err() {
        tracing::debug!(timeout = ?limit, "Session quit timed out");
    }
}

/// A session checked out of the pool. Holds one pool permit until it is
/// released, discarded, or dropped.
pub struct PooledSession {
    pool: Arc<TransferPool>,
    session: Option<Box<dyn TransferSession>>,
    broken: bool,
    _permit: OwnedSemaphorePermit,
}

impl std::fmt::Debug for PooledSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledSession")
            .field("broken", &self.broken)
            .finish_non_exhaustive()
    }
}

impl PooledSession {
    pub async fn cwd(&mut self, path: &str) -> Result<(), TransferError> {
        let session = self.session.as_mut().ok_or(TransferError::PoolClosed)?;
        let limit = self.pool.config.op_timeout;
        let result = self.pool.breaker.call(bounded(limit, session.cwd(path))).await;
        self.observe(result)
    }

    pub async fn list(&mut self) -> Result<Vec<String>, TransferError> {
        let session = self.session.as_mut().ok_or(TransferError::PoolClosed)?;
        let limit = self.pool.config.op_timeout;
        let result = self.pool.breaker.call(bounded(limit, session.list())).await;
        self.observe(result)
    }

    pub async fn size(&mut self, name: &str) -> Result<Option<u64>, TransferError> {
        let session = self.session.as_mut().ok_or(TransferError::PoolClosed)?;
        let limit = self.pool.config.op_timeout;
        let result = self.pool.breaker.call(bounded(limit, session.size(name))).await;
        self.observe(result)
    }

    /// Download `name`. Not bounded here; callers apply their own
    /// download timeout.
    pub async fn retrieve(&mut self, name: &str) -> Result<Vec<u8>, TransferError> {
        // Marked up front: if the caller's timeout drops this future the
        // session is left mid-transfer and must not be reused.
        let was_broken = std::mem::replace(&mut self.broken, true);
        let session = self.session.as_mut().ok_or(TransferError::PoolClosed)?;
        let result = self.pool.breaker.call(session.retrieve(name)).await;
        self.broken = was_broken;
        self.observe(result)
    }

    /// Flag the session so it is closed instead of returned to the pool.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    pub fn is_broken(&self) -> bool {
        self.broken
    }

    fn observe<T>(&mut self, result: Result<T, TransferError>) -> Result<T, TransferError> {
        if let Err(e) = &result {
            if e.is_connectivity() {
                self.broken = true;
            }
        }
        result
    }
}

impl Drop for PooledSession {
    fn drop(&mut self) {
        if let Some(inner) = self.session.take() {
            if self.broken {
                self.pool.close_detached(inner);
            } else {
                self.pool.push_idle(inner);
            }
        }
    }
}
