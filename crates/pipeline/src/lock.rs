//! Per-line pass lock.
//!
//! At most one live lock exists per `(line_id, lock_type)`. A lock carries
//! a random token; only the holder of that token can release it or report
//! progress against it. The holder renews the lock while it works, so only
//! locks left behind by a crashed pass expire after their TTL and can then
//! be taken over.

use std::time::Duration;

use async_trait::async_trait;
use cruisesync_core::types::{DbId, Timestamp};
use cruisesync_db::models::sync_lock::LOCK_TYPE_PRICING;
use cruisesync_db::repositories::SyncLockRepo;
use sqlx::PgPool;
use uuid::Uuid;

use crate::orchestrator::{Progress, ProgressSink};

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// Another pass holds a live lock for this line.
    #[error("sync lock for line {line_id} is held")]
    Held { line_id: DbId },

    #[error("lock store error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Proof of lock ownership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    pub line_id: DbId,
    pub token: Uuid,
    pub expires_at: Timestamp,
}

#[derive(Clone)]
pub struct LineLockManager {
    pool: PgPool,
    ttl: Duration,
    renew_every: Duration,
    lock_type: &'static str,
}

impl LineLockManager {
    /// Renews every third of `ttl` unless overridden.
    pub fn new(pool: PgPool, ttl: Duration) -> Self {
        Self {
            pool,
            ttl,
            renew_every: ttl / 3,
            lock_type: LOCK_TYPE_PRICING,
        }
    }

    pub fn with_renew_interval(mut self, every: Duration) -> Self {
        self.renew_every = every;
        self
    }

    /// Take the lock for `line_id`, or fail with [`LockError::Held`].
    pub async fn acquire(&self, line_id: DbId) -> Result<LockToken, LockError> {
        let token = Uuid::new_v4();
        let lock = SyncLockRepo::try_acquire(&self.pool, line_id, self.lock_type, token, self.ttl)
            .await?
            .ok_or(LockError::Held { line_id })?;

        tracing::debug!(
            line_id,
            token = %lock.token,
            expires_at = %lock.expires_at,
            "Sync lock acquired"
        );
        Ok(LockToken {
            line_id,
            token: lock.token,
            expires_at: lock.expires_at,
        })
    }

    /// Release the lock if `token` still owns it. Returns `false` when the
    /// lock had already expired and been taken over (or removed).
    pub async fn release(&self, token: &LockToken) -> Result<bool, LockError> {
        let released =
            SyncLockRepo::release(&self.pool, token.line_id, self.lock_type, token.token).await?;
        if released {
            tracing::debug!(line_id = token.line_id, "Sync lock released");
        } else {
            tracing::warn!(
                line_id = token.line_id,
                token = %token.token,
                "Sync lock was no longer held at release"
            );
        }
        Ok(released)
    }

    /// Extend the lock by another TTL. Returns `false` when `token` no
    /// longer owns it.
    pub async fn renew(&self, token: &LockToken) -> Result<bool, LockError> {
        let renewed =
            SyncLockRepo::renew(&self.pool, token.line_id, self.lock_type, token.token, self.ttl)
                .await?;
        match renewed {
            Some(expires_at) => {
                tracing::trace!(line_id = token.line_id, %expires_at, "Sync lock renewed");
                Ok(true)
            }
            None => {
                tracing::warn!(
                    line_id = token.line_id,
                    token = %token.token,
                    "Sync lock lost before renewal"
                );
                Ok(false)
            }
        }
    }

    /// Keep `token` live until it is lost. Completes only when another
    /// holder owns the lock or the row is gone; store errors are retried
    /// on the next tick.
    pub async fn hold(&self, token: &LockToken) {
        loop {
            tokio::time::sleep(self.renew_every).await;
            match self.renew(token).await {
                Ok(true) => {}
                Ok(false) => return,
                Err(e) => tracing::warn!(
                    line_id = token.line_id,
                    error = %e,
                    "Failed to renew sync lock"
                ),
            }
        }
    }

    /// Mirror pass progress onto the lock record.
    pub async fn record_progress(
        &self,
        token: &LockToken,
        progress: Progress,
    ) -> Result<bool, LockError> {
        Ok(SyncLockRepo::update_progress(
            &self.pool,
            token.line_id,
            self.lock_type,
            token.token,
            clamp_i32(progress.processed),
            clamp_i32(progress.succeeded),
            clamp_i32(progress.failed),
        )
        .await?)
    }

    /// Bind a token to this manager as a [`ProgressSink`].
    pub fn progress_sink<'a>(&'a self, token: &'a LockToken) -> LockProgress<'a> {
        LockProgress {
            manager: self,
            token,
        }
    }
}

fn clamp_i32(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

/// Writes orchestrator progress to the lock row of the running pass.
pub struct LockProgress<'a> {
    manager: &'a LineLockManager,
    token: &'a LockToken,
}

#[async_trait]
impl ProgressSink for LockProgress<'_> {
    async fn report(&self, progress: Progress) {
        match self.manager.record_progress(self.token, progress).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(
                line_id = self.token.line_id,
                "Sync lock lost while reporting progress"
            ),
            Err(e) => tracing::warn!(
                line_id = self.token.line_id,
                error = %e,
                "Failed to record sync progress"
            ),
        }
    }
}
