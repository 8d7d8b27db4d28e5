//! Repository for the `sync_locks` table.
//!
//! Acquisition is a single conditional upsert: a missing row is inserted,
//! an expired row is taken over, and a live row is left untouched (the
//! statement then returns no row). A running holder keeps its lock live by
//! renewing it before the expiry passes.

use std::time::Duration;

use cruisesync_core::types::{DbId, Timestamp};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::sync_lock::SyncLock;

/// Column list for `sync_locks` queries.
const COLUMNS: &str = "\
    line_id, lock_type, token, status, started_at, expires_at, \
    processed, succeeded, failed, error";

/// Provides lock operations keyed by `(line_id, lock_type)`.
pub struct SyncLockRepo;

impl SyncLockRepo {
    /// Try to take the lock for `token`. Returns the lock row on success,
    /// `None` when another holder's lock is still live.
    pub async fn try_acquire(
        pool: &PgPool,
        line_id: DbId,
        lock_type: &str,
        token: Uuid,
        ttl: Duration,
    ) -> Result<Option<SyncLock>, sqlx::Error> {
        let query = format!(
            "INSERT INTO sync_locks (line_id, lock_type, token, status, started_at, expires_at) \
             VALUES ($1, $2, $3, 'active', NOW(), NOW() + make_interval(secs => $4)) \
             ON CONFLICT (line_id, lock_type) DO UPDATE SET \
                token = EXCLUDED.token, \
                status = 'active', \
                started_at = EXCLUDED.started_at, \
                expires_at = EXCLUDED.expires_at, \
                processed = 0, \
                succeeded = 0, \
                failed = 0, \
                error = NULL \
             WHERE sync_locks.expires_at <= NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SyncLock>(&query)
            .bind(line_id)
            .bind(lock_type)
            .bind(token)
            .bind(ttl.as_secs_f64())
            .fetch_optional(pool)
            .await
    }

    /// Release the lock if `token` still holds it. Returns `true` when a
    /// row was removed.
    pub async fn release(
        pool: &PgPool,
        line_id: DbId,
        lock_type: &str,
        token: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM sync_locks WHERE line_id = $1 AND lock_type = $2 AND token = $3",
        )
        .bind(line_id)
        .bind(lock_type)
        .bind(token)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Push the expiry out to `NOW() + ttl` if `token` still holds the lock.
    /// Returns the new expiry, or `None` if the lock was lost.
    pub async fn renew(
        pool: &PgPool,
        line_id: DbId,
        lock_type: &str,
        token: Uuid,
        ttl: Duration,
    ) -> Result<Option<Timestamp>, sqlx::Error> {
        sqlx::query_scalar::<_, Timestamp>(
            "UPDATE sync_locks SET expires_at = NOW() + make_interval(secs => $4) \
             WHERE line_id = $1 AND lock_type = $2 AND token = $3 \
             RETURNING expires_at",
        )
        .bind(line_id)
        .bind(lock_type)
        .bind(token)
        .bind(ttl.as_secs_f64())
        .fetch_optional(pool)
        .await
    }

    /// Mirror pass progress onto the lock row. Only the current holder can
    /// write; returns `false` if the lock was lost.
    pub async fn update_progress(
        pool: &PgPool,
        line_id: DbId,
        lock_type: &str,
        token: Uuid,
        processed: i32,
        succeeded: i32,
        failed: i32,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sync_locks SET processed = $4, succeeded = $5, failed = $6 \
             WHERE line_id = $1 AND lock_type = $2 AND token = $3",
        )
        .bind(line_id)
        .bind(lock_type)
        .bind(token)
        .bind(processed)
        .bind(succeeded)
        .bind(failed)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Fetch the current lock row regardless of expiry.
    pub async fn find(
        pool: &PgPool,
        line_id: DbId,
        lock_type: &str,
    ) -> Result<Option<SyncLock>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM sync_locks WHERE line_id = $1 AND lock_type = $2");
        sqlx::query_as::<_, SyncLock>(&query)
            .bind(line_id)
            .bind(lock_type)
            .fetch_optional(pool)
            .await
    }

    /// List locks whose expiry is still in the future.
    pub async fn list_live(pool: &PgPool) -> Result<Vec<SyncLock>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sync_locks WHERE expires_at > NOW() ORDER BY line_id"
        );
        sqlx::query_as::<_, SyncLock>(&query).fetch_all(pool).await
    }
}
