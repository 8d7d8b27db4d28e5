//! Repository for the `sync_passes` audit table.

use cruisesync_core::types::DbId;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::sync_pass::{NewSyncPass, PassCounters, SyncPass};

/// Column list for `sync_passes` queries.
const COLUMNS: &str = "\
    pass_id, correlation_id, external_line_id, line_id, status, phase, event, payload, \
    attempted, succeeded, failed, skipped_missing, corrupted, success_rate, \
    error_sample, error, received_at, started_at, completed_at, updated_at";

/// Provides audit record operations for sync passes.
pub struct SyncPassRepo;

impl SyncPassRepo {
    /// Record a received pass. A repeated `pass_id` is ignored.
    pub async fn record_received(pool: &PgPool, input: &NewSyncPass) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO sync_passes \
                (pass_id, correlation_id, external_line_id, status, phase, event, payload) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (pass_id) DO NOTHING",
        )
        .bind(input.pass_id)
        .bind(input.correlation_id)
        .bind(input.external_line_id)
        .bind(&input.status)
        .bind(&input.phase)
        .bind(input.event.as_deref())
        .bind(&input.payload)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark the pass as started against an internal line id.
    pub async fn mark_processing(
        pool: &PgPool,
        pass_id: Uuid,
        line_id: DbId,
        phase: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE sync_passes SET line_id = $2, status = 'processing', phase = $3, \
                started_at = COALESCE(started_at, NOW()), updated_at = NOW() \
             WHERE pass_id = $1",
        )
        .bind(pass_id)
        .bind(line_id)
        .bind(phase)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Move a live pass to another phase.
    pub async fn mark_phase(pool: &PgPool, pass_id: Uuid, phase: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE sync_passes SET phase = $2, updated_at = NOW() WHERE pass_id = $1")
            .bind(pass_id)
            .bind(phase)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Write the terminal status, phase, and counters of a pass.
    pub async fn finish(
        pool: &PgPool,
        pass_id: Uuid,
        status: &str,
        phase: &str,
        counters: &PassCounters,
        error: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE sync_passes SET \
                status = $2, phase = $3, \
                attempted = $4, succeeded = $5, failed = $6, \
                skipped_missing = $7, corrupted = $8, success_rate = $9, \
                error_sample = $10, error = $11, \
                completed_at = NOW(), updated_at = NOW() \
             WHERE pass_id = $1",
        )
        .bind(pass_id)
        .bind(status)
        .bind(phase)
        .bind(counters.attempted)
        .bind(counters.succeeded)
        .bind(counters.failed)
        .bind(counters.skipped_missing)
        .bind(counters.corrupted)
        .bind(counters.success_rate)
        .bind(&counters.error_sample)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Find a pass by ID.
    pub async fn find(pool: &PgPool, pass_id: Uuid) -> Result<Option<SyncPass>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sync_passes WHERE pass_id = $1");
        sqlx::query_as::<_, SyncPass>(&query)
            .bind(pass_id)
            .fetch_optional(pool)
            .await
    }

    /// List all passes sharing a correlation id, oldest first.
    pub async fn list_by_correlation(
        pool: &PgPool,
        correlation_id: Uuid,
    ) -> Result<Vec<SyncPass>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sync_passes WHERE correlation_id = $1 \
             ORDER BY received_at ASC, pass_id ASC"
        );
        sqlx::query_as::<_, SyncPass>(&query)
            .bind(correlation_id)
            .fetch_all(pool)
            .await
    }
}
