//! Repository for the `sailings` table.

use cruisesync_core::types::DbId;
use sqlx::PgPool;

use crate::models::sailing::{Sailing, SailingTarget};

/// Column list for `sailings` queries.
const COLUMNS: &str = "\
    id, cruise_code, vessel_id, line_id, sailing_date, is_active, \
    last_synced_at, created_at, updated_at";

/// Filter shared by the candidate queries: active, departing today or later.
const CANDIDATE_FILTER: &str = "\
    s.line_id = $1 AND s.is_active AND s.sailing_date >= CURRENT_DATE";

/// Provides query operations for sailings.
pub struct SailingRepo;

impl SailingRepo {
    /// Find a sailing by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Sailing>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sailings WHERE id = $1");
        sqlx::query_as::<_, Sailing>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List up to `limit` sync candidates for a line, nearest departure first.
    pub async fn list_sync_candidates(
        pool: &PgPool,
        line_id: DbId,
        limit: i64,
    ) -> Result<Vec<SailingTarget>, sqlx::Error> {
        let query = format!(
            "SELECT s.id, s.cruise_code, s.vessel_id, v.name AS vessel_name, \
                    s.line_id, s.sailing_date \
             FROM sailings s \
             LEFT JOIN vessels v ON v.id = s.vessel_id \
             WHERE {CANDIDATE_FILTER} \
             ORDER BY s.sailing_date ASC, s.id ASC \
             LIMIT $2"
        );
        sqlx::query_as::<_, SailingTarget>(&query)
            .bind(line_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Count all sync candidates for a line, ignoring the cap.
    pub async fn count_sync_candidates(pool: &PgPool, line_id: DbId) -> Result<i64, sqlx::Error> {
        let query = format!("SELECT COUNT(*) FROM sailings s WHERE {CANDIDATE_FILTER}");
        sqlx::query_scalar::<_, i64>(&query)
            .bind(line_id)
            .fetch_one(pool)
            .await
    }
}
