//! Per-line sync lock rows.

use cruisesync_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Lock type used by pricing passes.
pub const LOCK_TYPE_PRICING: &str = "pricing_sync";

/// A `sync_locks` row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SyncLock {
    pub line_id: DbId,
    pub lock_type: String,
    pub token: Uuid,
    pub status: String,
    pub started_at: Timestamp,
    pub expires_at: Timestamp,
    pub processed: i32,
    pub succeeded: i32,
    pub failed: i32,
    pub error: Option<String>,
}
