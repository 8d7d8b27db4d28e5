//! Sync pass audit records.

use cruisesync_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A `sync_passes` row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SyncPass {
    pub pass_id: Uuid,
    pub correlation_id: Uuid,
    pub external_line_id: Option<DbId>,
    pub line_id: Option<DbId>,
    pub status: String,
    pub phase: String,
    pub event: Option<String>,
    pub payload: serde_json::Value,
    pub attempted: i32,
    pub succeeded: i32,
    pub failed: i32,
    pub skipped_missing: i32,
    pub corrupted: i32,
    pub success_rate: Option<f64>,
    pub error_sample: serde_json::Value,
    pub error: Option<String>,
    pub received_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

/// DTO for recording a newly received pass.
#[derive(Debug, Clone)]
pub struct NewSyncPass {
    pub pass_id: Uuid,
    pub correlation_id: Uuid,
    pub external_line_id: Option<DbId>,
    pub status: String,
    pub phase: String,
    pub event: Option<String>,
    pub payload: serde_json::Value,
}

/// Final counters written when a pass reaches a terminal state.
#[derive(Debug, Clone, Default)]
pub struct PassCounters {
    pub attempted: i32,
    pub succeeded: i32,
    pub failed: i32,
    pub skipped_missing: i32,
    pub corrupted: i32,
    pub success_rate: Option<f64>,
    pub error_sample: serde_json::Value,
}
