//! Sailing rows as seen by the sync engine.

use chrono::NaiveDate;
use cruisesync_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A full `sailings` row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Sailing {
    pub id: DbId,
    pub cruise_code: String,
    pub vessel_id: DbId,
    pub line_id: DbId,
    pub sailing_date: NaiveDate,
    pub is_active: bool,
    pub last_synced_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A sync candidate: the columns needed to locate and write one sailing's
/// pricing document.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct SailingTarget {
    pub id: DbId,
    pub cruise_code: String,
    pub vessel_id: DbId,
    pub vessel_name: Option<String>,
    pub line_id: DbId,
    pub sailing_date: NaiveDate,
}
