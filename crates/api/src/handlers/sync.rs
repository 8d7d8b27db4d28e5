//! Operator endpoints: pause/resume, status, and pass audit lookup.

use axum::extract::{Path, Query, State};
use axum::Json;
use cruisesync_core::error::CoreError;
use cruisesync_db::models::sync_lock::SyncLock;
use cruisesync_db::models::sync_pass::SyncPass;
use cruisesync_db::repositories::{SyncLockRepo, SyncPassRepo};
use cruisesync_transfer::PoolSnapshot;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct SyncStatus {
    pub paused: bool,
    pub transfer: PoolSnapshot,
    pub live_locks: Vec<SyncLock>,
}

#[derive(Debug, Deserialize)]
pub struct PassListQuery {
    pub correlation_id: Uuid,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/admin/sync/pause
pub async fn pause(State(state): State<AppState>) -> AppResult<Json<DataResponse<SyncStatus>>> {
    state.engine.pause();
    status(State(state)).await
}

/// POST /api/v1/admin/sync/resume
pub async fn resume(State(state): State<AppState>) -> AppResult<Json<DataResponse<SyncStatus>>> {
    state.engine.resume();
    status(State(state)).await
}

/// GET /api/v1/admin/sync/status
pub async fn status(State(state): State<AppState>) -> AppResult<Json<DataResponse<SyncStatus>>> {
    let live_locks = SyncLockRepo::list_live(&state.pool).await?;
    Ok(Json(DataResponse {
        data: SyncStatus {
            paused: state.engine.is_paused(),
            transfer: state.engine.transfer_pool().snapshot(),
            live_locks,
        },
    }))
}

/// GET /api/v1/sync/passes/{pass_id}
pub async fn get_pass(
    State(state): State<AppState>,
    Path(pass_id): Path<Uuid>,
) -> AppResult<Json<DataResponse<SyncPass>>> {
    let pass = SyncPassRepo::find(&state.pool, pass_id)
        .await?
        .ok_or_else(|| CoreError::NotFound {
            entity: "SyncPass",
            id: pass_id.to_string(),
        })?;
    Ok(Json(DataResponse { data: pass }))
}

/// GET /api/v1/sync/passes?correlation_id=
pub async fn list_passes(
    State(state): State<AppState>,
    Query(query): Query<PassListQuery>,
) -> AppResult<Json<DataResponse<Vec<SyncPass>>>> {
    let passes = SyncPassRepo::list_by_correlation(&state.pool, query.correlation_id).await?;
    Ok(Json(DataResponse { data: passes }))
}
