use axum::routing::{get, post};
use axum::Router;

use crate::handlers::sync;
use crate::state::AppState;

/// Routes mounted at `/admin/sync`.
///
/// ```text
/// POST /pause  -> pause
/// POST /resume -> resume
/// GET  /status -> status
/// ```
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/pause", post(sync::pause))
        .route("/resume", post(sync::resume))
        .route("/status", get(sync::status))
}

/// Routes mounted at `/sync`.
///
/// ```text
/// GET /passes            -> list_passes
/// GET /passes/{pass_id}  -> get_pass
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/passes", get(sync::list_passes))
        .route("/passes/{pass_id}", get(sync::get_pass))
}
