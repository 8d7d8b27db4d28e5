use axum::routing::post;
use axum::Router;

use crate::handlers::webhooks;
use crate::state::AppState;

/// Routes mounted at `/webhooks`.
///
/// ```text
/// POST /traveltek -> receive_notification
/// POST /pricing   -> receive_notification
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/traveltek", post(webhooks::receive_notification))
        .route("/pricing", post(webhooks::receive_notification))
}
