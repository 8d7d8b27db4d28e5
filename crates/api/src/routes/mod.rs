pub mod health;
pub mod sync;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /webhooks/traveltek                  provider notification (POST)
/// /webhooks/pricing                    alias of the above (POST)
///
/// /admin/sync/pause                    block new passes (POST)
/// /admin/sync/resume                   allow new passes (POST)
/// /admin/sync/status                   pause flag, pool, live locks (GET)
///
/// /sync/passes?correlation_id=         passes of one notification (GET)
/// /sync/passes/{pass_id}               one pass audit record (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/webhooks", webhooks::router())
        .nest("/admin/sync", sync::admin_router())
        .nest("/sync", sync::router())
}
