//! Provider change-notification endpoint.
//!
//! The provider retries on anything but a fast 200, so this handler never
//! fails: malformed bodies are acknowledged and recorded as ignored.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use cruisesync_core::pass_state::PassStatus;
use cruisesync_core::types::Timestamp;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub success: bool,
    pub message: String,
    pub status: PassStatus,
    pub correlation_id: Uuid,
    pub pass_ids: Vec<Uuid>,
    pub received_at: Timestamp,
}

/// POST /api/v1/webhooks/traveltek (and /pricing)
pub async fn receive_notification(State(state): State<AppState>, body: Bytes) -> Json<WebhookAck> {
    let payload = match serde_json::from_slice::<Value>(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, bytes = body.len(), "Notification body is not valid JSON");
            Value::Null
        }
    };

    let receipt = state.receiver.accept(payload).await;

    Json(WebhookAck {
        success: true,
        message: receipt.message,
        status: receipt.status,
        correlation_id: receipt.correlation_id,
        pass_ids: receipt.pass_ids,
        received_at: receipt.received_at,
    })
}
