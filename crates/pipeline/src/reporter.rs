//! Pass outcome reporting: audit record, structured log, and bus event.
//!
//! Reporting never fails a pass. Audit write errors are logged and
//! swallowed; delivery of the published event is the forwarder's concern.

use std::sync::Arc;
use std::time::Duration;

use cruisesync_core::outcome::BatchResult;
use cruisesync_core::pass_state::{PassPhase, PassStatus};
use cruisesync_core::types::DbId;
use cruisesync_db::models::sync_pass::PassCounters;
use cruisesync_db::repositories::SyncPassRepo;
use cruisesync_events::bus::{EVENT_PASS_ABORTED, EVENT_PASS_COMPLETED, EVENT_PASS_FAILED};
use cruisesync_events::{EventBus, PlatformEvent};
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct ResultReporter {
    pool: PgPool,
    bus: Arc<EventBus>,
}

impl ResultReporter {
    pub fn new(pool: PgPool, bus: Arc<EventBus>) -> Self {
        Self { pool, bus }
    }

    /// The pass reached a live phase.
    pub async fn phase(&self, pass_id: Uuid, line_id: DbId, phase: PassPhase) {
        let result = if phase == PassPhase::LockAcquired {
            SyncPassRepo::mark_processing(&self.pool, pass_id, line_id, phase.as_str()).await
        } else {
            SyncPassRepo::mark_phase(&self.pool, pass_id, phase.as_str()).await
        };
        if let Err(e) = result {
            tracing::warn!(%pass_id, phase = %phase, error = %e, "Failed to update pass audit record");
        }
    }

    /// The lock was held; nothing was done.
    pub async fn aborted(&self, pass_id: Uuid, external_line_id: DbId, line_id: DbId) {
        tracing::info!(%pass_id, line_id, "Sync pass skipped, line lock is held");
        self.finish(
            pass_id,
            PassPhase::AbortedNoLock,
            &counters(&BatchResult::default()),
            Some("line lock held by another pass"),
        )
        .await;
        self.bus.publish(
            PlatformEvent::new(EVENT_PASS_ABORTED)
                .with_pass(pass_id)
                .with_line(line_id)
                .with_payload(json!({ "external_line_id": external_line_id })),
        );
    }

    /// The pass ran to the end; items may still have failed individually.
    pub async fn completed(
        &self,
        pass_id: Uuid,
        external_line_id: DbId,
        line_id: DbId,
        result: &BatchResult,
        elapsed: Duration,
    ) {
        tracing::info!(
            %pass_id,
            line_id,
            external_line_id,
            attempted = result.attempted,
            succeeded = result.succeeded,
            failed = result.failed,
            skipped_missing = result.skipped_missing,
            corrupted = result.corrupted,
            success_rate = ?result.success_rate(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Sync pass completed"
        );
        self.finish(pass_id, PassPhase::Completed, &counters(result), None)
            .await;
        self.bus.publish(
            PlatformEvent::new(EVENT_PASS_COMPLETED)
                .with_pass(pass_id)
                .with_line(line_id)
                .with_payload(summary_payload(external_line_id, result, elapsed, None)),
        );
    }

    /// The pass failed as a whole. `partial` holds whatever was counted
    /// before the failure.
    pub async fn failed(
        &self,
        pass_id: Uuid,
        external_line_id: DbId,
        line_id: DbId,
        error: &str,
        partial: Option<&BatchResult>,
        elapsed: Duration,
    ) {
        tracing::error!(%pass_id, line_id, external_line_id, error, "Sync pass failed");
        let empty = BatchResult::default();
        let result = partial.unwrap_or(&empty);
        self.finish(pass_id, PassPhase::Failed, &counters(result), Some(error))
            .await;
        self.bus.publish(
            PlatformEvent::new(EVENT_PASS_FAILED)
                .with_pass(pass_id)
                .with_line(line_id)
                .with_payload(summary_payload(external_line_id, result, elapsed, Some(error))),
        );
    }

    async fn finish(
        &self,
        pass_id: Uuid,
        phase: PassPhase,
        counters: &PassCounters,
        error: Option<&str>,
    ) {
        let status: PassStatus = phase.status();
        if let Err(e) = SyncPassRepo::finish(
            &self.pool,
            pass_id,
            status.as_str(),
            phase.as_str(),
            counters,
            error,
        )
        .await
        {
            tracing::error!(%pass_id, status = %status, error = %e, "Failed to finalize pass audit record");
        }
    }
}

fn to_i32(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

/// Audit counters for a result.
pub fn counters(result: &BatchResult) -> PassCounters {
    PassCounters {
        attempted: to_i32(result.attempted),
        succeeded: to_i32(result.succeeded),
        failed: to_i32(result.failed),
        skipped_missing: to_i32(result.skipped_missing),
        corrupted: to_i32(result.corrupted),
        success_rate: result.success_rate(),
        error_sample: serde_json::to_value(&result.errors).unwrap_or_else(|_| json!([])),
    }
}

/// Event payload summarizing a pass.
pub fn summary_payload(
    external_line_id: DbId,
    result: &BatchResult,
    elapsed: Duration,
    error: Option<&str>,
) -> Value {
    json!({
        "external_line_id": external_line_id,
        "attempted": result.attempted,
        "succeeded": result.succeeded,
        "failed": result.failed,
        "skipped_missing": result.skipped_missing,
        "corrupted": result.corrupted,
        "success_rate": result.success_rate(),
        "errors": result.errors,
        "error": error,
        "elapsed_ms": elapsed.as_millis() as u64,
    })
}
