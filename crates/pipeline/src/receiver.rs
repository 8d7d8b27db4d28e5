//! Inbound notification handling.
//!
//! The caller (the webhook route) gets a [`Receipt`] as soon as the audit
//! rows are written. Passes run on their own tasks and never block or fail
//! the caller.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cruisesync_core::notification::{self, LineIdSource, NotificationTarget};
use cruisesync_core::pass_state::{PassPhase, PassStatus};
use cruisesync_core::types::{DbId, Timestamp};
use cruisesync_db::models::sync_pass::NewSyncPass;
use cruisesync_db::repositories::SyncPassRepo;
use futures::future::join_all;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::engine::{PassReport, PassRequest, SyncEngine};

/// Upper bound on the audit writes done on the caller's path, however many
/// lines a notification names.
const AUDIT_TIMEOUT: Duration = Duration::from_millis(500);

/// What the receiver did with one notification.
#[derive(Debug)]
pub struct Receipt {
    pub correlation_id: Uuid,
    pub pass_ids: Vec<Uuid>,
    pub external_line_ids: Vec<DbId>,
    pub status: PassStatus,
    pub message: String,
    pub received_at: Timestamp,
    /// Join handles of the spawned passes; dropping them detaches the passes.
    pub handles: Vec<JoinHandle<PassReport>>,
}

impl Receipt {
    /// Wait for every spawned pass. Used by tests and the CLI trigger.
    pub async fn join(self) -> Vec<PassReport> {
        let mut reports = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => tracing::error!(error = %e, "Sync pass task did not complete"),
            }
        }
        reports
    }
}

#[derive(Clone)]
pub struct NotificationReceiver {
    engine: Arc<SyncEngine>,
}

impl NotificationReceiver {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    /// Accept a notification payload of any shape.
    pub async fn accept(&self, payload: Value) -> Receipt {
        let correlation_id = Uuid::now_v7();
        let received_at = Utc::now();
        let target = notification::normalize(&payload);

        if !target.rejected_paths.is_empty() {
            tracing::debug!(
                %correlation_id,
                rejected = target.rejected_paths.len(),
                "Ignoring unparseable paths in notification"
            );
        }
        if !target.overridden_path_ids.is_empty() {
            tracing::debug!(
                %correlation_id,
                overridden = ?target.overridden_path_ids,
                "Explicit line id overrides ids derived from paths"
            );
        }

        if target.source == LineIdSource::None {
            return self.ignore(correlation_id, received_at, &target, payload).await;
        }

        if self.engine.is_paused() {
            return self.park(correlation_id, received_at, &target, payload).await;
        }

        let passes = new_passes(&target.external_line_ids);
        let audited = self
            .audit(correlation_id, &passes, PassStatus::Received, &target, &payload)
            .await;

        let mut pass_ids = Vec::with_capacity(passes.len());
        let mut handles = Vec::with_capacity(passes.len());
        let scheduled = passes.iter().zip(&target.external_line_ids).zip(audited);
        for ((&(pass_id, _), &external_line_id), audited) in scheduled {
            tracing::info!(
                %correlation_id,
                %pass_id,
                external_line_id,
                event = ?target.event,
                "Sync pass scheduled"
            );
            handles.push(self.engine.spawn_pass(PassRequest {
                pass_id,
                correlation_id,
                external_line_id,
                event: target.event.clone(),
                payload: payload.clone(),
                audited,
            }));
            pass_ids.push(pass_id);
        }

        Receipt {
            correlation_id,
            message: format!(
                "Pricing sync scheduled for {} line(s)",
                target.external_line_ids.len()
            ),
            external_line_ids: target.external_line_ids,
            pass_ids,
            status: PassStatus::Received,
            received_at,
            handles,
        }
    }

    // ---- private helpers ----

    async fn ignore(
        &self,
        correlation_id: Uuid,
        received_at: Timestamp,
        target: &NotificationTarget,
        payload: Value,
    ) -> Receipt {
        tracing::warn!(%correlation_id, "Notification carries no usable line id");
        let pass_id = Uuid::now_v7();
        self.audit(correlation_id, &[(pass_id, None)], PassStatus::Ignored, target, &payload)
            .await;
        Receipt {
            correlation_id,
            pass_ids: vec![pass_id],
            external_line_ids: Vec::new(),
            status: PassStatus::Ignored,
            message: "No line id found in notification; nothing to sync".to_string(),
            received_at,
            handles: Vec::new(),
        }
    }

    async fn park(
        &self,
        correlation_id: Uuid,
        received_at: Timestamp,
        target: &NotificationTarget,
        payload: Value,
    ) -> Receipt {
        tracing::warn!(
            %correlation_id,
            lines = ?target.external_line_ids,
            "Pricing sync is paused, notification recorded only"
        );
        let passes = new_passes(&target.external_line_ids);
        self.audit(correlation_id, &passes, PassStatus::Paused, target, &payload)
            .await;
        Receipt {
            correlation_id,
            pass_ids: passes.iter().map(|(pass_id, _)| *pass_id).collect(),
            external_line_ids: target.external_line_ids.clone(),
            status: PassStatus::Paused,
            message: "Pricing sync is paused; notification recorded".to_string(),
            received_at,
            handles: Vec::new(),
        }
    }

    /// Write one audit row per pass, concurrently and under a single
    /// [`AUDIT_TIMEOUT`] deadline. Returns, per pass, whether its row is
    /// known to have been written.
    async fn audit(
        &self,
        correlation_id: Uuid,
        passes: &[(Uuid, Option<DbId>)],
        status: PassStatus,
        target: &NotificationTarget,
        payload: &Value,
    ) -> Vec<bool> {
        let deadline = Instant::now() + AUDIT_TIMEOUT;
        let writes = passes.iter().map(|&(pass_id, external_line_id)| {
            let input = NewSyncPass {
                pass_id,
                correlation_id,
                external_line_id,
                status: status.as_str().to_string(),
                phase: PassPhase::Received.as_str().to_string(),
                event: target.event.clone(),
                payload: payload.clone(),
            };
            async move {
                let write = SyncPassRepo::record_received(self.engine.pool(), &input);
                match tokio::time::timeout_at(deadline, write).await {
                    Ok(Ok(())) => true,
                    Ok(Err(e)) => {
                        tracing::warn!(%pass_id, error = %e, "Failed to record pass audit row");
                        false
                    }
                    Err(_) => {
                        tracing::warn!(%pass_id, "Pass audit write timed out");
                        false
                    }
                }
            }
        });
        join_all(writes).await
    }
}

/// Fresh pass ids, one per line.
fn new_passes(external_line_ids: &[DbId]) -> Vec<(Uuid, Option<DbId>)> {
    external_line_ids
        .iter()
        .map(|&line| (Uuid::now_v7(), Some(line)))
        .collect()
}
