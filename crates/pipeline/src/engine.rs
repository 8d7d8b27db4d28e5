//! The pass state machine.
//!
//! ```text
//! received → lock_acquired → resolving_inventory → transferring → writing → completed
//!     └────→ aborted_no_lock              (any live phase) ──→ failed
//! ```
//!
//! Pass-level errors, including panics, are caught once in
//! [`SyncEngine::run_pass`]. The lock is renewed while the pass runs; if
//! it is lost anyway the pass stops at once and fails. The lock is
//! released before the terminal state is reported.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use cruisesync_core::line_mapping::LineIdMapping;
use cruisesync_core::outcome::BatchResult;
use cruisesync_core::pass_state::{PassPhase, PassStatus};
use cruisesync_core::types::DbId;
use cruisesync_db::models::sync_pass::NewSyncPass;
use cruisesync_db::repositories::SyncPassRepo;
use cruisesync_events::EventBus;
use cruisesync_transfer::TransferPool;
use futures::FutureExt;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::lock::{LineLockManager, LockError, LockToken};
use crate::orchestrator::BatchOrchestrator;
use crate::reporter::ResultReporter;
use crate::resolver::InventoryResolver;
use crate::writer::{DocumentWriter, PricingWriter};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PassError {
    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    #[error("inventory query failed: {0}")]
    Inventory(#[source] sqlx::Error),

    #[error("sync lock for line {line_id} was lost mid-pass")]
    LockLost { line_id: DbId },

    #[error("pass panicked: {0}")]
    Panicked(String),
}

/// One scheduled pass.
#[derive(Debug, Clone)]
pub struct PassRequest {
    pub pass_id: Uuid,
    pub correlation_id: Uuid,
    pub external_line_id: DbId,
    pub event: Option<String>,
    pub payload: serde_json::Value,
    /// Whether the receiver managed to write the `received` audit row.
    pub audited: bool,
}

/// Final state of a pass, returned from [`SyncEngine::run_pass`].
#[derive(Debug, Clone)]
pub struct PassReport {
    pub pass_id: Uuid,
    pub external_line_id: DbId,
    pub line_id: DbId,
    pub phase: PassPhase,
    pub result: Option<BatchResult>,
    pub error: Option<String>,
}

/// Tracks the current phase and checks transitions.
struct PassTracker {
    pass_id: Uuid,
    phase: PassPhase,
}

impl PassTracker {
    fn new(pass_id: Uuid) -> Self {
        Self {
            pass_id,
            phase: PassPhase::Received,
        }
    }

    fn advance(&mut self, next: PassPhase) {
        if !self.phase.can_transition_to(next) {
            tracing::error!(
                pass_id = %self.pass_id,
                from = %self.phase,
                to = %next,
                "Illegal pass transition"
            );
            debug_assert!(false, "illegal pass transition {} -> {}", self.phase, next);
        }
        tracing::debug!(pass_id = %self.pass_id, phase = %next, "Pass phase");
        self.phase = next;
    }
}

// ---------------------------------------------------------------------------
// SyncEngine
// ---------------------------------------------------------------------------

pub struct SyncEngine {
    pool: PgPool,
    mapping: Arc<LineIdMapping>,
    locks: LineLockManager,
    resolver: InventoryResolver,
    orchestrator: BatchOrchestrator,
    writer: Arc<dyn DocumentWriter>,
    reporter: ResultReporter,
    paused: AtomicBool,
}

impl SyncEngine {
    pub fn new(
        pool: PgPool,
        transfer: Arc<TransferPool>,
        bus: Arc<EventBus>,
        config: &SyncConfig,
    ) -> Arc<Self> {
        let config = config.clone().clamped();
        let mapping = Arc::new(config.line_mapping.clone());
        Arc::new(Self {
            locks: LineLockManager::new(pool.clone(), config.lock_ttl)
                .with_renew_interval(config.lock_renew_interval),
            resolver: InventoryResolver::new(pool.clone(), Arc::clone(&mapping), config.mega_batch_cap),
            orchestrator: BatchOrchestrator::new(transfer, &config),
            writer: Arc::new(PricingWriter::new(pool.clone())),
            reporter: ResultReporter::new(pool.clone(), bus),
            paused: AtomicBool::new(config.start_paused),
            mapping,
            pool,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn line_mapping(&self) -> &LineIdMapping {
        &self.mapping
    }

    pub fn transfer_pool(&self) -> &Arc<TransferPool> {
        self.orchestrator.transfer_pool()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Block new passes. Running passes are not interrupted.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        tracing::warn!("Pricing sync paused");
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        tracing::info!("Pricing sync resumed");
    }

    /// Run a pass on its own task.
    pub fn spawn_pass(self: &Arc<Self>, request: PassRequest) -> JoinHandle<PassReport> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.run_pass(request).await })
    }

    /// Run one pass to a terminal state.
    pub async fn run_pass(&self, request: PassRequest) -> PassReport {
        let started = Instant::now();
        let pass_id = request.pass_id;
        let external_line_id = request.external_line_id;
        let line_id = self.mapping.to_internal(external_line_id);
        let mut tracker = PassTracker::new(pass_id);

        if !request.audited {
            self.record_late_audit(&request).await;
        }

        let token = match self.locks.acquire(line_id).await {
            Ok(token) => token,
            Err(LockError::Held { .. }) => {
                tracker.advance(PassPhase::AbortedNoLock);
                self.reporter
                    .aborted(pass_id, external_line_id, line_id)
                    .await;
                return PassReport {
                    pass_id,
                    external_line_id,
                    line_id,
                    phase: tracker.phase,
                    result: None,
                    error: None,
                };
            }
            Err(e) => {
                let error = PassError::from(e).to_string();
                tracker.advance(PassPhase::Failed);
                self.reporter
                    .failed(pass_id, external_line_id, line_id, &error, None, started.elapsed())
                    .await;
                return PassReport {
                    pass_id,
                    external_line_id,
                    line_id,
                    phase: tracker.phase,
                    result: None,
                    error: Some(error),
                };
            }
        };

        tracker.advance(PassPhase::LockAcquired);
        self.reporter
            .phase(pass_id, line_id, PassPhase::LockAcquired)
            .await;

        let mut partial: Option<BatchResult> = None;
        let work = AssertUnwindSafe(self.execute(
            external_line_id,
            line_id,
            &token,
            &mut tracker,
            &mut partial,
        ))
        .catch_unwind();
        let outcome = tokio::select! {
            biased;
            outcome = work => outcome,
            () = self.locks.hold(&token) => Ok(Err(PassError::LockLost { line_id })),
        };

        if let Err(e) = self.locks.release(&token).await {
            tracing::error!(%pass_id, line_id, error = %e, "Failed to release sync lock");
        }

        let outcome = outcome.unwrap_or_else(|panic| Err(PassError::Panicked(panic_message(&*panic))));
        match outcome {
            Ok(result) => {
                tracker.advance(PassPhase::Completed);
                self.reporter
                    .completed(pass_id, external_line_id, line_id, &result, started.elapsed())
                    .await;
                PassReport {
                    pass_id,
                    external_line_id,
                    line_id,
                    phase: tracker.phase,
                    result: Some(result),
                    error: None,
                }
            }
            Err(e) => {
                let error = e.to_string();
                tracker.advance(PassPhase::Failed);
                self.reporter
                    .failed(
                        pass_id,
                        external_line_id,
                        line_id,
                        &error,
                        partial.as_ref(),
                        started.elapsed(),
                    )
                    .await;
                PassReport {
                    pass_id,
                    external_line_id,
                    line_id,
                    phase: tracker.phase,
                    result: partial,
                    error: Some(error),
                }
            }
        }
    }

    // ---- private helpers ----

    /// Everything between lock acquisition and release.
    async fn execute(
        &self,
        external_line_id: DbId,
        line_id: DbId,
        token: &LockToken,
        tracker: &mut PassTracker,
        partial: &mut Option<BatchResult>,
    ) -> Result<BatchResult, PassError> {
        let pass_id = tracker.pass_id;

        tracker.advance(PassPhase::ResolvingInventory);
        self.reporter
            .phase(pass_id, line_id, PassPhase::ResolvingInventory)
            .await;
        let inventory = self
            .resolver
            .resolve(line_id)
            .await
            .map_err(PassError::Inventory)?;

        if inventory.targets.is_empty() {
            tracing::info!(%pass_id, line_id, "No sailings to sync for line");
            return Ok(self.orchestrator.new_result());
        }

        tracker.advance(PassPhase::Transferring);
        self.reporter
            .phase(pass_id, line_id, PassPhase::Transferring)
            .await;
        let progress = self.locks.progress_sink(token);
        let today = Utc::now().date_naive();
        let transfer = self
            .orchestrator
            .transfer(external_line_id, inventory.targets, today, &progress)
            .await;
        *partial = Some(transfer.result.clone());

        tracker.advance(PassPhase::Writing);
        self.reporter
            .phase(pass_id, line_id, PassPhase::Writing)
            .await;
        let mut result = transfer.result;
        self.orchestrator
            .write(self.writer.as_ref(), transfer.documents, &mut result, &progress)
            .await;
        Ok(result)
    }

    /// The receiver's bounded audit write did not land; write it now.
    async fn record_late_audit(&self, request: &PassRequest) {
        let input = NewSyncPass {
            pass_id: request.pass_id,
            correlation_id: request.correlation_id,
            external_line_id: Some(request.external_line_id),
            status: PassStatus::Received.as_str().to_string(),
            phase: PassPhase::Received.as_str().to_string(),
            event: request.event.clone(),
            payload: request.payload.clone(),
        };
        if let Err(e) = SyncPassRepo::record_received(&self.pool, &input).await {
            tracing::warn!(pass_id = %request.pass_id, error = %e, "Failed to record pass audit row");
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
