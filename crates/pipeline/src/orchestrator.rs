//! Batch orchestration over the transfer pool.
//!
//! Sailings are grouped by remote directory (vessel and sailing month) so
//! one session serves a whole group sequentially without changing
//! directory. A vessel's groups are then fetched one after another by a
//! single task, so no two sessions ever work the same vessel at once.
//! Vessels are processed in chunks as wide as the execution strategy
//! allows, with a short pause between items and a longer one
//! between chunks. Every item failure is classified and recorded; nothing
//! below [`BatchOrchestrator::transfer`] or [`BatchOrchestrator::write`]
//! escapes as an error.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use cruisesync_core::outcome::{BatchResult, FailureKind, ItemFailure};
use cruisesync_core::pricing::PricingDocument;
use cruisesync_core::remote_path::{candidate_directories, document_file_name};
use cruisesync_core::types::DbId;
use cruisesync_db::models::sailing::SailingTarget;
use cruisesync_transfer::{FetchError, FileFetcher, PooledSession, RemoteDirectory, TransferPool};
use futures::future::join_all;

use crate::config::{ExecutionStrategy, SyncConfig};
use crate::writer::DocumentWriter;

/// Write-phase progress is reported every this many items.
const WRITE_PROGRESS_EVERY: usize = 50;

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Running counters mirrored to the lock record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub processed: u32,
    pub succeeded: u32,
    pub failed: u32,
}

/// Receives progress updates during a pass.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, progress: Progress);
}

/// Discards progress.
pub struct NoProgress;

#[async_trait]
impl ProgressSink for NoProgress {
    async fn report(&self, _progress: Progress) {}
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// A document fetched and parsed during the transfer phase.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub target: SailingTarget,
    pub document: PricingDocument,
}

/// Result of the transfer phase.
#[derive(Debug)]
pub struct TransferOutcome {
    pub documents: Vec<FetchedDocument>,
    /// Failures only; successes are counted when written.
    pub result: BatchResult,
}

/// Sailings sharing one remote directory.
#[derive(Debug)]
struct DirectoryGroup {
    vessel_id: DbId,
    sailing_month: NaiveDate,
    items: Vec<SailingTarget>,
}

/// One vessel's directory groups, in month order of first appearance.
#[derive(Debug)]
struct VesselBatch {
    vessel_id: DbId,
    groups: Vec<DirectoryGroup>,
}

pub struct BatchOrchestrator {
    pool: Arc<TransferPool>,
    fetcher: FileFetcher,
    namespace: String,
    strategy: ExecutionStrategy,
    item_delay: Duration,
    chunk_delay: Duration,
    error_sample_limit: usize,
}

impl BatchOrchestrator {
    pub fn new(pool: Arc<TransferPool>, config: &SyncConfig) -> Self {
        Self {
            pool,
            fetcher: FileFetcher::new(config.fetch_timeout),
            namespace: config.namespace.clone(),
            strategy: config.strategy,
            item_delay: config.item_delay,
            chunk_delay: config.chunk_delay,
            error_sample_limit: config.error_sample_limit,
        }
    }

    pub fn transfer_pool(&self) -> &Arc<TransferPool> {
        &self.pool
    }

    /// Empty result honouring the configured error sample size.
    pub fn new_result(&self) -> BatchResult {
        BatchResult::with_error_limit(self.error_sample_limit)
    }

    /// Fetch and parse every target's document.
    pub async fn transfer(
        &self,
        external_line_id: DbId,
        targets: Vec<SailingTarget>,
        today: NaiveDate,
        progress: &dyn ProgressSink,
    ) -> TransferOutcome {
        let total = targets.len();
        let vessels = group_by_vessel(targets);
        let width = self.strategy.chunk_width(self.pool.max_sessions());

        tracing::debug!(
            external_line_id,
            sailings = total,
            vessels = vessels.len(),
            width,
            "Transfer phase started"
        );

        let mut documents = Vec::with_capacity(total);
        let mut result = self.new_result();
        let mut chunks = vessels.chunks(width).peekable();

        while let Some(chunk) = chunks.next() {
            let fetches = chunk
                .iter()
                .map(|vessel| self.fetch_vessel(external_line_id, vessel, today));
            for (docs, partial) in join_all(fetches).await {
                documents.extend(docs);
                result.merge(partial);
            }

            progress
                .report(Progress {
                    processed: documents.len() as u32 + result.attempted,
                    succeeded: documents.len() as u32,
                    failed: result.unsuccessful(),
                })
                .await;

            if chunks.peek().is_some() && !self.chunk_delay.is_zero() {
                tokio::time::sleep(self.chunk_delay).await;
            }
        }

        TransferOutcome { documents, result }
    }

    /// Write every fetched document, isolating failures per sailing.
    pub async fn write(
        &self,
        writer: &dyn DocumentWriter,
        documents: Vec<FetchedDocument>,
        result: &mut BatchResult,
        progress: &dyn ProgressSink,
    ) {
        let total = documents.len();

        for (i, fetched) in documents.into_iter().enumerate() {
            let target = &fetched.target;
            match writer.write(target, &fetched.document).await {
                Ok(_) => result.record_success(),
                Err(e) => {
                    tracing::warn!(
                        sailing_id = target.id,
                        cruise_code = %target.cruise_code,
                        error = %e,
                        "Pricing write failed"
                    );
                    result.record_failure(ItemFailure {
                        sailing_id: target.id,
                        cruise_code: target.cruise_code.clone(),
                        kind: FailureKind::WriteFailed,
                        message: e.to_string(),
                    });
                }
            }

            let done = i + 1;
            if done % WRITE_PROGRESS_EVERY == 0 || done == total {
                progress
                    .report(Progress {
                        processed: result.attempted,
                        succeeded: result.succeeded,
                        failed: result.unsuccessful(),
                    })
                    .await;
            }
        }
    }

    // ---- private helpers ----

    /// Fetch a vessel's directory groups strictly in sequence.
    async fn fetch_vessel(
        &self,
        external_line_id: DbId,
        vessel: &VesselBatch,
        today: NaiveDate,
    ) -> (Vec<FetchedDocument>, BatchResult) {
        let mut docs = Vec::new();
        let mut result = self.new_result();
        for (i, group) in vessel.groups.iter().enumerate() {
            if i > 0 && !self.item_delay.is_zero() {
                tokio::time::sleep(self.item_delay).await;
            }
            let (group_docs, partial) = self.fetch_group(external_line_id, group, today).await;
            docs.extend(group_docs);
            result.merge(partial);
        }
        tracing::trace!(
            vessel_id = vessel.vessel_id,
            months = vessel.groups.len(),
            fetched = docs.len(),
            "Vessel fetched"
        );
        (docs, result)
    }

    /// Fetch one directory group sequentially on one session.
    ///
    /// A connectivity failure discards the session; the next item acquires
    /// a fresh one. Once the breaker opens, acquisition fails fast and the
    /// remaining items are recorded as `circuit_open`.
    async fn fetch_group(
        &self,
        external_line_id: DbId,
        group: &DirectoryGroup,
        today: NaiveDate,
    ) -> (Vec<FetchedDocument>, BatchResult) {
        let mut docs = Vec::with_capacity(group.items.len());
        let mut result = self.new_result();
        let candidates = candidate_directories(
            &self.namespace,
            external_line_id,
            &group.vessel_id.to_string(),
            group.sailing_month,
            today,
        );

        let mut session: Option<PooledSession> = None;
        let mut directory: Option<RemoteDirectory> = None;
        // Set once the session's working directory is the resolved one.
        let mut in_directory = false;

        for (i, target) in group.items.iter().enumerate() {
            if i > 0 && !self.item_delay.is_zero() {
                tokio::time::sleep(self.item_delay).await;
            }

            if session.is_none() {
                match self.pool.acquire().await {
                    Ok(s) => {
                        session = Some(s);
                        in_directory = false;
                    }
                    Err(e) => {
                        record_fetch_failure(&mut result, target, FetchError::from(e));
                        continue;
                    }
                }
            }
            let Some(s) = session.as_mut() else {
                continue;
            };

            let located = if let Some(dir) = &directory {
                if in_directory {
                    Ok(())
                } else {
                    s.cwd(&dir.path).await.map_err(FetchError::from)
                }
            } else {
                match self.fetcher.resolve_directory(s, &candidates).await {
                    Ok(dir) => {
                        tracing::trace!(
                            vessel_id = group.vessel_id,
                            path = %dir.path,
                            files = dir.len(),
                            "Resolved vessel directory"
                        );
                        directory = Some(dir);
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            };

            match located {
                Ok(()) => in_directory = true,
                Err(FetchError::PathNotFound { tried }) => {
                    tracing::warn!(
                        external_line_id,
                        vessel_id = group.vessel_id,
                        tried,
                        "No remote directory for vessel group"
                    );
                    for rest in &group.items[i..] {
                        record_fetch_failure(
                            &mut result,
                            rest,
                            FetchError::PathNotFound { tried },
                        );
                    }
                    break;
                }
                Err(e) => {
                    record_fetch_failure(&mut result, target, e);
                    self.drop_if_broken(&mut session);
                    continue;
                }
            }

            let Some(dir) = directory.as_ref() else {
                continue;
            };
            let file = document_file_name(&target.cruise_code);
            match self.fetcher.fetch_document(s, dir, &file).await {
                Ok(document) => docs.push(FetchedDocument {
                    target: target.clone(),
                    document,
                }),
                Err(e) => {
                    record_fetch_failure(&mut result, target, e);
                    self.drop_if_broken(&mut session);
                }
            }
        }

        if let Some(s) = session.take() {
            self.pool.release(s);
        }
        (docs, result)
    }

    fn drop_if_broken(&self, session: &mut Option<PooledSession>) {
        if session.as_ref().is_some_and(PooledSession::is_broken) {
            if let Some(s) = session.take() {
                self.pool.discard(s);
            }
        }
    }
}

fn record_fetch_failure(result: &mut BatchResult, target: &SailingTarget, error: FetchError) {
    let kind = error.kind();
    if !matches!(kind, FailureKind::Corrupted | FailureKind::FileNotFound) {
        tracing::warn!(
            sailing_id = target.id,
            cruise_code = %target.cruise_code,
            kind = %kind,
            error = %error,
            "Pricing fetch failed"
        );
    }
    result.record_failure(ItemFailure {
        sailing_id: target.id,
        cruise_code: target.cruise_code.clone(),
        kind,
        message: error.to_string(),
    });
}

/// Group targets by (vessel, sailing month), keeping the input order of
/// both groups (by first appearance) and items.
fn group_by_directory(targets: Vec<SailingTarget>) -> Vec<DirectoryGroup> {
    let mut index: HashMap<(DbId, i32, u32), usize> = HashMap::new();
    let mut groups: Vec<DirectoryGroup> = Vec::new();
    for target in targets {
        let date = target.sailing_date;
        let key = (target.vessel_id, date.year(), date.month());
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(DirectoryGroup {
                vessel_id: target.vessel_id,
                sailing_month: date.with_day(1).unwrap_or(date),
                items: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].items.push(target);
    }
    groups
}

/// Collect directory groups per vessel, keeping first-appearance order.
fn group_by_vessel(targets: Vec<SailingTarget>) -> Vec<VesselBatch> {
    let mut index: HashMap<DbId, usize> = HashMap::new();
    let mut vessels: Vec<VesselBatch> = Vec::new();
    for group in group_by_directory(targets) {
        let slot = *index.entry(group.vessel_id).or_insert_with(|| {
            vessels.push(VesselBatch {
                vessel_id: group.vessel_id,
                groups: Vec::new(),
            });
            vessels.len() - 1
        });
        vessels[slot].groups.push(group);
    }
    vessels
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
