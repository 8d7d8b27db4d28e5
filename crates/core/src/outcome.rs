//! Per-item failure classification and per-pass aggregation.

use serde::Serialize;

use crate::types::DbId;

/// Default cap on the number of error samples kept per pass.
pub const DEFAULT_ERROR_SAMPLE_LIMIT: usize = 20;

/// Why a single sailing could not be synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No candidate directory existed for the sailing's vessel.
    PathNotFound,
    /// The vessel directory exists but the document was never produced.
    FileNotFound,
    /// The payload failed the structural sanity check.
    Corrupted,
    /// The payload is well-formed but does not deserialize.
    ParseError,
    /// The download exceeded its hard timeout.
    Timeout,
    /// Session or connectivity failure talking to the remote endpoint.
    Connection,
    /// The circuit breaker rejected the call without attempting it.
    CircuitOpen,
    /// Persisting the parsed pricing failed.
    WriteFailed,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PathNotFound => "path_not_found",
            Self::FileNotFound => "file_not_found",
            Self::Corrupted => "corrupted",
            Self::ParseError => "parse_error",
            Self::Timeout => "timeout",
            Self::Connection => "connection",
            Self::CircuitOpen => "circuit_open",
            Self::WriteFailed => "write_failed",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded item failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub sailing_id: DbId,
    pub cruise_code: String,
    pub kind: FailureKind,
    pub message: String,
}

/// Aggregate outcome of one pass.
///
/// Missing files and corrupted payloads get their own counters; every
/// other failure kind counts as `failed`. `attempted` is always the sum
/// of the four outcome counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub attempted: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub skipped_missing: u32,
    pub corrupted: u32,
    /// Bounded sample of failures, oldest first.
    pub errors: Vec<ItemFailure>,
    #[serde(skip)]
    error_limit: usize,
}

impl Default for BatchResult {
    fn default() -> Self {
        Self::with_error_limit(DEFAULT_ERROR_SAMPLE_LIMIT)
    }
}

impl BatchResult {
    pub fn with_error_limit(error_limit: usize) -> Self {
        Self {
            attempted: 0,
            succeeded: 0,
            failed: 0,
            skipped_missing: 0,
            corrupted: 0,
            errors: Vec::new(),
            error_limit,
        }
    }

    pub fn record_success(&mut self) {
        self.attempted += 1;
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, failure: ItemFailure) {
        self.attempted += 1;
        match failure.kind {
            FailureKind::FileNotFound => self.skipped_missing += 1,
            FailureKind::Corrupted => self.corrupted += 1,
            _ => self.failed += 1,
        }
        if self.errors.len() < self.error_limit {
            self.errors.push(failure);
        }
    }

    /// Fold another partial result into this one, respecting the sample cap.
    pub fn merge(&mut self, other: BatchResult) {
        self.attempted += other.attempted;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.skipped_missing += other.skipped_missing;
        self.corrupted += other.corrupted;
        let room = self.error_limit.saturating_sub(self.errors.len());
        self.errors.extend(other.errors.into_iter().take(room));
    }

    /// Items that did not succeed, regardless of classification.
    pub fn unsuccessful(&self) -> u32 {
        self.attempted - self.succeeded
    }

    /// `succeeded / attempted`, or `None` when nothing was attempted.
    pub fn success_rate(&self) -> Option<f64> {
        (self.attempted > 0).then(|| f64::from(self.succeeded) / f64::from(self.attempted))
    }
}
