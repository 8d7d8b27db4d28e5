//! Sync engine configuration.

use std::time::Duration;

use cruisesync_core::env::{flag, var_opt, var_or};
use cruisesync_core::error::CoreError;
use cruisesync_core::line_mapping::LineIdMapping;
use cruisesync_core::outcome::DEFAULT_ERROR_SAMPLE_LIMIT;

/// Bounds on the lock time-to-live.
pub const MIN_LOCK_TTL: Duration = Duration::from_secs(60);
pub const MAX_LOCK_TTL: Duration = Duration::from_secs(300);
const MIN_RENEW_INTERVAL: Duration = Duration::from_millis(10);

/// How the orchestrator spreads work over transfer sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    /// Up to one vessel group per pooled session at a time.
    Pooled,
    /// One group at a time on a single session.
    SingleItem,
}

impl ExecutionStrategy {
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "pooled" | "bulk" => Ok(Self::Pooled),
            "single" | "single_item" | "legacy" => Ok(Self::SingleItem),
            other => Err(CoreError::Validation(format!(
                "Unknown execution strategy '{other}'"
            ))),
        }
    }

    /// Number of vessel groups fetched concurrently.
    pub fn chunk_width(self, pool_sessions: usize) -> usize {
        match self {
            Self::Pooled => pool_sessions.max(1),
            Self::SingleItem => 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Max sailings per pass.
    pub mega_batch_cap: i64,
    /// Clamped to `MIN_LOCK_TTL..=MAX_LOCK_TTL`.
    pub lock_ttl: Duration,
    /// How often a running pass extends its lock. At most half the TTL.
    pub lock_renew_interval: Duration,
    pub fetch_timeout: Duration,
    pub item_delay: Duration,
    pub chunk_delay: Duration,
    pub error_sample_limit: usize,
    pub strategy: ExecutionStrategy,
    /// Remote directory prefix tried before the bare layout.
    pub namespace: String,
    /// Initial value of the operator pause flag.
    pub start_paused: bool,
    pub line_mapping: LineIdMapping,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            mega_batch_cap: 500,
            lock_ttl: Duration::from_secs(180),
            lock_renew_interval: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(30),
            item_delay: Duration::from_millis(50),
            chunk_delay: Duration::from_millis(1000),
            error_sample_limit: DEFAULT_ERROR_SAMPLE_LIMIT,
            strategy: ExecutionStrategy::Pooled,
            namespace: "isell_json".into(),
            start_paused: false,
            line_mapping: LineIdMapping::default(),
        }
    }
}

impl SyncConfig {
    /// | Env Var                   | Default      |
    /// |---------------------------|--------------|
    /// | `SYNC_MEGA_BATCH_CAP`     | `500`        |
    /// | `SYNC_LOCK_TTL_SECS`      | `180`        |
    /// | `SYNC_LOCK_RENEW_SECS`    | `60`         |
    /// | `SYNC_FETCH_TIMEOUT_SECS` | `30`         |
    /// | `SYNC_ITEM_DELAY_MS`      | `50`         |
    /// | `SYNC_CHUNK_DELAY_MS`     | `1000`       |
    /// | `SYNC_ERROR_SAMPLE`       | `20`         |
    /// | `SYNC_STRATEGY`           | `pooled`     |
    /// | `SYNC_PAUSED`             | `false`      |
    /// | `FTP_NAMESPACE`           | `isell_json` |
    /// | `LINE_ID_MAP`             | (identity)   |
    pub fn from_env() -> Self {
        let strategy = ExecutionStrategy::from_name(
            &std::env::var("SYNC_STRATEGY").unwrap_or_else(|_| "pooled".into()),
        )
        .expect("SYNC_STRATEGY must be 'pooled' or 'single'");

        let line_mapping = var_opt("LINE_ID_MAP")
            .map(|raw| LineIdMapping::parse(&raw).expect("LINE_ID_MAP must be 'ext:int' pairs"))
            .unwrap_or_default();

        Self {
            mega_batch_cap: var_or::<i64>("SYNC_MEGA_BATCH_CAP", "500").max(1),
            lock_ttl: Duration::from_secs(var_or("SYNC_LOCK_TTL_SECS", "180")),
            lock_renew_interval: Duration::from_secs(var_or("SYNC_LOCK_RENEW_SECS", "60")),
            fetch_timeout: Duration::from_secs(var_or("SYNC_FETCH_TIMEOUT_SECS", "30")),
            item_delay: Duration::from_millis(var_or("SYNC_ITEM_DELAY_MS", "50")),
            chunk_delay: Duration::from_millis(var_or("SYNC_CHUNK_DELAY_MS", "1000")),
            error_sample_limit: var_or("SYNC_ERROR_SAMPLE", "20"),
            strategy,
            namespace: std::env::var("FTP_NAMESPACE").unwrap_or_else(|_| "isell_json".into()),
            start_paused: flag("SYNC_PAUSED"),
            line_mapping,
        }
        .clamped()
    }

    pub fn clamped(mut self) -> Self {
        self.lock_ttl = self.lock_ttl.clamp(MIN_LOCK_TTL, MAX_LOCK_TTL);
        self.lock_renew_interval = self
            .lock_renew_interval
            .clamp(MIN_RENEW_INTERVAL, self.lock_ttl / 2);
        self
    }
}
