//! Inventory resolution: which sailings a pass covers.

use std::sync::Arc;

use cruisesync_core::line_mapping::LineIdMapping;
use cruisesync_core::types::DbId;
use cruisesync_db::models::sailing::SailingTarget;
use cruisesync_db::repositories::SailingRepo;
use sqlx::PgPool;

/// The candidate set for one pass.
#[derive(Debug, Clone)]
pub struct ResolvedInventory {
    pub external_line_id: DbId,
    pub line_id: DbId,
    /// At most the mega-batch cap, nearest departure first.
    pub targets: Vec<SailingTarget>,
    /// Candidates beyond the cap, left for later passes.
    pub deferred: i64,
}

#[derive(Clone)]
pub struct InventoryResolver {
    pool: PgPool,
    mapping: Arc<LineIdMapping>,
    cap: i64,
}

impl InventoryResolver {
    pub fn new(pool: PgPool, mapping: Arc<LineIdMapping>, cap: i64) -> Self {
        Self { pool, mapping, cap }
    }

    /// Resolve candidates for an internal line id.
    pub async fn resolve(&self, line_id: DbId) -> Result<ResolvedInventory, sqlx::Error> {
        let targets = SailingRepo::list_sync_candidates(&self.pool, line_id, self.cap).await?;

        let mut deferred = 0;
        if targets.len() as i64 >= self.cap {
            let total = SailingRepo::count_sync_candidates(&self.pool, line_id).await?;
            deferred = (total - targets.len() as i64).max(0);
            if deferred > 0 {
                tracing::info!(
                    line_id,
                    cap = self.cap,
                    deferred,
                    "Line exceeds mega-batch cap, deferring later sailings"
                );
            }
        }

        Ok(ResolvedInventory {
            external_line_id: self.mapping.to_external(line_id),
            line_id,
            targets,
            deferred,
        })
    }
}
