//! Per-sailing pricing persistence.

use async_trait::async_trait;
use cruisesync_core::pricing::{price_lines, PricingDocument, PricingSummary};
use cruisesync_core::types::DbId;
use cruisesync_db::models::sailing::SailingTarget;
use cruisesync_db::repositories::PricingRepo;
use sqlx::PgPool;

#[derive(Debug, thiserror::Error)]
#[error("write failed for sailing {sailing_id}: {source}")]
pub struct WriteError {
    pub sailing_id: DbId,
    #[source]
    pub source: sqlx::Error,
}

/// What a successful write stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub has_pricing: bool,
    pub lines_written: u64,
}

/// Persists one parsed document.
#[async_trait]
pub trait DocumentWriter: Send + Sync {
    async fn write(
        &self,
        target: &SailingTarget,
        document: &PricingDocument,
    ) -> Result<WriteSummary, WriteError>;
}

/// Writes the cheapest-price summary and replaces the price lines of a
/// sailing in one transaction. Repeating a write with the same document
/// leaves the store unchanged apart from timestamps.
#[derive(Clone)]
pub struct PricingWriter {
    pool: PgPool,
}

impl PricingWriter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentWriter for PricingWriter {
    async fn write(
        &self,
        target: &SailingTarget,
        document: &PricingDocument,
    ) -> Result<WriteSummary, WriteError> {
        let summary = PricingSummary::from_document(document);
        let lines = price_lines(document);

        let lines_written = PricingRepo::replace_for_sailing(&self.pool, target.id, &summary, &lines)
            .await
            .map_err(|source| WriteError {
                sailing_id: target.id,
                source,
            })?;

        tracing::trace!(
            sailing_id = target.id,
            cruise_code = %target.cruise_code,
            cheapest = ?summary.cheapest_price,
            lines_written,
            "Pricing written"
        );
        Ok(WriteSummary {
            has_pricing: summary.has_pricing(),
            lines_written,
        })
    }
}
