//! Repository for the `cheapest_pricing` and `price_lines` tables.

use cruisesync_core::pricing::{PriceLine, PricingSummary};
use cruisesync_core::types::DbId;
use sqlx::PgPool;

use crate::models::pricing::{CheapestPricing, PriceLineRow};

/// Column list for `cheapest_pricing` queries.
const SUMMARY_COLUMNS: &str = "\
    sailing_id, cheapest_price, interior_price, oceanview_price, \
    balcony_price, suite_price, currency, last_updated";

/// Column list for `price_lines` queries.
const LINE_COLUMNS: &str = "\
    id, sailing_id, rate_code, cabin_code, occupancy_code, base_price, \
    taxes, ncf, gratuity, fuel, non_comm, total_price, created_at";

/// Provides pricing persistence for one sailing at a time.
pub struct PricingRepo;

impl PricingRepo {
    /// Replace all pricing for a sailing in a single transaction:
    ///
    /// 1. upsert the summary row keyed by `sailing_id`,
    /// 2. delete every existing price line for the sailing,
    /// 3. insert the new lines,
    /// 4. stamp `sailings.last_synced_at`.
    ///
    /// Returns the number of price lines written.
    pub async fn replace_for_sailing(
        pool: &PgPool,
        sailing_id: DbId,
        summary: &PricingSummary,
        lines: &[PriceLine],
    ) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "INSERT INTO cheapest_pricing \
                (sailing_id, cheapest_price, interior_price, oceanview_price, \
                 balcony_price, suite_price, currency, last_updated) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, NOW()) \
             ON CONFLICT (sailing_id) DO UPDATE SET \
                cheapest_price = EXCLUDED.cheapest_price, \
                interior_price = EXCLUDED.interior_price, \
                oceanview_price = EXCLUDED.oceanview_price, \
                balcony_price = EXCLUDED.balcony_price, \
                suite_price = EXCLUDED.suite_price, \
                currency = EXCLUDED.currency, \
                last_updated = EXCLUDED.last_updated",
        )
        .bind(sailing_id)
        .bind(summary.cheapest_price)
        .bind(summary.interior_price)
        .bind(summary.oceanview_price)
        .bind(summary.balcony_price)
        .bind(summary.suite_price)
        .bind(summary.currency.as_deref())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM price_lines WHERE sailing_id = $1")
            .bind(sailing_id)
            .execute(&mut *tx)
            .await?;

        let mut written = 0u64;
        for line in lines {
            let result = sqlx::query(
                "INSERT INTO price_lines \
                    (sailing_id, rate_code, cabin_code, occupancy_code, base_price, \
                     taxes, ncf, gratuity, fuel, non_comm, total_price) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .bind(sailing_id)
            .bind(&line.rate_code)
            .bind(&line.cabin_code)
            .bind(&line.occupancy_code)
            .bind(line.base_price)
            .bind(line.taxes)
            .bind(line.ncf)
            .bind(line.gratuity)
            .bind(line.fuel)
            .bind(line.non_comm)
            .bind(line.total_price)
            .execute(&mut *tx)
            .await?;
            written += result.rows_affected();
        }

        sqlx::query(
            "UPDATE sailings SET last_synced_at = NOW(), updated_at = NOW() WHERE id = $1",
        )
        .bind(sailing_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(written)
    }

    /// Fetch the summary row for a sailing.
    pub async fn find_summary(
        pool: &PgPool,
        sailing_id: DbId,
    ) -> Result<Option<CheapestPricing>, sqlx::Error> {
        let query =
            format!("SELECT {SUMMARY_COLUMNS} FROM cheapest_pricing WHERE sailing_id = $1");
        sqlx::query_as::<_, CheapestPricing>(&query)
            .bind(sailing_id)
            .fetch_optional(pool)
            .await
    }

    /// List the price lines of a sailing in (rate, cabin, occupancy) order.
    pub async fn list_lines(
        pool: &PgPool,
        sailing_id: DbId,
    ) -> Result<Vec<PriceLineRow>, sqlx::Error> {
        let query = format!(
            "SELECT {LINE_COLUMNS} FROM price_lines WHERE sailing_id = $1 \
             ORDER BY rate_code, cabin_code, occupancy_code"
        );
        sqlx::query_as::<_, PriceLineRow>(&query)
            .bind(sailing_id)
            .fetch_all(pool)
            .await
    }
}
