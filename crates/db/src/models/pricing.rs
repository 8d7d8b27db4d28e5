//! Pricing summary and detailed price line rows.

use cruisesync_core::types::{DbId, Timestamp};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

/// A `cheapest_pricing` row.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct CheapestPricing {
    pub sailing_id: DbId,
    pub cheapest_price: Option<Decimal>,
    pub interior_price: Option<Decimal>,
    pub oceanview_price: Option<Decimal>,
    pub balcony_price: Option<Decimal>,
    pub suite_price: Option<Decimal>,
    pub currency: Option<String>,
    pub last_updated: Timestamp,
}

/// A `price_lines` row.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct PriceLineRow {
    pub id: DbId,
    pub sailing_id: DbId,
    pub rate_code: String,
    pub cabin_code: String,
    pub occupancy_code: String,
    pub base_price: Option<Decimal>,
    pub taxes: Option<Decimal>,
    pub ncf: Option<Decimal>,
    pub gratuity: Option<Decimal>,
    pub fuel: Option<Decimal>,
    pub non_comm: Option<Decimal>,
    pub total_price: Option<Decimal>,
    pub created_at: Timestamp,
}
