//! Pricing document model and price derivation.
//!
//! A pricing document is the provider's per-sailing JSON file. Only the
//! fields the engine needs are modelled; everything else is ignored.
//! Amounts arrive as numbers, numeric strings, empty strings, or `null`,
//! so they go through [`lenient_amount`].

use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize};

/// Cabin categories tracked in the cheapest-price summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CabinCategory {
    Interior,
    Oceanview,
    Balcony,
    Suite,
}

// ---------------------------------------------------------------------------
// Document model
// ---------------------------------------------------------------------------

/// A provider pricing document for one sailing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PricingDocument {
    #[serde(default, alias = "cruiseid")]
    pub cruise_id: Option<serde_json::Value>,

    #[serde(default)]
    pub currency: Option<String>,

    /// Structured cheapest block: `{"combined": {"inside": ..., ...}}`.
    #[serde(default)]
    pub cheapest: Option<CheapestBlock>,

    /// Flat per-category fallbacks used by older exports.
    #[serde(default, alias = "cheapestinside", deserialize_with = "lenient_amount")]
    pub cheapest_inside: Option<Decimal>,
    #[serde(default, alias = "cheapestoutside", deserialize_with = "lenient_amount")]
    pub cheapest_outside: Option<Decimal>,
    #[serde(default, alias = "cheapestbalcony", deserialize_with = "lenient_amount")]
    pub cheapest_balcony: Option<Decimal>,
    #[serde(default, alias = "cheapestsuite", deserialize_with = "lenient_amount")]
    pub cheapest_suite: Option<Decimal>,

    /// `rate code -> cabin code -> occupancy code -> components`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub prices: BTreeMap<String, BTreeMap<String, BTreeMap<String, PriceComponents>>>,
}

/// The `cheapest` block of a pricing document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheapestBlock {
    #[serde(default)]
    pub combined: Option<CategoryPrices>,
}

/// Per-category prices as published by the provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryPrices {
    #[serde(default, alias = "interior", deserialize_with = "lenient_amount")]
    pub inside: Option<Decimal>,
    #[serde(default, alias = "oceanview", deserialize_with = "lenient_amount")]
    pub outside: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub balcony: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub suite: Option<Decimal>,
}

/// Price components of one (rate, cabin, occupancy) combination.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PriceComponents {
    #[serde(default, deserialize_with = "lenient_amount")]
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub taxes: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub ncf: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub gratuity: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub fuel: Option<Decimal>,
    #[serde(default, alias = "noncomm", deserialize_with = "lenient_amount")]
    pub non_comm: Option<Decimal>,
}

impl PricingDocument {
    /// Deserialize a document from raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Combined per-category prices, preferring the structured block and
    /// falling back to the flat `cheapest*` fields category by category.
    pub fn category_prices(&self) -> CategoryPrices {
        let combined = self
            .cheapest
            .as_ref()
            .and_then(|c| c.combined.clone())
            .unwrap_or_default();
        CategoryPrices {
            inside: combined.inside.or(self.cheapest_inside),
            outside: combined.outside.or(self.cheapest_outside),
            balcony: combined.balcony.or(self.cheapest_balcony),
            suite: combined.suite.or(self.cheapest_suite),
        }
    }
}

// ---------------------------------------------------------------------------
// Derived rows
// ---------------------------------------------------------------------------

/// Cheapest-price summary for one sailing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PricingSummary {
    pub cheapest_price: Option<Decimal>,
    pub interior_price: Option<Decimal>,
    pub oceanview_price: Option<Decimal>,
    pub balcony_price: Option<Decimal>,
    pub suite_price: Option<Decimal>,
    pub currency: Option<String>,
}

impl PricingSummary {
    /// Build the summary from a parsed document.
    pub fn from_document(doc: &PricingDocument) -> Self {
        let prices = doc.category_prices();
        let interior_price = prices.inside.map(round_amount);
        let oceanview_price = prices.outside.map(round_amount);
        let balcony_price = prices.balcony.map(round_amount);
        let suite_price = prices.suite.map(round_amount);

        let cheapest_price = cheapest_of([
            (CabinCategory::Interior, interior_price),
            (CabinCategory::Oceanview, oceanview_price),
            (CabinCategory::Balcony, balcony_price),
            (CabinCategory::Suite, suite_price),
        ]);

        Self {
            cheapest_price,
            interior_price,
            oceanview_price,
            balcony_price,
            suite_price,
            currency: doc
                .currency
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_uppercase),
        }
    }

    pub fn has_pricing(&self) -> bool {
        self.cheapest_price.is_some()
    }
}

/// Minimum over the present, non-null category prices; `None` if none.
pub fn cheapest_of(
    categories: impl IntoIterator<Item = (CabinCategory, Option<Decimal>)>,
) -> Option<Decimal> {
    categories.into_iter().filter_map(|(_, price)| price).min()
}

/// One detailed price line for a sailing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceLine {
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
}

/// Flatten the nested `prices` map into line items, ordered by
/// (rate, cabin, occupancy).
///
/// The total is the sum of the present chargeable components; a line
/// with no base price has no total.
pub fn price_lines(doc: &PricingDocument) -> Vec<PriceLine> {
    let mut lines = Vec::new();
    for (rate_code, cabins) in &doc.prices {
        for (cabin_code, occupancies) in cabins {
            for (occupancy_code, c) in occupancies {
                let total_price = c.price.map(|base| {
                    round_amount(
                        [c.taxes, c.ncf, c.gratuity, c.fuel]
                            .into_iter()
                            .flatten()
                            .fold(base, |acc, v| acc + v),
                    )
                });
                lines.push(PriceLine {
                    rate_code: rate_code.clone(),
                    cabin_code: cabin_code.clone(),
                    occupancy_code: occupancy_code.clone(),
                    base_price: c.price.map(round_amount),
                    taxes: c.taxes.map(round_amount),
                    ncf: c.ncf.map(round_amount),
                    gratuity: c.gratuity.map(round_amount),
                    fuel: c.fuel.map(round_amount),
                    non_comm: c.non_comm.map(round_amount),
                    total_price,
                });
            }
        }
    }
    lines
}

/// Largest amount a `NUMERIC(10, 2)` column holds.
pub fn max_amount() -> Decimal {
    Decimal::new(9_999_999_999, 2)
}

/// Round to 2 decimal places, half away from zero.
pub fn round_amount(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

// ---------------------------------------------------------------------------
// Serde helpers
// ---------------------------------------------------------------------------

/// Accept a number, a numeric string, an empty string, or `null`.
///
/// Negative amounts and amounts that do not fit `NUMERIC(10, 2)` after
/// rounding are rejected: the document is invalid, not merely missing a
/// price.
fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let parsed = match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::Number(n)) => Some(
            Decimal::from_str(&n.to_string())
                .or_else(|_| Decimal::from_scientific(&n.to_string()))
                .map_err(|e| D::Error::custom(format!("invalid amount {n}: {e}")))?,
        ),
        Some(serde_json::Value::String(s)) => {
            let trimmed = s.trim().replace(',', "");
            if trimmed.is_empty() {
                None
            } else {
                Some(Decimal::from_str(&trimmed).map_err(|e| {
                    D::Error::custom(format!("invalid amount '{s}': {e}"))
                })?)
            }
        }
        Some(other) => {
            return Err(D::Error::custom(format!(
                "expected amount, found {other}"
            )))
        }
    };

    match parsed {
        Some(amount) if amount.is_sign_negative() && !amount.is_zero() => Err(
            D::Error::custom(format!("negative amount {amount}")),
        ),
        Some(amount) if round_amount(amount) > max_amount() => Err(D::Error::custom(
            format!("amount {amount} exceeds {}", max_amount()),
        )),
        other => Ok(other),
    }
}

/// Treat an explicit `null` like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
