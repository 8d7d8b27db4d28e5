mod common;

use std::str::FromStr;

use common::{days_from_today, insert_sailing, insert_vessel};
use cruisesync_core::pricing::{PriceLine, PricingSummary};
use cruisesync_db::repositories::{PricingRepo, SailingRepo};
use rust_decimal::Decimal;
use sqlx::PgPool;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn line(rate: &str, cabin: &str, base: &str, total: &str) -> PriceLine {
    PriceLine {
        rate_code: rate.into(),
        cabin_code: cabin.into(),
        occupancy_code: "101".into(),
        base_price: Some(dec(base)),
        taxes: Some(dec("100.00")),
        ncf: None,
        gratuity: None,
        fuel: None,
        non_comm: None,
        total_price: Some(dec(total)),
    }
}

async fn seed(pool: &PgPool) -> i64 {
    insert_vessel(pool, 1234, "Harmony").await;
    insert_sailing(pool, "C100", 1234, 22, days_from_today(30)).await
}

#[sqlx::test(migrations = "./migrations")]
async fn test_replace_writes_summary_lines_and_stamp(pool: PgPool) {
    let sailing_id = seed(&pool).await;
    let summary = PricingSummary {
        cheapest_price: Some(dec("500.00")),
        interior_price: Some(dec("500.00")),
        oceanview_price: None,
        balcony_price: Some(dec("650.00")),
        suite_price: Some(dec("1200.00")),
        currency: Some("USD".into()),
    };
    let lines = vec![
        line("BESTRATE", "IA", "500.00", "600.00"),
        line("BESTRATE", "BA", "650.00", "750.00"),
    ];

    let written = PricingRepo::replace_for_sailing(&pool, sailing_id, &summary, &lines)
        .await
        .unwrap();
    assert_eq!(written, 2);

    let row = PricingRepo::find_summary(&pool, sailing_id).await.unwrap().unwrap();
    assert_eq!(row.cheapest_price, Some(dec("500.00")));
    assert_eq!(row.oceanview_price, None);
    assert_eq!(row.currency.as_deref(), Some("USD"));

    let stored = PricingRepo::list_lines(&pool, sailing_id).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].cabin_code, "BA");
    assert_eq!(stored[1].total_price, Some(dec("600.00")));

    let sailing = SailingRepo::find_by_id(&pool, sailing_id).await.unwrap().unwrap();
    assert!(sailing.last_synced_at.is_some());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_replace_is_idempotent(pool: PgPool) {
    let sailing_id = seed(&pool).await;
    let summary = PricingSummary {
        cheapest_price: Some(dec("799.00")),
        interior_price: Some(dec("799.00")),
        ..Default::default()
    };
    let lines = vec![line("R1", "IA", "799.00", "899.00")];

    PricingRepo::replace_for_sailing(&pool, sailing_id, &summary, &lines)
        .await
        .unwrap();
    PricingRepo::replace_for_sailing(&pool, sailing_id, &summary, &lines)
        .await
        .unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cheapest_pricing WHERE sailing_id = $1")
        .bind(sailing_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(PricingRepo::list_lines(&pool, sailing_id).await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_replace_drops_stale_lines_and_nulls_missing_categories(pool: PgPool) {
    let sailing_id = seed(&pool).await;
    let full = PricingSummary {
        cheapest_price: Some(dec("400.00")),
        interior_price: Some(dec("400.00")),
        suite_price: Some(dec("2000.00")),
        currency: Some("USD".into()),
        ..Default::default()
    };
    PricingRepo::replace_for_sailing(
        &pool,
        sailing_id,
        &full,
        &[line("R1", "IA", "400.00", "500.00"), line("R1", "SU", "2000.00", "2100.00")],
    )
    .await
    .unwrap();

    let empty = PricingSummary::default();
    let written = PricingRepo::replace_for_sailing(&pool, sailing_id, &empty, &[])
        .await
        .unwrap();
    assert_eq!(written, 0);

    let row = PricingRepo::find_summary(&pool, sailing_id).await.unwrap().unwrap();
    assert_eq!(row.cheapest_price, None);
    assert_eq!(row.suite_price, None);
    assert!(PricingRepo::list_lines(&pool, sailing_id).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_failed_replace_leaves_previous_pricing(pool: PgPool) {
    let sailing_id = seed(&pool).await;
    let summary = PricingSummary {
        cheapest_price: Some(dec("300.00")),
        interior_price: Some(dec("300.00")),
        ..Default::default()
    };
    PricingRepo::replace_for_sailing(&pool, sailing_id, &summary, &[line("R1", "IA", "300.00", "400.00")])
        .await
        .unwrap();

    // Duplicate combination violates the unique constraint mid-transaction.
    let dup = vec![line("R2", "IA", "310.00", "410.00"), line("R2", "IA", "310.00", "410.00")];
    let changed = PricingSummary {
        cheapest_price: Some(dec("310.00")),
        ..Default::default()
    };
    let result = PricingRepo::replace_for_sailing(&pool, sailing_id, &changed, &dup).await;
    assert!(result.is_err());

    let row = PricingRepo::find_summary(&pool, sailing_id).await.unwrap().unwrap();
    assert_eq!(row.cheapest_price, Some(dec("300.00")));
    let lines = PricingRepo::list_lines(&pool, sailing_id).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].rate_code, "R1");
}
