mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use cruisesync_core::line_mapping::LineIdMapping;
use cruisesync_core::outcome::FailureKind;
use cruisesync_core::pass_state::{PassPhase, PassStatus};
use cruisesync_db::models::sync_lock::LOCK_TYPE_PRICING;
use cruisesync_db::repositories::{PricingRepo, SyncLockRepo, SyncPassRepo};
use cruisesync_events::bus::{EVENT_PASS_ABORTED, EVENT_PASS_COMPLETED};
use cruisesync_pipeline::{InventoryResolver, LineLockManager, NotificationReceiver, SyncConfig};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

const PRICED: &[u8] = br#"{
    "cruiseid": 2143102,
    "currency": "usd",
    "cheapest": {"combined": {"inside": "799.00", "outside": 949, "balcony": null}},
    "prices": {
        "RATE1": {
            "IA": {"101": {"price": 799, "taxes": "120.50", "ncf": 0}},
            "BA": {"101": {"price": 1299, "taxes": "120.50"}}
        }
    }
}"#;

const UNPRICED: &[u8] = br#"{"cruiseid": 2143103, "prices": {}}"#;

struct Fixture {
    priced: i64,
    unpriced: i64,
}

async fn seed(pool: &PgPool, h: &Harness) -> Fixture {
    insert_vessel(pool, VESSEL, "Harmony").await;
    let first = days_from_today(30);
    let second = days_from_today(60);
    let priced = insert_sailing(pool, "2143102", VESSEL, INTERNAL_LINE, first).await;
    let unpriced = insert_sailing(pool, "2143103", VESSEL, INTERNAL_LINE, second).await;
    h.endpoint
        .put_file(&remote_dir(first), "2143102.json", PRICED.to_vec());
    h.endpoint
        .put_file(&remote_dir(second), "2143103.json", UNPRICED.to_vec());
    Fixture { priced, unpriced }
}

fn notification() -> serde_json::Value {
    json!({"event": "cruiseline_pricing_updated", "lineid": EXTERNAL_LINE})
}

// ---------------------------------------------------------------------------
// Full pass
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn notification_syncs_mapped_line(pool: PgPool) {
    let h = harness(&pool);
    let fx = seed(&pool, &h).await;
    let mut events = h.bus.subscribe();
    let receiver = NotificationReceiver::new(Arc::clone(&h.engine));

    let receipt = receiver.accept(notification()).await;
    assert_eq!(receipt.status, PassStatus::Received);
    assert_eq!(receipt.external_line_ids, vec![EXTERNAL_LINE]);
    assert_eq!(receipt.pass_ids.len(), 1);
    let pass_id = receipt.pass_ids[0];

    let reports = receipt.join().await;
    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.phase, PassPhase::Completed);
    assert_eq!(report.line_id, INTERNAL_LINE);
    let result = report.result.as_ref().unwrap();
    assert_eq!(result.attempted, 2);
    assert_eq!(result.succeeded, 2);
    assert_eq!(result.failed, 0);

    let summary = PricingRepo::find_summary(&pool, fx.priced)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.cheapest_price, Some(Decimal::new(79900, 2)));
    assert_eq!(summary.interior_price, Some(Decimal::new(79900, 2)));
    assert_eq!(summary.oceanview_price, Some(Decimal::new(94900, 2)));
    assert_eq!(summary.balcony_price, None);
    assert_eq!(summary.currency.as_deref(), Some("USD"));
    let lines = PricingRepo::list_lines(&pool, fx.priced).await.unwrap();
    assert_eq!(lines.len(), 2);

    let empty = PricingRepo::find_summary(&pool, fx.unpriced)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(empty.cheapest_price, None);
    assert_eq!(empty.interior_price, None);
    assert_eq!(empty.suite_price, None);

    let audit = SyncPassRepo::find(&pool, pass_id).await.unwrap().unwrap();
    assert_eq!(audit.status, "completed");
    assert_eq!(audit.phase, "completed");
    assert_eq!(audit.external_line_id, Some(EXTERNAL_LINE));
    assert_eq!(audit.line_id, Some(INTERNAL_LINE));
    assert_eq!(audit.attempted, 2);
    assert_eq!(audit.succeeded, 2);
    assert!(audit.started_at.is_some());
    assert!(audit.completed_at.is_some());

    let event = events.recv().await.unwrap();
    assert_eq!(event.event_type, EVENT_PASS_COMPLETED);
    assert_eq!(event.pass_id, Some(pass_id));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn lock_is_released_after_pass(pool: PgPool) {
    let h = harness(&pool);
    seed(&pool, &h).await;
    let receiver = NotificationReceiver::new(Arc::clone(&h.engine));

    receiver.accept(notification()).await.join().await;

    let lock = SyncLockRepo::find(&pool, INTERNAL_LINE, LOCK_TYPE_PRICING)
        .await
        .unwrap();
    assert!(lock.is_none());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn rerun_leaves_identical_pricing(pool: PgPool) {
    let h = harness(&pool);
    let fx = seed(&pool, &h).await;
    let receiver = NotificationReceiver::new(Arc::clone(&h.engine));

    receiver.accept(notification()).await.join().await;
    let first_summary = PricingRepo::find_summary(&pool, fx.priced).await.unwrap().unwrap();
    let first_lines = PricingRepo::list_lines(&pool, fx.priced).await.unwrap();

    let reports = receiver.accept(notification()).await.join().await;
    assert_eq!(reports[0].phase, PassPhase::Completed);

    let second_summary = PricingRepo::find_summary(&pool, fx.priced).await.unwrap().unwrap();
    let second_lines = PricingRepo::list_lines(&pool, fx.priced).await.unwrap();
    assert_eq!(first_summary.cheapest_price, second_summary.cheapest_price);
    assert_eq!(first_lines.len(), second_lines.len());
    let combos = |lines: &[cruisesync_db::models::pricing::PriceLineRow]| {
        lines
            .iter()
            .map(|l| (l.rate_code.clone(), l.cabin_code.clone(), l.total_price))
            .collect::<Vec<_>>()
    };
    assert_eq!(combos(&first_lines), combos(&second_lines));
}

// ---------------------------------------------------------------------------
// Locking
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn pass_aborts_when_line_is_locked(pool: PgPool) {
    let h = harness(&pool);
    let fx = seed(&pool, &h).await;
    let mut events = h.bus.subscribe();
    let locks = LineLockManager::new(pool.clone(), Duration::from_secs(180));
    let held = locks.acquire(INTERNAL_LINE).await.unwrap();

    let receiver = NotificationReceiver::new(Arc::clone(&h.engine));
    let receipt = receiver.accept(notification()).await;
    let pass_id = receipt.pass_ids[0];
    let reports = receipt.join().await;

    assert_eq!(reports[0].phase, PassPhase::AbortedNoLock);
    assert!(reports[0].result.is_none());
    assert_eq!(h.endpoint.connect_count(), 0);
    assert!(PricingRepo::find_summary(&pool, fx.priced).await.unwrap().is_none());

    let audit = SyncPassRepo::find(&pool, pass_id).await.unwrap().unwrap();
    assert_eq!(audit.status, "aborted_no_lock");
    assert_eq!(events.recv().await.unwrap().event_type, EVENT_PASS_ABORTED);

    // The other holder keeps its lock.
    let lock = SyncLockRepo::find(&pool, INTERNAL_LINE, LOCK_TYPE_PRICING)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lock.token, held.token);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn expired_lock_is_taken_over(pool: PgPool) {
    let h = harness(&pool);
    seed(&pool, &h).await;
    sqlx::query(
        "INSERT INTO sync_locks (line_id, lock_type, token, expires_at) \
         VALUES ($1, $2, gen_random_uuid(), NOW() - INTERVAL '1 minute')",
    )
    .bind(INTERNAL_LINE)
    .bind(LOCK_TYPE_PRICING)
    .execute(&pool)
    .await
    .unwrap();

    let receiver = NotificationReceiver::new(Arc::clone(&h.engine));
    let reports = receiver.accept(notification()).await.join().await;

    assert_eq!(reports[0].phase, PassPhase::Completed);
    assert_eq!(reports[0].result.as_ref().unwrap().succeeded, 2);
}

fn fast_renewal() -> SyncConfig {
    SyncConfig {
        lock_renew_interval: Duration::from_millis(20),
        ..config()
    }
}

#[sqlx::test(migrations = "../db/migrations")]
async fn running_pass_renews_lock_past_its_ttl(pool: PgPool) {
    let h = harness_with(&pool, fast_renewal());
    seed(&pool, &h).await;
    h.endpoint.set_retrieve_delay(Some(Duration::from_millis(400)));
    let receiver = NotificationReceiver::new(Arc::clone(&h.engine));

    let receipt = receiver.accept(notification()).await;
    let lock = wait_for_lock(&pool).await;

    // The original TTL runs out while the pass is still downloading.
    sqlx::query("UPDATE sync_locks SET expires_at = NOW() - INTERVAL '1 second' WHERE token = $1")
        .bind(lock.token)
        .execute(&pool)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    let live: bool = sqlx::query_scalar("SELECT expires_at > NOW() FROM sync_locks WHERE token = $1")
        .bind(lock.token)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(live, "holder renewed its lock");
    assert!(matches!(
        LineLockManager::new(pool.clone(), Duration::from_secs(180))
            .acquire(INTERNAL_LINE)
            .await,
        Err(cruisesync_pipeline::LockError::Held { .. })
    ));

    let reports = receipt.join().await;
    assert_eq!(reports[0].phase, PassPhase::Completed);
    assert_eq!(reports[0].result.as_ref().unwrap().succeeded, 2);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn pass_stops_when_its_lock_is_taken(pool: PgPool) {
    let h = harness_with(&pool, fast_renewal());
    let fx = seed(&pool, &h).await;
    h.endpoint.set_retrieve_delay(Some(Duration::from_millis(400)));
    let receiver = NotificationReceiver::new(Arc::clone(&h.engine));

    let receipt = receiver.accept(notification()).await;
    let pass_id = receipt.pass_ids[0];
    wait_for_lock(&pool).await;

    let thief = Uuid::new_v4();
    sqlx::query("UPDATE sync_locks SET token = $1")
        .bind(thief)
        .execute(&pool)
        .await
        .unwrap();

    let reports = receipt.join().await;
    let report = &reports[0];
    assert_eq!(report.phase, PassPhase::Failed);
    assert!(report.error.as_deref().unwrap().contains("lost"));
    assert!(PricingRepo::find_summary(&pool, fx.priced).await.unwrap().is_none());

    let audit = SyncPassRepo::find(&pool, pass_id).await.unwrap().unwrap();
    assert_eq!(audit.status, "failed");
    let lock = SyncLockRepo::find(&pool, INTERNAL_LINE, LOCK_TYPE_PRICING)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lock.token, thief);
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn mega_batch_cap_keeps_nearest_sailings(pool: PgPool) {
    insert_vessel(&pool, VESSEL, "Harmony").await;
    sqlx::query(
        "INSERT INTO sailings (cruise_code, vessel_id, line_id, sailing_date) \
         SELECT 'C' || n, $1, $2, CURRENT_DATE + (n % 400) \
         FROM generate_series(1, 1200) AS n",
    )
    .bind(VESSEL)
    .bind(INTERNAL_LINE)
    .execute(&pool)
    .await
    .unwrap();

    let mapping = LineIdMapping::from_pairs([(EXTERNAL_LINE, INTERNAL_LINE)]).unwrap();
    let resolver = InventoryResolver::new(pool.clone(), Arc::new(mapping), 500);
    let inventory = resolver.resolve(INTERNAL_LINE).await.unwrap();

    assert_eq!(inventory.external_line_id, EXTERNAL_LINE);
    assert_eq!(inventory.targets.len(), 500);
    assert_eq!(inventory.deferred, 700);
    assert!(inventory
        .targets
        .windows(2)
        .all(|w| w[0].sailing_date <= w[1].sailing_date));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn line_without_sailings_completes_empty(pool: PgPool) {
    let h = harness(&pool);
    let receiver = NotificationReceiver::new(Arc::clone(&h.engine));

    let reports = receiver.accept(json!({"lineid": 99})).await.join().await;

    assert_eq!(reports[0].phase, PassPhase::Completed);
    assert_eq!(reports[0].result.as_ref().unwrap().attempted, 0);
    assert_eq!(h.endpoint.connect_count(), 0);
}

// ---------------------------------------------------------------------------
// Degraded transfer
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn unreachable_endpoint_fails_items_not_pass(pool: PgPool) {
    let h = harness(&pool);
    seed(&pool, &h).await;
    h.endpoint.set_reachable(false);
    let receiver = NotificationReceiver::new(Arc::clone(&h.engine));

    let reports = receiver.accept(notification()).await.join().await;

    let report = &reports[0];
    assert_eq!(report.phase, PassPhase::Completed);
    let result = report.result.as_ref().unwrap();
    assert_eq!(result.attempted, 2);
    assert_eq!(result.succeeded, 0);
    assert_eq!(result.failed, 2);
    assert!(result
        .errors
        .iter()
        .all(|e| matches!(e.kind, FailureKind::Connection | FailureKind::CircuitOpen)));

    let lock = SyncLockRepo::find(&pool, INTERNAL_LINE, LOCK_TYPE_PRICING)
        .await
        .unwrap();
    assert!(lock.is_none());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn missing_document_is_counted_as_skipped(pool: PgPool) {
    let h = harness(&pool);
    insert_vessel(&pool, VESSEL, "Harmony").await;
    let day = days_from_today(30);
    insert_sailing(&pool, "2143102", VESSEL, INTERNAL_LINE, day).await;
    insert_sailing(&pool, "2143199", VESSEL, INTERNAL_LINE, day).await;
    h.endpoint
        .put_file(&remote_dir(day), "2143102.json", PRICED.to_vec());
    let receiver = NotificationReceiver::new(Arc::clone(&h.engine));

    let receipt = receiver.accept(notification()).await;
    let pass_id = receipt.pass_ids[0];
    let reports = receipt.join().await;

    let result = reports[0].result.as_ref().unwrap();
    assert_eq!(result.succeeded, 1);
    assert_eq!(result.skipped_missing, 1);
    assert_eq!(result.failed, 0);

    let audit = SyncPassRepo::find(&pool, pass_id).await.unwrap().unwrap();
    assert_eq!(audit.skipped_missing, 1);
    assert_eq!(audit.success_rate, Some(0.5));
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn notification_without_line_is_ignored(pool: PgPool) {
    let h = harness(&pool);
    let receiver = NotificationReceiver::new(Arc::clone(&h.engine));

    let receipt = receiver.accept(json!({"event": "ping"})).await;

    assert_eq!(receipt.status, PassStatus::Ignored);
    assert!(receipt.handles.is_empty());
    let audit = SyncPassRepo::find(&pool, receipt.pass_ids[0])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(audit.status, "ignored");
    assert_eq!(audit.external_line_id, None);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn paused_engine_records_but_does_not_run(pool: PgPool) {
    let h = harness(&pool);
    let fx = seed(&pool, &h).await;
    h.engine.pause();
    let receiver = NotificationReceiver::new(Arc::clone(&h.engine));

    let receipt = receiver.accept(notification()).await;

    assert_eq!(receipt.status, PassStatus::Paused);
    assert!(receipt.handles.is_empty());
    let audit = SyncPassRepo::find(&pool, receipt.pass_ids[0])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(audit.status, "paused");
    assert!(PricingRepo::find_summary(&pool, fx.priced).await.unwrap().is_none());

    h.engine.resume();
    let reports = receiver.accept(notification()).await.join().await;
    assert_eq!(reports[0].phase, PassPhase::Completed);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn multiple_lines_share_a_correlation_id(pool: PgPool) {
    let h = harness(&pool);
    let receiver = NotificationReceiver::new(Arc::clone(&h.engine));

    let receipt = receiver.accept(json!({"lineid": [3, 7]})).await;
    let correlation_id = receipt.correlation_id;
    assert_eq!(receipt.pass_ids.len(), 2);
    receipt.join().await;

    let passes = SyncPassRepo::list_by_correlation(&pool, correlation_id)
        .await
        .unwrap();
    assert_eq!(passes.len(), 2);
    assert!(passes.iter().all(|p| p.status == "completed"));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn many_lines_are_audited_within_one_deadline(pool: PgPool) {
    let h = harness(&pool);
    h.engine.pause();
    let receiver = NotificationReceiver::new(Arc::clone(&h.engine));
    let lines: Vec<i64> = (100..112).collect();

    let started = std::time::Instant::now();
    let receipt = receiver.accept(json!({"lineid": lines})).await;
    assert!(started.elapsed() < Duration::from_secs(1));

    assert_eq!(receipt.pass_ids.len(), 12);
    let passes = SyncPassRepo::list_by_correlation(&pool, receipt.correlation_id)
        .await
        .unwrap();
    assert_eq!(passes.len(), 12);
    assert!(passes.iter().all(|p| p.status == "paused"));
}
