#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Days, NaiveDate, Utc};
use cruisesync_core::line_mapping::LineIdMapping;
use cruisesync_db::models::sync_lock::{SyncLock, LOCK_TYPE_PRICING};
use cruisesync_db::repositories::SyncLockRepo;
use cruisesync_events::EventBus;
use cruisesync_pipeline::{SyncConfig, SyncEngine};
use cruisesync_transfer::memory::MemoryEndpoint;
use cruisesync_transfer::{BreakerConfig, PoolConfig, TransferPool};
use sqlx::PgPool;

pub const EXTERNAL_LINE: i64 = 3;
pub const INTERNAL_LINE: i64 = 22;
pub const VESSEL: i64 = 1234;

pub fn days_from_today(days: u64) -> NaiveDate {
    Utc::now().date_naive() + Days::new(days)
}

/// Namespaced remote directory for a sailing of [`VESSEL`] on [`EXTERNAL_LINE`].
pub fn remote_dir(sailing_date: NaiveDate) -> String {
    format!(
        "/isell_json/{}/{:02}/{EXTERNAL_LINE}/{VESSEL}",
        sailing_date.year(),
        sailing_date.month()
    )
}

pub async fn insert_vessel(pool: &PgPool, id: i64, name: &str) {
    sqlx::query("INSERT INTO vessels (id, name) VALUES ($1, $2)")
        .bind(id)
        .bind(name)
        .execute(pool)
        .await
        .unwrap();
}

pub async fn insert_sailing(
    pool: &PgPool,
    cruise_code: &str,
    vessel_id: i64,
    line_id: i64,
    sailing_date: NaiveDate,
) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO sailings (cruise_code, vessel_id, line_id, sailing_date) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(cruise_code)
    .bind(vessel_id)
    .bind(line_id)
    .bind(sailing_date)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub fn config() -> SyncConfig {
    SyncConfig {
        item_delay: Duration::ZERO,
        chunk_delay: Duration::ZERO,
        fetch_timeout: Duration::from_secs(5),
        line_mapping: LineIdMapping::from_pairs([(EXTERNAL_LINE, INTERNAL_LINE)]).unwrap(),
        ..Default::default()
    }
}

/// Poll until a pass holds the pricing lock of [`INTERNAL_LINE`].
pub async fn wait_for_lock(pool: &PgPool) -> SyncLock {
    for _ in 0..400 {
        if let Some(lock) = SyncLockRepo::find(pool, INTERNAL_LINE, LOCK_TYPE_PRICING)
            .await
            .unwrap()
        {
            return lock;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("no pass acquired the lock");
}

pub struct Harness {
    pub engine: Arc<SyncEngine>,
    pub bus: Arc<EventBus>,
    pub endpoint: Arc<MemoryEndpoint>,
}

pub fn harness(pool: &PgPool) -> Harness {
    harness_with(pool, config())
}

pub fn harness_with(pool: &PgPool, config: SyncConfig) -> Harness {
    let endpoint = MemoryEndpoint::new();
    let transfer = TransferPool::new(
        endpoint.factory(),
        PoolConfig::default(),
        BreakerConfig {
            failure_threshold: 3,
            cooldown: Duration::from_secs(60),
        },
    );
    let bus = Arc::new(EventBus::new(64));
    let engine = SyncEngine::new(pool.clone(), transfer, Arc::clone(&bus), &config);
    Harness {
        engine,
        bus,
        endpoint,
    }
}
