#![allow(dead_code)]

use chrono::{Days, NaiveDate, Utc};
use sqlx::PgPool;

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn days_from_today(days: i64) -> NaiveDate {
    let today = today();
    if days >= 0 {
        today + Days::new(days as u64)
    } else {
        today - Days::new(days.unsigned_abs())
    }
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
