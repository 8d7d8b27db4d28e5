#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

use cruisesync_api::config::ServerConfig;
use cruisesync_api::router::build_app_router;
use cruisesync_api::state::AppState;
use cruisesync_db::models::sync_pass::SyncPass;
use cruisesync_db::repositories::SyncPassRepo;
use cruisesync_events::EventBus;
use cruisesync_pipeline::{SyncConfig, SyncEngine};
use cruisesync_transfer::memory::MemoryEndpoint;
use cruisesync_transfer::{BreakerConfig, PoolConfig, TransferPool};

pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        database_max_connections: 5,
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub endpoint: Arc<MemoryEndpoint>,
}

/// Full application router over an in-memory transfer endpoint.
pub fn build_test_app(pool: PgPool) -> TestApp {
    let endpoint = MemoryEndpoint::new();
    let transfer = TransferPool::new(
        endpoint.factory(),
        PoolConfig::default(),
        BreakerConfig::default(),
    );
    let bus = Arc::new(EventBus::default());
    let sync_config = SyncConfig {
        item_delay: Duration::ZERO,
        chunk_delay: Duration::ZERO,
        ..Default::default()
    };
    let engine = SyncEngine::new(pool.clone(), transfer, Arc::clone(&bus), &sync_config);

    let config = test_config();
    let state = AppState::new(pool, config.clone(), engine, bus);
    let router = build_app_router(state.clone(), &config);
    TestApp {
        router,
        state,
        endpoint,
    }
}

pub async fn get(app: &Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn post_raw(app: &Router, uri: &str, body: impl Into<Body>) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> Response {
    post_raw(app, uri, body.to_string()).await
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll the audit record until the pass reaches a terminal status.
pub async fn wait_for_pass(pool: &PgPool, pass_id: Uuid) -> SyncPass {
    for _ in 0..250 {
        if let Some(pass) = SyncPassRepo::find(pool, pass_id).await.unwrap() {
            if matches!(pass.status.as_str(), "completed" | "failed" | "aborted_no_lock") {
                return pass;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("pass {pass_id} did not finish");
}
