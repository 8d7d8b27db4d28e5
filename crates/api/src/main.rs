use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cruisesync_api::config::ServerConfig;
use cruisesync_api::router::build_app_router;
use cruisesync_api::state::AppState;
use cruisesync_core::env::var_opt;
use cruisesync_events::{EventBus, NotificationForwarder, Notifier, SlackDelivery};
use cruisesync_pipeline::{SyncConfig, SyncEngine};
use cruisesync_transfer::{
    BreakerConfig, FtpSessionFactory, PoolConfig, TransferConfig, TransferPool,
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let json_logs = var_opt("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "cruisesync_api=debug,cruisesync_pipeline=debug,cruisesync_transfer=info,tower_http=debug"
                    .into()
            }),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let sync_config = SyncConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = config.port,
        strategy = ?sync_config.strategy,
        mega_batch_cap = sync_config.mega_batch_cap,
        lock_ttl_secs = sync_config.lock_ttl.as_secs(),
        mapped_lines = sync_config.line_mapping.len(),
        paused = sync_config.start_paused,
        "Loaded configuration"
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = cruisesync_db::create_pool(&database_url, config.database_max_connections)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    cruisesync_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    cruisesync_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());

    let notifier: Option<Arc<dyn Notifier>> = match var_opt("SLACK_WEBHOOK_URL") {
        Some(url) => {
            let slack: Arc<dyn Notifier> = Arc::new(SlackDelivery::new(url));
            Some(slack)
        }
        None => {
            tracing::warn!("SLACK_WEBHOOK_URL is not set, pass summaries are only logged");
            None
        }
    };
    let forwarder_handle =
        tokio::spawn(NotificationForwarder::run(notifier, event_bus.subscribe()));

    // --- Transfer pool ---
    let transfer_config = TransferConfig::from_env();
    tracing::info!(host = %transfer_config.host, port = transfer_config.port, "Transfer endpoint configured");
    let transfer = TransferPool::new(
        Arc::new(FtpSessionFactory::new(transfer_config)),
        PoolConfig::from_env(),
        BreakerConfig::from_env(),
    );

    let reaper_cancel = CancellationToken::new();
    let reaper_handle = tokio::spawn(cruisesync_transfer::reaper::run_reaper(
        Arc::clone(&transfer),
        reaper_cancel.clone(),
    ));

    // --- Sync engine ---
    let engine = SyncEngine::new(
        pool.clone(),
        Arc::clone(&transfer),
        Arc::clone(&event_bus),
        &sync_config,
    );
    tracing::info!("Sync engine started");

    // --- Router ---
    let state = AppState::new(pool, config.clone(), engine, Arc::clone(&event_bus));
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let grace = Duration::from_secs(config.shutdown_timeout_secs);

    reaper_cancel.cancel();
    let _ = tokio::time::timeout(grace, reaper_handle).await;

    transfer.shutdown().await;
    tracing::info!("Transfer pool closed");

    // In-flight passes hold their own bus handle; the forwarder ends once
    // the last one finishes or the grace period runs out.
    drop(event_bus);
    let _ = tokio::time::timeout(grace, forwarder_handle).await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
