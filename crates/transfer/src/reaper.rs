//! Background task that closes idle transfer sessions.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::pool::TransferPool;

/// Run the idle reaper until `cancel` fires.
///
/// Every `reap_interval`, sessions idle for longer than `idle_timeout`
/// are closed. On cancellation the pool is shut down.
pub async fn run_reaper(pool: Arc<TransferPool>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(pool.config().reap_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    tracing::info!(
        idle_timeout_secs = pool.config().idle_timeout.as_secs(),
        "Transfer session reaper started"
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                pool.shutdown().await;
                tracing::info!("Transfer session reaper stopped");
                return;
            }
            _ = interval.tick() => {
                let closed = pool.reap_idle().await;
                if closed > 0 {
                    tracing::debug!(closed, "Closed idle transfer sessions");
                }
            }
        }
    }
}
