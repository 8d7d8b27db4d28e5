use std::sync::Arc;

use cruisesync_events::EventBus;
use cruisesync_pipeline::{NotificationReceiver, SyncEngine};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub pool: cruisesync_db::DbPool,
    pub config: Arc<ServerConfig>,
    pub engine: Arc<SyncEngine>,
    pub receiver: NotificationReceiver,
    pub event_bus: Arc<EventBus>,
}

impl AppState {
    pub fn new(
        pool: cruisesync_db::DbPool,
        config: ServerConfig,
        engine: Arc<SyncEngine>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            receiver: NotificationReceiver::new(Arc::clone(&engine)),
            engine,
            event_bus,
        }
    }
}
