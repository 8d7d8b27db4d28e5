use cruisesync_core::env::var_or;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for background tasks (default: `10`).
    pub shutdown_timeout_secs: u64,
    /// Maximum pooled database connections (default: `20`).
    pub database_max_connections: u32,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default   |
    /// |----------------------------|-----------|
    /// | `HOST`                     | `0.0.0.0` |
    /// | `PORT`                     | `3000`    |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`      |
    /// | `SHUTDOWN_TIMEOUT_SECS`    | `10`      |
    /// | `DATABASE_MAX_CONNECTIONS` | `20`      |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        Self {
            host,
            port: var_or("PORT", "3000"),
            request_timeout_secs: var_or("REQUEST_TIMEOUT_SECS", "30"),
            shutdown_timeout_secs: var_or("SHUTDOWN_TIMEOUT_SECS", "10"),
            database_max_connections: var_or("DATABASE_MAX_CONNECTIONS", "20"),
        }
    }
}
