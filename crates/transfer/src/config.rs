//! Transfer, pool, and breaker configuration.

use std::time::Duration;

use cruisesync_core::env::{var_opt, var_or};

/// Hard bounds on the number of concurrent remote sessions.
pub const MIN_SESSIONS: usize = 1;
pub const MAX_SESSIONS: usize = 5;

/// Remote endpoint address and credentials.
#[derive(Clone)]
pub struct TransferConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub connect_timeout: Duration,
}

impl std::fmt::Debug for TransferConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl TransferConfig {
    /// | Env Var                    | Default                     |
    /// |----------------------------|-----------------------------|
    /// | `TRAVELTEK_FTP_HOST`       | `ftpeu1prod.traveltek.net`  |
    /// | `TRAVELTEK_FTP_PORT`       | `21`                        |
    /// | `TRAVELTEK_FTP_USER`       | (empty)                     |
    /// | `TRAVELTEK_FTP_PASSWORD`   | (empty)                     |
    /// | `FTP_CONNECT_TIMEOUT_SECS` | `15`                        |
    pub fn from_env() -> Self {
        let user = var_opt("TRAVELTEK_FTP_USER").unwrap_or_default();
        let password = var_opt("TRAVELTEK_FTP_PASSWORD").unwrap_or_default();
        if user.is_empty() || password.is_empty() {
            tracing::warn!("TRAVELTEK_FTP_USER or TRAVELTEK_FTP_PASSWORD is not set");
        }

        Self {
            host: var_or("TRAVELTEK_FTP_HOST", "ftpeu1prod.traveltek.net"),
            port: var_or("TRAVELTEK_FTP_PORT", "21"),
            user,
            password,
            connect_timeout: Duration::from_secs(var_or("FTP_CONNECT_TIMEOUT_SECS", "15")),
        }
    }
}

/// Session pool sizing and idle policy.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Clamped to `MIN_SESSIONS..=MAX_SESSIONS`.
    pub max_sessions: usize,
    pub idle_timeout: Duration,
    pub reap_interval: Duration,
    /// Upper bound on any single control-channel operation (`cwd`, `list`,
    /// `size`, liveness probe, `quit`). Downloads are bounded by the caller.
    pub op_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_sessions: 3,
            idle_timeout: Duration::from_secs(300),
            reap_interval: Duration::from_secs(30),
            op_timeout: Duration::from_secs(30),
        }
    }
}

impl PoolConfig {
    /// | Env Var                  | Default |
    /// |--------------------------|---------|
    /// | `FTP_MAX_SESSIONS`       | `3`     |
    /// | `FTP_IDLE_TIMEOUT_SECS`  | `300`   |
    /// | `FTP_REAP_INTERVAL_SECS` | `30`    |
    /// | `FTP_OP_TIMEOUT_SECS`    | `30`    |
    pub fn from_env() -> Self {
        Self {
            max_sessions: var_or::<usize>("FTP_MAX_SESSIONS", "3"),
            idle_timeout: Duration::from_secs(var_or("FTP_IDLE_TIMEOUT_SECS", "300")),
            reap_interval: Duration::from_secs(var_or("FTP_REAP_INTERVAL_SECS", "30")),
            op_timeout: Duration::from_secs(var_or::<u64>("FTP_OP_TIMEOUT_SECS", "30").max(1)),
        }
        .clamped()
    }

    pub fn clamped(mut self) -> Self {
        self.max_sessions = self.max_sessions.clamp(MIN_SESSIONS, MAX_SESSIONS);
        self
    }
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures that open the breaker.
    pub failure_threshold: u32,
    /// How long the breaker stays open before allowing one trial call.
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
        }
    }
}

impl BreakerConfig {
    /// | Env Var                     | Default |
    /// |-----------------------------|---------|
    /// | `FTP_BREAKER_THRESHOLD`     | `5`     |
    /// | `FTP_BREAKER_COOLDOWN_SECS` | `60`    |
    pub fn from_env() -> Self {
        Self {
            failure_threshold: var_or::<u32>("FTP_BREAKER_THRESHOLD", "5").max(1),
            cooldown: Duration::from_secs(var_or("FTP_BREAKER_COOLDOWN_SECS", "60")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_size_is_clamped() {
        let too_big = PoolConfig {
            max_sessions: 12,
            ..Default::default()
        };
        assert_eq!(too_big.clamped().max_sessions, MAX_SESSIONS);

        let zero = PoolConfig {
            max_sessions: 0,
            ..Default::default()
        };
        assert_eq!(zero.clamped().max_sessions, MIN_SESSIONS);
    }

    #[test]
    fn debug_redacts_password() {
        let config = TransferConfig {
            host: "ftp.example.com".into(),
            port: 21,
            user: "agent".into(),
            password: "hunter2".into(),
            connect_timeout: Duration::from_secs(15),
        };
        let printed = format!("{config:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
    }
}
