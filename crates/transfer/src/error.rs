use std::time::Duration;

use crate::breaker::CircuitOpen;

/// Failure talking to the remote transfer endpoint.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// The session could not be opened or authenticated.
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The remote path does not exist (FTP 550).
    #[error("not found: {0}")]
    NotFound(String),

    /// The server answered, but not with what we expected.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpen),

    #[error("transfer pool is shut down")]
    PoolClosed,
}

impl TransferError {
    /// Whether this failure says the endpoint is unreachable or unhealthy.
    ///
    /// Only these count toward opening the circuit breaker and cause the
    /// session to be discarded instead of returned to the pool.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Timeout(_) | Self::Io(_))
    }
}
