//! Remote file-transfer plumbing for the pricing sync engine.
//!
//! - [`session`]: the session/factory traits every transport implements.
//! - [`ftp`]: the production FTP transport.
//! - [`breaker`]: consecutive-failure circuit breaker wrapping remote calls.
//! - [`pool`]: bounded pool of long-lived sessions with explicit
//!   acquire/release.
//! - [`reaper`]: background task closing idle sessions.
//! - [`fetcher`]: per-sailing document download, sanity check, and parse,
//!   with failure classification.

pub mod breaker;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod ftp;
#[cfg(any(test, feature = "testkit"))]
pub mod memory;
pub mod pool;
pub mod reaper;
pub mod session;

pub use breaker::{BreakerState, CircuitBreaker, CircuitOpen};
pub use config::{BreakerConfig, PoolConfig, TransferConfig};
pub use error::TransferError;
pub use fetcher::{FetchError, FileFetcher, RemoteDirectory};
pub use ftp::FtpSessionFactory;
pub use pool::{PoolSnapshot, PooledSession, TransferPool};
pub use session::{SessionFactory, TransferSession};
