//! Transport-neutral session interface.
//!
//! The pool, fetcher, and orchestrator only ever see these traits, so the
//! production FTP transport and the in-memory test endpoint are
//! interchangeable.

use async_trait::async_trait;

use crate::error::TransferError;

/// One authenticated, directory-navigable session. Read-only.
#[async_trait]
pub trait TransferSession: Send {
    /// Change the working directory.
    async fn cwd(&mut self, path: &str) -> Result<(), TransferError>;

    /// Bare file names in the working directory.
    async fn list(&mut self) -> Result<Vec<String>, TransferError>;

    /// Size in bytes, if the server reports one.
    async fn size(&mut self, name: &str) -> Result<Option<u64>, TransferError>;

    /// Download a file from the working directory into memory.
    async fn retrieve(&mut self, name: &str) -> Result<Vec<u8>, TransferError>;

    /// Cheap liveness probe.
    async fn noop(&mut self) -> Result<(), TransferError>;

    /// Close the session. Errors are ignored.
    async fn quit(&mut self);
}

/// Opens new sessions against the remote endpoint.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn TransferSession>, TransferError>;
}
