//! FTP transport over `async_ftp`.

use async_ftp::types::FileType;
use async_ftp::{FtpError, FtpStream};
use async_trait::async_trait;

use crate::config::TransferConfig;
use crate::error::TransferError;
use crate::session::{SessionFactory, TransferSession};

/// Opens authenticated binary-mode FTP sessions.
pub struct FtpSessionFactory {
    config: TransferConfig,
}

impl FtpSessionFactory {
    pub fn new(config: TransferConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for FtpSessionFactory {
    async fn connect(&self) -> Result<Box<dyn TransferSession>, TransferError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let timeout = self.config.connect_timeout;

        let mut stream = tokio::time::timeout(timeout, FtpStream::connect(addr.as_str()))
            .await
            .map_err(|_| TransferError::Timeout(timeout))?
            .map_err(|e| TransferError::Connect(e.to_string()))?;

        let login = async {
            stream
                .login(&self.config.user, &self.config.password)
                .await?;
            stream.transfer_type(FileType::Binary).await
        };
        match tokio::time::timeout(timeout, login).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(TransferError::Connect(e.to_string())),
            Err(_) => return Err(TransferError::Timeout(timeout)),
        }

        tracing::debug!(host = %self.config.host, "FTP session opened");
        Ok(Box::new(FtpSession { stream }))
    }
}

/// A live FTP control connection.
pub struct FtpSession {
    stream: FtpStream,
}

#[async_trait]
impl TransferSession for FtpSession {
    async fn cwd(&mut self, path: &str) -> Result<(), TransferError> {
        self.stream.cwd(path).await.map_err(classify)
    }

    async fn list(&mut self) -> Result<Vec<String>, TransferError> {
        let entries = self.stream.nlst(None).await.map_err(classify)?;
        Ok(entries.iter().map(|e| bare_name(e).to_string()).collect())
    }

    async fn size(&mut self, name: &str) -> Result<Option<u64>, TransferError> {
        let size = self.stream.size(name).await.map_err(classify)?;
        Ok(size.map(|s| s as u64))
    }

    async fn retrieve(&mut self, name: &str) -> Result<Vec<u8>, TransferError> {
        let cursor = self.stream.simple_retr(name).await.map_err(classify)?;
        Ok(cursor.into_inner())
    }

    async fn noop(&mut self) -> Result<(), TransferError> {
        self.stream.noop().await.map_err(classify)
    }

    async fn quit(&mut self) {
        if let Err(e) = self.stream.quit().await {
            tracing::debug!(error = %e, "FTP quit failed");
        }
    }
}

/// Map an FTP error onto the transport-neutral taxonomy.
///
/// Permanent "file unavailable" replies (550) mean the path is absent,
/// not that the server is unhealthy.
fn classify(e: FtpError) -> TransferError {
    match e {
        FtpError::ConnectionError(io) => TransferError::Io(io),
        FtpError::InvalidResponse(msg) if msg.contains("550") => TransferError::NotFound(msg),
        FtpError::InvalidResponse(msg) if msg.starts_with("421") || msg.contains(" 421 ") => {
            TransferError::Connect(msg)
        }
        other => TransferError::Protocol(other.to_string()),
    }
}

/// `NLST` may return names relative to the cwd or full paths.
fn bare_name(entry: &str) -> &str {
    let entry = entry.trim_end_matches(['\r', '\n']);
    entry.rsplit('/').next().unwrap_or(entry)
}
