//! Per-sailing document retrieval with failure classification.
//!
//! Directory resolution tries candidate directories in order and lists the
//! first one that exists exactly once; documents absent from that listing
//! are reported missing without a download attempt. Each download runs
//! under a hard timeout, then passes the structural sanity check before it
//! is deserialized.

use std::collections::HashSet;
use std::time::Duration;

use cruisesync_core::integrity::{check_structure, StructureError};
use cruisesync_core::outcome::FailureKind;
use cruisesync_core::pricing::PricingDocument;

use crate::breaker::CircuitOpen;
use crate::error::TransferError;
use crate::pool::PooledSession;

/// Why a single document could not be fetched and parsed.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("no candidate directory exists ({tried} tried)")]
    PathNotFound { tried: usize },

    #[error("file {0} not found")]
    FileNotFound(String),

    #[error("corrupted document {file}: {source}")]
    Corrupted {
        file: String,
        #[source]
        source: StructureError,
    },

    #[error("invalid document {file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("download of {file} timed out after {timeout:?}")]
    Timeout { file: String, timeout: Duration },

    #[error(transparent)]
    CircuitOpen(CircuitOpen),

    #[error("transfer failed: {0}")]
    Transfer(TransferError),
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::PathNotFound { .. } => FailureKind::PathNotFound,
            Self::FileNotFound(_) => FailureKind::FileNotFound,
            Self::Corrupted { .. } => FailureKind::Corrupted,
            Self::Parse { .. } => FailureKind::ParseError,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::CircuitOpen(_) => FailureKind::CircuitOpen,
            Self::Transfer(TransferError::Timeout(_)) => FailureKind::Timeout,
            Self::Transfer(_) => FailureKind::Connection,
        }
    }
}

impl From<TransferError> for FetchError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::CircuitOpen(open) => Self::CircuitOpen(open),
            other => Self::Transfer(other),
        }
    }
}

/// A resolved vessel directory and its listing.
#[derive(Debug, Clone)]
pub struct RemoteDirectory {
    pub path: String,
    names: HashSet<String>,
}

impl RemoteDirectory {
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Downloads and parses pricing documents.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    timeout: Duration,
}

impl FileFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// `cwd` into the first candidate that exists and list it.
    ///
    /// A missing candidate moves on to the next one; any other failure is
    /// returned immediately.
    pub async fn resolve_directory(
        &self,
        session: &mut PooledSession,
        candidates: &[String],
    ) -> Result<RemoteDirectory, FetchError> {
        for path in candidates {
            match session.cwd(path).await {
                Ok(()) => {
                    let names = session.list().await?.into_iter().collect();
                    return Ok(RemoteDirectory {
                        path: path.clone(),
                        names,
                    });
                }
                Err(TransferError::NotFound(_)) => {
                    tracing::trace!(path = %path, "Candidate directory missing");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(FetchError::PathNotFound {
            tried: candidates.len(),
        })
    }

    /// Fetch `file` from the session's working directory (`dir`) and parse it.
    pub async fn fetch_document(
        &self,
        session: &mut PooledSession,
        dir: &RemoteDirectory,
        file: &str,
    ) -> Result<PricingDocument, FetchError> {
        if !dir.contains(file) {
            return Err(FetchError::FileNotFound(file.to_string()));
        }

        match session.size(file).await {
            Ok(Some(0)) => {
                return Err(FetchError::Corrupted {
                    file: file.to_string(),
                    source: StructureError::Empty,
                })
            }
            Ok(_) => {}
            Err(TransferError::NotFound(_)) => {
                return Err(FetchError::FileNotFound(file.to_string()))
            }
            // Some servers refuse SIZE in ASCII mode or at all.
            Err(TransferError::Protocol(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let bytes = match tokio::time::timeout(self.timeout, session.retrieve(file)).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(TransferError::NotFound(_))) => {
                return Err(FetchError::FileNotFound(file.to_string()))
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                session.mark_broken();
                return Err(FetchError::Timeout {
                    file: file.to_string(),
                    timeout: self.timeout,
                });
            }
        };

        parse_document(file, &bytes)
    }
}

/// Sanity-check then deserialize a downloaded payload.
pub fn parse_document(file: &str, bytes: &[u8]) -> Result<PricingDocument, FetchError> {
    if let Err(source) = check_structure(bytes) {
        tracing::warn!(file, bytes = bytes.len(), reason = %source, "Corrupted pricing document");
        return Err(FetchError::Corrupted {
            file: file.to_string(),
            source,
        });
    }
    PricingDocument::from_slice(bytes).map_err(|source| FetchError::Parse {
        file: file.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;

    use super::*;
    use crate::config::{BreakerConfig, PoolConfig};
    use crate::memory::MemoryEndpoint;
    use crate::pool::TransferPool;

    const DIR: &str = "/isell_json/2025/05/3/1234";
    const VALID: &[u8] = br#"{"cruiseid": 100, "currency": "usd", "cheapest": {"combined": {"inside": 799}}}"#;

    fn pool(endpoint: &Arc<MemoryEndpoint>) -> Arc<TransferPool> {
        TransferPool::new(
            endpoint.factory(),
            PoolConfig::default(),
            BreakerConfig::default(),
        )
    }

    fn candidates() -> Vec<String> {
        vec![
            "/isell_json/2025/06/3/1234".to_string(),
            DIR.to_string(),
            "/2025/05/3/1234".to_string(),
        ]
    }

    #[tokio::test]
    async fn resolves_first_existing_candidate() {
        let endpoint = MemoryEndpoint::new();
        endpoint.put_file(DIR, "100.json", VALID.to_vec());
        endpoint.put_file("/2025/05/3/1234", "999.json", VALID.to_vec());
        let pool = pool(&endpoint);
        let fetcher = FileFetcher::new(Duration::from_secs(30));

        let mut session = pool.acquire().await.unwrap();
        let dir = fetcher
            .resolve_directory(&mut session, &candidates())
            .await
            .unwrap();
        assert_eq!(dir.path, DIR);
        assert!(dir.contains("100.json"));
        assert!(!dir.contains("999.json"));
    }

    #[tokio::test]
    async fn no_candidate_is_path_not_found() {
        let endpoint = MemoryEndpoint::new();
        let pool = pool(&endpoint);
        let fetcher = FileFetcher::new(Duration::from_secs(30));

        let mut session = pool.acquire().await.unwrap();
        let err = fetcher
            .resolve_directory(&mut session, &candidates())
            .await
            .unwrap_err();
        assert_matches!(err, FetchError::PathNotFound { tried: 3 });
        assert_eq!(err.kind(), FailureKind::PathNotFound);
    }

    #[tokio::test]
    async fn fetches_and_parses_document() {
        let endpoint = MemoryEndpoint::new();
        endpoint.put_file(DIR, "100.json", VALID.to_vec());
        let pool = pool(&endpoint);
        let fetcher = FileFetcher::new(Duration::from_secs(30));

        let mut session = pool.acquire().await.unwrap();
        let dir = fetcher.resolve_directory(&mut session, &candidates()).await.unwrap();
        let doc = fetcher.fetch_document(&mut session, &dir, "100.json").await.unwrap();
        assert_eq!(doc.currency.as_deref(), Some("usd"));
    }

    #[tokio::test]
    async fn missing_file_is_classified_without_download() {
        let endpoint = MemoryEndpoint::new();
        endpoint.put_file(DIR, "100.json", VALID.to_vec());
        let pool = pool(&endpoint);
        let fetcher = FileFetcher::new(Duration::from_secs(30));

        let mut session = pool.acquire().await.unwrap();
        let dir = fetcher.resolve_directory(&mut session, &candidates()).await.unwrap();
        let err = fetcher
            .fetch_document(&mut session, &dir, "101.json")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::FileNotFound);
        assert_eq!(endpoint.retrieve_count(), 0);
    }

    #[tokio::test]
    async fn corrupted_payloads_never_reach_the_parser() {
        let endpoint = MemoryEndpoint::new();
        endpoint.put_file(DIR, "trunc.json", br#"{"prices": {"A": {"B": 1}"#.to_vec());
        endpoint.put_file(DIR, "bytes.json", br#"{"0":"{","1":"\""}"#.to_vec());
        endpoint.put_file(DIR, "empty.json", Vec::new());
        let pool = pool(&endpoint);
        let fetcher = FileFetcher::new(Duration::from_secs(30));

        let mut session = pool.acquire().await.unwrap();
        let dir = fetcher.resolve_directory(&mut session, &candidates()).await.unwrap();
        for name in ["trunc.json", "bytes.json", "empty.json"] {
            let err = fetcher.fetch_document(&mut session, &dir, name).await.unwrap_err();
            assert_matches!(err, FetchError::Corrupted { .. }, "{name}");
            assert_eq!(err.kind(), FailureKind::Corrupted);
        }
        // The empty file is caught by its size before download.
        assert_eq!(endpoint.retrieve_count(), 2);
    }

    #[tokio::test]
    async fn well_formed_but_invalid_is_parse_error() {
        let endpoint = MemoryEndpoint::new();
        endpoint.put_file(DIR, "bad.json", br#"{"cheapest": {"combined": {"inside": -5}}}"#.to_vec());
        let pool = pool(&endpoint);
        let fetcher = FileFetcher::new(Duration::from_secs(30));

        let mut session = pool.acquire().await.unwrap();
        let dir = fetcher.resolve_directory(&mut session, &candidates()).await.unwrap();
        let err = fetcher.fetch_document(&mut session, &dir, "bad.json").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::ParseError);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_download_times_out_and_breaks_session() {
        let endpoint = MemoryEndpoint::new();
        endpoint.put_file(DIR, "100.json", VALID.to_vec());
        endpoint.set_retrieve_delay(Some(Duration::from_secs(120)));
        let pool = pool(&endpoint);
        let fetcher = FileFetcher::new(Duration::from_secs(30));

        let mut session = pool.acquire().await.unwrap();
        let dir = fetcher.resolve_directory(&mut session, &candidates()).await.unwrap();
        let err = fetcher.fetch_document(&mut session, &dir, "100.json").await.unwrap_err();
        assert_matches!(err, FetchError::Timeout { .. });
        assert_eq!(err.kind(), FailureKind::Timeout);
        assert!(session.is_broken());

        pool.release(session);
        assert_eq!(pool.snapshot().open, 0);
        assert_eq!(pool.breaker().consecutive_failures(), 1);
    }

    #[tokio::test]
    async fn connection_loss_is_classified() {
        let endpoint = MemoryEndpoint::new();
        endpoint.put_file(DIR, "100.json", VALID.to_vec());
        endpoint.fail_retrieve("100.json");
        let pool = pool(&endpoint);
        let fetcher = FileFetcher::new(Duration::from_secs(30));

        let mut session = pool.acquire().await.unwrap();
        let dir = fetcher.resolve_directory(&mut session, &candidates()).await.unwrap();
        let err = fetcher.fetch_document(&mut session, &dir, "100.json").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Connection);
    }
}
