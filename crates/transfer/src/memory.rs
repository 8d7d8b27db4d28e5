//! In-memory transfer endpoint for tests.
//!
//! Directories and files live in a map; reachability, per-file failures,
//! and download latency can be toggled to exercise the pool, breaker, and
//! fetcher without a network.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransferError;
use crate::session::{SessionFactory, TransferSession};

#[derive(Default)]
pub struct MemoryEndpoint {
    /// directory path → (file name → bytes)
    dirs: Mutex<HashMap<String, HashMap<String, Vec<u8>>>>,
    failing_files: Mutex<HashSet<String>>,
    reachable: AtomicBool,
    /// Control-channel calls never answer, like a half-open connection.
    stalled: AtomicBool,
    /// Sessions opened before this generation fail their liveness probe.
    generation: AtomicU64,
    connects: AtomicUsize,
    retrieves: AtomicUsize,
    retrieve_delay: Mutex<Option<Duration>>,
}

impl MemoryEndpoint {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            reachable: AtomicBool::new(true),
            ..Default::default()
        })
    }

    pub fn factory(self: &Arc<Self>) -> Arc<dyn SessionFactory> {
        Arc::new(MemoryFactory {
            endpoint: Arc::clone(self),
        })
    }

    /// Create `dir` (if needed) and store `name` in it.
    pub fn put_file(&self, dir: &str, name: &str, bytes: Vec<u8>) {
        self.dirs
            .lock()
            .unwrap()
            .entry(normalize(dir))
            .or_default()
            .insert(name.to_string(), bytes);
    }

    /// Make downloads of `name` fail with an I/O error.
    pub fn fail_retrieve(&self, name: &str) {
        self.failing_files.lock().unwrap().insert(name.to_string());
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    pub fn set_retrieve_delay(&self, delay: Option<Duration>) {
        *self.retrieve_delay.lock().unwrap() = delay;
    }

    /// Invalidate every open session, as a server-side idle timeout would.
    pub fn expire_sessions(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn retrieve_count(&self) -> usize {
        self.retrieves.load(Ordering::SeqCst)
    }
}

fn normalize(dir: &str) -> String {
    format!("/{}", dir.trim_matches('/'))
}

struct MemoryFactory {
    endpoint: Arc<MemoryEndpoint>,
}

#[async_trait]
impl SessionFactory for MemoryFactory {
    async fn connect(&self) -> Result<Box<dyn TransferSession>, TransferError> {
        self.endpoint.connects.fetch_add(1, Ordering::SeqCst);
        if !self.endpoint.reachable.load(Ordering::SeqCst) {
            return Err(TransferError::Connect("connection refused".into()));
        }
        Ok(Box::new(MemorySession {
            endpoint: Arc::clone(&self.endpoint),
            generation: self.endpoint.generation.load(Ordering::SeqCst),
            cwd: None,
        }))
    }
}

struct MemorySession {
    endpoint: Arc<MemoryEndpoint>,
    generation: u64,
    cwd: Option<String>,
}

impl MemorySession {
    async fn stall_if_half_open(&self) {
        if self.endpoint.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }

    fn check_alive(&self) -> Result<(), TransferError> {
        let current = self.endpoint.generation.load(Ordering::SeqCst);
        if !self.endpoint.reachable.load(Ordering::SeqCst) || self.generation != current {
            return Err(TransferError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            )));
        }
        Ok(())
    }

    fn current_files(&self) -> Result<HashMap<String, Vec<u8>>, TransferError> {
        let cwd = self
            .cwd
            .as_deref()
            .ok_or_else(|| TransferError::Protocol("no working directory".into()))?;
        self.endpoint
            .dirs
            .lock()
            .unwrap()
            .get(cwd)
            .cloned()
            .ok_or_else(|| TransferError::NotFound(cwd.to_string()))
    }
}

#[async_trait]
impl TransferSession for MemorySession {
    async fn cwd(&mut self, path: &str) -> Result<(), TransferError> {
        self.stall_if_half_open().await;
        self.check_alive()?;
        let path = normalize(path);
        if !self.endpoint.dirs.lock().unwrap().contains_key(&path) {
            return Err(TransferError::NotFound(path));
        }
        self.cwd = Some(path);
        Ok(())
    }

    async fn list(&mut self) -> Result<Vec<String>, TransferError> {
        self.stall_if_half_open().await;
        self.check_alive()?;
        let mut names: Vec<String> = self.current_files()?.into_keys().collect();
        names.sort();
        Ok(names)
    }

    async fn size(&mut self, name: &str) -> Result<Option<u64>, TransferError> {
        self.stall_if_half_open().await;
        self.check_alive()?;
        self.current_files()?
            .get(name)
            .map(|b| Some(b.len() as u64))
            .ok_or_else(|| TransferError::NotFound(name.to_string()))
    }

    async fn retrieve(&mut self, name: &str) -> Result<Vec<u8>, TransferError> {
        self.check_alive()?;
        self.endpoint.retrieves.fetch_add(1, Ordering::SeqCst);
        let delay = *self.endpoint.retrieve_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.endpoint.failing_files.lock().unwrap().contains(name) {
            return Err(TransferError::Io(std::io::Error::other("data connection lost")));
        }
        self.current_files()?
            .remove(name)
            .ok_or_else(|| TransferError::NotFound(name.to_string()))
    }

    async fn noop(&mut self) -> Result<(), TransferError> {
        self.stall_if_half_open().await;
        self.check_alive()
    }

    async fn quit(&mut self) {
        self.stall_if_half_open().await;
    }
}
