//! The pricing synchronization engine.
//!
//! One pass per line: receive → lock → resolve inventory → transfer →
//! write → report, with the lock released on every exit path.
//!
//! - [`receiver::NotificationReceiver`]: normalizes notifications, writes
//!   the audit record, and spawns passes off the caller's path.
//! - [`lock::LineLockManager`]: per-line mutual exclusion with a TTL.
//! - [`resolver::InventoryResolver`]: capped, date-ordered candidate set.
//! - [`orchestrator::BatchOrchestrator`]: vessel grouping, chunking, and
//!   per-item failure isolation over the transfer pool.
//! - [`writer::PricingWriter`]: idempotent per-sailing pricing upsert.
//! - [`reporter::ResultReporter`]: audit record updates and events.
//! - [`engine::SyncEngine`]: the pass state machine tying them together.

pub mod config;
pub mod engine;
pub mod lock;
pub mod orchestrator;
pub mod receiver;
pub mod reporter;
pub mod resolver;
pub mod writer;

pub use config::{ExecutionStrategy, SyncConfig};
pub use engine::{PassError, PassReport, PassRequest, SyncEngine};
pub use lock::{LineLockManager, LockError, LockToken};
pub use orchestrator::{BatchOrchestrator, FetchedDocument, ProgressSink};
pub use receiver::{NotificationReceiver, Receipt};
pub use reporter::ResultReporter;
pub use resolver::{InventoryResolver, ResolvedInventory};
pub use writer::{DocumentWriter, PricingWriter, WriteError};
