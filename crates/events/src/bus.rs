//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` between the pass runner
//! (publisher) and the notification forwarder (subscriber).

use chrono::{DateTime, Utc};
use cruisesync_core::types::DbId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// A pass finished its work (possibly with per-item failures).
pub const EVENT_PASS_COMPLETED: &str = "sync.pass.completed";

/// A pass failed as a whole.
pub const EVENT_PASS_FAILED: &str = "sync.pass.failed";

/// A pass did not start because the line lock was held.
pub const EVENT_PASS_ABORTED: &str = "sync.pass.aborted";

// ---------------------------------------------------------------------------
// PlatformEvent
// ---------------------------------------------------------------------------

/// An operational event emitted by the sync engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEvent {
    /// Dot-separated event name, e.g. `"sync.pass.completed"`.
    pub event_type: String,

    /// Pass the event belongs to.
    pub pass_id: Option<Uuid>,

    /// Internal line id the pass ran against.
    pub line_id: Option<DbId>,

    /// Event-specific data (counters, error sample, reason).
    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl PlatformEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            pass_id: None,
            line_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_pass(mut self, pass_id: Uuid) -> Self {
        self.pass_id = Some(pass_id);
        self
    }

    pub fn with_line(mut self, line_id: DbId) -> Self {
        self.line_id = Some(line_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out event bus.
pub struct EventBus {
    sender: broadcast::Sender<PlatformEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest un-consumed messages are dropped
    /// and slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers. Dropped silently when
    /// nobody is listening.
    pub fn publish(&self, event: PlatformEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
