//! Pass lifecycle.
//!
//! A pass moves through
//! `received → lock_acquired → resolving_inventory → transferring → writing → completed`,
//! and can leave early to `aborted_no_lock` (only from `received`) or
//! `failed` (from any non-terminal phase).
//!
//! [`PassStatus`] is the coarse status stored on the audit record;
//! [`PassPhase`] is the fine-grained state machine position.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Position of a pass in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassPhase {
    Received,
    LockAcquired,
    ResolvingInventory,
    Transferring,
    Writing,
    Completed,
    AbortedNoLock,
    Failed,
}

impl PassPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::LockAcquired => "lock_acquired",
            Self::ResolvingInventory => "resolving_inventory",
            Self::Transferring => "transferring",
            Self::Writing => "writing",
            Self::Completed => "completed",
            Self::AbortedNoLock => "aborted_no_lock",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::AbortedNoLock | Self::Failed)
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(self, next: PassPhase) -> bool {
        use PassPhase::*;
        match (self, next) {
            (Received, LockAcquired | AbortedNoLock) => true,
            (LockAcquired, ResolvingInventory) => true,
            (ResolvingInventory, Transferring) => true,
            // A line with no candidate sailings has nothing to transfer.
            (ResolvingInventory, Completed) => true,
            (Transferring, Writing) => true,
            (Writing, Completed) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Coarse audit status corresponding to this phase.
    pub fn status(self) -> PassStatus {
        match self {
            Self::Received => PassStatus::Received,
            Self::LockAcquired
            | Self::ResolvingInventory
            | Self::Transferring
            | Self::Writing => PassStatus::Processing,
            Self::Completed => PassStatus::Completed,
            Self::AbortedNoLock => PassStatus::AbortedNoLock,
            Self::Failed => PassStatus::Failed,
        }
    }
}

impl std::fmt::Display for PassPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status stored on the durable audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassStatus {
    Received,
    Processing,
    Completed,
    Failed,
    AbortedNoLock,
    /// Not started: the operator pause flag was set at receive time.
    Paused,
    /// Not started: no line id could be derived from the notification.
    Ignored,
}

impl PassStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::AbortedNoLock => "aborted_no_lock",
            Self::Paused => "paused",
            Self::Ignored => "ignored",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "received" => Ok(Self::Received),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "aborted_no_lock" => Ok(Self::AbortedNoLock),
            "paused" => Ok(Self::Paused),
            "ignored" => Ok(Self::Ignored),
            other => Err(CoreError::Validation(format!(
                "Unknown pass status '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for PassStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
