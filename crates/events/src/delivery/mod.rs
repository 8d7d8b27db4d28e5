//! Outbound delivery channels for operational notifications.

pub mod slack;

use async_trait::async_trait;

use crate::bus::PlatformEvent;
use slack::WebhookError;

/// Something that can push an event outside the process.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &PlatformEvent) -> Result<(), WebhookError>;
}
