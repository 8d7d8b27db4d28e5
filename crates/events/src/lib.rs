//! Pricing-sync event bus and operational notification delivery.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PlatformEvent`]: the event envelope published at the end of a pass.
//! - [`delivery`]: outbound channels (Slack-compatible incoming webhook).
//! - [`NotificationForwarder`]: background task bridging bus → delivery.

pub mod bus;
pub mod delivery;
pub mod forwarder;

pub use bus::{EventBus, PlatformEvent};
pub use delivery::slack::{SlackDelivery, WebhookError};
pub use delivery::Notifier;
pub use forwarder::NotificationForwarder;
