//! Background bridge from the [`EventBus`](crate::bus::EventBus) to an
//! outbound [`Notifier`].
//!
//! Each delivery is spawned as its own task so a slow or failing webhook
//! never holds up the receive loop. Without a notifier the forwarder only
//! logs a one-line summary per event.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::bus::PlatformEvent;
use crate::delivery::Notifier;

/// Background service that forwards sync events to an external channel.
pub struct NotificationForwarder;

impl NotificationForwarder {
    /// Run the forwarding loop until the bus is dropped.
    pub async fn run(
        notifier: Option<Arc<dyn Notifier>>,
        mut receiver: broadcast::Receiver<PlatformEvent>,
    ) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    tracing::info!(
                        event_type = %event.event_type,
                        pass_id = ?event.pass_id,
                        line_id = ?event.line_id,
                        payload = %event.payload,
                        "Sync event"
                    );
                    if let Some(notifier) = &notifier {
                        let notifier = Arc::clone(notifier);
                        tokio::spawn(async move {
                            if let Err(e) = notifier.notify(&event).await {
                                tracing::warn!(
                                    event_type = %event.event_type,
                                    error = %e,
                                    "Dropping undeliverable sync notification"
                                );
                            }
                        });
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Notification forwarder lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, notification forwarder shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::bus::{EventBus, EVENT_PASS_COMPLETED, EVENT_PASS_FAILED};
    use crate::delivery::slack::WebhookError;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for Recorder {
        async fn notify(&self, event: &PlatformEvent) -> Result<(), WebhookError> {
            self.seen.lock().unwrap().push(event.event_type.clone());
            if event.event_type == EVENT_PASS_FAILED {
                return Err(WebhookError::HttpStatus(500));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn forwards_every_event_and_stops_on_close() {
        let bus = EventBus::default();
        let recorder = Arc::new(Recorder::default());
        let handle = tokio::spawn(NotificationForwarder::run(
            Some(recorder.clone() as Arc<dyn Notifier>),
            bus.subscribe(),
        ));

        bus.publish(PlatformEvent::new(EVENT_PASS_FAILED));
        bus.publish(PlatformEvent::new(EVENT_PASS_COMPLETED));
        drop(bus);
        handle.await.unwrap();

        // Deliveries run on their own tasks; give them a moment to land.
        for _ in 0..50 {
            if recorder.seen.lock().unwrap().len() == 2 {
                break;
            }
            tokio::task::yield_now().await;
        }
        let mut seen = recorder.seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec![EVENT_PASS_COMPLETED, EVENT_PASS_FAILED]);
    }

    #[tokio::test]
    async fn runs_without_notifier() {
        let bus = EventBus::default();
        let handle = tokio::spawn(NotificationForwarder::run(None, bus.subscribe()));
        bus.publish(PlatformEvent::new(EVENT_PASS_COMPLETED));
        drop(bus);
        handle.await.unwrap();
    }
}
