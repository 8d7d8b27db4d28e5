//! Slack-compatible incoming-webhook delivery with bounded retry.
//!
//! [`SlackDelivery`] renders a [`PlatformEvent`] as a block message
//! (header, summary, divider, error sample, context) and POSTs it to the
//! configured webhook URL. Failed attempts are retried twice (1 s, 2 s).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::bus::{PlatformEvent, EVENT_PASS_ABORTED, EVENT_PASS_COMPLETED, EVENT_PASS_FAILED};
use crate::delivery::Notifier;

/// Backoff before each retry.
const RETRY_DELAYS_SECS: [u64; 2] = [1, 2];

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Max error entries rendered into the message body.
const MAX_RENDERED_ERRORS: usize = 5;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// Network, DNS, or timeout failure.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

// ---------------------------------------------------------------------------
// SlackDelivery
// ---------------------------------------------------------------------------

/// Delivers sync events to a Slack incoming webhook.
pub struct SlackDelivery {
    client: reqwest::Client,
    webhook_url: String,
}

impl SlackDelivery {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            client,
            webhook_url: webhook_url.into(),
        }
    }

    /// Deliver one event, retrying with backoff. Returns the last error if
    /// every attempt failed.
    pub async fn deliver(&self, event: &PlatformEvent) -> Result<(), WebhookError> {
        let message = render_message(event);

        for (attempt, delay_secs) in RETRY_DELAYS_SECS.iter().enumerate() {
            match self.try_send(&message).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        event_type = %event.event_type,
                        error = %e,
                        "Slack delivery attempt failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
                }
            }
        }

        self.try_send(&message).await.inspect_err(|e| {
            tracing::error!(
                event_type = %event.event_type,
                error = %e,
                "Slack delivery failed after all retries"
            );
        })
    }

    async fn try_send(&self, message: &Value) -> Result<(), WebhookError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(message)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(WebhookError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for SlackDelivery {
    async fn notify(&self, event: &PlatformEvent) -> Result<(), WebhookError> {
        self.deliver(event).await
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Build the Slack block message for an event.
pub fn render_message(event: &PlatformEvent) -> Value {
    let p = &event.payload;
    let line = event
        .line_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "?".to_string());

    let title = match event.event_type.as_str() {
        EVENT_PASS_COMPLETED => format!("Pricing sync completed for line {line}"),
        EVENT_PASS_FAILED => format!("Pricing sync failed for line {line}"),
        EVENT_PASS_ABORTED => format!("Pricing sync skipped for line {line} (lock held)"),
        other => format!("{other} (line {line})"),
    };

    let rate = p
        .get("success_rate")
        .and_then(Value::as_f64)
        .map(|r| format!("{:.1}%", r * 100.0))
        .unwrap_or_else(|| "n/a".to_string());

    let summary = format!(
        "*Attempted:* {}  *Succeeded:* {}  *Failed:* {}\n\
         *Missing files:* {}  *Corrupted:* {}  *Success rate:* {rate}",
        count(p, "attempted"),
        count(p, "succeeded"),
        count(p, "failed"),
        count(p, "skipped_missing"),
        count(p, "corrupted"),
    );

    let mut blocks = vec![
        json!({
            "type": "header",
            "text": {"type": "plain_text", "text": title, "emoji": true}
        }),
        json!({
            "type": "section",
            "text": {"type": "mrkdwn", "text": summary}
        }),
    ];

    if let Some(detail) = error_detail(p) {
        blocks.push(json!({"type": "divider"}));
        blocks.push(json!({
            "type": "section",
            "text": {"type": "mrkdwn", "text": format!("```{detail}```")}
        }));
    }

    let pass = event
        .pass_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    blocks.push(json!({
        "type": "context",
        "elements": [{
            "type": "mrkdwn",
            "text": format!("pass `{pass}` | {}", event.timestamp.to_rfc3339())
        }]
    }));

    json!({ "text": title, "blocks": blocks })
}

fn count(payload: &Value, key: &str) -> u64 {
    payload.get(key).and_then(Value::as_u64).unwrap_or(0)
}

/// Pass-level error first, then up to [`MAX_RENDERED_ERRORS`] item errors.
fn error_detail(payload: &Value) -> Option<String> {
    let mut lines = Vec::new();
    if let Some(error) = payload.get("error").and_then(Value::as_str) {
        lines.push(error.to_string());
    }
    if let Some(errors) = payload.get("errors").and_then(Value::as_array) {
        for e in errors.iter().take(MAX_RENDERED_ERRORS) {
            lines.push(format!(
                "{} [{}] {}",
                e.get("cruise_code").and_then(Value::as_str).unwrap_or("?"),
                e.get("kind").and_then(Value::as_str).unwrap_or("?"),
                e.get("message").and_then(Value::as_str).unwrap_or(""),
            ));
        }
        if errors.len() > MAX_RENDERED_ERRORS {
            lines.push(format!("... and {} more", errors.len() - MAX_RENDERED_ERRORS));
        }
    }
    (!lines.is_empty()).then(|| lines.join("\n"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn completed_event(errors: Value) -> PlatformEvent {
        PlatformEvent::new(EVENT_PASS_COMPLETED)
            .with_pass(Uuid::nil())
            .with_line(22)
            .with_payload(json!({
                "attempted": 10,
                "succeeded": 8,
                "failed": 1,
                "skipped_missing": 1,
                "corrupted": 0,
                "success_rate": 0.8,
                "errors": errors,
            }))
    }

    #[test]
    fn clean_pass_has_no_error_block() {
        let msg = render_message(&completed_event(json!([])));
        let blocks = msg["blocks"].as_array().unwrap();

        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0]["type"], "header");
        assert_eq!(
            blocks[0]["text"]["text"],
            "Pricing sync completed for line 22"
        );
        let summary = blocks[1]["text"]["text"].as_str().unwrap();
        assert!(summary.contains("*Succeeded:* 8"));
        assert!(summary.contains("80.0%"));
        assert_eq!(blocks[2]["type"], "context");
    }

    #[test]
    fn item_errors_render_as_code_block() {
        let errors: Vec<Value> = (0..7)
            .map(|i| {
                json!({
                    "sailing_id": i,
                    "cruise_code": format!("C{i}"),
                    "kind": "timeout",
                    "message": "download timed out"
                })
            })
            .collect();
        let msg = render_message(&completed_event(Value::Array(errors)));
        let blocks = msg["blocks"].as_array().unwrap();

        assert_eq!(blocks[2]["type"], "divider");
        let detail = blocks[3]["text"]["text"].as_str().unwrap();
        assert!(detail.starts_with("```C0 [timeout]"));
        assert!(detail.contains("... and 2 more"));
        assert!(!detail.contains("C5 "));
    }

    #[test]
    fn failed_pass_shows_pass_error() {
        let event = PlatformEvent::new(EVENT_PASS_FAILED)
            .with_line(7)
            .with_payload(json!({"error": "inventory query failed"}));
        let msg = render_message(&event);

        assert_eq!(msg["text"], "Pricing sync failed for line 7");
        let blocks = msg["blocks"].as_array().unwrap();
        assert!(blocks[3]["text"]["text"]
            .as_str()
            .unwrap()
            .contains("inventory query failed"));
        assert!(blocks[1]["text"]["text"].as_str().unwrap().contains("n/a"));
    }

    #[test]
    fn webhook_error_display() {
        assert_eq!(
            WebhookError::HttpStatus(502).to_string(),
            "Webhook returned HTTP 502"
        );
    }
}
