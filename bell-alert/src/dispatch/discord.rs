//! Discord webhook transport.
//!
//! Executes `POST {base}/api/webhooks/{id}/{token}` with a single embed built
//! from the payload.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::{DeliveryTransport, DestinationEndpoint};
use crate::composer::AlertPayload;
use crate::error::DeliveryError;

/// Discord webhook delivery.
pub struct DiscordWebhookTransport {
    api_base: String,
    username: String,
    client: reqwest::Client,
}

impl DiscordWebhookTransport {
    pub fn new(api_base: impl Into<String>, username: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            username: username.into(),
            client,
        }
    }

    fn webhook_url(&self, destination: &DestinationEndpoint) -> String {
        format!(
            "{}/api/webhooks/{}/{}",
            self.api_base, destination.id, destination.token
        )
    }

    /// Build the webhook request body.
    pub fn build_body(&self, payload: &AlertPayload) -> Value {
        let fields: Vec<Value> = payload
            .fields
            .iter()
            .map(|f| json!({ "name": f.name, "value": f.value, "inline": f.inline }))
            .collect();

        let mut embed = json!({
            "title": payload.title,
            "description": payload.description,
            "color": payload.accent_color,
            "fields": fields,
            "footer": { "text": format!("ข้อมูลจาก {}", payload.source_attribution) },
            "timestamp": payload.generated_at.to_rfc3339(),
        });

        if let Some(url) = &payload.url {
            embed["url"] = json!(url);
        }
        if let Some(url) = &payload.thumbnail_url {
            embed["thumbnail"] = json!({ "url": url });
        }
        if let Some(url) = &payload.image_url {
            embed["image"] = json!({ "url": url });
        }

        json!({
            "username": self.username,
            "embeds": [embed],
        })
    }
}

/// Seconds to wait from a `Retry-After` header, if present.
fn retry_after_secs(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .map(|secs| secs.ceil() as u64)
}

#[async_trait]
impl DeliveryTransport for DiscordWebhookTransport {
    fn name(&self) -> &'static str {
        "discord_webhook"
    }

    async fn send(&self, payload: &AlertPayload, destination: &DestinationEndpoint) -> Result<(), DeliveryError> {
        debug!(destination = %destination.id, "Posting to Discord webhook");

        let response = self
            .client
            .post(self.webhook_url(destination))
            .json(&self.build_body(payload))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout
                } else {
                    // The webhook URL carries the token
                    DeliveryError::Network(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        match status.as_u16() {
            401 | 403 | 404 => Err(DeliveryError::Auth {
                status: status.as_u16(),
            }),
            429 => Err(DeliveryError::RateLimited {
                retry_after_secs: retry_after_secs(&response),
            }),
            code => {
                let body = response.text().await.unwrap_or_default();
                Err(DeliveryError::Http { status: code, body })
            }
        }
    }
}
