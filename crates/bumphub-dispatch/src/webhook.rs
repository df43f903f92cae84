//! Webhook dispatcher — Discord-compatible embed delivery.
//!
//! `send` POSTs with `?wait=true` so the platform returns the created
//! message id; `edit` PATCHes `/messages/{id}`. Every call carries a
//! bounded timeout, and retryable failures (429, 5xx, connect errors)
//! back off exponentially up to `max_attempts`.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use bumphub_core::config::DispatchConfig;
use bumphub_core::error::{BumpHubError, Result};
use bumphub_core::types::Destination;

use crate::payload::{MessageId, NotificationPayload};

/// Outbound notification sink. One implementation talks to real
/// webhooks; tests swap in [`crate::MockDispatcher`].
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Create a new message at the destination, returning its id.
    async fn send(&self, dest: &Destination, payload: &NotificationPayload) -> Result<MessageId>;

    /// Edit a previously created message in place.
    async fn edit(
        &self,
        dest: &Destination,
        message_id: &MessageId,
        payload: &NotificationPayload,
    ) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct CreatedMessage {
    id: String,
}

/// Real webhook transport.
pub struct WebhookDispatcher {
    client: reqwest::Client,
    timeout: Duration,
    max_attempts: u32,
    backoff_base: Duration,
}

impl WebhookDispatcher {
    pub fn new(config: &DispatchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("BumpHub/0.3")
            .build()
            .map_err(|e| BumpHubError::Dispatch(format!("Client build: {e}")))?;
        Ok(Self {
            client,
            timeout: Duration::from_secs(config.timeout_secs),
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
        })
    }

    /// Run one request builder through the retry loop.
    async fn execute(
        &self,
        dest_id: &str,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let outcome = build().timeout(self.timeout).send().await;

            match outcome {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => {
                    let status = resp.status();
                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    let body = resp.text().await.unwrap_or_default();
                    if !retryable || attempt >= self.max_attempts {
                        return Err(BumpHubError::Dispatch(format!(
                            "{dest_id}: HTTP {status}: {body}"
                        )));
                    }
                    tracing::warn!(
                        "⚠️ Dispatch to {} got {} (attempt {}/{}), backing off",
                        dest_id,
                        status,
                        attempt,
                        self.max_attempts
                    );
                }
                Err(e) => {
                    if attempt >= self.max_attempts {
                        return Err(BumpHubError::Dispatch(format!("{dest_id}: {e}")));
                    }
                    tracing::warn!(
                        "⚠️ Dispatch to {} failed: {} (attempt {}/{}), backing off",
                        dest_id,
                        e,
                        attempt,
                        self.max_attempts
                    );
                }
            }

            let delay = self.backoff_base * 2u32.saturating_pow(attempt - 1);
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Dispatcher for WebhookDispatcher {
    async fn send(&self, dest: &Destination, payload: &NotificationPayload) -> Result<MessageId> {
        let url = format!("{}?wait=true", dest.webhook_url);
        let body = payload.to_embed_json();
        let resp = self
            .execute(&dest.id, || self.client.post(&url).json(&body))
            .await?;
        let created: CreatedMessage = resp
            .json()
            .await
            .map_err(|e| BumpHubError::Dispatch(format!("{}: bad create response: {e}", dest.id)))?;
        tracing::debug!("✅ Sent message {} to {}", created.id, dest.id);
        Ok(created.id)
    }

    async fn edit(
        &self,
        dest: &Destination,
        message_id: &MessageId,
        payload: &NotificationPayload,
    ) -> Result<()> {
        let url = format!("{}/messages/{}", dest.webhook_url, message_id);
        let body = payload.to_embed_json();
        self.execute(&dest.id, || self.client.patch(&url).json(&body))
            .await?;
        tracing::debug!("✅ Edited message {} at {}", message_id, dest.id);
        Ok(())
    }
}
