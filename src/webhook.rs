use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::domain::ports::AlertSink;
use crate::error::SyncError;

#[derive(Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

/// Posts `{"text": ...}` to a Slack-compatible incoming webhook.
pub struct WebhookClient {
    client: reqwest::Client,
    url: String,
    timeout_secs: u64,
}

impl WebhookClient {
    pub fn new(url: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("building webhook HTTP client")?;
        Ok(Self {
            client,
            url: url.to_string(),
            timeout_secs,
        })
    }
}

#[async_trait]
impl AlertSink for WebhookClient {
    async fn post(&self, message: &str) -> crate::error::Result<()> {
        debug!(url = %self.url, timeout_secs = self.timeout_secs, "posting alert to webhook");
        self.client
            .post(&self.url)
            .json(&WebhookPayload { text: message })
            .send()
            .await
            .map_err(|e| SyncError::AlertDeliveryFailed(format!("sending to webhook: {}", e)))?
            .error_for_status()
            .map_err(|e| SyncError::AlertDeliveryFailed(format!("webhook returned error status: {}", e)))?;

        Ok(())
    }
}
