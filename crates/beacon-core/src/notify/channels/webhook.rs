//! Webhook transport used for the email and bot bridges
//!
//! Posts a JSON payload to a bridge service that owns the actual email or
//! chat delivery.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::Channel;
use crate::notify::render::RenderedMessage;

use super::ChannelTransport;

/// Default request timeout for bridge calls
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct WebhookPayload<'a> {
    user_id: i64,
    channel: Channel,
    #[serde(flatten)]
    message: &'a RenderedMessage,
}

/// Transport that POSTs rendered messages to a bridge URL
#[derive(Clone)]
pub struct WebhookChannel {
    channel: Channel,
    url: String,
    client: Client,
}

impl WebhookChannel {
    pub fn new(channel: Channel, url: &str) -> Self {
        Self::with_timeout(channel, url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(channel: Channel, url: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            channel,
            url: url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Build from an environment variable holding the bridge URL
    ///
    /// Returns None if the variable is unset or empty.
    pub fn from_env(channel: Channel, var: &str) -> Option<Self> {
        std::env::var(var)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(|url| Self::new(channel, &url))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChannelTransport for WebhookChannel {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, user_id: i64, message: &RenderedMessage) -> Result<()> {
        let payload = WebhookPayload {
            user_id,
            channel: self.channel,
            message,
        };

        let response = self.client.post(&self.url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Channel(format!(
                "{} bridge returned {}",
                self.channel, status
            )));
        }

        debug!(
            user_id,
            channel = self.channel.as_str(),
            notification_id = message.notification_id,
            "Webhook delivery accepted"
        );
        Ok(())
    }
}
