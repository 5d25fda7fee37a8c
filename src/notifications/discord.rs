//! Discord webhook transport.

use super::notifier::{NotificationTransportError, WebhookTransport};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

pub const DISCORD_API_BASE: &str = "https://discord.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    content: &'a str,
}

/// Posts messages to a Discord channel through an incoming webhook.
pub struct DiscordWebhook {
    client: Mutex<Option<Client>>,
    url: String,
}

impl DiscordWebhook {
    /// Create a webhook client for the given webhook id and token.
    pub fn new(webhook_id: &str, webhook_token: &str) -> Result<Self> {
        Self::with_base_url(DISCORD_API_BASE, webhook_id, webhook_token)
    }

    /// Same as [`DiscordWebhook::new`] against a different API host.
    pub fn with_base_url(base_url: &str, webhook_id: &str, webhook_token: &str) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let url = format!(
            "{}/api/webhooks/{}/{}",
            base_url.trim_end_matches('/'),
            webhook_id,
            webhook_token
        );

        Ok(Self {
            client: Mutex::new(Some(client)),
            url,
        })
    }

    fn client(&self) -> Option<Client> {
        self.client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl WebhookTransport for DiscordWebhook {
    async fn send(&self, text: &str) -> Result<(), NotificationTransportError> {
        let client = self.client().ok_or(NotificationTransportError::Closed)?;

        let response = client
            .post(&self.url)
            .json(&WebhookMessage { content: text })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationTransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }

    async fn close(&self) {
        let released = self
            .client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if released.is_some() {
            debug!("Discord webhook client released");
        }
    }
}
