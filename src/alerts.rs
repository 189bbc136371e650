use std::time::Duration;

use anyhow::{Context, bail};
use reqwest::Client;
use serde::Serialize;
use tracing::{info, instrument};

use crate::actors::messages::ViewAlertEvent;
use crate::config::{Alert, Webhook};
use crate::discord::DiscordManager;

/// Upper bound for a single delivery
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Header marking requests sent by the hub
pub const WEBHOOK_HEADER: &str = "X-Pulsewatch";

/// Body of a webhook alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookPayload {
    pub name: String,
    pub from_state: String,
    pub to_state: String,
    pub incident_number: u64,
    pub timestamp: String,
}

impl From<&ViewAlertEvent> for WebhookPayload {
    fn from(event: &ViewAlertEvent) -> Self {
        Self {
            name: event.view.name.clone(),
            from_state: event.previous.as_str().to_uppercase(),
            to_state: event.current.as_str().to_uppercase(),
            incident_number: event.view.incident_nbr,
            timestamp: event.timestamp.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AlertManager {
    client: Client,
    discord_manager: DiscordManager,
}

impl Default for AlertManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertManager {
    pub fn new() -> Self {
        let client = Client::new();
        Self {
            discord_manager: DiscordManager::new(client.clone(), DELIVERY_TIMEOUT),
            client,
        }
    }

    /// Deliver one view transition to one alert target
    #[instrument(skip(self, alert, event), fields(view = %event.view.name))]
    pub async fn send_view_alert(
        &self,
        alert: &Alert,
        event: &ViewAlertEvent,
    ) -> anyhow::Result<()> {
        match alert {
            Alert::Discord(discord) => {
                let message = self.discord_manager.build_view_message(discord, event);
                self.discord_manager.send_message(discord, &message).await
            }
            Alert::Webhook(webhook) => self.send_webhook_alert(webhook, event).await,
        }
    }

    #[instrument(skip(self, webhook, event))]
    async fn send_webhook_alert(
        &self,
        webhook: &Webhook,
        event: &ViewAlertEvent,
    ) -> anyhow::Result<()> {
        info!("sending webhook alert to {}", webhook.url);

        let response = self
            .client
            .post(&webhook.url)
            .header(WEBHOOK_HEADER, "1")
            .timeout(DELIVERY_TIMEOUT)
            .json(&WebhookPayload::from(event))
            .send()
            .await
            .context("failed to post webhook")?;

        if !response.status().is_success() {
            bail!("webhook alert failed with status: {}", response.status());
        }

        info!("Successfully sent webhook alert");
        Ok(())
    }
}
