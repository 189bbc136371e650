use std::time::Duration;

use anyhow::{Context, bail};
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::State;
use crate::actors::messages::ViewAlertEvent;
use crate::config::Discord;

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Default)]
pub struct MessageBuilder {
    content: Option<String>,
    embeds: Vec<Embed>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: impl ToString) -> Self {
        self.content = Some(content.to_string());
        self
    }

    pub fn add_embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn build(self) -> Message {
        Message {
            content: self.content,
            embeds: self.embeds,
        }
    }
}

fn state_color(state: State) -> u32 {
    match state {
        State::Error => 15158332,   // Red
        State::Warning => 15105570, // Orange
        State::Ok => 3066993,       // Green
        State::Paused => 9807270,   // Grey
    }
}

fn state_emoji(state: State) -> &'static str {
    match state {
        State::Error => "🔴",
        State::Warning => "🟠",
        State::Ok => "✅",
        State::Paused => "⏸️",
    }
}

#[derive(Debug, Clone)]
pub struct DiscordManager {
    client: Client,
    timeout: Duration,
}

impl DiscordManager {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn build_view_embed(&self, event: &ViewAlertEvent) -> Embed {
        let view = &event.view;

        let (title, description) = if event.current.is_failing() {
            (
                format!(
                    "{} View {}",
                    state_emoji(event.current),
                    event.current.as_str().to_uppercase()
                ),
                format!(
                    "View **{}** went from {} to **{}**",
                    view.name,
                    event.previous.as_str().to_uppercase(),
                    event.current.as_str().to_uppercase()
                ),
            )
        } else {
            (
                format!("{} View Recovered", state_emoji(event.current)),
                format!(
                    "View **{}** is back to {}",
                    view.name,
                    event.current.as_str().to_uppercase()
                ),
            )
        };

        Embed {
            title: Some(title),
            description: Some(description),
            color: Some(state_color(event.current)),
            fields: vec![
                EmbedField {
                    name: "Previous".to_string(),
                    value: event.previous.as_str().to_uppercase(),
                    inline: true,
                },
                EmbedField {
                    name: "Current".to_string(),
                    value: event.current.as_str().to_uppercase(),
                    inline: true,
                },
                EmbedField {
                    name: "Incident".to_string(),
                    value: format!("#{}", view.incident_nbr),
                    inline: true,
                },
            ],
            footer: Some(EmbedFooter {
                text: format!("View: {} | pattern: {}", view.name, view.pattern),
            }),
            timestamp: Some(event.timestamp.to_rfc3339()),
        }
    }

    /// Build the full message for a view alert, mentioning `user_id` if set
    pub fn build_view_message(&self, discord: &Discord, event: &ViewAlertEvent) -> Message {
        let mut message_builder = MessageBuilder::new().add_embed(self.build_view_embed(event));
        if let Some(user_id) = &discord.user_id {
            message_builder = message_builder.content(format!(
                "{} View: `{}` <@{user_id}>",
                state_emoji(event.current),
                event.view.name
            ));
        }
        message_builder.build()
    }

    #[instrument(skip(self, discord, message))]
    pub async fn send_message(&self, discord: &Discord, message: &Message) -> anyhow::Result<()> {
        let response = self
            .client
            .post(&discord.url)
            .timeout(self.timeout)
            .json(message)
            .send()
            .await
            .context("failed to send Discord message")?;

        let status = response.status();
        if !status.is_success() {
            if let Ok(error_text) = response.text().await {
                error!("Discord API error response: {}", error_text);
            }
            bail!("Discord message failed with status: {}", status);
        }

        info!("Successfully sent Discord message");
        Ok(())
    }
}
