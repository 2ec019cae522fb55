//! Webhook payloads.

use serde::Serialize;

/// Embed sidebar color.
pub const EMBED_COLOR: u32 = 0x00c8_9b3c;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookEmbed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<WebhookField>,
}

/// Either plain text (`content`) or a list of embeds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WebhookMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<WebhookEmbed>,
}

impl WebhookMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: Some(content.into()), embeds: Vec::new() }
    }

    pub fn embed(embed: WebhookEmbed) -> Self {
        Self { content: None, embeds: vec![embed] }
    }
}
