//! Messaging-provider boundary: WhatsApp Business over the Graph API.
//!
//! Outbound: plain text messages and interactive button messages (the
//! platform caps buttons at 3 with titles of at most 20 characters, so
//! anything longer is trimmed here rather than rejected upstream).
//! Inbound: webhook payload parsing into `(from, text, profile name)`,
//! resolving button replies to their option id text.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::json;

use crate::config::WhatsAppConfig;
use crate::errors::{Error, Result};

/// Platform limit on interactive buttons per message.
const MAX_BUTTONS: usize = 3;
/// Platform limit on button title length, in characters.
const MAX_BUTTON_TITLE_CHARS: usize = 20;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One inbound message lifted out of a webhook payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Sender's WhatsApp identity (phone number)
    pub from: String,
    /// Message text, or the selected button id for button replies
    pub body: String,
    /// Sender's profile display name, if the payload carried one
    pub profile_name: Option<String>,
}

/// Narrow contract for the external messaging service.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Delivers a plain text message.
    async fn send_text(&self, to: &str, body: &str) -> Result<()>;

    /// Delivers a message with up to 3 tappable reply options.
    async fn send_buttons(&self, to: &str, body: &str, options: &[String]) -> Result<()>;
}

/// HTTP client for the WhatsApp Business Graph API.
pub struct WhatsAppClient {
    http: reqwest::Client,
    messages_url: String,
}

impl WhatsAppClient {
    /// Creates a client pointed at the configured phone number.
    pub fn new(config: &WhatsAppConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth =
            HeaderValue::from_str(&format!("Bearer {}", config.access_token)).map_err(|e| {
                Error::Config {
                    message: format!("invalid WhatsApp access token header: {e}"),
                }
            })?;
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config {
                message: format!("HTTP client build failed: {e}"),
            })?;

        let messages_url = format!(
            "{}/{}/{}/messages",
            config.api_url, config.api_version, config.phone_number_id
        );

        Ok(Self { http, messages_url })
    }

    async fn post(&self, payload: serde_json::Value) -> Result<()> {
        let response = self
            .http
            .post(&self.messages_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Delivery {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Delivery {
                message: format!("messaging provider returned {status}: {detail}"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Messenger for WhatsAppClient {
    async fn send_text(&self, to: &str, body: &str) -> Result<()> {
        self.post(json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": { "body": body },
        }))
        .await
    }

    async fn send_buttons(&self, to: &str, body: &str, options: &[String]) -> Result<()> {
        if options.is_empty() {
            return self.send_text(to, body).await;
        }

        let buttons: Vec<serde_json::Value> = options
            .iter()
            .take(MAX_BUTTONS)
            .map(|title| {
                let title: String = title.chars().take(MAX_BUTTON_TITLE_CHARS).collect();
                json!({
                    "type": "reply",
                    "reply": { "id": &title, "title": &title },
                })
            })
            .collect();

        self.post(json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": "interactive",
            "interactive": {
                "type": "button",
                "body": { "text": body },
                "action": { "buttons": buttons },
            },
        }))
        .await
    }
}

#[derive(Deserialize)]
struct WebhookPayload {
    #[serde(default)]
    entry: Vec<WebhookEntry>,
}

#[derive(Deserialize)]
struct WebhookEntry {
    #[serde(default)]
    changes: Vec<WebhookChange>,
}

#[derive(Deserialize)]
struct WebhookChange {
    #[serde(default)]
    value: WebhookValue,
}

#[derive(Deserialize, Default)]
struct WebhookValue {
    #[serde(default)]
    messages: Vec<WebhookMessage>,
    #[serde(default)]
    contacts: Vec<WebhookContact>,
}

#[derive(Deserialize)]
struct WebhookMessage {
    from: String,
    #[serde(rename = "type")]
    message_type: String,
    #[serde(default)]
    text: Option<WebhookText>,
    #[serde(default)]
    interactive: Option<WebhookInteractive>,
}

#[derive(Deserialize)]
struct WebhookText {
    #[serde(default)]
    body: String,
}

#[derive(Deserialize)]
struct WebhookInteractive {
    #[serde(rename = "type")]
    interactive_type: String,
    #[serde(default)]
    button_reply: Option<WebhookButtonReply>,
}

#[derive(Deserialize)]
struct WebhookButtonReply {
    #[serde(default)]
    id: String,
}

#[derive(Deserialize)]
struct WebhookContact {
    #[serde(default)]
    profile: WebhookProfile,
}

#[derive(Deserialize, Default)]
struct WebhookProfile {
    #[serde(default)]
    name: Option<String>,
}

/// Lifts the first message out of a webhook push payload.
///
/// Returns None for payloads that carry no message (status updates and the
/// like), so the webhook handler can acknowledge them without acting.
#[must_use]
pub fn parse_webhook_payload(body: &serde_json::Value) -> Option<InboundMessage> {
    let payload: WebhookPayload = serde_json::from_value(body.clone()).ok()?;
    let value = payload.entry.into_iter().next()?.changes.into_iter().next()?.value;
    let profile_name = value
        .contacts
        .into_iter()
        .next()
        .and_then(|contact| contact.profile.name);
    let message = value.messages.into_iter().next()?;

    let body = match message.message_type.as_str() {
        "text" => message.text.map(|text| text.body)?,
        "interactive" => {
            let interactive = message.interactive?;
            if interactive.interactive_type != "button_reply" {
                return None;
            }
            interactive.button_reply.map(|reply| reply.id)?
        }
        _ => return None,
    };

    if body.is_empty() {
        return None;
    }

    Some(InboundMessage {
        from: message.from,
        body,
        profile_name,
    })
}
