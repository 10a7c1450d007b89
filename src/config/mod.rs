//! Configuration management for database and provider settings.
//!
//! Everything is environment-driven (with `.env` support via dotenvy in
//! `main`). The completion provider needs an API key; the messaging provider
//! settings may be absent in development, in which case outbound delivery is
//! disabled and replies only travel back over HTTP.

/// Database configuration and connection management
pub mod database;

use crate::errors::{Error, Result};

/// Completion-provider (OpenAI-compatible) settings.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Bearer token for the provider API
    pub api_key: String,
    /// Base URL of the provider, e.g. `https://api.openai.com`
    pub base_url: String,
    /// Model identifier to request
    pub model: String,
}

/// WhatsApp Business (Graph API) settings.
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    /// Graph API base URL
    pub api_url: String,
    /// Graph API version segment
    pub api_version: String,
    /// Business phone number id used as the sender
    pub phone_number_id: String,
    /// Bearer token for the Graph API
    pub access_token: String,
    /// Shared secret for the webhook verification handshake
    pub verify_token: String,
}

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SeaORM connection string
    pub database_url: String,
    /// Address the HTTP server binds to
    pub listen_addr: String,
    /// Completion-provider settings
    pub completion: CompletionConfig,
    /// Messaging-provider settings, None when not configured
    pub whatsapp: Option<WhatsAppConfig>,
}

/// Loads the application configuration from the environment.
///
/// `OPENAI_API_KEY` is required; the WhatsApp settings are optional as a
/// group keyed on `WHATSAPP_ACCESS_TOKEN`.
pub fn load_app_configuration() -> Result<AppConfig> {
    let database_url = database::get_database_url();
    let listen_addr =
        std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    let completion = CompletionConfig {
        api_key: std::env::var("OPENAI_API_KEY").map_err(|_| Error::Config {
            message: "OPENAI_API_KEY is not set".to_string(),
        })?,
        base_url: std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com".to_string()),
        model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
    };

    let whatsapp = match std::env::var("WHATSAPP_ACCESS_TOKEN") {
        Ok(access_token) => Some(WhatsAppConfig {
            api_url: std::env::var("WHATSAPP_API_URL")
                .unwrap_or_else(|_| "https://graph.facebook.com".to_string()),
            api_version: std::env::var("WHATSAPP_API_VERSION")
                .unwrap_or_else(|_| "v23.0".to_string()),
            phone_number_id: std::env::var("WHATSAPP_PHONE_NUMBER_ID").map_err(|_| {
                Error::Config {
                    message: "WHATSAPP_PHONE_NUMBER_ID is required when \
                              WHATSAPP_ACCESS_TOKEN is set"
                        .to_string(),
                }
            })?,
            access_token,
            verify_token: std::env::var("WHATSAPP_VERIFY_TOKEN").unwrap_or_default(),
        }),
        Err(_) => None,
    };

    Ok(AppConfig {
        database_url,
        listen_addr,
        completion,
        whatsapp,
    })
}
