//! Completion-provider boundary.
//!
//! The core only needs one operation: send a system prompt, a user prompt,
//! and optionally the previous continuation token; get back free text and a
//! new continuation token. The token is an opaque session handle owned by
//! whichever entity (transaction or message) is currently "active" - it is
//! always persisted before it is used again.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::config::CompletionConfig;
use crate::errors::{Error, Result};

/// One prompt exchange with the completion provider.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System prompt framing the exchange
    pub system: String,
    /// User prompt carrying the data
    pub user: String,
    /// Continuation token from a prior exchange, None for a fresh one
    pub previous_response_id: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
}

/// The provider's answer to a [`CompletionRequest`].
#[derive(Debug, Clone)]
pub struct Completion {
    /// Free text (possibly JSON the caller must parse)
    pub text: String,
    /// Continuation token preserving the provider's context window
    pub response_id: String,
}

/// Narrow contract for the external language-model service.
///
/// Implementations may fail; a transport error and unparsable output are the
/// same failure class to callers (`Error::AiGeneration`).
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Runs one completion and returns the text with its continuation token.
    async fn complete(&self, request: CompletionRequest) -> Result<Completion>;
}

/// HTTP client for an OpenAI-compatible Responses API.
pub struct OpenAiClient {
    http: reqwest::Client,
    config: CompletionConfig,
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    input: Vec<ApiMessage<'a>>,
    temperature: f32,
    store: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_response_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct ApiResponse {
    id: String,
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<ApiOutputItem>,
}

#[derive(Deserialize)]
struct ApiOutputItem {
    #[serde(default)]
    content: Vec<ApiContentPart>,
}

#[derive(Deserialize)]
struct ApiContentPart {
    #[serde(default)]
    text: String,
}

impl ApiResponse {
    /// Collapses the response body into plain text, preferring the
    /// convenience `output_text` field when the provider sends it.
    fn into_text(self) -> (String, String) {
        let text = match self.output_text {
            Some(text) if !text.is_empty() => text,
            _ => self
                .output
                .iter()
                .flat_map(|item| item.content.iter())
                .map(|part| part.text.as_str())
                .collect::<Vec<_>>()
                .join(""),
        };
        (self.id, text)
    }
}

impl OpenAiClient {
    /// Creates a client with the bearer token baked into default headers.
    pub fn new(config: CompletionConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key)).map_err(|e| {
            Error::Config {
                message: format!("invalid API key header: {e}"),
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

        Ok(Self { http, config })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        let body = ApiRequest {
            model: &self.config.model,
            input: vec![
                ApiMessage {
                    role: "system",
                    content: &request.system,
                },
                ApiMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            store: true,
            previous_response_id: request.previous_response_id.as_deref(),
        };

        let url = format!("{}/v1/responses", self.config.base_url);
        let response = self.http.post(&url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::AiGeneration {
                message: format!("completion provider returned {status}: {detail}"),
            });
        }

        let parsed: ApiResponse = response.json().await.map_err(|e| Error::AiGeneration {
            message: format!("completion response was not valid JSON: {e}"),
        })?;
        let (response_id, text) = parsed.into_text();

        if text.is_empty() {
            return Err(Error::AiGeneration {
                message: "completion response carried no text".to_string(),
            });
        }

        Ok(Completion { text, response_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_prefers_output_text() {
        let parsed: ApiResponse = serde_json::from_str(
            r#"{"id":"resp_1","output_text":"hello","output":[]}"#,
        )
        .unwrap();
        let (id, text) = parsed.into_text();
        assert_eq!(id, "resp_1");
        assert_eq!(text, "hello");
    }

    #[test]
    fn test_response_falls_back_to_output_items() {
        let parsed: ApiResponse = serde_json::from_str(
            r#"{
                "id": "resp_2",
                "output": [
                    {"type": "reasoning"},
                    {"type": "message", "content": [{"type": "output_text", "text": "from items"}]}
                ]
            }"#,
        )
        .unwrap();
        let (id, text) = parsed.into_text();
        assert_eq!(id, "resp_2");
        assert_eq!(text, "from items");
    }

    #[test]
    fn test_previous_response_id_omitted_when_absent() {
        let body = ApiRequest {
            model: "gpt-4o-mini",
            input: vec![],
            temperature: 0.5,
            store: true,
            previous_response_id: None,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(!json.contains("previous_response_id"));
    }
}
