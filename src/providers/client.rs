//! Completion client trait and the HTTP implementation.
//!
//! The engine and orchestrator only care about three outcomes: text, a
//! rate-limit signal, or some other failure. The trait keeps that
//! classification; the HTTP client maps transport detail onto it. A request
//! timeout counts as rate-limiting so the fallback loop rotates providers
//! instead of hammering a stalled one.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::ProviderConfig;
use crate::error::{BatonError, Result};

/// One completion request, fully specified.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Model key to call.
    pub model: String,
    /// System prompt.
    pub system_prompt: String,
    /// User prompt.
    pub user_prompt: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
}

/// Something that can turn a [`CompletionRequest`] into text.
///
/// Errors must be classified: [`BatonError::RateLimited`] drives provider
/// fallback, anything else is a plain failure.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Run one completion call.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Chat message in the wire format of the completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sender role, `"system"` or `"user"`.
    pub role: String,
    /// Message text.
    pub content: String,
}

/// Request body for the chat completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    /// Model key.
    pub model: String,
    /// Conversation messages, system first.
    pub messages: Vec<ChatMessage>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
}

/// Response body of the chat completions endpoint, reduced to what we read.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    /// Generated choices; only the first is used.
    pub choices: Vec<ChatChoice>,
}

/// One generated choice.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    /// The generated message.
    pub message: ChatChoiceMessage,
}

/// Message payload of a choice.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoiceMessage {
    /// Generated text; absent on some refusals.
    pub content: Option<String>,
}

/// HTTP client for an OpenAI-style chat completions endpoint.
pub struct HttpCompletionClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl HttpCompletionClient {
    /// Build a client from provider configuration.
    ///
    /// Connect and request timeouts come from the config; the request
    /// timeout bounds the whole call including the response body.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| BatonError::Provider(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Endpoint URL this client posts to.
    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

impl fmt::Debug for HttpCompletionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpCompletionClient")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = ChatCompletionRequest {
            model: request.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_owned(),
                    content: request.system_prompt.clone(),
                },
                ChatMessage {
                    role: "user".to_owned(),
                    content: request.user_prompt.clone(),
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let mut http = self.client.post(&self.api_url).json(&body);
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key);
        }

        let response = match http.send().await {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                return Err(BatonError::RateLimited(format!("request timed out: {err}")));
            }
            Err(err) => return Err(BatonError::Provider(err.to_string())),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let reason = match retry_after {
                Some(secs) => format!("retry after {secs}s"),
                None => "no retry-after header".to_owned(),
            };
            return Err(BatonError::RateLimited(reason));
        }
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_owned());
            return Err(BatonError::Provider(format!("status {status}: {message}")));
        }

        let parsed: ChatCompletionResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(err) if err.is_timeout() => {
                return Err(BatonError::RateLimited(format!("request timed out: {err}")));
            }
            Err(err) => {
                return Err(BatonError::Provider(format!(
                    "invalid completion response: {err}"
                )));
            }
        };

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| BatonError::Provider("empty completion response".to_owned()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn request_body_serializes_in_wire_order() {
        let body = ChatCompletionRequest {
            model: "x-ai/grok-4.1-fast".to_owned(),
            messages: vec![
                ChatMessage {
                    role: "system".to_owned(),
                    content: "You are terse.".to_owned(),
                },
                ChatMessage {
                    role: "user".to_owned(),
                    content: "Hello".to_owned(),
                },
            ],
            max_tokens: 1200,
            temperature: 0.6,
        };
        let json = serde_json::to_value(&body).expect("serialize");
        assert_eq!(json["model"], "x-ai/grok-4.1-fast");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["max_tokens"], 1200);
        assert_eq!(json["temperature"], 0.6);
    }

    #[test]
    fn response_parses_from_api_format() {
        let json = r#"{
            "id": "gen-123",
            "model": "x-ai/grok-4.1-fast",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hi"}}]
        }"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(json).expect("deserialize");
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("Hi"));
    }

    #[test]
    fn response_tolerates_null_content() {
        let json = r#"{"choices": [{"message": {"content": null}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(json).expect("deserialize");
        assert_eq!(parsed.choices[0].message.content, None);
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = ProviderConfig {
            api_key: Some("sk-secret".to_owned()),
            ..ProviderConfig::default()
        };
        let client = HttpCompletionClient::new(&config).expect("client");
        let debug = format!("{client:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
