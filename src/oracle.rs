//! Access to the language-model service.
//!
//! The rest of the crate only sees the [`Oracle`] trait. [`OpenAiClient`] is
//! the production implementation; it is built once from [`LlmConfig`] and
//! passed by reference to the indexer and the schema synthesizer.

use crate::config::{ConfigError, LlmConfig};
use crate::error::OrganizeResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Errors from a single oracle request.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("Request to {model} failed: {reason}")]
    Request { model: String, reason: String },
    #[error("{model} returned HTTP {status}: {body}")]
    Status {
        model: String,
        status: u16,
        body: String,
    },
    #[error("{model} returned no content")]
    EmptyResponse { model: String },
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// One chat-style request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub system: Option<String>,
    pub prompt: String,
    /// Ask the service for a JSON object response.
    pub json_mode: bool,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: None,
            prompt: prompt.into(),
            json_mode: false,
            temperature: 0.7,
            max_tokens: 4096,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A text-completion service.
pub trait Oracle {
    /// Sends `request` and returns the response text.
    fn complete(&self, request: &CompletionRequest) -> Result<String, OracleError>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Blocking client for OpenAI-compatible chat-completions endpoints.
pub struct OpenAiClient {
    http: reqwest::blocking::Client,
    api_key: String,
    endpoint: String,
}

impl OpenAiClient {
    /// Builds a client; fails if no API key is configured.
    pub fn from_config(config: &LlmConfig) -> OrganizeResult<Self> {
        let api_key = config.api_key.trim();
        if api_key.is_empty() {
            return Err(ConfigError::MissingApiKey.into());
        }

        let mut builder = reqwest::blocking::Client::builder().user_agent("aitidy/0.1");
        // reqwest's blocking client defaults to a 30s timeout; None disables it.
        builder = builder.timeout(config.timeout_secs.map(Duration::from_secs));
        let http = builder
            .build()
            .map_err(|e| OracleError::Client(e.to_string()))?;

        Ok(Self {
            http,
            api_key: api_key.to_string(),
            endpoint: format!(
                "{}/chat/completions",
                config.api_base.trim_end_matches('/')
            ),
        })
    }
}

impl Oracle for OpenAiClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String, OracleError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        let body = ChatRequest {
            model: &request.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request.json_mode.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        debug!(model = %request.model, json = request.json_mode, "sending completion request");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| OracleError::Request {
                model: request.model.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(OracleError::Status {
                model: request.model.clone(),
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let parsed: ChatResponse = response.json().map_err(|e| OracleError::Request {
            model: request.model.clone(),
            reason: format!("invalid response body: {e}"),
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| OracleError::EmptyResponse {
                model: request.model.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrganizeError;

    #[test]
    fn test_client_requires_api_key() {
        let config = LlmConfig::default();
        assert!(matches!(
            OpenAiClient::from_config(&config),
            Err(OrganizeError::Config(ConfigError::MissingApiKey))
        ));
    }

    #[test]
    fn test_endpoint_joins_base() {
        let config = LlmConfig {
            api_key: "sk-test".to_string(),
            api_base: "http://localhost:8080/v1/".to_string(),
            ..LlmConfig::default()
        };
        let client = OpenAiClient::from_config(&config).unwrap();
        assert_eq!(client.endpoint, "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_request_serialization() {
        let body = ChatRequest {
            model: "gpt-4o",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            temperature: 0.2,
            max_tokens: 10,
            response_format: Some(ResponseFormat {
                format_type: "json_object",
            }),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["response_format"]["type"], "json_object");
        assert_eq!(value["messages"][0]["role"], "user");
    }
}
