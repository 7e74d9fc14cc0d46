//! Anthropic-style messages client.
//!
//! The wire format differs from the chat-completions shape in two ways that
//! stay internal to this adapter: the system prompt is segregated into a
//! top-level `system` field instead of a messages entry, and `max_tokens`
//! is mandatory.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::error::{from_transport, LlmError};
use super::{ChatMessage, ChatOptions, ChatResponse, LlmClient, Role, TokenUsage};

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u64 = 4096;

/// Anthropic-style API client.
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    url: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key: api_key.into(),
            url: DEFAULT_API_URL.to_string(),
            model: model.into(),
        }
    }

    /// Split the abstract message list into the segregated `system` field
    /// and the remaining conversation turns.
    fn split_messages(messages: &[ChatMessage]) -> (Option<String>, Vec<WireMessage>) {
        let mut system_parts = Vec::new();
        let mut turns = Vec::new();

        for message in messages {
            match message.role {
                Role::System => system_parts.push(message.content.clone()),
                Role::User => turns.push(WireMessage {
                    role: "user",
                    content: message.content.clone(),
                }),
                Role::Assistant => turns.push(WireMessage {
                    role: "assistant",
                    content: message.content.clone(),
                }),
            }
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };
        (system, turns)
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn chat_completion(
        &self,
        messages: &[ChatMessage],
        options: ChatOptions,
    ) -> Result<ChatResponse, LlmError> {
        let (system, turns) = Self::split_messages(messages);
        if turns.is_empty() {
            return Err(LlmError::malformed(
                "anthropic wire format requires at least one non-system message",
            ));
        }

        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system,
            messages: turns,
            temperature: options.temperature,
            top_p: options.top_p,
        };

        tracing::debug!(model = %self.model, "sending messages request");

        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| from_transport(&e))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(LlmError::from_status(status.as_u16(), &body, None));
        }

        let parsed: MessagesResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::malformed(format!("undecodable messages response: {}", e)))?;

        let content = parsed
            .content
            .iter()
            .filter_map(|block| match block {
                WireContentBlock::Text { text } => Some(text.as_str()),
            })
            .collect::<Vec<_>>()
            .join("");

        Ok(ChatResponse {
            content,
            usage: parsed
                .usage
                .map(|u| TokenUsage::new(u.input_tokens, u.output_tokens)),
            model: parsed.model.or_else(|| Some(request.model.clone())),
            finish_reason: parsed.stop_reason,
        })
    }
}

/// Messages API request format.
#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

/// Messages API response format.
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<WireContentBlock>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireContentBlock {
    Text { text: String },
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    input_tokens: u64,
    output_tokens: u64,
}
