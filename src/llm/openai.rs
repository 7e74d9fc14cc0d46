//! OpenAI-style chat-completions client.
//!
//! Speaks the `/v1/chat/completions` wire format: the abstract message list
//! maps one-to-one onto the request `messages` array, system role included.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::error::{from_transport, LlmError};
use super::{ChatMessage, ChatOptions, ChatResponse, LlmClient, TokenUsage};

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-style API client.
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    url: String,
    model: String,
}

impl OpenAiClient {
    /// Create a client against the default OpenAI endpoint.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self::with_url(api_key, model, DEFAULT_API_URL, timeout)
    }

    /// Create a client against a compatible custom endpoint.
    pub fn with_url(
        api_key: impl Into<String>,
        model: impl Into<String>,
        url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key: api_key.into(),
            url: url.into(),
            model: model.into(),
        }
    }

    /// Parse a Retry-After header if present.
    fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
        headers
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok().map(Duration::from_secs))
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat_completion(
        &self,
        messages: &[ChatMessage],
        options: ChatOptions,
    ) -> Result<ChatResponse, LlmError> {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            temperature: options.temperature,
            top_p: options.top_p,
            max_tokens: options.max_tokens,
            frequency_penalty: options.frequency_penalty,
            presence_penalty: options.presence_penalty,
        };

        tracing::debug!(model = %self.model, "sending chat completion request");

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| from_transport(&e))?;

        let status = response.status();
        let retry_after = Self::parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(LlmError::from_status(status.as_u16(), &body, retry_after));
        }

        let parsed: CompletionResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::malformed(format!("undecodable completion response: {}", e))
        })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::malformed("no choices in response"))?;

        Ok(ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            usage: parsed
                .usage
                .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens)),
            model: parsed.model.or_else(|| Some(request.model.clone())),
            finish_reason: choice.finish_reason,
        })
    }
}

/// Chat-completions request format.
#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f64>,
}

/// Chat-completions response format.
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    #[test]
    fn request_serializes_system_role_inline() {
        let request = CompletionRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![
                ChatMessage::system("You generate tasks."),
                ChatMessage::user("Generate one."),
            ],
            temperature: Some(0.7),
            top_p: None,
            max_tokens: None,
            frequency_penalty: None,
            presence_penalty: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert!(json.get("top_p").is_none());
    }

    #[test]
    fn response_parses_content_and_usage() {
        let body = serde_json::json!({
            "model": "gpt-4o-mini",
            "choices": [{
                "message": {"role": "assistant", "content": "hello"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 4, "total_tokens": 14}
        })
        .to_string();
        let parsed: CompletionResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("hello"));
        assert_eq!(parsed.usage.as_ref().unwrap().completion_tokens, 4);
    }

    #[test]
    fn message_roles_round_trip() {
        let msg = ChatMessage::assistant("done");
        let json = serde_json::to_string(&msg).unwrap();
        let back: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.role, Role::Assistant);
        assert_eq!(back.content, "done");
    }
}
