//! Provider abstraction for generative back ends.
//!
//! This module provides a trait-based abstraction over chat-completion
//! providers. Two network-backed implementations (OpenAI-style and
//! Anthropic-style wire formats) and a deterministic in-process mock share
//! the same interface; wire-format quirks stay inside each adapter.
//!
//! Raw provider text is never parsed directly: every structured read goes
//! through [`normalize::parse_structured`], which strips Markdown code
//! fences first and fails with a distinguishable `MalformedResponse` error.

mod anthropic;
mod error;
mod factory;
mod mock;
pub mod normalize;
mod openai;

pub use anthropic::AnthropicClient;
pub use error::{classify_http_status, LlmError, LlmErrorKind};
pub use factory::ProviderFactory;
pub use mock::MockClient;
pub use openai::OpenAiClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Role in a chat conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Optional generation parameters. Providers supply defaults for anything
/// left unset.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// Sampling temperature, clamped to [0, 2].
    pub temperature: Option<f64>,
    /// Top-p nucleus sampling.
    pub top_p: Option<f64>,
    /// Maximum output tokens to generate.
    pub max_tokens: Option<u64>,
    pub frequency_penalty: Option<f64>,
    pub presence_penalty: Option<f64>,
}

impl ChatOptions {
    /// Options with only a temperature set.
    pub fn with_temperature(temperature: f64) -> Self {
        Self {
            temperature: Some(temperature.clamp(0.0, 2.0)),
            ..Self::default()
        }
    }
}

/// Token usage counters, when the upstream provider reports them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Create a usage object ensuring `total_tokens` is consistent.
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Response from a chat completion. Produced once per call; never mutated
/// after it is handed to the caller.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// Raw text payload.
    pub content: String,
    pub usage: Option<TokenUsage>,
    /// Model identifier the upstream resolved the request to.
    pub model: Option<String>,
    pub finish_reason: Option<String>,
}

/// Trait for chat-completion clients.
///
/// A single operation: turn an ordered message sequence plus generation
/// options into a [`ChatResponse`]. Implementations do not retry; transport
/// and auth failures propagate unmodified to the caller.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider identifier (e.g. "openai", "anthropic", "mock").
    fn name(&self) -> &str;

    /// Send a chat completion request.
    async fn chat_completion(
        &self,
        messages: &[ChatMessage],
        options: ChatOptions,
    ) -> Result<ChatResponse, LlmError>;
}
