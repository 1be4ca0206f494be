// crates/opsgate-llm/src/chat.rs
// ============================================================================
// Module: Chat Contract
// Description: Provider-agnostic request/response types for the LLM Gateway.
// Purpose: Give every provider implementation, and the gateway itself, one
//          shared vocabulary for messages, options, responses, and errors.
// Dependencies: opsgate-core, serde
// ============================================================================

use opsgate_core::TokenUsage;
use serde::Deserialize;
use serde::Serialize;

/// A message role in a chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// End-user content.
    User,
    /// Prior model output, replayed as context.
    Assistant,
}

/// One message in a chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who the message is attributed to.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Builds a message with the given role and content.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// How the gateway should interpret and parse the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Plain text, returned verbatim.
    #[default]
    Text,
    /// Structured JSON; parsed, with a fallback to raw text on parse failure.
    Json,
}

/// Request-level tuning knobs, independent of any one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatOptions {
    /// Model identifier, provider-specific.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// Nucleus sampling parameter.
    pub top_p: Option<f32>,
    /// Sequences that end generation early.
    pub stop_sequences: Option<Vec<String>>,
    /// How the response body should be interpreted.
    pub response_format: ResponseFormat,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            model: String::new(),
            temperature: 0.7,
            max_tokens: None,
            top_p: None,
            stop_sequences: None,
            response_format: ResponseFormat::default(),
        }
    }
}

/// Why a provider stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The model reached a natural stop point.
    Stop,
    /// The response was truncated at the token limit.
    Length,
    /// Generation ended abnormally.
    Error,
}

/// A completed (non-streaming) chat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Raw text content.
    pub content: String,
    /// Parsed JSON content, present when `response_format = json` and
    /// parsing succeeded.
    pub parsed_json: Option<serde_json::Value>,
    /// Token accounting for this call.
    pub usage: TokenUsage,
    /// Why generation stopped.
    pub finish_reason: FinishReason,
    /// The provider that served this response.
    pub provider: String,
    /// Model actually used.
    pub model: String,
    /// Round-trip latency.
    pub latency_ms: u64,
}

/// One chunk of a streaming response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Incremental text content, empty on the terminal chunk.
    pub content: String,
    /// Set on the final chunk.
    pub done: bool,
    /// Present only on the terminal chunk.
    pub usage: Option<TokenUsage>,
}

/// The taxonomy of errors a provider call can fail with.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// Credentials were rejected.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// The provider is rate-limiting this caller.
    #[error("rate limited: {0}")]
    RateLimit(String),
    /// The request itself was malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// The requested model does not exist for this provider.
    #[error("model not found: {0}")]
    ModelNotFound(String),
    /// The request exceeded its deadline.
    #[error("request timed out: {0}")]
    Timeout(String),
    /// A lower-level network failure.
    #[error("network error: {0}")]
    Network(String),
    /// The provider's content filter rejected the request or response.
    #[error("content filtered: {0}")]
    ContentFilter(String),
    /// An otherwise-unclassified provider failure.
    #[error("provider error: {0}")]
    ProviderError(String),
}

impl ProviderError {
    /// Whether this error justifies another attempt against the same
    /// provider (subject to the attempt budget) rather than immediate
    /// fallthrough to the next one.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        !matches!(
            self,
            Self::Authentication(_) | Self::InvalidRequest(_) | Self::ModelNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_retriable_errors_are_exactly_the_documented_three() {
        assert!(!ProviderError::Authentication("x".to_string()).is_retriable());
        assert!(!ProviderError::InvalidRequest("x".to_string()).is_retriable());
        assert!(!ProviderError::ModelNotFound("x".to_string()).is_retriable());
        assert!(ProviderError::RateLimit("x".to_string()).is_retriable());
        assert!(ProviderError::Timeout("x".to_string()).is_retriable());
        assert!(ProviderError::Network("x".to_string()).is_retriable());
        assert!(ProviderError::ContentFilter("x".to_string()).is_retriable());
        assert!(ProviderError::ProviderError("x".to_string()).is_retriable());
    }
}
