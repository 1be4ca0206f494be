// crates/opsgate-llm/src/provider.rs
// ============================================================================
// Module: Chat Provider
// Description: The trait every concrete LLM backend implements, plus an
//              OpenAI-compatible HTTP implementation.
// Purpose: Let the gateway fall back across providers without knowing their
//          wire formats.
// Dependencies: opsgate-core, reqwest, serde_json, async-trait
// ============================================================================

//! ## Overview
//! [`HttpChatProvider`] speaks the OpenAI chat-completions wire format over
//! HTTPS. Non-2xx responses are mapped into the [`ProviderError`] taxonomy by
//! status code; a successful response's `usage` block is trusted when
//! present and otherwise estimated from message length.

use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use opsgate_core::TokenUsage;
use reqwest::Client;
use serde_json::json;
use serde_json::Value;

use crate::chat::ChatMessage;
use crate::chat::ChatOptions;
use crate::chat::ChatResponse;
use crate::chat::FinishReason;
use crate::chat::ProviderError;
use crate::chat::ResponseFormat;
use crate::chat::Role;
use crate::chat::StreamChunk;

/// A single remote chat backend.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// The provider's name, used for gateway ordering and diagnostics.
    fn name(&self) -> &str;

    /// Issues one non-streaming chat completion.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatResponse, ProviderError>;

    /// Issues a streaming chat completion, invoking `on_chunk` for each
    /// chunk in order. The default implementation falls back to a single
    /// non-streaming call delivered as one content chunk followed by a
    /// terminal `done` chunk, for providers with no native streaming mode.
    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
        on_chunk: &mut (dyn FnMut(StreamChunk) + Send),
    ) -> Result<(), ProviderError> {
        let response = self.chat(messages, options).await?;
        on_chunk(StreamChunk { content: response.content, done: false, usage: None });
        on_chunk(StreamChunk { content: String::new(), done: true, usage: Some(response.usage) });
        Ok(())
    }
}

/// Pricing for one model, in micro-dollars per 1000 tokens.
#[derive(Debug, Clone, Copy)]
pub struct ModelPricing {
    /// Cost per 1000 prompt tokens, in micro-dollars.
    pub prompt_micros_per_1k: u64,
    /// Cost per 1000 completion tokens, in micro-dollars.
    pub completion_micros_per_1k: u64,
}

/// Configuration for one OpenAI-compatible HTTP provider instance.
#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    /// Provider name, used for gateway ordering and diagnostics.
    pub name: String,
    /// Base chat-completions endpoint.
    pub api_url: String,
    /// Bearer token.
    pub api_key: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Pricing used to estimate cost from token usage.
    pub pricing: ModelPricing,
}

/// Speaks the OpenAI chat-completions wire format over HTTPS.
pub struct HttpChatProvider {
    config: HttpProviderConfig,
    client: Client,
}

impl HttpChatProvider {
    /// Builds a provider from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Network`] if the HTTP client cannot be
    /// constructed.
    pub fn new(config: HttpProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| ProviderError::Network(err.to_string()))?;
        Ok(Self { config, client })
    }

    fn estimate_cost_micros(&self, usage: &TokenUsage) -> u64 {
        let prompt_cost = usage.prompt_tokens * self.config.pricing.prompt_micros_per_1k / 1000;
        let completion_cost = usage.completion_tokens * self.config.pricing.completion_micros_per_1k / 1000;
        prompt_cost + completion_cost
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn map_status_error(status: reqwest::StatusCode, body: &str) -> ProviderError {
    match status.as_u16() {
        401 | 403 => ProviderError::Authentication(body.to_string()),
        404 => ProviderError::ModelNotFound(body.to_string()),
        400 | 422 => ProviderError::InvalidRequest(body.to_string()),
        429 => ProviderError::RateLimit(body.to_string()),
        400..=499 => ProviderError::InvalidRequest(body.to_string()),
        _ => ProviderError::ProviderError(body.to_string()),
    }
}

#[async_trait]
impl ChatProvider for HttpChatProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatResponse, ProviderError> {
        let started = Instant::now();
        let payload_messages: Vec<Value> = messages
            .iter()
            .map(|message| json!({ "role": role_str(message.role), "content": message.content }))
            .collect();

        let mut payload = json!({
            "model": options.model,
            "messages": payload_messages,
            "temperature": options.temperature,
        });
        if let Some(max_tokens) = options.max_tokens {
            payload["max_tokens"] = json!(max_tokens);
        }
        if let Some(top_p) = options.top_p {
            payload["top_p"] = json!(top_p);
        }
        if let Some(stop) = &options.stop_sequences {
            payload["stop"] = json!(stop);
        }
        if options.response_format == ResponseFormat::Json {
            payload["response_format"] = json!({ "type": "json_object" });
        }

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ProviderError::Timeout(err.to_string())
                } else {
                    ProviderError::Network(err.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_error(status, &body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| ProviderError::ProviderError(err.to_string()))?;

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ProviderError::ProviderError("missing message content".to_string()))?
            .to_string();

        let parsed_json = if options.response_format == ResponseFormat::Json {
            serde_json::from_str(&content).ok()
        } else {
            None
        };

        let prompt_tokens = body["usage"]["prompt_tokens"].as_u64().unwrap_or(0);
        let completion_tokens = body["usage"]["completion_tokens"].as_u64().unwrap_or(0);
        let mut usage = TokenUsage::default();
        usage.track(prompt_tokens, completion_tokens, 0);
        let cost_micros = self.estimate_cost_micros(&usage);
        usage.track(0, 0, cost_micros);

        let finish_reason = match body["choices"][0]["finish_reason"].as_str() {
            Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            _ => FinishReason::Error,
        };

        Ok(ChatResponse {
            content,
            parsed_json,
            usage,
            finish_reason,
            provider: self.config.name.clone(),
            model: options.model.clone(),
            latency_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }
}
