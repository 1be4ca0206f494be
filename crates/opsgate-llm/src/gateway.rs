// crates/opsgate-llm/src/gateway.rs
// ============================================================================
// Module: LLM Gateway (L7)
// Description: Single call surface over an ordered list of chat providers.
// Purpose: Fall back across providers on non-retriable or exhausted-retry
//          failures, with exponential backoff between same-provider
//          attempts.
// Dependencies: opsgate-core, rand, tokio, tracing
// ============================================================================

//! ## Overview
//! [`LlmGateway::chat`] tries each configured provider in order. Within one
//! provider, up to [`RetryConfig::max_attempts`] attempts run with
//! exponential backoff (`initial_delay * multiplier^(attempt-1)`, capped at
//! `max_delay`, plus jitter). A non-retriable [`ProviderError`] — as judged
//! by [`ProviderError::is_retriable`] — skips the remaining attempts for
//! that provider and moves on immediately. If every provider is exhausted,
//! the gateway returns [`GatewayError::AllProvidersFailed`] carrying the
//! last underlying error.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::info;
use tracing::warn;

use crate::chat::ChatMessage;
use crate::chat::ChatOptions;
use crate::chat::ChatResponse;
use crate::chat::ProviderError;
use crate::chat::StreamChunk;
use crate::provider::ChatProvider;

/// Retry tuning shared by every provider the gateway calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Attempts per provider before moving to the next one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Delay ceiling regardless of attempt count.
    pub max_delay: Duration,
    /// Exponential backoff multiplier.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    fn delay_for(&self, attempt: u32) -> Duration {
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.powi(i32::try_from(attempt - 1).unwrap_or(0));
        let capped = scaled.min(self.max_delay.as_secs_f64());
        let jitter: f64 = rand::thread_rng().gen_range(0.85..=1.15);
        Duration::from_secs_f64((capped * jitter).max(0.0))
    }
}

/// Raised when every configured provider has been exhausted.
#[derive(Debug, Clone, thiserror::Error)]
#[error("all providers failed, last error: {last_error}")]
pub struct GatewayError {
    /// The last underlying provider error observed.
    pub last_error: ProviderError,
}

/// A single call surface over an ordered list of [`ChatProvider`]s.
pub struct LlmGateway {
    providers: Vec<Arc<dyn ChatProvider>>,
    retry: RetryConfig,
}

impl LlmGateway {
    /// Builds a gateway trying `providers` in the given order.
    #[must_use]
    pub fn new(providers: Vec<Arc<dyn ChatProvider>>, retry: RetryConfig) -> Self {
        Self { providers, retry }
    }

    /// Runs `messages` through the first provider that succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] once every provider has exhausted its
    /// attempt budget or failed non-retriably.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatResponse, GatewayError> {
        let mut last_error = ProviderError::ProviderError("no providers configured".to_string());
        for provider in &self.providers {
            match self.call_with_retry(provider.as_ref(), messages, options).await {
                Ok(response) => return Ok(response),
                Err(error) => {
                    warn!(provider = provider.name(), "provider exhausted: {error}");
                    last_error = error;
                }
            }
        }
        Err(GatewayError { last_error })
    }

    /// Streams `messages` through the first provider that accepts the
    /// call, forwarding chunks to `on_chunk` in order.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] once every provider has failed to start a
    /// stream.
    pub async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
        on_chunk: &mut (dyn FnMut(StreamChunk) + Send),
    ) -> Result<(), GatewayError> {
        let mut last_error = ProviderError::ProviderError("no providers configured".to_string());
        for provider in &self.providers {
            match provider.chat_stream(messages, options, on_chunk).await {
                Ok(()) => return Ok(()),
                Err(error) => {
                    warn!(provider = provider.name(), "stream provider failed: {error}");
                    last_error = error;
                }
            }
        }
        Err(GatewayError { last_error })
    }

    async fn call_with_retry(
        &self,
        provider: &dyn ChatProvider,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatResponse, ProviderError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match provider.chat(messages, options).await {
                Ok(response) => {
                    info!(provider = provider.name(), attempt, "chat succeeded");
                    return Ok(response);
                }
                Err(error) => {
                    if !error.is_retriable() || attempt >= self.retry.max_attempts {
                        return Err(error);
                    }
                    let delay = self.retry.delay_for(attempt);
                    warn!(provider = provider.name(), attempt, ?delay, "retrying after error: {error}");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
