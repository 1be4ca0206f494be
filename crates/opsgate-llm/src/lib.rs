// crates/opsgate-llm/src/lib.rs
// ============================================================================
// Crate: opsgate-llm
// Description: Token budget accounting (L5) and the multi-provider LLM
//              gateway (L7).
// ============================================================================

//! Provider-agnostic chat contract, an OpenAI-compatible HTTP
//! implementation, ordered-provider fallback with per-provider retry, and
//! per-day-per-provider token budget enforcement.

mod chat;
mod gateway;
mod provider;
mod token_budget;

pub use chat::ChatMessage;
pub use chat::ChatOptions;
pub use chat::ChatResponse;
pub use chat::FinishReason;
pub use chat::ProviderError;
pub use chat::ResponseFormat;
pub use chat::Role;
pub use chat::StreamChunk;
pub use gateway::GatewayError;
pub use gateway::LlmGateway;
pub use gateway::RetryConfig;
pub use provider::ChatProvider;
pub use provider::HttpChatProvider;
pub use provider::HttpProviderConfig;
pub use provider::ModelPricing;
pub use token_budget::BudgetCheck;
pub use token_budget::TokenBudget;
pub use token_budget::WARN_THRESHOLD_PERCENT;
