// crates/opsgate-llm/src/token_budget.rs
// ============================================================================
// Module: Token Budget (L5)
// Description: Tokenization estimate, per-day-per-provider usage tally, and
//              daily budget enforcement.
// Purpose: Reject LLM calls before they reach the network once a provider's
//          daily token budget is exhausted, and warn as usage approaches it.
// Dependencies: opsgate-core, opsgate-reliability, tokio, tracing
// ============================================================================

//! ## Overview
//! Usage is keyed by `(date_key, provider)` and reset implicitly: a call on
//! a new day starts a fresh [`TokenUsage`] record for that provider. The
//! in-memory map is persisted as a whole on every [`TokenBudget::track_usage`]
//! via the shared atomic snapshot helper, and restored at startup.

use std::collections::BTreeMap;
use std::path::PathBuf;

use opsgate_core::Timestamp;
use opsgate_core::TokenUsage;
use opsgate_reliability::load_snapshot;
use opsgate_reliability::write_snapshot;
use opsgate_reliability::PersistenceError;
use serde::Deserialize;
use serde::Serialize;
use time::UtcOffset;
use tokio::sync::Mutex;
use tracing::warn;

use crate::chat::ChatMessage;
use crate::provider::ModelPricing;

/// Fraction of the daily limit at which `check_budget` logs a warning.
pub const WARN_THRESHOLD_PERCENT: f64 = 80.0;
/// Fixed per-message overhead tokens, mirroring chat-format framing cost.
const PER_MESSAGE_OVERHEAD_TOKENS: u64 = 3;
/// Priming constant added once per request, for the reply-start framing.
const PRIMING_TOKENS: u64 = 3;

/// Outcome of a budget check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetCheck {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// Tokens remaining in today's budget for this provider.
    pub remaining_tokens: u64,
    /// Percent of the daily limit already used, before this request.
    pub percent_used: f64,
    /// Estimated cost of this request in micro-dollars.
    pub estimated_cost_micros: u64,
    /// Present when `allowed = false`.
    pub reason: Option<String>,
}

#[derive(Default, Serialize, Deserialize)]
struct BudgetSnapshot {
    by_date_provider: BTreeMap<String, TokenUsage>,
}

fn snapshot_key(date_key: &str, provider: &str) -> String {
    format!("{date_key}|{provider}")
}

/// Per-day, per-provider token accounting and budget enforcement.
pub struct TokenBudget {
    state: Mutex<BTreeMap<String, TokenUsage>>,
    daily_limit_tokens: u64,
    pricing: BTreeMap<String, ModelPricing>,
    store_path: PathBuf,
    local_offset: UtcOffset,
}

impl TokenBudget {
    /// Builds a budget tracker enforcing `daily_limit_tokens` per provider,
    /// pricing looked up from `pricing`, persisting to `store_path`.
    #[must_use]
    pub fn new(
        daily_limit_tokens: u64,
        pricing: BTreeMap<String, ModelPricing>,
        store_path: PathBuf,
        local_offset: UtcOffset,
    ) -> Self {
        Self {
            state: Mutex::new(BTreeMap::new()),
            daily_limit_tokens,
            pricing,
            store_path,
            local_offset,
        }
    }

    /// Restores prior usage from `store_path`, if present.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the snapshot exists but cannot be
    /// read or parsed.
    pub async fn load(&self) -> Result<(), PersistenceError> {
        if let Some(snapshot) = load_snapshot::<BudgetSnapshot>(&self.store_path).await? {
            *self.state.lock().await = snapshot.by_date_provider;
        }
        Ok(())
    }

    /// Estimates the token count of a single piece of text. Falls back to
    /// `ceil(len / 4)` when no real tokenizer is wired in.
    #[must_use]
    pub fn count_tokens(text: &str) -> u64 {
        let len = text.chars().count() as u64;
        len.div_ceil(4)
    }

    /// Estimates the total token count of a message list, including
    /// per-message and priming overhead.
    #[must_use]
    pub fn count_message_tokens(messages: &[ChatMessage]) -> u64 {
        let body: u64 = messages
            .iter()
            .map(|message| Self::count_tokens(&message.content) + PER_MESSAGE_OVERHEAD_TOKENS)
            .sum();
        body + PRIMING_TOKENS
    }

    /// Checks whether `estimated_tokens` more usage would exceed today's
    /// budget for `provider`, without recording anything.
    pub async fn check_budget(
        &self,
        estimated_tokens: u64,
        provider: &str,
        now: Timestamp,
    ) -> BudgetCheck {
        let date_key = now.local_midnight(self.local_offset).date_key();
        let used = {
            let state = self.state.lock().await;
            state
                .get(&snapshot_key(&date_key, provider))
                .map_or(0, TokenUsage::total_tokens)
        };
        let percent_used = percent(used, self.daily_limit_tokens);
        let estimated_cost_micros = self.estimate_cost(estimated_tokens, provider);

        if used >= self.daily_limit_tokens {
            return BudgetCheck {
                allowed: false,
                remaining_tokens: 0,
                percent_used,
                estimated_cost_micros,
                reason: Some("daily token budget already exhausted".to_string()),
            };
        }
        if used + estimated_tokens > self.daily_limit_tokens {
            return BudgetCheck {
                allowed: false,
                remaining_tokens: self.daily_limit_tokens - used,
                percent_used,
                estimated_cost_micros,
                reason: Some("request would exceed daily token budget".to_string()),
            };
        }

        let would_be_percent = percent(used + estimated_tokens, self.daily_limit_tokens);
        if would_be_percent >= WARN_THRESHOLD_PERCENT {
            warn!(provider, would_be_percent, "token budget crossing warning threshold");
        }

        BudgetCheck {
            allowed: true,
            remaining_tokens: self.daily_limit_tokens - used - estimated_tokens,
            percent_used,
            estimated_cost_micros,
            reason: None,
        }
    }

    /// Records actual usage for `provider` and persists the updated
    /// snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the updated snapshot cannot be
    /// written.
    pub async fn track_usage(
        &self,
        prompt_tokens: u64,
        completion_tokens: u64,
        provider: &str,
        now: Timestamp,
    ) -> Result<(), PersistenceError> {
        let date_key = now.local_midnight(self.local_offset).date_key();
        let cost_micros = self.estimate_cost(prompt_tokens + completion_tokens, provider);
        {
            let mut state = self.state.lock().await;
            state
                .entry(snapshot_key(&date_key, provider))
                .or_default()
                .track(prompt_tokens, completion_tokens, cost_micros);
        }
        self.persist().await
    }

    fn estimate_cost(&self, tokens: u64, provider: &str) -> u64 {
        self.pricing
            .get(provider)
            .map_or(0, |pricing| tokens * pricing.prompt_micros_per_1k / 1000)
    }

    async fn persist(&self) -> Result<(), PersistenceError> {
        let by_date_provider = self.state.lock().await.clone();
        write_snapshot(&self.store_path, &BudgetSnapshot { by_date_provider }).await
    }
}

fn percent(used: u64, limit: u64) -> f64 {
    if limit == 0 {
        return 100.0;
    }
    #[allow(clippy::cast_precision_loss, reason = "token counts fit comfortably in f64 mantissa")]
    {
        used as f64 / limit as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    //! Test-only lint relaxations for panic-based assertions and debug output.
    #![allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only output and panic-based assertions are permitted."
    )]

    use tempfile::tempdir;

    use super::*;
    use crate::chat::Role;

    fn budget(limit: u64, dir: &std::path::Path) -> TokenBudget {
        TokenBudget::new(limit, BTreeMap::new(), dir.join("budget.json"), UtcOffset::UTC)
    }

    #[test]
    fn count_tokens_falls_back_to_ceil_len_over_four() {
        assert_eq!(TokenBudget::count_tokens("abcd"), 1);
        assert_eq!(TokenBudget::count_tokens("abcde"), 2);
        assert_eq!(TokenBudget::count_tokens(""), 0);
    }

    #[tokio::test]
    async fn rejects_once_budget_already_exhausted() {
        let dir = tempdir().expect("tempdir");
        let budget = budget(100, dir.path());
        budget.track_usage(100, 0, "openai", Timestamp::from_unix_millis(0)).await.expect("track");
        let check = budget.check_budget(1, "openai", Timestamp::from_unix_millis(0)).await;
        assert!(!check.allowed);
    }

    #[tokio::test]
    async fn rejects_request_that_would_exceed_budget() {
        let dir = tempdir().expect("tempdir");
        let budget = budget(100, dir.path());
        budget.track_usage(90, 0, "openai", Timestamp::from_unix_millis(0)).await.expect("track");
        let check = budget.check_budget(20, "openai", Timestamp::from_unix_millis(0)).await;
        assert!(!check.allowed);
        assert_eq!(check.remaining_tokens, 10);
    }

    #[tokio::test]
    async fn allows_request_within_budget() {
        let dir = tempdir().expect("tempdir");
        let budget = budget(100, dir.path());
        let check = budget.check_budget(10, "openai", Timestamp::from_unix_millis(0)).await;
        assert!(check.allowed);
        assert_eq!(check.remaining_tokens, 90);
    }

    #[test]
    fn message_tokens_include_overhead_and_priming() {
        let messages = vec![ChatMessage::new(Role::User, "abcd")];
        assert_eq!(TokenBudget::count_message_tokens(&messages), 1 + 3 + 3);
    }
}
