// crates/opsgate-core/src/token_usage.rs
// ============================================================================
// Module: Token Usage
// Description: Per-day, per-provider token and cost counters.
// Purpose: Define TokenUsage and its daily-rollup persistence shape.
// Dependencies: crate::time, serde
// ============================================================================

//! ## Overview
//! `TokenUsage` is the unit the Token Budget persists, one per
//! `(date, provider)` pair, resetting at local midnight. Month-to-date
//! rollups are computed by summing the per-day records for a provider; this
//! type does not itself own the rollup, only the daily counters.

use serde::Deserialize;
use serde::Serialize;

/// Per-day, per-provider token and cost counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens consumed so far today.
    pub prompt_tokens: u64,
    /// Completion tokens consumed so far today.
    pub completion_tokens: u64,
    /// Running cost estimate in micro-dollars (USD * 1e-6), to avoid float
    /// drift across many small additions.
    pub estimated_cost_micros: u64,
}

impl TokenUsage {
    /// Total tokens (prompt + completion) consumed so far today.
    #[must_use]
    pub const fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    /// Records additional usage and cost.
    pub fn track(&mut self, prompt_tokens: u64, completion_tokens: u64, cost_micros: u64) {
        self.prompt_tokens += prompt_tokens;
        self.completion_tokens += completion_tokens;
        self.estimated_cost_micros += cost_micros;
    }

    /// Returns the fraction of `daily_limit` consumed, in `[0, 1]` (or
    /// above `1` if already over budget).
    #[must_use]
    pub fn percent_used(&self, daily_limit: u64) -> f64 {
        if daily_limit == 0 {
            return 1.0;
        }
        #[allow(
            clippy::cast_precision_loss,
            reason = "token counts fit comfortably in f64 mantissa for reporting purposes"
        )]
        {
            self.total_tokens() as f64 / daily_limit as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TokenUsage;

    #[test]
    fn tracks_cumulative_usage() {
        let mut usage = TokenUsage::default();
        usage.track(100, 50, 10);
        usage.track(10, 5, 1);
        assert_eq!(usage.total_tokens(), 165);
        assert_eq!(usage.estimated_cost_micros, 11);
    }

    #[test]
    fn percent_used_saturates_above_one_when_over_budget() {
        let mut usage = TokenUsage::default();
        usage.track(150, 0, 0);
        assert!(usage.percent_used(100) > 1.0);
    }
}
