// crates/opsgate-core/tests/proptest_invariants.rs
// ============================================================================
// Module: Validated-Constructor Property Tests
// Description: Property tests for Classification::new and Decision::new.
// Purpose: Confirm the confidence-range and reasoning-length invariants hold
//          across wide input ranges, not just the handful of fixed cases
//          the unit tests cover.
// ============================================================================

//! Property-based tests for the core crate's validated constructors.

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
    reason = "Test-only assertions and helpers are permitted."
)]

use opsgate_core::identifiers::DecisionId;
use opsgate_core::identifiers::SignalId;
use opsgate_core::ActionParams;
use opsgate_core::Category;
use opsgate_core::Classification;
use opsgate_core::Decision;
use opsgate_core::Importance;
use opsgate_core::Timestamp;
use opsgate_core::Urgency;
use opsgate_core::ValidationResult;
use proptest::prelude::*;

fn reasoning_of_len(len: usize) -> String {
    "x".repeat(len)
}

proptest! {
    #[test]
    fn classification_confidence_must_be_in_unit_range(
        confidence in -2.0_f64..3.0_f64,
        reasoning_len in 10_usize..=500,
    ) {
        let result = Classification::new(
            Urgency::Low,
            Importance::Medium,
            Category::Notification,
            confidence,
            reasoning_of_len(reasoning_len),
            Vec::new(),
            false,
        );
        prop_assert_eq!(result.is_ok(), (0.0..=1.0).contains(&confidence));
    }

    #[test]
    fn classification_reasoning_length_is_enforced(reasoning_len in 0_usize..600) {
        let result = Classification::new(
            Urgency::Low,
            Importance::Medium,
            Category::Notification,
            0.5,
            reasoning_of_len(reasoning_len),
            Vec::new(),
            false,
        );
        prop_assert_eq!(result.is_ok(), (10..=500).contains(&reasoning_len));
    }

    #[test]
    fn critical_urgency_requires_immediate_or_high_confidence(
        confidence in 0.0_f64..=1.0_f64,
        requires_immediate in any::<bool>(),
    ) {
        let result = Classification::new(
            Urgency::Critical,
            Importance::High,
            Category::Incident,
            confidence,
            reasoning_of_len(40),
            Vec::new(),
            requires_immediate,
        );
        let expected_ok = requires_immediate || confidence >= 0.7;
        prop_assert_eq!(result.is_ok(), expected_ok);
    }

    #[test]
    fn decision_confidence_must_be_in_unit_range(
        confidence in -2.0_f64..3.0_f64,
        reasoning_len in 10_usize..=500,
    ) {
        let result = Decision::new(
            DecisionId::generate(),
            SignalId::generate(),
            ActionParams::Ignore,
            false,
            reasoning_of_len(reasoning_len),
            confidence,
            Timestamp::now(),
            ValidationResult { valid: true, warnings: Vec::new(), errors: Vec::new() },
            0,
        );
        prop_assert_eq!(result.is_ok(), (0.0..=1.0).contains(&confidence));
    }

    #[test]
    fn decision_reasoning_length_is_enforced(reasoning_len in 0_usize..600) {
        let result = Decision::new(
            DecisionId::generate(),
            SignalId::generate(),
            ActionParams::Ignore,
            false,
            reasoning_of_len(reasoning_len),
            0.5,
            Timestamp::now(),
            ValidationResult { valid: true, warnings: Vec::new(), errors: Vec::new() },
            0,
        );
        prop_assert_eq!(result.is_ok(), (10..=500).contains(&reasoning_len));
    }
}
