// crates/opsgate-core/src/reasoning.rs
// ============================================================================
// Module: Reasoning Result
// Description: The Reasoning Pipeline's per-signal outcome.
// Purpose: Define ReasoningResult, its stage outputs, and run metadata.
// Dependencies: crate::{classification, decision, error, preprocessed,
//               signal}, serde
// ============================================================================

//! ## Overview
//! A `ReasoningResult` is produced by sequencing the Signal Preprocessor,
//! Classifier, and Decision Maker over one `Signal`. `requiresHumanReview`
//! depends on fields outside this type (spam category plus sender trust),
//! so it is computed by the pipeline crate that owns that policy, not
//! enforced as a constructor invariant here; this module only enforces the
//! `cached ⇒ classification_stage.cached` invariant, which is local.

use serde::Deserialize;
use serde::Serialize;

use crate::classification::Classification;
use crate::decision::Decision;
use crate::error::CoreError;
use crate::preprocessed::PreprocessedSignal;
use crate::signal::Signal;

/// Terminal status of one reasoning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningStatus {
    /// All three stages succeeded.
    Success,
    /// Classification succeeded but decision-making failed; a safe
    /// fallback `ignore` decision was substituted and review is required.
    Partial,
    /// Classification failed; no decision was produced.
    Failed,
}

/// The Classifier's output for one run, with cache provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationStage {
    /// The classification produced (or served from cache).
    pub classification: Classification,
    /// Whether this result was served from the response cache.
    pub cached: bool,
}

/// Per-stage wall-clock timings, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTimings {
    /// Time spent in the Signal Preprocessor.
    pub preprocessing_ms: u64,
    /// Time spent in the Classifier.
    pub classification_ms: u64,
    /// Time spent in the Decision Maker.
    pub decision_ms: u64,
}

/// Summary metadata attached to a `ReasoningResult`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningMetadata {
    /// Total wall-clock processing time, in milliseconds.
    pub processing_time_ms: u64,
    /// Overall confidence: the decision's if present, else the
    /// classification's.
    pub confidence: f64,
    /// Whether any stage result in this run was served from cache.
    pub cached: bool,
    /// Count of non-fatal warnings accumulated across stages.
    pub warning_count: u32,
    /// Whether this result requires human review before execution.
    pub requires_human_review: bool,
    /// Terminal status of the run.
    pub status: ReasoningStatus,
    /// Per-stage timings.
    pub stage_timings: StageTimings,
}

/// The Reasoning Pipeline's outcome for one `Signal`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningResult {
    /// The signal this run processed.
    pub signal: Signal,
    /// Preprocessor output, absent only if the adapter fed malformed input
    /// (practically always present: stage 1 has an error-fallback path).
    pub preprocessing_stage: Option<PreprocessedSignal>,
    /// Classifier output, absent when classification failed outright.
    pub classification_stage: Option<ClassificationStage>,
    /// Decision Maker output, absent when the run is `failed`.
    pub decision_stage: Option<Decision>,
    /// Summary metadata for the run.
    pub metadata: ReasoningMetadata,
}

impl ReasoningResult {
    /// Builds a `ReasoningResult`, enforcing `cached ⇒
    /// classification_stage.cached`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Invariant`] if `metadata.cached` is `true` while
    /// `classification_stage` is absent or not itself cached.
    pub fn new(
        signal: Signal,
        preprocessing_stage: Option<PreprocessedSignal>,
        classification_stage: Option<ClassificationStage>,
        decision_stage: Option<Decision>,
        metadata: ReasoningMetadata,
    ) -> Result<Self, CoreError> {
        if metadata.cached {
            let stage_cached = classification_stage
                .as_ref()
                .is_some_and(|stage| stage.cached);
            if !stage_cached {
                return Err(CoreError::Invariant(
                    "metadata.cached requires a cached classification stage".to_string(),
                ));
            }
        }
        Ok(Self {
            signal,
            preprocessing_stage,
            classification_stage,
            decision_stage,
            metadata,
        })
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

    use super::ClassificationStage;
    use super::ReasoningMetadata;
    use super::ReasoningResult;
    use super::ReasoningStatus;
    use super::StageTimings;
    use crate::classification::Category;
    use crate::classification::Classification;
    use crate::classification::Importance;
    use crate::classification::Urgency;
    use crate::identifiers::SignalId;
    use crate::signal::Signal;
    use crate::signal::SignalSource;
    use crate::time::Timestamp;

    fn signal() -> Signal {
        Signal {
            id: SignalId::new("s1"),
            source: SignalSource::Email,
            subject: None,
            body: "hello".to_string(),
            sender: None,
            timestamp: Timestamp::from_unix_millis(0),
            attachments: Vec::new(),
        }
    }

    fn metadata(cached: bool) -> ReasoningMetadata {
        ReasoningMetadata {
            processing_time_ms: 10,
            confidence: 0.9,
            cached,
            warning_count: 0,
            requires_human_review: false,
            status: ReasoningStatus::Success,
            stage_timings: StageTimings::default(),
        }
    }

    #[test]
    fn cached_metadata_without_cached_stage_is_rejected() {
        let result = ReasoningResult::new(signal(), None, None, None, metadata(true));
        assert!(result.is_err());
    }

    #[test]
    fn cached_metadata_with_cached_stage_is_accepted() {
        let classification = Classification::new(
            Urgency::Low,
            Importance::Low,
            Category::Information,
            0.9,
            "routine informational update, no action needed".to_string(),
            Vec::new(),
            false,
        )
        .expect("valid classification");
        let stage = ClassificationStage {
            classification,
            cached: true,
        };
        let result =
            ReasoningResult::new(signal(), None, Some(stage), None, metadata(true));
        assert!(result.is_ok());
    }
}
