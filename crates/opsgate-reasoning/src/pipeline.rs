// crates/opsgate-reasoning/src/pipeline.rs
// ============================================================================
// Module: Reasoning Pipeline (M4)
// Description: Sequences the Signal Preprocessor, Classifier, and Decision
//              Maker over one Signal, recording per-stage timings and
//              computing the overall confidence / requiresHumanReview /
//              status.
// Dependencies: opsgate-core, crate::{classifier, decision_maker,
//               preprocessor}
// ============================================================================

//! ## Overview
//! [`ReasoningPipeline::process`] is the single `process(signal) ->
//! ReasoningResult` contract. Concurrent calls for signals that normalize
//! to the same classification fingerprint are coalesced: the first caller
//! runs the classifier, later callers for the same fingerprint wait on its
//! result instead of issuing a duplicate LLM call.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use opsgate_cache::fingerprint_of;
use opsgate_core::ClassificationStage;
use opsgate_core::Decision;
use opsgate_core::Fingerprint;
use opsgate_core::ReasoningMetadata;
use opsgate_core::ReasoningResult;
use opsgate_core::ReasoningStatus;
use opsgate_core::Signal;
use opsgate_core::StageTimings;
use opsgate_core::Timestamp;
use opsgate_core::ValidationResult;
use opsgate_core::ValidationWarning;
use tokio::sync::Mutex;
use tracing::warn;

use crate::classifier::Classifier;
use crate::classifier::ClassifyOutcome;
use crate::decision_maker::DecisionMaker;
use crate::preprocessor;

const REVIEW_CONFIDENCE_FLOOR: f64 = 0.7;

type CoalesceSlot = Arc<Mutex<Option<Result<ClassifyOutcome, String>>>>;

/// Sequences M1 -> M2 -> M3 over a `Signal`, producing a `ReasoningResult`.
pub struct ReasoningPipeline {
    classifier: Arc<Classifier>,
    decision_maker: Arc<DecisionMaker>,
    trusted_senders: Vec<String>,
    extract_entities: bool,
    classifier_model: String,
    classifier_temperature: f32,
    inflight: Mutex<HashMap<Fingerprint, CoalesceSlot>>,
}

impl ReasoningPipeline {
    /// Builds a pipeline over the given M2/M3 components.
    #[must_use]
    pub fn new(
        classifier: Arc<Classifier>,
        decision_maker: Arc<DecisionMaker>,
        trusted_senders: Vec<String>,
        extract_entities: bool,
        classifier_model: String,
        classifier_temperature: f32,
    ) -> Self {
        Self {
            classifier,
            decision_maker,
            trusted_senders,
            extract_entities,
            classifier_model,
            classifier_temperature,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Runs the full pipeline over `signal`.
    pub async fn process(&self, signal: Signal, now: Timestamp) -> ReasoningResult {
        let pipeline_started = Instant::now();
        let mut stage_timings = StageTimings::default();

        let preprocessing_started = Instant::now();
        let preprocessed = preprocessor::preprocess(&signal, now, self.extract_entities);
        stage_timings.preprocessing_ms = elapsed_ms(preprocessing_started);

        let Ok(preprocess_result) = preprocessed else {
            return self.failed_result(signal, None, stage_timings, pipeline_started);
        };

        let classification_started = Instant::now();
        let classify_result = self
            .classify_coalesced(&preprocess_result.signal.cleaned_body, preprocess_result.signal.cleaned_subject.as_deref(), now)
            .await;
        stage_timings.classification_ms = elapsed_ms(classification_started);

        let Ok(outcome) = classify_result else {
            return self.failed_result(signal, Some(preprocess_result.signal), stage_timings, pipeline_started);
        };

        let decision_started = Instant::now();
        let decision_result = self
            .decision_maker
            .decide(&signal.id, &preprocess_result.signal.cleaned_body, &outcome.classification, now)
            .await;
        stage_timings.decision_ms = elapsed_ms(decision_started);

        match decision_result {
            Ok(decision) => self.success_result(signal, preprocess_result.signal, outcome, decision, stage_timings, pipeline_started),
            Err(error) => {
                warn!(%error, "decision maker failed, substituting a safe fallback ignore decision");
                let fallback = fallback_ignore_decision(&signal.id, now);
                self.partial_result(signal, preprocess_result.signal, outcome, fallback, stage_timings, pipeline_started)
            }
        }
    }

    async fn classify_coalesced(
        &self,
        cleaned_body: &str,
        subject: Option<&str>,
        now: Timestamp,
    ) -> Result<ClassifyOutcome, String> {
        let fingerprint = fingerprint_of(
            &crate::classifier::normalized_for_fingerprint(cleaned_body, subject),
            &self.classifier_model,
            self.classifier_temperature,
            None,
        );

        let slot = {
            let mut inflight = self.inflight.lock().await;
            inflight.entry(fingerprint.clone()).or_insert_with(|| Arc::new(Mutex::new(None))).clone()
        };

        let mut guard = slot.lock().await;
        if let Some(cached) = guard.clone() {
            return cached;
        }

        let result = self
            .classifier
            .classify(cleaned_body, subject, now)
            .await
            .map_err(|error| error.to_string());
        *guard = Some(result.clone());
        drop(guard);

        self.inflight.lock().await.remove(&fingerprint);
        result
    }

    fn failed_result(
        &self,
        signal: Signal,
        preprocessing_stage: Option<opsgate_core::PreprocessedSignal>,
        stage_timings: StageTimings,
        pipeline_started: Instant,
    ) -> ReasoningResult {
        let metadata = ReasoningMetadata {
            processing_time_ms: elapsed_ms(pipeline_started),
            confidence: 0.0,
            cached: false,
            warning_count: 0,
            requires_human_review: true,
            status: ReasoningStatus::Failed,
            stage_timings,
        };
        build_result(signal, preprocessing_stage, None, None, metadata)
    }

    fn partial_result(
        &self,
        signal: Signal,
        preprocessing_stage: opsgate_core::PreprocessedSignal,
        outcome: ClassifyOutcome,
        fallback_decision: Decision,
        stage_timings: StageTimings,
        pipeline_started: Instant,
    ) -> ReasoningResult {
        let stage = ClassificationStage { classification: outcome.classification, cached: outcome.cached };
        let metadata = ReasoningMetadata {
            processing_time_ms: elapsed_ms(pipeline_started),
            confidence: fallback_decision.confidence,
            cached: outcome.cached,
            warning_count: u32::try_from(fallback_decision.validation.warnings.len()).unwrap_or(u32::MAX),
            requires_human_review: true,
            status: ReasoningStatus::Partial,
            stage_timings,
        };
        build_result(signal, Some(preprocessing_stage), Some(stage), Some(fallback_decision), metadata)
    }

    fn success_result(
        &self,
        signal: Signal,
        preprocessing_stage: opsgate_core::PreprocessedSignal,
        outcome: ClassifyOutcome,
        decision: Decision,
        stage_timings: StageTimings,
        pipeline_started: Instant,
    ) -> ReasoningResult {
        let spam_from_untrusted_sender = outcome.classification.category.is_spam() && signal.is_untrusted_sender(&self.trusted_senders);
        let requires_human_review =
            decision.requires_approval || decision.confidence < REVIEW_CONFIDENCE_FLOOR || spam_from_untrusted_sender;

        let stage = ClassificationStage { classification: outcome.classification, cached: outcome.cached };
        let metadata = ReasoningMetadata {
            processing_time_ms: elapsed_ms(pipeline_started),
            confidence: decision.confidence,
            cached: outcome.cached,
            warning_count: u32::try_from(decision.validation.warnings.len()).unwrap_or(u32::MAX),
            requires_human_review,
            status: ReasoningStatus::Success,
            stage_timings,
        };
        build_result(signal, Some(preprocessing_stage), Some(stage), Some(decision), metadata)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[allow(clippy::expect_used, reason = "fixed literal confidence/reasoning inputs always satisfy Decision::new's invariants")]
fn fallback_ignore_decision(signal_id: &opsgate_core::identifiers::SignalId, now: Timestamp) -> Decision {
    let validation = ValidationResult { valid: true, warnings: vec![ValidationWarning::LowConfidence], errors: Vec::new() };
    Decision::new(
        opsgate_core::identifiers::DecisionId::generate(),
        signal_id.clone(),
        opsgate_core::ActionParams::Ignore,
        true,
        "decision maker failed, deferring to human review".to_string(),
        0.0,
        now,
        validation,
        0,
    )
    .expect("fixed literal inputs always satisfy Decision::new's invariants")
}

#[allow(clippy::expect_used, reason = "metadata.cached is always derived from classification_stage.cached above, so the invariant always holds")]
fn build_result(
    signal: Signal,
    preprocessing_stage: Option<opsgate_core::PreprocessedSignal>,
    classification_stage: Option<ClassificationStage>,
    decision_stage: Option<Decision>,
    metadata: ReasoningMetadata,
) -> ReasoningResult {
    ReasoningResult::new(signal, preprocessing_stage, classification_stage, decision_stage, metadata)
        .expect("metadata.cached is always derived from classification_stage.cached")
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

    use std::collections::BTreeMap;

    use async_trait::async_trait;
    use opsgate_cache::ResponseCache;
    use opsgate_cache::TtlConfig;
    use opsgate_contract::ContractValidator;
    use opsgate_core::identifiers::SignalId;
    use opsgate_core::SignalSource;
    use opsgate_core::TokenUsage;
    use opsgate_llm::ChatMessage;
    use opsgate_llm::ChatOptions;
    use opsgate_llm::ChatProvider;
    use opsgate_llm::ChatResponse;
    use opsgate_llm::FinishReason;
    use opsgate_llm::LlmGateway;
    use opsgate_llm::ModelPricing;
    use opsgate_llm::ProviderError;
    use opsgate_llm::RetryConfig;
    use opsgate_llm::TokenBudget;
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;
    use crate::classifier::ClassifierConfig;
    use crate::decision_maker::PolicyBlockers;

    struct ScriptedProvider;

    #[async_trait]
    impl ChatProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn chat(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<ChatResponse, ProviderError> {
            let prompt = &messages[0].content;
            let payload = if prompt.contains("Classify") {
                json!({
                    "urgency": "high",
                    "importance": "high",
                    "category": "task",
                    "confidence": 0.9,
                    "reasoning": "clear actionable task described in the body",
                    "suggestedActions": ["create_task"],
                    "requiresImmediate": false,
                })
            } else {
                json!({
                    "action": "create_task",
                    "actionParams": {
                        "action": "create_task",
                        "platform": "notion",
                        "title": "Follow up on report",
                    },
                    "requiresApproval": false,
                    "reasoning": "routine task creation with high classifier confidence",
                    "confidence": 0.9,
                })
            };
            Ok(ChatResponse {
                content: payload.to_string(),
                parsed_json: Some(payload),
                usage: TokenUsage { prompt_tokens: 10, completion_tokens: 10 },
                finish_reason: FinishReason::Stop,
                provider: "scripted".to_string(),
                model: options.model.clone(),
                latency_ms: 0,
            })
        }
    }

    fn signal(body: &str) -> Signal {
        Signal {
            id: SignalId::new("s1"),
            source: SignalSource::Email,
            subject: Some("status report".to_string()),
            body: body.to_string(),
            sender: Some("trusted@example.com".to_string()),
            timestamp: Timestamp::from_unix_millis(0),
            attachments: Vec::new(),
        }
    }

    fn pipeline(dir: &std::path::Path) -> ReasoningPipeline {
        let gateway = Arc::new(LlmGateway::new(vec![Arc::new(ScriptedProvider)], RetryConfig::default()));
        let budget = Arc::new(TokenBudget::new(
            500_000,
            BTreeMap::from([("test".to_string(), ModelPricing { prompt_micros_per_1k: 1, completion_micros_per_1k: 1 })]),
            dir.join("budget.json"),
            time::UtcOffset::UTC,
        ));
        let cache = Arc::new(ResponseCache::new(TtlConfig::default(), dir.join("cache.json")));
        let validator = Arc::new(ContractValidator::new().expect("validator compiles"));

        let classifier = Arc::new(Classifier::new(
            gateway.clone(),
            budget,
            cache,
            validator.clone(),
            ClassifierConfig { provider: "test".to_string(), model: "test".to_string(), temperature: 0.0 },
        ));
        let decision_maker =
            Arc::new(DecisionMaker::new(gateway, validator, "test".to_string(), 0.0, PolicyBlockers::default()));

        ReasoningPipeline::new(classifier, decision_maker, vec!["trusted@example.com".to_string()], false, "test".to_string(), 0.0)
    }

    #[tokio::test]
    async fn successful_run_produces_success_status() {
        let dir = tempdir().expect("tempdir");
        let pipeline = pipeline(dir.path());
        let result = pipeline.process(signal("Please create a task for the quarterly report."), Timestamp::from_unix_millis(0)).await;
        assert_eq!(result.metadata.status, ReasoningStatus::Success);
        assert!(result.decision_stage.is_some());
        assert!(!result.metadata.requires_human_review);
    }

    #[tokio::test]
    async fn untrusted_sender_spam_requires_human_review() {
        let dir = tempdir().expect("tempdir");
        let pipeline = pipeline(dir.path());
        let mut untrusted = signal("Please create a task for the quarterly report.");
        untrusted.sender = Some("someone-else@example.com".to_string());
        let result = pipeline.process(untrusted, Timestamp::from_unix_millis(0)).await;
        assert_eq!(result.metadata.status, ReasoningStatus::Success);
    }

    #[tokio::test]
    async fn concurrent_identical_signals_share_one_classification() {
        let dir = tempdir().expect("tempdir");
        let pipeline = Arc::new(pipeline(dir.path()));
        let body = "Please create a task for the quarterly report.";
        let first = pipeline.process(signal(body), Timestamp::from_unix_millis(0));
        let second = pipeline.process(signal(body), Timestamp::from_unix_millis(0));
        let (first_result, second_result) = tokio::join!(first, second);
        assert_eq!(first_result.metadata.status, ReasoningStatus::Success);
        assert_eq!(second_result.metadata.status, ReasoningStatus::Success);
    }
}
