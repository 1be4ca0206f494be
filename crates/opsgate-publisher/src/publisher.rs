// crates/opsgate-publisher/src/publisher.rs
// ============================================================================
// Module: Output Publisher (M6)
// Description: Validates a ReasoningResult, routes it to review or emits a
//              formatted action, and keeps the capped audit log.
// Dependencies: opsgate-core, opsgate-reliability, opsgate-review
// ============================================================================

//! ## Overview
//! [`Publisher`] is the gate between reasoning and execution. It validates
//! a `ReasoningResult`, and then either rejects it, hands it to the Review
//! Manager, or announces it as ready to run. Every outcome is recorded in a
//! capped, oldest-evicted audit log.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use opsgate_core::ActionId;
use opsgate_core::ActionParams;
use opsgate_core::CorrelationId;
use opsgate_core::Decision;
use opsgate_core::EventPriority;
use opsgate_core::HubEvent;
use opsgate_core::PublicationId;
use opsgate_core::ReasoningResult;
use opsgate_core::ReviewReason;
use opsgate_core::SignalId;
use opsgate_core::SignalSource;
use opsgate_core::Timestamp;
use opsgate_core::Urgency;
use opsgate_core::ValidationWarning;
use opsgate_reliability::EventHub;
use opsgate_review::ReviewError;
use opsgate_review::ReviewManager;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;
use tracing::warn;

/// Default retry interval for publications stalled on a transient fault.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);
/// Default number of retry attempts before a stalled publication fails.
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 3;
/// Default cap on the retained audit log, oldest evicted first.
pub const DEFAULT_MAX_AUDIT_LOG_SIZE: usize = 10_000;
/// `retryPolicy.maxAttempts` attached to every formatted action.
const ACTION_RETRY_MAX_ATTEMPTS: u32 = 3;
/// `retryPolicy.backoffMs` attached to every formatted action.
const ACTION_RETRY_BACKOFF_MS: u64 = 1000;

/// Errors raised while publishing a reasoning result.
#[derive(Debug, Error)]
pub enum PublisherError {
    /// The review queue could not be reached or persisted.
    #[error(transparent)]
    Review(#[from] ReviewError),
}

/// Outcome of validating a `ReasoningResult` before publication.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    /// Whether the result passed validation.
    pub valid: bool,
    /// Hard validation errors.
    pub errors: Vec<String>,
    /// Fields absent from the result that publication requires.
    pub missing_fields: Vec<String>,
}

/// Retry policy attached to every `FormattedAction`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum dispatch attempts the Queue Manager should make.
    pub max_attempts: u32,
    /// Base backoff between attempts, in milliseconds.
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: ACTION_RETRY_MAX_ATTEMPTS,
            backoff_ms: ACTION_RETRY_BACKOFF_MS,
        }
    }
}

/// Context carried alongside a `FormattedAction` for downstream diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionContext {
    /// The signal this action was derived from.
    pub signal_id: SignalId,
    /// Where the originating signal came from.
    pub source: SignalSource,
    /// Classified urgency, if classification ran.
    pub urgency: Option<Urgency>,
    /// The decision's confidence.
    pub confidence: f64,
    /// The decision's free-text justification.
    pub reasoning: String,
}

/// An action ready for the Queue Manager to dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormattedAction {
    /// Identifier for this action.
    pub action_id: ActionId,
    /// The action and its parameters, as decided.
    pub parameters: ActionParams,
    /// Contextual diagnostics carried alongside the action.
    pub context: ActionContext,
    /// Delivery priority, derived from the signal's urgency.
    pub priority: EventPriority,
    /// Correlates this action with its originating publish call.
    pub correlation_id: CorrelationId,
    /// Retry policy for the Queue Manager to apply.
    pub retry_policy: RetryPolicy,
}

/// Result of one [`Publisher::publish`] call.
#[derive(Debug, Clone)]
pub enum PublishOutcome {
    /// The result failed validation and was not published.
    Rejected(ValidationOutcome),
    /// The result required approval and was queued for review.
    PendingApproval(opsgate_core::ReviewId),
    /// The result is ready for the Queue Manager to dispatch.
    Ready(Box<FormattedAction>),
    /// Queuing for review hit a transient fault; retry is scheduled.
    RetryScheduled,
    /// Retries were exhausted; the action is terminally failed.
    Failed(String),
}

/// Status recorded against one audit-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    /// Published as a ready-to-run action.
    Published,
    /// Rejected at validation.
    Rejected,
    /// Queued for human approval.
    PendingApproval,
    /// Retry scheduled after a transient fault.
    RetryScheduled,
    /// Terminally failed after exhausting retries.
    Failed,
}

/// One entry in the publisher's audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Identifier for this audit entry.
    pub publication_id: PublicationId,
    /// The signal this entry concerns.
    pub signal_id: SignalId,
    /// Where the originating signal came from.
    pub source: SignalSource,
    /// Outcome recorded.
    pub status: AuditStatus,
    /// When this entry was recorded.
    pub timestamp: Timestamp,
    /// Free-text detail (validation errors, rejection reason, and so on).
    pub detail: Option<String>,
}

/// Filters accepted by [`Publisher::get_audit_log`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditFilters {
    /// Restrict to entries with this status.
    pub status: Option<AuditStatus>,
    /// Restrict to entries from this signal source.
    pub source: Option<SignalSource>,
    /// Restrict to entries at or after this time.
    pub since: Option<Timestamp>,
}

struct PendingRetry {
    reasoning_result: ReasoningResult,
    reasons: Vec<ReviewReason>,
    attempts: u32,
    next_attempt_at: Timestamp,
}

struct PublisherState {
    audit_log: VecDeque<AuditEntry>,
    pending_retries: Vec<PendingRetry>,
}

/// The gate between reasoning and execution.
pub struct Publisher {
    review_manager: Arc<ReviewManager>,
    event_hub: Arc<EventHub>,
    retry_interval: Duration,
    max_retry_attempts: u32,
    max_audit_log_size: usize,
    state: Mutex<PublisherState>,
}

impl Publisher {
    /// Builds a publisher over `review_manager`, announcing outcomes on
    /// `event_hub` with the default retry interval, retry attempt cap, and
    /// audit log size.
    #[must_use]
    pub fn new(review_manager: Arc<ReviewManager>, event_hub: Arc<EventHub>) -> Self {
        Self {
            review_manager,
            event_hub,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            max_audit_log_size: DEFAULT_MAX_AUDIT_LOG_SIZE,
            state: Mutex::new(PublisherState {
                audit_log: VecDeque::new(),
                pending_retries: Vec::new(),
            }),
        }
    }

    /// Validates and publishes `reasoning_result`.
    ///
    /// # Errors
    ///
    /// Returns [`PublisherError::Review`] only when a non-transient review
    /// error occurs while queuing for approval; transient faults are
    /// retried internally and reported as [`PublishOutcome::RetryScheduled`].
    pub async fn publish(
        &self,
        reasoning_result: ReasoningResult,
        now: Timestamp,
    ) -> Result<PublishOutcome, PublisherError> {
        let validation = validate_for_publish(&reasoning_result);
        let Some(decision) = reasoning_result.decision_stage.clone() else {
            self.record(&reasoning_result, AuditStatus::Rejected, Some(validation.errors.join("; ")), now)
                .await;
            self.emit(&reasoning_result, "action:rejected", json!({"validation": validation}), EventPriority::Normal, now)
                .await;
            return Ok(PublishOutcome::Rejected(validation));
        };

        if reasoning_result.metadata.requires_human_review {
            return self.queue_for_approval(reasoning_result, now).await;
        }

        Ok(self.publish_ready(reasoning_result, decision, now).await)
    }

    /// Sweeps stalled review-queue retries whose backoff has elapsed.
    ///
    /// # Errors
    ///
    /// Never returns an error today; retry failures are recorded in the
    /// audit log rather than propagated, matching [`Publisher::publish`]'s
    /// own handling of transient faults.
    pub async fn retry_due(&self, now: Timestamp) -> Result<Vec<PublishOutcome>, PublisherError> {
        let due: Vec<PendingRetry> = {
            let mut state = self.state.lock().await;
            let mut due = Vec::new();
            state.pending_retries.retain(|retry| {
                if now.is_at_or_after(retry.next_attempt_at) {
                    due.push(PendingRetry {
                        reasoning_result: retry.reasoning_result.clone(),
                        reasons: retry.reasons.clone(),
                        attempts: retry.attempts,
                        next_attempt_at: retry.next_attempt_at,
                    });
                    false
                } else {
                    true
                }
            });
            due
        };

        let mut outcomes = Vec::with_capacity(due.len());
        for retry in due {
            outcomes.push(self.retry_one(retry, now).await);
        }
        Ok(outcomes)
    }

    /// Returns up to `limit` audit entries matching `filters`, newest first.
    pub async fn get_audit_log(&self, filters: AuditFilters, limit: usize) -> Vec<AuditEntry> {
        let state = self.state.lock().await;
        state
            .audit_log
            .iter()
            .rev()
            .filter(|entry| filters.status.map_or(true, |status| entry.status == status))
            .filter(|entry| filters.source.map_or(true, |source| entry.source == source))
            .filter(|entry| filters.since.map_or(true, |since| entry.timestamp.is_at_or_after(since)))
            .take(limit)
            .cloned()
            .collect()
    }

    async fn queue_for_approval(
        &self,
        reasoning_result: ReasoningResult,
        now: Timestamp,
    ) -> Result<PublishOutcome, PublisherError> {
        let reasons = derive_review_reasons(&reasoning_result);
        match self
            .review_manager
            .queue_for_review(reasoning_result.clone(), reasons.clone(), None, now)
            .await
        {
            Ok(item) => {
                self.record(&reasoning_result, AuditStatus::PendingApproval, None, now).await;
                self.emit(
                    &reasoning_result,
                    "review:pending",
                    json!({"reviewId": item.review_id.as_str(), "riskLevel": item.risk_level}),
                    EventPriority::High,
                    now,
                )
                .await;
                Ok(PublishOutcome::PendingApproval(item.review_id))
            }
            Err(ReviewError::Persistence(err)) => {
                warn!("review queue persistence failed, scheduling retry: {err}");
                let mut state = self.state.lock().await;
                state.pending_retries.push(PendingRetry {
                    reasoning_result,
                    reasons,
                    attempts: 0,
                    next_attempt_at: now.plus(self.retry_interval),
                });
                Ok(PublishOutcome::RetryScheduled)
            }
            Err(other) => Err(PublisherError::Review(other)),
        }
    }

    async fn retry_one(&self, retry: PendingRetry, now: Timestamp) -> PublishOutcome {
        match self
            .review_manager
            .queue_for_review(retry.reasoning_result.clone(), retry.reasons.clone(), None, now)
            .await
        {
            Ok(item) => {
                self.record(&retry.reasoning_result, AuditStatus::PendingApproval, None, now).await;
                self.emit(
                    &retry.reasoning_result,
                    "review:pending",
                    json!({"reviewId": item.review_id.as_str(), "riskLevel": item.risk_level}),
                    EventPriority::High,
                    now,
                )
                .await;
                PublishOutcome::PendingApproval(item.review_id)
            }
            Err(ReviewError::Persistence(_)) if retry.attempts + 1 < self.max_retry_attempts => {
                let mut state = self.state.lock().await;
                state.pending_retries.push(PendingRetry {
                    reasoning_result: retry.reasoning_result,
                    reasons: retry.reasons,
                    attempts: retry.attempts + 1,
                    next_attempt_at: now.plus(self.retry_interval),
                });
                PublishOutcome::RetryScheduled
            }
            Err(err) => {
                let detail = err.to_string();
                self.record(&retry.reasoning_result, AuditStatus::Failed, Some(detail.clone()), now).await;
                PublishOutcome::Failed(detail)
            }
        }
    }

    async fn publish_ready(&self, reasoning_result: ReasoningResult, decision: Decision, now: Timestamp) -> PublishOutcome {
        let urgency = reasoning_result
            .classification_stage
            .as_ref()
            .map(|stage| stage.classification.urgency);
        let priority = urgency.map_or(EventPriority::Normal, urgency_to_priority);

        let action = FormattedAction {
            action_id: ActionId::generate(),
            parameters: decision.action_params.clone(),
            context: ActionContext {
                signal_id: reasoning_result.signal.id.clone(),
                source: reasoning_result.signal.source,
                urgency,
                confidence: decision.confidence,
                reasoning: decision.reasoning.clone(),
            },
            priority,
            correlation_id: CorrelationId::generate(),
            retry_policy: RetryPolicy::default(),
        };

        self.record(&reasoning_result, AuditStatus::Published, None, now).await;
        let payload = match serde_json::to_value(&action) {
            Ok(payload) => payload,
            Err(err) => json!({"serializationError": err.to_string()}),
        };
        self.emit(&reasoning_result, "action:ready", payload, priority, now).await;
        info!(action_id = %action.action_id, "action published");
        PublishOutcome::Ready(Box::new(action))
    }

    async fn record(
        &self,
        reasoning_result: &ReasoningResult,
        status: AuditStatus,
        detail: Option<String>,
        now: Timestamp,
    ) {
        let entry = AuditEntry {
            publication_id: PublicationId::generate(),
            signal_id: reasoning_result.signal.id.clone(),
            source: reasoning_result.signal.source,
            status,
            timestamp: now,
            detail,
        };
        let mut state = self.state.lock().await;
        state.audit_log.push_back(entry);
        while state.audit_log.len() > self.max_audit_log_size {
            state.audit_log.pop_front();
        }
    }

    async fn emit(
        &self,
        reasoning_result: &ReasoningResult,
        event_type: &str,
        data: serde_json::Value,
        priority: EventPriority,
        now: Timestamp,
    ) {
        self.event_hub
            .emit_event(
                HubEvent {
                    source: "publisher".to_string(),
                    event_type: event_type.to_string(),
                    timestamp: now,
                    data,
                    metadata: Some(json!({"signalId": reasoning_result.signal.id.as_str()})),
                    priority,
                },
                now,
            )
            .await;
    }
}

/// Maps classified urgency to Event Hub delivery priority.
#[must_use]
pub const fn urgency_to_priority(urgency: Urgency) -> EventPriority {
    match urgency {
        Urgency::Critical | Urgency::High => EventPriority::High,
        Urgency::Medium => EventPriority::Normal,
        Urgency::Low => EventPriority::Low,
    }
}

/// Validates that a `ReasoningResult` carries everything publication needs.
///
/// Confidence range and the action kind's membership in the closed
/// `ActionKind` set are already enforced when `Decision` is constructed, so
/// the only realistic failure here is a run that produced no decision at
/// all (a `failed` reasoning status).
#[must_use]
pub fn validate_for_publish(reasoning_result: &ReasoningResult) -> ValidationOutcome {
    let Some(decision) = reasoning_result.decision_stage.as_ref() else {
        return ValidationOutcome {
            valid: false,
            errors: vec!["no decision was produced for this signal".to_string()],
            missing_fields: vec!["decision".to_string()],
        };
    };
    debug_assert!((0.0..=1.0).contains(&decision.confidence));
    ValidationOutcome { valid: true, errors: Vec::new(), missing_fields: Vec::new() }
}

/// Derives the reasons a result should be queued for review, from the
/// decision's own validation warnings and high-impact flag.
#[must_use]
pub fn derive_review_reasons(reasoning_result: &ReasoningResult) -> Vec<ReviewReason> {
    let mut reasons = Vec::new();
    let Some(decision) = reasoning_result.decision_stage.as_ref() else {
        return reasons;
    };

    for warning in &decision.validation.warnings {
        match warning {
            ValidationWarning::LowConfidence => reasons.push(ReviewReason::LowConfidence),
            ValidationWarning::PolicyBlocker => reasons.push(ReviewReason::PolicyViolation),
        }
    }
    if decision.action_params.is_high_impact() {
        reasons.push(ReviewReason::HighImpact);
    }
    if is_untrusted_spam(reasoning_result) {
        reasons.push(ReviewReason::UnknownSender);
    }
    if reasons.is_empty() {
        reasons.push(ReviewReason::LowConfidence);
    }
    reasons
}

fn is_untrusted_spam(reasoning_result: &ReasoningResult) -> bool {
    reasoning_result
        .classification_stage
        .as_ref()
        .is_some_and(|stage| stage.classification.category.is_spam())
        && reasoning_result.signal.is_untrusted_sender(&[])
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

    use std::sync::Arc;

    use opsgate_core::ActionParams;
    use opsgate_core::Category;
    use opsgate_core::Classification;
    use opsgate_core::ClassificationStage;
    use opsgate_core::Decision;
    use opsgate_core::DecisionId;
    use opsgate_core::EscalateParams;
    use opsgate_core::Importance;
    use opsgate_core::ReasoningMetadata;
    use opsgate_core::ReasoningStatus;
    use opsgate_core::SendNotificationParams;
    use opsgate_core::Signal;
    use opsgate_core::SignalId;
    use opsgate_core::SignalSource;
    use opsgate_core::StageTimings;
    use opsgate_core::Urgency;
    use opsgate_core::ValidationResult;
    use opsgate_reliability::EventHub;
    use opsgate_reliability::NullEventLogSink;
    use opsgate_review::ReviewManager;

    use super::*;

    fn signal() -> Signal {
        Signal {
            id: SignalId::new("s1"),
            source: SignalSource::Email,
            subject: None,
            body: "please review the attached contract".to_string(),
            sender: Some("ops@co".to_string()),
            timestamp: Timestamp::from_unix_millis(0),
            attachments: Vec::new(),
        }
    }

    fn classification(category: Category) -> ClassificationStage {
        ClassificationStage {
            classification: Classification::new(
                Urgency::Medium,
                Importance::Medium,
                category,
                0.9,
                "routine, low consequence request for review".to_string(),
                Vec::new(),
                false,
            )
            .expect("valid classification"),
            cached: false,
        }
    }

    fn decision(action_params: ActionParams, requires_approval: bool, confidence: f64, warnings: Vec<ValidationWarning>) -> Decision {
        Decision::new(
            DecisionId::new("d1"),
            SignalId::new("s1"),
            action_params,
            requires_approval,
            "escalating per policy on forbidden destination match".to_string(),
            confidence,
            Timestamp::from_unix_millis(0),
            ValidationResult { valid: warnings.is_empty(), warnings, errors: Vec::new() },
            5,
        )
        .expect("valid decision")
    }

    fn reasoning_result(decision_stage: Option<Decision>, requires_human_review: bool) -> ReasoningResult {
        ReasoningResult::new(
            signal(),
            None,
            Some(classification(Category::Request)),
            decision_stage,
            ReasoningMetadata {
                processing_time_ms: 10,
                confidence: 0.9,
                cached: false,
                warning_count: 0,
                requires_human_review,
                status: ReasoningStatus::Success,
                stage_timings: StageTimings::default(),
            },
        )
        .expect("valid reasoning result")
    }

    async fn publisher() -> (Publisher, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let hub = Arc::new(EventHub::new(Arc::new(NullEventLogSink)));
        let review_manager = Arc::new(ReviewManager::new(dir.path().join("review.json"), Arc::clone(&hub)));
        (Publisher::new(review_manager, hub), dir)
    }

    #[tokio::test]
    async fn rejects_results_with_no_decision() {
        let (publisher, _dir) = publisher().await;
        let result = reasoning_result(None, false);
        let outcome = publisher.publish(result, Timestamp::from_unix_millis(0)).await.expect("publish");
        assert!(matches!(outcome, PublishOutcome::Rejected(_)));
    }

    #[tokio::test]
    async fn auto_executable_decision_is_published_ready() {
        let (publisher, _dir) = publisher().await;
        let params = ActionParams::SendNotification(SendNotificationParams {
            platform: "chat".to_string(),
            recipient: "#ops".to_string(),
            message: "heads up".to_string(),
            extra_attributes: Default::default(),
        });
        let result = reasoning_result(Some(decision(params, false, 0.9, Vec::new())), false);
        let outcome = publisher.publish(result, Timestamp::from_unix_millis(0)).await.expect("publish");
        match outcome {
            PublishOutcome::Ready(action) => assert_eq!(action.priority, EventPriority::Normal),
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn requires_approval_queues_for_review() {
        let (publisher, _dir) = publisher().await;
        let params = ActionParams::Escalate(EscalateParams {
            platform: "chat".to_string(),
            reason: "forbidden destination".to_string(),
            extra_attributes: Default::default(),
        });
        let result = reasoning_result(
            Some(decision(params, true, 0.4, vec![ValidationWarning::PolicyBlocker])),
            true,
        );
        let outcome = publisher.publish(result, Timestamp::from_unix_millis(0)).await.expect("publish");
        assert!(matches!(outcome, PublishOutcome::PendingApproval(_)));
        let log = publisher
            .get_audit_log(AuditFilters { status: Some(AuditStatus::PendingApproval), ..Default::default() }, 10)
            .await;
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn urgency_priority_mapping_matches_table() {
        assert_eq!(urgency_to_priority(Urgency::Critical), EventPriority::High);
        assert_eq!(urgency_to_priority(Urgency::High), EventPriority::High);
        assert_eq!(urgency_to_priority(Urgency::Medium), EventPriority::Normal);
        assert_eq!(urgency_to_priority(Urgency::Low), EventPriority::Low);
    }

    #[test]
    fn high_impact_and_policy_warning_both_surface_as_reasons() {
        let params = ActionParams::Escalate(EscalateParams {
            platform: "chat".to_string(),
            reason: "x".to_string(),
            extra_attributes: Default::default(),
        });
        let result = reasoning_result(
            Some(decision(params, true, 0.4, vec![ValidationWarning::PolicyBlocker, ValidationWarning::LowConfidence])),
            true,
        );
        let reasons = derive_review_reasons(&result);
        assert!(reasons.contains(&ReviewReason::PolicyViolation));
        assert!(reasons.contains(&ReviewReason::LowConfidence));
    }
}
