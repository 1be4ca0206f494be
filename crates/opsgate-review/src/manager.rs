// crates/opsgate-review/src/manager.rs
// ============================================================================
// Module: Review Manager (M5)
// Description: Durable human-approval queue with risk-tiered
//              auto-expiration and aggregate statistics.
// Dependencies: opsgate-core, opsgate-reliability
// ============================================================================

//! ## Overview
//! [`ReviewManager`] owns every `ReviewItem` queued for human approval. It
//! assigns a risk tier (or accepts a caller-supplied one), derives the
//! auto-expiration deadline from that tier, and exposes the sweep that
//! resolves expired items per the risk-tier table: `low`/`medium` auto
//! approve, `high` auto-rejects only when time-sensitive, `critical` never
//! auto-transitions.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use opsgate_core::ActionParams;
use opsgate_core::CoreError;
use opsgate_core::EventPriority;
use opsgate_core::HubEvent;
use opsgate_core::Modification;
use opsgate_core::ReasoningResult;
use opsgate_core::ReviewId;
use opsgate_core::ReviewItem;
use opsgate_core::ReviewReason;
use opsgate_core::ReviewStatus;
use opsgate_core::RiskLevel;
use opsgate_core::Timestamp;
use opsgate_core::Urgency;
use opsgate_reliability::EventHub;
use opsgate_reliability::load_snapshot;
use opsgate_reliability::write_snapshot;
use opsgate_reliability::PersistenceError;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

const LOW_EXPIRY: Duration = Duration::from_secs(60 * 60);
const MEDIUM_EXPIRY: Duration = Duration::from_secs(4 * 60 * 60);
const HIGH_EXPIRY: Duration = Duration::from_secs(24 * 60 * 60);

const TIME_SENSITIVE_KEYWORDS: [&str; 5] =
    ["asap", "urgent", "deadline", "immediate", "time-sensitive"];

/// Errors raised while managing the review queue.
#[derive(Debug, Error)]
pub enum ReviewError {
    /// No review with this id is queued.
    #[error("review {0} not found")]
    NotFound(ReviewId),
    /// `reasoningResult.decisionStage` was absent; nothing to review.
    #[error("reasoning result has no decision to review")]
    MissingDecision,
    /// An invariant enforced by `opsgate_core::review` was violated.
    #[error(transparent)]
    Invariant(#[from] CoreError),
    /// The queue snapshot could not be written or read.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Filters accepted by [`ReviewManager::get_queue`].
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueFilters {
    /// Restrict to items with this status.
    pub status: Option<ReviewStatus>,
    /// Restrict to items with this risk level.
    pub risk_level: Option<RiskLevel>,
}

/// Wait-time distribution, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WaitTimeStats {
    /// Mean wait time across every queued item.
    pub mean_ms: f64,
    /// Median wait time across every queued item.
    pub median_ms: u64,
    /// Maximum wait time observed.
    pub max_ms: u64,
}

/// Aggregate statistics over the review queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewStats {
    /// Count of items currently in each status.
    pub counts_by_status: HashMap<ReviewStatus, usize>,
    /// Count of items at each risk level.
    pub counts_by_risk: HashMap<RiskLevel, usize>,
    /// Count of items queued for each reason (an item may count under
    /// several reasons at once).
    pub counts_by_reason: HashMap<ReviewReason, usize>,
    /// Distribution of time spent in the queue, resolved or not.
    pub wait_time: WaitTimeStats,
    /// `approved + auto_approved` divided by every terminal item.
    pub approval_rate: f64,
    /// `rejected + auto_rejected` divided by every terminal item.
    pub rejection_rate: f64,
    /// Total items ever queued, including resolved ones.
    pub total: usize,
}

/// Outcome of one [`ReviewManager::auto_expire`] sweep.
#[derive(Debug, Clone, Default)]
pub struct AutoExpireOutcome {
    /// Items auto-approved this sweep.
    pub auto_approved: Vec<ReviewItem>,
    /// Items auto-rejected this sweep.
    pub auto_rejected: Vec<ReviewItem>,
}

#[derive(Default, Serialize, Deserialize)]
struct QueueSnapshot {
    items: Vec<ReviewItem>,
}

/// Manages `ReviewItem`s awaiting, or resolved by, human approval.
pub struct ReviewManager {
    items: Mutex<HashMap<ReviewId, ReviewItem>>,
    store_path: PathBuf,
    event_hub: Arc<EventHub>,
}

impl ReviewManager {
    /// Builds an empty manager persisting to `store_path` and publishing
    /// queue events to `event_hub`.
    #[must_use]
    pub fn new(store_path: PathBuf, event_hub: Arc<EventHub>) -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            store_path,
            event_hub,
        }
    }

    /// Restores the queue from its last snapshot, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Persistence`] if a snapshot exists but cannot
    /// be read or parsed.
    pub async fn load(&self) -> Result<(), ReviewError> {
        if let Some(snapshot) = load_snapshot::<QueueSnapshot>(&self.store_path).await? {
            let mut items = self.items.lock().await;
            for item in snapshot.items {
                items.insert(item.review_id.clone(), item);
            }
        }
        Ok(())
    }

    /// Queues `reasoning_result` for human approval under `reasons`,
    /// determining `risk_level` from the precedence table unless the
    /// caller supplies one.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::MissingDecision`] if `reasoning_result` has no
    /// decision stage, [`ReviewError::Invariant`] if the risk level and
    /// expiry combination is invalid, or [`ReviewError::Persistence`] if the
    /// updated queue cannot be persisted.
    pub async fn queue_for_review(
        &self,
        reasoning_result: ReasoningResult,
        reasons: Vec<ReviewReason>,
        risk_level: Option<RiskLevel>,
        now: Timestamp,
    ) -> Result<ReviewItem, ReviewError> {
        let decision = reasoning_result
            .decision_stage
            .clone()
            .ok_or(ReviewError::MissingDecision)?;
        let risk_level =
            risk_level.unwrap_or_else(|| RiskLevel::determine(&reasons, decision.confidence));
        let expires_at = expiry_for(risk_level, now);
        let signal_id = reasoning_result.signal.id.clone();

        let item = ReviewItem::new(
            ReviewId::generate(),
            signal_id,
            reasons,
            risk_level,
            reasoning_result,
            decision,
            now,
            expires_at,
        )?;

        {
            let mut items = self.items.lock().await;
            items.insert(item.review_id.clone(), item.clone());
        }
        self.persist().await?;
        Ok(item)
    }

    /// Approves `review_id`, recording `approver` and any modifications
    /// applied.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::NotFound`] if no such review is queued,
    /// [`ReviewError::Invariant`] if it is not `Pending`, or
    /// [`ReviewError::Persistence`] if the updated queue cannot be
    /// persisted.
    pub async fn approve(
        &self,
        review_id: &ReviewId,
        approver: impl Into<String>,
        modifications: Vec<Modification>,
        now: Timestamp,
    ) -> Result<ReviewItem, ReviewError> {
        let item = {
            let mut items = self.items.lock().await;
            let item = items
                .get_mut(review_id)
                .ok_or_else(|| ReviewError::NotFound(review_id.clone()))?;
            item.transition_to(ReviewStatus::Approved, now)?;
            item.reviewer = Some(approver.into());
            item.modifications = modifications;
            item.clone()
        };
        self.persist().await?;
        self.emit(&item, "review:approved", now).await;
        Ok(item)
    }

    /// Rejects `review_id`, recording `reviewer` and the rejection reason.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::NotFound`] if no such review is queued,
    /// [`ReviewError::Invariant`] if it is not `Pending`, or
    /// [`ReviewError::Persistence`] if the updated queue cannot be
    /// persisted.
    pub async fn reject(
        &self,
        review_id: &ReviewId,
        reviewer: impl Into<String>,
        reason: impl Into<String>,
        now: Timestamp,
    ) -> Result<ReviewItem, ReviewError> {
        let item = {
            let mut items = self.items.lock().await;
            let item = items
                .get_mut(review_id)
                .ok_or_else(|| ReviewError::NotFound(review_id.clone()))?;
            item.transition_to(ReviewStatus::Rejected, now)?;
            item.reviewer = Some(reviewer.into());
            item.rejection_reason = Some(reason.into());
            item.clone()
        };
        self.persist().await?;
        self.emit(&item, "review:rejected", now).await;
        Ok(item)
    }

    /// Sweeps every `Pending` item whose `expires_at` has passed:
    /// `low`/`medium` risk transitions to `auto_approved`, `high` risk
    /// transitions to `auto_rejected` when [`time_sensitive`], and
    /// otherwise is re-announced on the event bus without transitioning, so
    /// it keeps surfacing for manual escalation. `critical` risk items are
    /// skipped outright since they have no `expires_at`.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Persistence`] if the swept queue cannot be
    /// persisted; items already transitioned in memory are not rolled back.
    pub async fn auto_expire(&self, now: Timestamp) -> Result<AutoExpireOutcome, ReviewError> {
        let mut outcome = AutoExpireOutcome::default();
        let due: Vec<ReviewId> = {
            let items = self.items.lock().await;
            items
                .values()
                .filter(|item| item.status == ReviewStatus::Pending)
                .filter(|item| item.expires_at.is_some_and(|expiry| now.is_at_or_after(expiry)))
                .map(|item| item.review_id.clone())
                .collect()
        };

        for review_id in due {
            self.expire_one(&review_id, now, &mut outcome).await;
        }

        self.persist().await?;
        Ok(outcome)
    }

    async fn expire_one(&self, review_id: &ReviewId, now: Timestamp, outcome: &mut AutoExpireOutcome) {
        enum Resolution {
            Approved(ReviewItem),
            Rejected(ReviewItem),
            Lingering(ReviewItem),
            Skipped,
        }

        let resolution = {
            let mut items = self.items.lock().await;
            let Some(item) = items.get_mut(review_id) else {
                return;
            };
            match item.risk_level {
                RiskLevel::Low | RiskLevel::Medium => {
                    if item.transition_to(ReviewStatus::AutoApproved, now).is_err() {
                        Resolution::Skipped
                    } else {
                        Resolution::Approved(item.clone())
                    }
                }
                RiskLevel::High if time_sensitive(item) => {
                    if item.transition_to(ReviewStatus::AutoRejected, now).is_err() {
                        Resolution::Skipped
                    } else {
                        Resolution::Rejected(item.clone())
                    }
                }
                RiskLevel::High => Resolution::Lingering(item.clone()),
                RiskLevel::Critical => Resolution::Skipped,
            }
        };

        match resolution {
            Resolution::Approved(item) => {
                info!(review_id = %item.review_id, "review auto-approved on expiry");
                self.emit(&item, "review:auto_approved", now).await;
                outcome.auto_approved.push(item);
            }
            Resolution::Rejected(item) => {
                info!(review_id = %item.review_id, "review auto-rejected on expiry (time-sensitive)");
                self.emit(&item, "review:auto_rejected", now).await;
                outcome.auto_rejected.push(item);
            }
            Resolution::Lingering(item) => {
                info!(review_id = %item.review_id, "high-risk review past expiry, not time-sensitive, re-announcing");
                self.emit(&item, "review:pending", now).await;
            }
            Resolution::Skipped => {}
        }
    }

    /// Returns every review item matching `filters`, ordered
    /// `critical > high > medium > low`, ties broken oldest-first.
    pub async fn get_queue(&self, filters: QueueFilters) -> Vec<ReviewItem> {
        let items = self.items.lock().await;
        let mut matching: Vec<ReviewItem> = items
            .values()
            .filter(|item| filters.status.map_or(true, |status| item.status == status))
            .filter(|item| filters.risk_level.map_or(true, |risk| item.risk_level == risk))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.risk_level.cmp(&a.risk_level).then_with(|| a.queued_at.cmp(&b.queued_at)));
        matching
    }

    /// Computes aggregate statistics over every item ever queued, measuring
    /// wait time up to `now` for items still pending.
    pub async fn get_stats(&self, now: Timestamp) -> ReviewStats {
        let items = self.items.lock().await;
        let mut stats = ReviewStats {
            total: items.len(),
            ..ReviewStats::default()
        };

        let mut wait_times_ms: Vec<u64> = Vec::with_capacity(items.len());
        let mut approved_count = 0usize;
        let mut rejected_count = 0usize;
        let mut terminal_count = 0usize;

        for item in items.values() {
            *stats.counts_by_status.entry(item.status).or_insert(0) += 1;
            *stats.counts_by_risk.entry(item.risk_level).or_insert(0) += 1;
            for reason in &item.reasons {
                *stats.counts_by_reason.entry(*reason).or_insert(0) += 1;
            }
            wait_times_ms.push(wait_time_ms(item, now));

            if item.status.is_terminal() {
                terminal_count += 1;
                match item.status {
                    ReviewStatus::Approved | ReviewStatus::AutoApproved => approved_count += 1,
                    ReviewStatus::Rejected | ReviewStatus::AutoRejected => rejected_count += 1,
                    _ => {}
                }
            }
        }

        stats.wait_time = wait_time_distribution(&mut wait_times_ms);
        if terminal_count > 0 {
            #[allow(clippy::cast_precision_loss, reason = "queue sizes stay far below f64's exact-integer range")]
            {
                stats.approval_rate = approved_count as f64 / terminal_count as f64;
                stats.rejection_rate = rejected_count as f64 / terminal_count as f64;
            }
        }
        stats
    }

    async fn persist(&self) -> Result<(), ReviewError> {
        let items: Vec<ReviewItem> = self.items.lock().await.values().cloned().collect();
        write_snapshot(&self.store_path, &QueueSnapshot { items }).await?;
        Ok(())
    }

    async fn emit(&self, item: &ReviewItem, event_type: &str, now: Timestamp) {
        self.event_hub
            .emit_event(
                HubEvent {
                    source: "review_manager".to_string(),
                    event_type: event_type.to_string(),
                    timestamp: now,
                    data: json!({
                        "reviewId": item.review_id.as_str(),
                        "signalId": item.signal_id.as_str(),
                        "riskLevel": item.risk_level,
                        "status": item.status,
                    }),
                    metadata: None,
                    priority: EventPriority::High,
                },
                now,
            )
            .await;
    }
}

fn expiry_for(risk_level: RiskLevel, now: Timestamp) -> Option<Timestamp> {
    match risk_level {
        RiskLevel::Low => Some(now.plus(LOW_EXPIRY)),
        RiskLevel::Medium => Some(now.plus(MEDIUM_EXPIRY)),
        RiskLevel::High => Some(now.plus(HIGH_EXPIRY)),
        RiskLevel::Critical => None,
    }
}

/// Whether a high-risk review should auto-reject on expiry rather than
/// linger for manual escalation.
fn time_sensitive(item: &ReviewItem) -> bool {
    let classification_critical = item.reasoning_result.classification_stage.as_ref().is_some_and(|stage| {
        stage.classification.urgency == Urgency::Critical || stage.classification.requires_immediate
    });
    if classification_critical || implies_deadline(&item.original_decision.action_params) {
        return true;
    }
    let body = item.reasoning_result.signal.body.to_lowercase();
    TIME_SENSITIVE_KEYWORDS.iter().any(|keyword| body.contains(keyword))
}

fn implies_deadline(action_params: &ActionParams) -> bool {
    matches!(action_params, ActionParams::CreateTask(params) if params.due_date.is_some())
}

#[allow(clippy::cast_sign_loss, reason = "saturating_sub is clamped to 0 before the cast")]
fn wait_time_ms(item: &ReviewItem, now: Timestamp) -> u64 {
    let end = item.reviewed_at.unwrap_or(now);
    end.unix_millis().saturating_sub(item.queued_at.unix_millis()).max(0) as u64
}

fn wait_time_distribution(wait_times_ms: &mut [u64]) -> WaitTimeStats {
    if wait_times_ms.is_empty() {
        return WaitTimeStats::default();
    }
    wait_times_ms.sort_unstable();
    let max_ms = wait_times_ms[wait_times_ms.len() - 1];
    let mid = wait_times_ms.len() / 2;
    let median_ms = if wait_times_ms.len() % 2 == 0 {
        (wait_times_ms[mid - 1] + wait_times_ms[mid]) / 2
    } else {
        wait_times_ms[mid]
    };
    #[allow(clippy::cast_precision_loss, reason = "wait times stay far below f64's exact-integer range")]
    let mean_ms = wait_times_ms.iter().sum::<u64>() as f64 / wait_times_ms.len() as f64;
    WaitTimeStats { mean_ms, median_ms, max_ms }
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

    use opsgate_core::identifiers::SignalId;
    use opsgate_core::reasoning::ClassificationStage;
    use opsgate_core::reasoning::ReasoningMetadata;
    use opsgate_core::reasoning::ReasoningStatus;
    use opsgate_core::reasoning::StageTimings;
    use opsgate_core::signal::Signal;
    use opsgate_core::signal::SignalSource;
    use opsgate_core::Category;
    use opsgate_core::Classification;
    use opsgate_core::CreateTaskParams;
    use opsgate_core::Decision;
    use opsgate_core::DecisionId;
    use opsgate_core::Importance;
    use opsgate_core::Urgency;
    use opsgate_core::ValidationResult;
    use tempfile::tempdir;

    use super::*;
    use opsgate_reliability::NullEventLogSink;

    fn signal(body: &str) -> Signal {
        Signal {
            id: SignalId::generate(),
            source: SignalSource::Email,
            subject: None,
            body: body.to_string(),
            sender: Some("someone@example.com".to_string()),
            timestamp: Timestamp::from_unix_millis(0),
            attachments: Vec::new(),
        }
    }

    fn classification(urgency: Urgency, confidence: f64, requires_immediate: bool) -> Classification {
        Classification::new(
            urgency,
            Importance::Medium,
            Category::Task,
            confidence,
            "routine task requiring review before dispatch".to_string(),
            Vec::new(),
            requires_immediate,
        )
        .expect("valid classification")
    }

    fn decision(confidence: f64, action_params: ActionParams) -> Decision {
        Decision::new(
            DecisionId::generate(),
            SignalId::generate(),
            action_params,
            true,
            "queued for human review given policy constraints".to_string(),
            confidence,
            Timestamp::from_unix_millis(0),
            ValidationResult::default(),
            5,
        )
        .expect("valid decision")
    }

    fn reasoning_result(signal: Signal, classification: Classification, decision: Decision) -> ReasoningResult {
        let metadata = ReasoningMetadata {
            processing_time_ms: 10,
            confidence: decision.confidence,
            cached: false,
            warning_count: 0,
            requires_human_review: true,
            status: ReasoningStatus::Success,
            stage_timings: StageTimings::default(),
        };
        ReasoningResult::new(
            signal,
            None,
            Some(ClassificationStage { classification, cached: false }),
            Some(decision),
            metadata,
        )
        .expect("valid reasoning result")
    }

    async fn manager() -> (ReviewManager, tempfile::TempDir) {
        let dir = tempdir().expect("tempdir");
        let hub = Arc::new(EventHub::new(Arc::new(NullEventLogSink)));
        let manager = ReviewManager::new(dir.path().join("review_queue.json"), hub);
        (manager, dir)
    }

    #[tokio::test]
    async fn queue_for_review_determines_risk_when_not_supplied() {
        let (manager, _dir) = manager().await;
        let result = reasoning_result(
            signal("a routine update"),
            classification(Urgency::Low, 0.95, false),
            decision(0.95, ActionParams::Ignore),
        );
        let item = manager
            .queue_for_review(result, vec![], None, Timestamp::from_unix_millis(0))
            .await
            .expect("queue");
        assert_eq!(item.risk_level, RiskLevel::Low);
        assert!(item.expires_at.is_some());
    }

    #[tokio::test]
    async fn approve_transitions_and_records_reviewer() {
        let (manager, _dir) = manager().await;
        let result = reasoning_result(
            signal("please review"),
            classification(Urgency::Medium, 0.6, false),
            decision(0.6, ActionParams::Ignore),
        );
        let item = manager
            .queue_for_review(result, vec![ReviewReason::LowConfidence], None, Timestamp::from_unix_millis(0))
            .await
            .expect("queue");
        let resolved = manager
            .approve(&item.review_id, "alice", vec![], Timestamp::from_unix_millis(1000))
            .await
            .expect("approve");
        assert_eq!(resolved.status, ReviewStatus::Approved);
        assert_eq!(resolved.reviewer.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn auto_expire_approves_low_risk_past_deadline() {
        let (manager, _dir) = manager().await;
        let result = reasoning_result(
            signal("routine update"),
            classification(Urgency::Low, 0.95, false),
            decision(0.95, ActionParams::Ignore),
        );
        manager
            .queue_for_review(result, vec![], None, Timestamp::from_unix_millis(0))
            .await
            .expect("queue");
        let outcome = manager.auto_expire(Timestamp::from_unix_millis(0).plus(LOW_EXPIRY)).await.expect("sweep");
        assert_eq!(outcome.auto_approved.len(), 1);
        assert!(outcome.auto_rejected.is_empty());
    }

    #[tokio::test]
    async fn auto_expire_rejects_time_sensitive_high_risk() {
        let (manager, _dir) = manager().await;
        let result = reasoning_result(
            signal("this is urgent, please action asap"),
            classification(Urgency::High, 0.4, false),
            decision(
                0.4,
                ActionParams::CreateTask(CreateTaskParams {
                    platform: "notion".to_string(),
                    title: "handle it".to_string(),
                    description: None,
                    assignee: None,
                    due_date: None,
                    extra_attributes: Default::default(),
                }),
            ),
        );
        let item = manager
            .queue_for_review(result, vec![ReviewReason::LargeScope], None, Timestamp::from_unix_millis(0))
            .await
            .expect("queue");
        assert_eq!(item.risk_level, RiskLevel::High);
        let outcome = manager.auto_expire(Timestamp::from_unix_millis(0).plus(HIGH_EXPIRY)).await.expect("sweep");
        assert_eq!(outcome.auto_rejected.len(), 1);
    }

    #[tokio::test]
    async fn auto_expire_leaves_non_time_sensitive_high_risk_pending() {
        let (manager, _dir) = manager().await;
        let result = reasoning_result(
            signal("a moderate concern, no rush"),
            classification(Urgency::Medium, 0.4, false),
            decision(
                0.4,
                ActionParams::CreateTask(CreateTaskParams {
                    platform: "notion".to_string(),
                    title: "handle it".to_string(),
                    description: None,
                    assignee: None,
                    due_date: None,
                    extra_attributes: Default::default(),
                }),
            ),
        );
        let item = manager
            .queue_for_review(result, vec![ReviewReason::LargeScope], None, Timestamp::from_unix_millis(0))
            .await
            .expect("queue");
        let outcome = manager.auto_expire(Timestamp::from_unix_millis(0).plus(HIGH_EXPIRY)).await.expect("sweep");
        assert!(outcome.auto_approved.is_empty());
        assert!(outcome.auto_rejected.is_empty());
        let queue = manager.get_queue(QueueFilters::default()).await;
        assert_eq!(queue[0].review_id, item.review_id);
        assert_eq!(queue[0].status, ReviewStatus::Pending);
    }

    #[tokio::test]
    async fn critical_risk_never_auto_expires() {
        let (manager, _dir) = manager().await;
        let result = reasoning_result(
            signal("move money now"),
            classification(Urgency::Critical, 0.9, true),
            decision(
                0.9,
                ActionParams::FileDocument(opsgate_core::FileDocumentParams {
                    platform: "drive".to_string(),
                    destination: "finance".to_string(),
                    title: "wire transfer".to_string(),
                    touches_money: true,
                    extra_attributes: Default::default(),
                }),
            ),
        );
        let item = manager
            .queue_for_review(result, vec![ReviewReason::HighImpact], None, Timestamp::from_unix_millis(0))
            .await
            .expect("queue");
        assert_eq!(item.risk_level, RiskLevel::Critical);
        assert!(item.expires_at.is_none());
        let outcome = manager
            .auto_expire(Timestamp::from_unix_millis(0).plus(Duration::from_secs(365 * 24 * 60 * 60)))
            .await
            .expect("sweep");
        assert!(outcome.auto_approved.is_empty());
        assert!(outcome.auto_rejected.is_empty());
    }

    #[tokio::test]
    async fn get_queue_orders_by_risk_then_age() {
        let (manager, _dir) = manager().await;
        let low = reasoning_result(
            signal("low risk"),
            classification(Urgency::Low, 0.95, false),
            decision(0.95, ActionParams::Ignore),
        );
        let high = reasoning_result(
            signal("high risk"),
            classification(Urgency::Medium, 0.3, false),
            decision(0.3, ActionParams::Ignore),
        );
        manager
            .queue_for_review(low, vec![], None, Timestamp::from_unix_millis(0))
            .await
            .expect("queue low");
        manager
            .queue_for_review(high, vec![ReviewReason::LargeScope], None, Timestamp::from_unix_millis(1000))
            .await
            .expect("queue high");
        let queue = manager.get_queue(QueueFilters::default()).await;
        assert_eq!(queue[0].risk_level, RiskLevel::High);
        assert_eq!(queue[1].risk_level, RiskLevel::Low);
    }

    #[tokio::test]
    async fn stats_reflect_terminal_outcomes() {
        let (manager, _dir) = manager().await;
        let result = reasoning_result(
            signal("a task"),
            classification(Urgency::Medium, 0.6, false),
            decision(0.6, ActionParams::Ignore),
        );
        let item = manager
            .queue_for_review(result, vec![ReviewReason::LowConfidence], None, Timestamp::from_unix_millis(0))
            .await
            .expect("queue");
        manager
            .approve(&item.review_id, "bob", vec![], Timestamp::from_unix_millis(5000))
            .await
            .expect("approve");
        let stats = manager.get_stats(Timestamp::from_unix_millis(10_000)).await;
        assert_eq!(stats.total, 1);
        assert_eq!(stats.approval_rate, 1.0);
        assert_eq!(stats.wait_time.max_ms, 5000);
    }

    #[tokio::test]
    async fn load_restores_persisted_queue() {
        let dir = tempdir().expect("tempdir");
        let store_path = dir.path().join("review_queue.json");
        let hub = Arc::new(EventHub::new(Arc::new(NullEventLogSink)));
        let manager = ReviewManager::new(store_path.clone(), hub);
        let result = reasoning_result(
            signal("persisted item"),
            classification(Urgency::Low, 0.95, false),
            decision(0.95, ActionParams::Ignore),
        );
        manager
            .queue_for_review(result, vec![], None, Timestamp::from_unix_millis(0))
            .await
            .expect("queue");

        let hub2 = Arc::new(EventHub::new(Arc::new(NullEventLogSink)));
        let restored = ReviewManager::new(store_path, hub2);
        restored.load().await.expect("load");
        let queue = restored.get_queue(QueueFilters::default()).await;
        assert_eq!(queue.len(), 1);
    }
}
