// crates/opsgate-queue/src/manager.rs
// ============================================================================
// Module: Queue Manager (H2)
// Description: Durable priority queue executing approved actions with
//              bounded concurrency and per-platform rate limits.
// Dependencies: opsgate-core, opsgate-reliability, opsgate-router
// ============================================================================

//! ## Overview
//! [`QueueManager`] owns every `QueuedAction` from enqueue through a
//! terminal status. `process_queue` runs one scheduling tick: it sorts
//! pending actions by priority then age, respects `MAX_CONCURRENT` and a
//! per-platform minimum inter-request interval, dispatches through the
//! Action Router, and applies exponential backoff to actions that fail
//! but have attempts remaining.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use opsgate_core::ActionId;
use opsgate_core::ActionStatus;
use opsgate_core::CoreError;
use opsgate_core::Decision;
use opsgate_core::EventPriority;
use opsgate_core::HubEvent;
use opsgate_core::Priority;
use opsgate_core::QueuedAction;
use opsgate_core::ReasoningResult;
use opsgate_core::Timestamp;
use opsgate_reliability::EventHub;
use opsgate_reliability::load_snapshot;
use opsgate_reliability::write_snapshot;
use opsgate_reliability::PersistenceError;
use opsgate_router::ActionRouter;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;
use tracing::warn;

/// Default priority assigned to an action when the caller supplies none.
pub const DEFAULT_PRIORITY: Priority = 3;
/// Maximum actions that may be `Executing` at once.
pub const MAX_CONCURRENT: usize = 5;
/// Base delay for the `BACKOFF_BASE × 2^(attempts-1)` retry schedule.
pub const BACKOFF_BASE: Duration = Duration::from_secs(1);
/// Default cadence of the scheduling tick.
pub const PROCESSING_INTERVAL: Duration = Duration::from_secs(2);

/// Minimum inter-request interval per platform, keyed by platform name.
pub type RateLimitTable = HashMap<String, Duration>;

/// Errors raised while managing the action queue.
#[derive(Debug, Error)]
pub enum QueueError {
    /// No action with this id is queued.
    #[error("action {0} not found")]
    NotFound(ActionId),
    /// The result had no decision to enqueue.
    #[error("reasoning result has no decision to enqueue")]
    MissingDecision,
    /// An invariant enforced by `opsgate_core::queue` was violated.
    #[error(transparent)]
    Invariant(#[from] CoreError),
    /// The queue snapshot could not be written or read.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Aggregate statistics over the action queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Actions currently `Pending`.
    pub pending: usize,
    /// Actions currently `Executing`.
    pub executing: usize,
    /// Actions completed over this manager's lifetime.
    pub completed: u64,
    /// Actions currently `Failed` (retained for inspection, not removed).
    pub failed: usize,
    /// Total actions ever enqueued.
    pub total: u64,
    /// Mean wait time across pending actions, in milliseconds.
    pub avg_wait_time_ms: f64,
    /// Age of the oldest pending action, in milliseconds, if any are
    /// pending.
    pub oldest_pending_age_ms: Option<u64>,
}

/// Outcome of one [`QueueManager::process_queue`] tick.
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    /// Actions dispatched this tick.
    pub dispatched: usize,
    /// Actions that completed successfully this tick.
    pub completed: Vec<ActionId>,
    /// Actions returned to `Pending` with a scheduled retry this tick.
    pub retried: Vec<ActionId>,
    /// Actions that exhausted their attempts this tick.
    pub failed: Vec<ActionId>,
}

#[derive(Default, Serialize, Deserialize)]
struct QueueSnapshot {
    items: Vec<QueuedAction>,
    completed_total: u64,
    enqueued_total: u64,
}

struct QueueState {
    items: HashMap<ActionId, QueuedAction>,
    next_eligible_at: HashMap<ActionId, Timestamp>,
    last_execution: HashMap<String, Timestamp>,
}

/// Durable priority queue executing approved actions.
pub struct QueueManager {
    state: Mutex<QueueState>,
    store_path: PathBuf,
    router: Arc<ActionRouter>,
    event_hub: Arc<EventHub>,
    rate_limits: RateLimitTable,
    paused: AtomicBool,
    completed_total: AtomicU64,
    enqueued_total: AtomicU64,
}

impl QueueManager {
    /// Builds an empty queue manager persisting to `store_path`, dispatching
    /// through `router`, and announcing outcomes on `event_hub`.
    #[must_use]
    pub fn new(
        store_path: PathBuf,
        router: Arc<ActionRouter>,
        event_hub: Arc<EventHub>,
        rate_limits: RateLimitTable,
    ) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: HashMap::new(),
                next_eligible_at: HashMap::new(),
                last_execution: HashMap::new(),
            }),
            store_path,
            router,
            event_hub,
            rate_limits,
            paused: AtomicBool::new(false),
            completed_total: AtomicU64::new(0),
            enqueued_total: AtomicU64::new(0),
        }
    }

    /// Restores the queue from its last snapshot, resetting any action
    /// still `Executing` back to `Pending`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Persistence`] if a snapshot exists but cannot
    /// be read or parsed.
    pub async fn init(&self) -> Result<(), QueueError> {
        if let Some(snapshot) = load_snapshot::<QueueSnapshot>(&self.store_path).await? {
            let mut state = self.state.lock().await;
            for mut item in snapshot.items {
                item.restore_interrupted();
                state.items.insert(item.id.clone(), item);
            }
            self.completed_total.store(snapshot.completed_total, Ordering::SeqCst);
            self.enqueued_total.store(snapshot.enqueued_total, Ordering::SeqCst);
        }
        Ok(())
    }

    /// Flushes the current queue to disk.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Persistence`] if the snapshot cannot be
    /// written.
    pub async fn shutdown(&self) -> Result<(), QueueError> {
        self.persist().await
    }

    /// Enqueues `reasoning_result` at `priority` (`1` highest, `5` lowest).
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::MissingDecision`] if `reasoning_result` has no
    /// decision stage, or [`QueueError::Persistence`] if the updated queue
    /// cannot be persisted.
    pub async fn enqueue(
        &self,
        reasoning_result: ReasoningResult,
        priority: Priority,
        now: Timestamp,
    ) -> Result<ActionId, QueueError> {
        if reasoning_result.decision_stage.is_none() {
            return Err(QueueError::MissingDecision);
        }
        let action = QueuedAction::new(ActionId::generate(), reasoning_result, priority, now);
        let action_id = action.id.clone();
        {
            let mut state = self.state.lock().await;
            state.items.insert(action_id.clone(), action);
        }
        self.enqueued_total.fetch_add(1, Ordering::SeqCst);
        self.persist().await?;
        Ok(action_id)
    }

    /// Pauses scheduling; [`QueueManager::process_queue`] becomes a no-op
    /// until [`QueueManager::resume`] is called.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Resumes scheduling after a [`QueueManager::pause`].
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Removes every `Pending` action from the queue. Actions already
    /// `Executing`, `Completed`, or `Failed` are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Persistence`] if the cleared queue cannot be
    /// persisted.
    pub async fn clear(&self) -> Result<(), QueueError> {
        {
            let mut state = self.state.lock().await;
            let pending_ids: Vec<ActionId> = state
                .items
                .values()
                .filter(|item| item.status == ActionStatus::Pending)
                .map(|item| item.id.clone())
                .collect();
            for id in pending_ids {
                state.items.remove(&id);
                state.next_eligible_at.remove(&id);
            }
        }
        self.persist().await
    }

    /// Runs one scheduling tick: dispatches eligible pending actions up to
    /// `MAX_CONCURRENT`, respecting each platform's rate limit, and
    /// resolves in-flight results from the previous dispatch round.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Persistence`] if the queue cannot be
    /// persisted after a transition.
    pub async fn process_queue(&self, now: Timestamp) -> Result<TickOutcome, QueueError> {
        if self.paused.load(Ordering::SeqCst) {
            return Ok(TickOutcome::default());
        }

        let dispatches = self.claim_dispatches(now).await;
        if dispatches.is_empty() {
            return Ok(TickOutcome::default());
        }
        self.persist().await?;

        let mut outcome = TickOutcome { dispatched: dispatches.len(), ..TickOutcome::default() };
        for (action_id, decision) in dispatches {
            self.resolve_dispatch(action_id, decision, now, &mut outcome).await;
        }
        self.persist().await?;
        Ok(outcome)
    }

    async fn claim_dispatches(&self, now: Timestamp) -> Vec<(ActionId, Decision)> {
        let mut state = self.state.lock().await;
        let executing_count = state
            .items
            .values()
            .filter(|item| item.status == ActionStatus::Executing)
            .count();
        let mut slots = MAX_CONCURRENT.saturating_sub(executing_count);
        if slots == 0 {
            return Vec::new();
        }

        let mut candidates: Vec<ActionId> = state
            .items
            .values()
            .filter(|item| item.status == ActionStatus::Pending)
            .filter(|item| {
                state
                    .next_eligible_at
                    .get(&item.id)
                    .is_none_or(|eligible| now.is_at_or_after(*eligible))
            })
            .map(|item| item.id.clone())
            .collect();
        candidates.sort_by(|a, b| {
            let item_a = &state.items[a];
            let item_b = &state.items[b];
            item_a.priority.cmp(&item_b.priority).then_with(|| item_a.created_at.cmp(&item_b.created_at))
        });

        let mut dispatches = Vec::new();
        for action_id in candidates {
            if slots == 0 {
                break;
            }
            let platform = state.items[&action_id]
                .reasoning_result
                .decision_stage
                .as_ref()
                .and_then(|decision| decision.action_params.platform().map(str::to_string));
            if let Some(platform) = &platform {
                if let Some(min_interval) = self.rate_limits.get(platform) {
                    if let Some(last) = state.last_execution.get(platform) {
                        if now < last.plus(*min_interval) {
                            continue;
                        }
                    }
                }
            }

            let Some(decision) = state.items[&action_id].reasoning_result.decision_stage.clone() else {
                continue;
            };
            let Some(item) = state.items.get_mut(&action_id) else {
                continue;
            };
            if item.begin_attempt(now).is_err() {
                continue;
            }
            if let Some(platform) = platform {
                state.last_execution.insert(platform, now);
            }
            slots -= 1;
            dispatches.push((action_id, decision));
        }
        dispatches
    }

    async fn resolve_dispatch(
        &self,
        action_id: ActionId,
        decision: Decision,
        now: Timestamp,
        outcome: &mut TickOutcome,
    ) {
        let result = self.router.route_action(&decision, now).await;

        let mut state = self.state.lock().await;
        let Some(item) = state.items.get_mut(&action_id) else {
            return;
        };

        if result.success {
            if item.complete(now).is_ok() {
                state.items.remove(&action_id);
                state.next_eligible_at.remove(&action_id);
                self.completed_total.fetch_add(1, Ordering::SeqCst);
                outcome.completed.push(action_id.clone());
                info!(action_id = %action_id, "action completed");
                self.emit("action:completed", &action_id, now).await;
            }
            return;
        }

        let error = result.error.unwrap_or_else(|| "dispatch failed with no detail".to_string());
        if item.fail_attempt(now, error.clone()).is_ok() {
            match item.status {
                ActionStatus::Pending => {
                    let attempts = item.attempts;
                    let backoff = BACKOFF_BASE.saturating_mul(1u32 << attempts.saturating_sub(1));
                    state.next_eligible_at.insert(action_id.clone(), now.plus(backoff));
                    outcome.retried.push(action_id.clone());
                    warn!(action_id = %action_id, attempts, "dispatch failed, retry scheduled");
                    self.emit("action:retry_scheduled", &action_id, now).await;
                }
                ActionStatus::Failed => {
                    outcome.failed.push(action_id.clone());
                    warn!(action_id = %action_id, error = %error, "action failed, attempts exhausted");
                    self.emit("action:failed", &action_id, now).await;
                }
                ActionStatus::Executing | ActionStatus::Completed => {}
            }
        }
    }

    /// Computes current queue statistics.
    pub async fn stats(&self, now: Timestamp) -> QueueStats {
        let state = self.state.lock().await;
        let mut pending = 0usize;
        let mut executing = 0usize;
        let mut failed = 0usize;
        let mut wait_times_ms: Vec<u64> = Vec::new();

        for item in state.items.values() {
            match item.status {
                ActionStatus::Pending => {
                    pending += 1;
                    wait_times_ms.push(age_ms(item.created_at, now));
                }
                ActionStatus::Executing => executing += 1,
                ActionStatus::Failed => failed += 1,
                ActionStatus::Completed => {}
            }
        }

        let oldest_pending_age_ms = wait_times_ms.iter().copied().max();
        #[allow(clippy::cast_precision_loss, reason = "queue sizes stay far below f64's exact-integer range")]
        let avg_wait_time_ms = if wait_times_ms.is_empty() {
            0.0
        } else {
            wait_times_ms.iter().sum::<u64>() as f64 / wait_times_ms.len() as f64
        };

        QueueStats {
            pending,
            executing,
            completed: self.completed_total.load(Ordering::SeqCst),
            failed,
            total: self.enqueued_total.load(Ordering::SeqCst),
            avg_wait_time_ms,
            oldest_pending_age_ms,
        }
    }

    async fn persist(&self) -> Result<(), QueueError> {
        let state = self.state.lock().await;
        let items: Vec<QueuedAction> = state.items.values().cloned().collect();
        drop(state);
        write_snapshot(
            &self.store_path,
            &QueueSnapshot {
                items,
                completed_total: self.completed_total.load(Ordering::SeqCst),
                enqueued_total: self.enqueued_total.load(Ordering::SeqCst),
            },
        )
        .await?;
        Ok(())
    }

    async fn emit(&self, event_type: &str, action_id: &ActionId, now: Timestamp) {
        self.event_hub
            .emit_event(
                HubEvent {
                    source: "queue_manager".to_string(),
                    event_type: event_type.to_string(),
                    timestamp: now,
                    data: json!({"actionId": action_id.as_str()}),
                    metadata: None,
                    priority: EventPriority::Normal,
                },
                now,
            )
            .await;
    }
}

#[allow(clippy::cast_sign_loss, reason = "saturating_sub is clamped to 0 before the cast")]
fn age_ms(since: Timestamp, now: Timestamp) -> u64 {
    now.unix_millis().saturating_sub(since.unix_millis()).max(0) as u64
}
