// crates/opsgate-core/src/queue.rs
// ============================================================================
// Module: Queued Action
// Description: An approved action awaiting or undergoing execution.
// Purpose: Define QueuedAction, its status machine, and attempt bookkeeping.
// Dependencies: crate::{error, identifiers, reasoning, time}, serde
// ============================================================================

//! ## Overview
//! A `QueuedAction` is owned by the Queue Manager until it terminates. It
//! leaves `Executing` only via `Completed`, `Failed`, or a process restart
//! (which resets it to `Pending`); this module enforces that transition
//! shape rather than permitting direct status mutation.

use serde::Deserialize;
use serde::Serialize;

use crate::error::CoreError;
use crate::identifiers::ActionId;
use crate::reasoning::ReasoningResult;
use crate::time::Timestamp;

/// Default cap on execution attempts before an action is marked `Failed`.
pub const MAX_ATTEMPTS: u32 = 3;

/// Lifecycle status of a `QueuedAction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Waiting to be dispatched.
    Pending,
    /// Currently dispatched to a platform adapter.
    Executing,
    /// Dispatch succeeded.
    Completed,
    /// Dispatch failed after exhausting attempts.
    Failed,
}

/// Priority for a `QueuedAction`; `1` is highest.
pub type Priority = u8;

/// An approved action awaiting or undergoing execution by the Queue
/// Manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedAction {
    /// Identifier for this queued action.
    pub id: ActionId,
    /// The reasoning result this action was formatted from.
    pub reasoning_result: ReasoningResult,
    /// Priority, `1` (highest) through `5` (lowest).
    pub priority: Priority,
    /// Current lifecycle status.
    pub status: ActionStatus,
    /// Number of dispatch attempts made so far.
    pub attempts: u32,
    /// When this action was enqueued.
    pub created_at: Timestamp,
    /// When the most recent dispatch attempt began, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<Timestamp>,
    /// When this action reached a terminal status, if it has.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<Timestamp>,
    /// Error message from the most recent failed attempt, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueuedAction {
    /// Builds a new `QueuedAction` in `Pending` status with zero attempts.
    #[must_use]
    pub fn new(
        id: ActionId,
        reasoning_result: ReasoningResult,
        priority: Priority,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            reasoning_result,
            priority: priority.clamp(1, 5),
            status: ActionStatus::Pending,
            attempts: 0,
            created_at,
            last_attempt_at: None,
            executed_at: None,
            error: None,
        }
    }

    /// Marks this action as dispatched: moves `Pending` to `Executing` and
    /// increments `attempts`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Invariant`] if the action is not `Pending`, or
    /// if `attempts` would exceed [`MAX_ATTEMPTS`].
    pub fn begin_attempt(&mut self, at: Timestamp) -> Result<(), CoreError> {
        if self.status != ActionStatus::Pending {
            return Err(CoreError::Invariant(format!(
                "action {} is {:?}, not pending",
                self.id, self.status
            )));
        }
        if self.attempts >= MAX_ATTEMPTS {
            return Err(CoreError::Invariant(format!(
                "action {} already exhausted {} attempts",
                self.id, MAX_ATTEMPTS
            )));
        }
        self.status = ActionStatus::Executing;
        self.attempts += 1;
        self.last_attempt_at = Some(at);
        Ok(())
    }

    /// Marks this action `Completed`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Invariant`] if the action is not `Executing`.
    pub fn complete(&mut self, at: Timestamp) -> Result<(), CoreError> {
        self.require_executing()?;
        self.status = ActionStatus::Completed;
        self.executed_at = Some(at);
        self.error = None;
        Ok(())
    }

    /// Records a failed attempt. If `attempts < MAX_ATTEMPTS`, returns the
    /// action to `Pending` for a later retry; otherwise marks it `Failed`
    /// with `executed_at` set.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Invariant`] if the action is not `Executing`.
    pub fn fail_attempt(&mut self, at: Timestamp, error: String) -> Result<(), CoreError> {
        self.require_executing()?;
        self.error = Some(error);
        if self.attempts < MAX_ATTEMPTS {
            self.status = ActionStatus::Pending;
        } else {
            self.status = ActionStatus::Failed;
            self.executed_at = Some(at);
        }
        Ok(())
    }

    /// Restores an `Executing` action to `Pending`, as happens on process
    /// restart when the prior attempt's outcome is unknown.
    pub fn restore_interrupted(&mut self) {
        if self.status == ActionStatus::Executing {
            self.status = ActionStatus::Pending;
        }
    }

    fn require_executing(&self) -> Result<(), CoreError> {
        if self.status != ActionStatus::Executing {
            return Err(CoreError::Invariant(format!(
                "action {} is {:?}, not executing",
                self.id, self.status
            )));
        }
        Ok(())
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

    use super::ActionStatus;
    use super::QueuedAction;
    use super::MAX_ATTEMPTS;
    use crate::classification::Category;
    use crate::classification::Classification;
    use crate::classification::Importance;
    use crate::classification::Urgency;
    use crate::identifiers::ActionId;
    use crate::identifiers::SignalId;
    use crate::reasoning::ClassificationStage;
    use crate::reasoning::ReasoningMetadata;
    use crate::reasoning::ReasoningResult;
    use crate::reasoning::ReasoningStatus;
    use crate::reasoning::StageTimings;
    use crate::signal::Signal;
    use crate::signal::SignalSource;
    use crate::time::Timestamp;

    fn reasoning_result() -> ReasoningResult {
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
        ReasoningResult::new(
            Signal {
                id: SignalId::new("s1"),
                source: SignalSource::Email,
                subject: None,
                body: "hello".to_string(),
                sender: None,
                timestamp: Timestamp::from_unix_millis(0),
                attachments: Vec::new(),
            },
            None,
            Some(ClassificationStage {
                classification,
                cached: false,
            }),
            None,
            ReasoningMetadata {
                processing_time_ms: 5,
                confidence: 0.9,
                cached: false,
                warning_count: 0,
                requires_human_review: false,
                status: ReasoningStatus::Success,
                stage_timings: StageTimings::default(),
            },
        )
        .expect("valid result")
    }

    #[test]
    fn exhausting_attempts_marks_failed_with_executed_at() {
        let mut action = QueuedAction::new(
            ActionId::new("a1"),
            reasoning_result(),
            3,
            Timestamp::from_unix_millis(0),
        );
        for attempt in 1..=MAX_ATTEMPTS {
            action.begin_attempt(Timestamp::from_unix_millis(0)).expect("begin");
            action
                .fail_attempt(Timestamp::from_unix_millis(0), "boom".to_string())
                .expect("fail");
            if attempt < MAX_ATTEMPTS {
                assert_eq!(action.status, ActionStatus::Pending);
            }
        }
        assert_eq!(action.status, ActionStatus::Failed);
        assert!(action.executed_at.is_some());
    }

    #[test]
    fn completing_requires_executing_state() {
        let mut action = QueuedAction::new(
            ActionId::new("a1"),
            reasoning_result(),
            3,
            Timestamp::from_unix_millis(0),
        );
        assert!(action.complete(Timestamp::from_unix_millis(0)).is_err());
    }

    #[test]
    fn restore_interrupted_resets_executing_to_pending() {
        let mut action = QueuedAction::new(
            ActionId::new("a1"),
            reasoning_result(),
            3,
            Timestamp::from_unix_millis(0),
        );
        action.begin_attempt(Timestamp::from_unix_millis(0)).expect("begin");
        action.restore_interrupted();
        assert_eq!(action.status, ActionStatus::Pending);
    }
}
