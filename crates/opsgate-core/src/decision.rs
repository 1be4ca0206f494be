// crates/opsgate-core/src/decision.rs
// ============================================================================
// Module: Decision
// Description: The Decision Maker's validated action instruction.
// Purpose: Define Decision, its tagged action-parameter union, and
//          ValidationResult.
// Dependencies: crate::{error, identifiers, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! `actionParams` in the distilled spec is a dynamic, per-action-type
//! property map. Per the redesign notes, this is replaced with
//! [`ActionParams`], a tagged union with one variant per `ActionKind` and a
//! named field set per variant; a small `extra_attributes` bag is reserved
//! on each variant for genuinely free-form fields an LLM might add that the
//! schema does not promote to a first-class field.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::error::CoreError;
use crate::identifiers::DecisionId;
use crate::identifiers::SignalId;
use crate::time::Timestamp;

/// The closed set of actions a `Decision` may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Create a tracked task.
    CreateTask,
    /// Send a notification to a chat or messaging platform.
    SendNotification,
    /// Update a row or cell in a spreadsheet.
    UpdateSheet,
    /// File a document in a drive-like store.
    FileDocument,
    /// Delegate handling to another recipient.
    Delegate,
    /// Escalate to a human for direct attention.
    Escalate,
    /// Take no action.
    Ignore,
}

/// Free-form attributes an LLM produced that are not first-class fields.
pub type ExtraAttributes = BTreeMap<String, Value>;

/// Parameters for a `create_task` decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTaskParams {
    /// Target platform, e.g. `notion`, `trello`.
    pub platform: String,
    /// Task title.
    pub title: String,
    /// Optional task description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional assignee.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    /// Optional due date, ISO-8601.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    /// Free-form extra attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_attributes: ExtraAttributes,
}

/// Parameters for a `send_notification` decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendNotificationParams {
    /// Target platform, e.g. `chat`.
    pub platform: String,
    /// Notification recipient (channel, user, or address).
    pub recipient: String,
    /// Notification message body.
    pub message: String,
    /// Free-form extra attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_attributes: ExtraAttributes,
}

/// Parameters for an `update_sheet` decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateSheetParams {
    /// Target platform, e.g. `sheets`.
    pub platform: String,
    /// Target sheet identifier or name.
    pub sheet: String,
    /// Target cell or row reference.
    pub range: String,
    /// Value to write.
    pub value: String,
    /// Free-form extra attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_attributes: ExtraAttributes,
}

/// Parameters for a `file_document` decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDocumentParams {
    /// Target platform, e.g. `drive`.
    pub platform: String,
    /// Destination folder or collection.
    pub destination: String,
    /// Document title.
    pub title: String,
    /// Whether this document involves a monetary amount.
    #[serde(default)]
    pub touches_money: bool,
    /// Free-form extra attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_attributes: ExtraAttributes,
}

/// Parameters for a `delegate` decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegateParams {
    /// Target platform the delegate will act through.
    pub platform: String,
    /// Recipient the signal is being delegated to.
    pub recipient: String,
    /// Whether `recipient` has not previously received a delegation.
    #[serde(default)]
    pub is_new_recipient: bool,
    /// Free-form extra attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_attributes: ExtraAttributes,
}

/// Parameters for an `escalate` decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalateParams {
    /// Target platform for the escalation notice.
    pub platform: String,
    /// Reason for escalation.
    pub reason: String,
    /// Free-form extra attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_attributes: ExtraAttributes,
}

/// Tagged union of per-action parameters, replacing a dynamic property map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionParams {
    /// See [`CreateTaskParams`].
    CreateTask(CreateTaskParams),
    /// See [`SendNotificationParams`].
    SendNotification(SendNotificationParams),
    /// See [`UpdateSheetParams`].
    UpdateSheet(UpdateSheetParams),
    /// See [`FileDocumentParams`].
    FileDocument(FileDocumentParams),
    /// See [`DelegateParams`].
    Delegate(DelegateParams),
    /// See [`EscalateParams`].
    Escalate(EscalateParams),
    /// No parameters; `actionParams` is empty by invariant.
    Ignore,
}

impl ActionParams {
    /// Returns the `ActionKind` this variant corresponds to.
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::CreateTask(_) => ActionKind::CreateTask,
            Self::SendNotification(_) => ActionKind::SendNotification,
            Self::UpdateSheet(_) => ActionKind::UpdateSheet,
            Self::FileDocument(_) => ActionKind::FileDocument,
            Self::Delegate(_) => ActionKind::Delegate,
            Self::Escalate(_) => ActionKind::Escalate,
            Self::Ignore => ActionKind::Ignore,
        }
    }

    /// Returns the target platform, if this action has one.
    #[must_use]
    pub fn platform(&self) -> Option<&str> {
        match self {
            Self::CreateTask(p) => Some(&p.platform),
            Self::SendNotification(p) => Some(&p.platform),
            Self::UpdateSheet(p) => Some(&p.platform),
            Self::FileDocument(p) => Some(&p.platform),
            Self::Delegate(p) => Some(&p.platform),
            Self::Escalate(p) => Some(&p.platform),
            Self::Ignore => None,
        }
    }

    /// Returns whether this action is high-impact: `file_document` touching
    /// money, or `delegate` to a recipient not seen before.
    #[must_use]
    pub const fn is_high_impact(&self) -> bool {
        match self {
            Self::FileDocument(p) => p.touches_money,
            Self::Delegate(p) => p.is_new_recipient,
            _ => false,
        }
    }

    /// Rewrites this action to `Ignore`, used by the policy blocker rule.
    pub fn blocked(&mut self) {
        *self = Self::Ignore;
    }
}

/// A single validation finding attached to a `Decision`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationWarning {
    /// Confidence fell below the review floor.
    LowConfidence,
    /// The action targets a forbidden destination.
    PolicyBlocker,
}

/// Outcome of applying the Decision Maker's validation rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the decision passed validation outright (no hard errors).
    pub valid: bool,
    /// Warnings raised while validating, non-fatal.
    #[serde(default)]
    pub warnings: Vec<ValidationWarning>,
    /// Hard validation errors, if any.
    #[serde(default)]
    pub errors: Vec<String>,
}

/// The Decision Maker's validated action instruction for a `Signal`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Identifier for this decision.
    pub decision_id: DecisionId,
    /// Identifier of the signal this decision was made for.
    pub signal_id: SignalId,
    /// The action and its parameters.
    pub action_params: ActionParams,
    /// Whether this decision must pass through human review before
    /// execution.
    pub requires_approval: bool,
    /// Free-text justification, 10-500 characters.
    pub reasoning: String,
    /// Model confidence in `[0, 1]`.
    pub confidence: f64,
    /// When the decision was produced.
    pub timestamp: Timestamp,
    /// Result of applying the validation rules.
    pub validation: ValidationResult,
    /// Wall-clock time the Decision Maker spent producing this decision, in
    /// milliseconds.
    pub processing_time_ms: u64,
}

impl Decision {
    /// Builds a `Decision`, enforcing the confidence range, reasoning
    /// length, and `ignore ⇒ no parameters` invariants.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::OutOfRange`] if `confidence` is outside
    /// `[0, 1]`, or [`CoreError::InvalidLength`] if `reasoning` is outside
    /// 10-500 characters.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        decision_id: DecisionId,
        signal_id: SignalId,
        action_params: ActionParams,
        requires_approval: bool,
        reasoning: String,
        confidence: f64,
        timestamp: Timestamp,
        validation: ValidationResult,
        processing_time_ms: u64,
    ) -> Result<Self, CoreError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(CoreError::OutOfRange {
                field: "confidence",
                min: 0.0,
                max: 1.0,
                actual: confidence,
            });
        }
        let len = reasoning.chars().count();
        if !(10..=500).contains(&len) {
            return Err(CoreError::InvalidLength {
                field: "reasoning",
                min: 10,
                max: 500,
                actual: len,
            });
        }
        Ok(Self {
            decision_id,
            signal_id,
            action_params,
            requires_approval,
            reasoning,
            confidence,
            timestamp,
            validation,
            processing_time_ms,
        })
    }

    /// Returns the action kind this decision names.
    #[must_use]
    pub const fn action(&self) -> ActionKind {
        self.action_params.kind()
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

    use super::ActionParams;
    use super::Decision;
    use super::ValidationResult;
    use crate::identifiers::DecisionId;
    use crate::identifiers::SignalId;
    use crate::time::Timestamp;

    #[test]
    fn ignore_action_carries_no_parameters() {
        let decision = Decision::new(
            DecisionId::new("d1"),
            SignalId::new("s1"),
            ActionParams::Ignore,
            false,
            "blocked by policy, no action taken".to_string(),
            0.9,
            Timestamp::from_unix_millis(0),
            ValidationResult::default(),
            5,
        )
        .expect("valid decision");
        assert!(matches!(decision.action_params, ActionParams::Ignore));
    }

    #[test]
    fn reasoning_too_short_is_rejected() {
        let result = Decision::new(
            DecisionId::new("d1"),
            SignalId::new("s1"),
            ActionParams::Ignore,
            false,
            "short".to_string(),
            0.9,
            Timestamp::from_unix_millis(0),
            ValidationResult::default(),
            5,
        );
        assert!(result.is_err());
    }
}
