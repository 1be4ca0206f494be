// crates/opsgate-core/src/review.rs
// ============================================================================
// Module: Review Item
// Description: A decision awaiting, or resolved by, human approval.
// Purpose: Define ReviewItem, its status/reason/risk enums, and the
//          monotone-transition invariant.
// Dependencies: crate::{decision, error, identifiers, reasoning, time},
//               serde
// ============================================================================

//! ## Overview
//! A `ReviewItem` is owned by the Review Manager. Its `status` transitions
//! only away from `Pending` to a terminal state, exactly once; this module
//! enforces that via [`ReviewItem::transition_to`] rather than allowing
//! direct field mutation.

use serde::Deserialize;
use serde::Serialize;

use crate::decision::Decision;
use crate::error::CoreError;
use crate::identifiers::ReviewId;
use crate::identifiers::SignalId;
use crate::reasoning::ReasoningResult;
use crate::time::Timestamp;

/// Lifecycle status of a `ReviewItem`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// Awaiting a human decision.
    Pending,
    /// A reviewer approved the decision.
    Approved,
    /// A reviewer rejected the decision.
    Rejected,
    /// The risk-tier sweeper auto-approved the decision on expiry.
    AutoApproved,
    /// The risk-tier sweeper auto-rejected the decision on expiry.
    AutoRejected,
    /// The review expired without a qualifying auto-transition.
    Expired,
}

impl ReviewStatus {
    /// Returns whether this status is terminal (not `Pending`).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Reasons a decision was routed to review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewReason {
    /// The action is high-impact per the Decision Maker's validation rules.
    HighImpact,
    /// The action targets a policy-forbidden destination.
    PolicyViolation,
    /// Classification confidence fell below the review floor.
    LowConfidence,
    /// The classifier and decision maker disagreed in a way worth a human
    /// look.
    ConflictingClassification,
    /// The action's scope is unusually broad.
    LargeScope,
    /// The signal's sender is not in the trusted set.
    UnknownSender,
}

/// Coarse risk tier, determining auto-expiration behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Expires after the low-risk tier window; auto-approves.
    Low,
    /// Expires after the high-risk tier window; auto-approves.
    Medium,
    /// Expires after the high-risk tier window; auto-rejects if
    /// time-sensitive, else lingers for manual escalation.
    High,
    /// Never auto-expires.
    Critical,
}

impl RiskLevel {
    /// Determines the risk level from the reasons and confidence, following
    /// the Review Manager's precedence table.
    #[must_use]
    pub fn determine(reasons: &[ReviewReason], confidence: f64) -> Self {
        let has = |reason: ReviewReason| reasons.contains(&reason);
        if has(ReviewReason::HighImpact) || has(ReviewReason::PolicyViolation) {
            return Self::Critical;
        }
        if has(ReviewReason::ConflictingClassification)
            || has(ReviewReason::LargeScope)
            || confidence < 0.5
        {
            return Self::High;
        }
        if has(ReviewReason::LowConfidence) || has(ReviewReason::UnknownSender) || confidence < 0.7
        {
            return Self::Medium;
        }
        Self::Low
    }
}

/// A decision modification a reviewer applied while approving.
pub type Modification = String;

/// A decision awaiting, or resolved by, human approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    /// Identifier for this review.
    pub review_id: ReviewId,
    /// Identifier of the signal under review.
    pub signal_id: SignalId,
    /// Current lifecycle status.
    pub status: ReviewStatus,
    /// Reasons this item was queued for review.
    pub reasons: Vec<ReviewReason>,
    /// Risk tier, determining auto-expiration.
    pub risk_level: RiskLevel,
    /// The reasoning result this review is gating.
    pub reasoning_result: ReasoningResult,
    /// The decision as originally produced, before any reviewer
    /// modification.
    pub original_decision: Decision,
    /// When this item entered the queue.
    pub queued_at: Timestamp,
    /// When this item auto-expires; absent for `Critical` risk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
    /// When this item was resolved, if it has been.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<Timestamp>,
    /// The reviewer who resolved this item, if a human did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<String>,
    /// Modifications a reviewer applied while approving.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifications: Vec<Modification>,
    /// Reason given for rejection, if rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl ReviewItem {
    /// Builds a new, `Pending` `ReviewItem`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Invariant`] if `risk_level` is `Critical` but
    /// `expires_at` is supplied (critical items never auto-expire).
    pub fn new(
        review_id: ReviewId,
        signal_id: SignalId,
        reasons: Vec<ReviewReason>,
        risk_level: RiskLevel,
        reasoning_result: ReasoningResult,
        original_decision: Decision,
        queued_at: Timestamp,
        expires_at: Option<Timestamp>,
    ) -> Result<Self, CoreError> {
        if risk_level == RiskLevel::Critical && expires_at.is_some() {
            return Err(CoreError::Invariant(
                "critical risk reviews must not have an expiry".to_string(),
            ));
        }
        Ok(Self {
            review_id,
            signal_id,
            status: ReviewStatus::Pending,
            reasons,
            risk_level,
            reasoning_result,
            original_decision,
            queued_at,
            expires_at,
            reviewed_at: None,
            reviewer: None,
            modifications: Vec::new(),
            rejection_reason: None,
        })
    }

    /// Moves this item from `Pending` to a terminal status.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Invariant`] if the item is not currently
    /// `Pending`, or if `to` is not itself terminal.
    pub fn transition_to(&mut self, to: ReviewStatus, at: Timestamp) -> Result<(), CoreError> {
        if self.status != ReviewStatus::Pending {
            return Err(CoreError::Invariant(format!(
                "review {} already resolved as {:?}",
                self.review_id, self.status
            )));
        }
        if !to.is_terminal() {
            return Err(CoreError::Invariant(
                "transition_to requires a terminal status".to_string(),
            ));
        }
        self.status = to;
        self.reviewed_at = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ReviewReason;
    use super::ReviewStatus;
    use super::RiskLevel;

    #[test]
    fn high_impact_reason_is_always_critical() {
        assert_eq!(
            RiskLevel::determine(&[ReviewReason::HighImpact], 0.99),
            RiskLevel::Critical
        );
    }

    #[test]
    fn low_confidence_without_reasons_is_medium() {
        assert_eq!(RiskLevel::determine(&[], 0.6), RiskLevel::Medium);
    }

    #[test]
    fn no_flags_and_high_confidence_is_low() {
        assert_eq!(RiskLevel::determine(&[], 0.95), RiskLevel::Low);
    }

    #[test]
    fn terminal_status_check() {
        assert!(!ReviewStatus::Pending.is_terminal());
        assert!(ReviewStatus::Approved.is_terminal());
    }
}
