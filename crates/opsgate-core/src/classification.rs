// crates/opsgate-core/src/classification.rs
// ============================================================================
// Module: Classification
// Description: The Classifier's validated judgment of a preprocessed signal.
// Purpose: Define Classification and its enums, enforcing its invariant.
// Dependencies: crate::error, serde
// ============================================================================

//! ## Overview
//! A `Classification` is produced by the Classifier from L7 output and
//! validated against a schema before this type is ever constructed (schema
//! validation lives in the contract crate; this module enforces the one
//! invariant that is independent of wire shape: `critical` urgency implies
//! either `requiresImmediate` or `confidence >= 0.7`).

use serde::Deserialize;
use serde::Serialize;

use crate::error::CoreError;

/// How urgently a signal demands action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    /// Can wait indefinitely.
    Low,
    /// Should be handled within the normal course of business.
    Medium,
    /// Should be handled soon.
    High,
    /// Demands immediate attention.
    Critical,
}

/// How consequential a signal is, independent of urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    /// Low consequence if mishandled.
    Low,
    /// Moderate consequence if mishandled.
    Medium,
    /// High consequence if mishandled.
    High,
}

/// The closed set of signal categories the classifier may assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// A meeting invite or scheduling request.
    Meeting,
    /// A task or to-do request.
    Task,
    /// A status or progress report.
    Report,
    /// A question awaiting an answer.
    Question,
    /// An informational notification.
    Notification,
    /// An alert about a monitored condition.
    Alert,
    /// A request for action or resource.
    Request,
    /// General information with no requested action.
    Information,
    /// A production or operational incident.
    Incident,
    /// A software defect report.
    Bug,
    /// A financial matter.
    Finance,
    /// Unsolicited or low-value content.
    Spam,
    /// A product feature request or proposal.
    Feature,
}

impl Category {
    /// Returns whether this category is spam.
    #[must_use]
    pub const fn is_spam(self) -> bool {
        matches!(self, Self::Spam)
    }
}

/// A suggested follow-up action, free text from the LLM's reasoning.
pub type SuggestedAction = String;

/// The Classifier's validated judgment of a `PreprocessedSignal`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// How urgently the signal demands action.
    pub urgency: Urgency,
    /// How consequential the signal is.
    pub importance: Importance,
    /// The assigned category.
    pub category: Category,
    /// Model confidence in `[0, 1]`.
    pub confidence: f64,
    /// Free-text justification, 10-500 characters.
    pub reasoning: String,
    /// Suggested follow-up actions.
    #[serde(default)]
    pub suggested_actions: Vec<SuggestedAction>,
    /// Whether the classifier judges this signal needs immediate handling.
    pub requires_immediate: bool,
}

impl Classification {
    /// Builds a `Classification`, enforcing the confidence range, reasoning
    /// length, and critical-urgency invariants.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::OutOfRange`] if `confidence` is outside
    /// `[0, 1]`, [`CoreError::InvalidLength`] if `reasoning` is outside
    /// 10-500 characters, or [`CoreError::Invariant`] if `urgency` is
    /// `Critical` while neither `requires_immediate` nor `confidence >= 0.7`
    /// holds.
    pub fn new(
        urgency: Urgency,
        importance: Importance,
        category: Category,
        confidence: f64,
        reasoning: String,
        suggested_actions: Vec<SuggestedAction>,
        requires_immediate: bool,
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
        if urgency == Urgency::Critical && !requires_immediate && confidence < 0.7 {
            return Err(CoreError::Invariant(
                "critical urgency requires requires_immediate or confidence >= 0.7".to_string(),
            ));
        }
        Ok(Self {
            urgency,
            importance,
            category,
            confidence,
            reasoning,
            suggested_actions,
            requires_immediate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Category;
    use super::Classification;
    use super::Importance;
    use super::Urgency;

    fn reasoning() -> String {
        "production errors detected in logs".to_string()
    }

    #[test]
    fn critical_without_immediate_or_confidence_is_rejected() {
        let result = Classification::new(
            Urgency::Critical,
            Importance::High,
            Category::Incident,
            0.5,
            reasoning(),
            Vec::new(),
            false,
        );
        assert!(result.is_err());
    }

    #[test]
    fn critical_with_high_confidence_is_accepted() {
        let result = Classification::new(
            Urgency::Critical,
            Importance::High,
            Category::Incident,
            0.8,
            reasoning(),
            Vec::new(),
            false,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn critical_with_requires_immediate_is_accepted() {
        let result = Classification::new(
            Urgency::Critical,
            Importance::High,
            Category::Incident,
            0.2,
            reasoning(),
            Vec::new(),
            true,
        );
        assert!(result.is_ok());
    }
}
