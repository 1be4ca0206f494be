// crates/opsgate-contract/src/validator.rs
// ============================================================================
// Module: Contract Validator
// Description: Compiles and applies the classification/decision schemas.
// Purpose: Give M2/M3 a first-class, reusable validator instead of ad hoc
//          field checks against duck-typed LLM output.
// Dependencies: jsonschema, serde_json, crate::schemas
// ============================================================================

//! ## Overview
//! `ContractValidator` compiles both schemas once at construction and
//! validates payloads against them on every call, returning a
//! [`ContractError`] that lists every violation rather than the first.

use jsonschema::Draft;
use jsonschema::Validator;
use serde_json::Value;
use thiserror::Error;

use crate::schemas::classification_schema;
use crate::schemas::decision_schema;

/// Errors raised while compiling or applying a contract schema.
#[derive(Debug, Error)]
pub enum ContractError {
    /// A schema failed to compile; this indicates a bug in this crate, not
    /// caller input.
    #[error("failed to compile schema: {0}")]
    SchemaCompilation(String),
    /// A payload did not satisfy the compiled schema.
    #[error("payload does not match schema: {0}")]
    Invalid(String),
}

/// Validates raw LLM JSON output against the classification and decision
/// schemas.
pub struct ContractValidator {
    classification: Validator,
    decision: Validator,
}

impl ContractValidator {
    /// Compiles both schemas.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::SchemaCompilation`] if either schema fails
    /// to compile, which would indicate a defect in this crate's bundled
    /// schemas.
    pub fn new() -> Result<Self, ContractError> {
        Ok(Self {
            classification: compile(&classification_schema())?,
            decision: compile(&decision_schema())?,
        })
    }

    /// Validates a raw classification payload.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::Invalid`] listing every schema violation.
    pub fn validate_classification(&self, payload: &Value) -> Result<(), ContractError> {
        validate(&self.classification, payload)
    }

    /// Validates a raw decision payload.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::Invalid`] listing every schema violation.
    pub fn validate_decision(&self, payload: &Value) -> Result<(), ContractError> {
        validate(&self.decision, payload)
    }
}

fn compile(schema: &Value) -> Result<Validator, ContractError> {
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .map_err(|err| ContractError::SchemaCompilation(err.to_string()))
}

fn validate(validator: &Validator, payload: &Value) -> Result<(), ContractError> {
    let messages: Vec<String> = validator
        .iter_errors(payload)
        .map(|error| error.to_string())
        .collect();
    if messages.is_empty() {
        Ok(())
    } else {
        Err(ContractError::Invalid(messages.join("; ")))
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

    use serde_json::json;

    use super::ContractValidator;

    #[test]
    fn accepts_a_well_formed_classification() {
        let validator = ContractValidator::new().expect("schemas compile");
        let payload = json!({
            "urgency": "critical",
            "importance": "high",
            "category": "incident",
            "confidence": 0.9,
            "reasoning": "production errors detected, immediate action required",
            "suggestedActions": ["page on-call"],
            "requiresImmediate": true
        });
        assert!(validator.validate_classification(&payload).is_ok());
    }

    #[test]
    fn rejects_unknown_category() {
        let validator = ContractValidator::new().expect("schemas compile");
        let payload = json!({
            "urgency": "low",
            "importance": "low",
            "category": "not_a_real_category",
            "confidence": 0.5,
            "reasoning": "routine informational update, no action needed",
            "requiresImmediate": false
        });
        assert!(validator.validate_classification(&payload).is_err());
    }

    #[test]
    fn rejects_confidence_out_of_range() {
        let validator = ContractValidator::new().expect("schemas compile");
        let payload = json!({
            "action": "create_task",
            "actionParams": {},
            "requiresApproval": false,
            "reasoning": "creating a task to track the requested follow-up",
            "confidence": 1.5
        });
        assert!(validator.validate_decision(&payload).is_err());
    }

    #[test]
    fn accepts_a_well_formed_decision() {
        let validator = ContractValidator::new().expect("schemas compile");
        let payload = json!({
            "action": "ignore",
            "actionParams": {},
            "requiresApproval": false,
            "reasoning": "no action required for this informational message",
            "confidence": 0.95
        });
        assert!(validator.validate_decision(&payload).is_ok());
    }
}
