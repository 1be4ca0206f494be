// crates/opsgate-reasoning/src/decision_maker.rs
// ============================================================================
// Module: Decision Maker (M3)
// Description: Maps a (PreprocessedSignal, Classification) pair to a
//              validated Decision, applying the high-impact, confidence-
//              floor, and policy-blocker validation rules.
// Dependencies: opsgate-contract, opsgate-core, opsgate-llm
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use opsgate_contract::ContractValidator;
use opsgate_core::identifiers::DecisionId;
use opsgate_core::identifiers::SignalId;
use opsgate_core::ActionKind;
use opsgate_core::ActionParams;
use opsgate_core::Classification;
use opsgate_core::CoreError;
use opsgate_core::CreateTaskParams;
use opsgate_core::Decision;
use opsgate_core::DelegateParams;
use opsgate_core::EscalateParams;
use opsgate_core::FileDocumentParams;
use opsgate_core::SendNotificationParams;
use opsgate_core::Timestamp;
use opsgate_core::UpdateSheetParams;
use opsgate_core::ValidationResult;
use opsgate_core::ValidationWarning;
use opsgate_llm::ChatMessage;
use opsgate_llm::ChatOptions;
use opsgate_llm::LlmGateway;
use opsgate_llm::ResponseFormat;
use opsgate_llm::Role;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// The confidence floor below which `requiresApproval` is forced.
const APPROVAL_CONFIDENCE_FLOOR: f64 = 0.7;
/// The confidence floor below which a `low_confidence` warning is added.
const LOW_CONFIDENCE_FLOOR: f64 = 0.5;

/// Errors raised while producing a `Decision`.
#[derive(Debug, Error)]
pub enum DecisionMakerError {
    /// Every configured provider failed.
    #[error("llm gateway failed: {0}")]
    Gateway(#[from] opsgate_llm::GatewayError),
    /// The payload did not validate against the decision schema.
    #[error("decision payload invalid: {0}")]
    ValidationFailed(String),
    /// A validated payload still failed to construct a `Decision`.
    #[error(transparent)]
    Invariant(#[from] CoreError),
}

/// Destinations the policy check forbids, e.g. `"chat:#leadership"`.
#[derive(Debug, Clone, Default)]
pub struct PolicyBlockers {
    /// Forbidden `platform:recipient`-style targets, matched verbatim.
    pub forbidden_targets: Vec<String>,
}

/// Produces validated `Decision`s from a signal and its classification.
pub struct DecisionMaker {
    gateway: Arc<LlmGateway>,
    validator: Arc<ContractValidator>,
    model: String,
    temperature: f32,
    policy: PolicyBlockers,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDecision {
    action: String,
    action_params: Value,
    requires_approval: bool,
    reasoning: String,
    confidence: f64,
}

fn build_prompt(signal_id: &str, cleaned_body: &str, classification: &Classification) -> String {
    format!(
        "Given this signal and its classification, decide the action to take. Respond as JSON matching the decision schema.\nSignal {signal_id}: {cleaned_body}\nClassification: urgency={:?} importance={:?} category={:?} confidence={}",
        classification.urgency, classification.importance, classification.category, classification.confidence
    )
}

fn parse<T: serde::de::DeserializeOwned>(value: &Value) -> Result<T, String> {
    serde_json::from_value(value.clone()).map_err(|err| err.to_string())
}

fn build_action_params(action: &str, params: &Value) -> Result<ActionParams, String> {
    match action {
        "create_task" => Ok(ActionParams::CreateTask(parse::<CreateTaskParams>(params)?)),
        "send_notification" => Ok(ActionParams::SendNotification(parse::<SendNotificationParams>(params)?)),
        "update_sheet" => Ok(ActionParams::UpdateSheet(parse::<UpdateSheetParams>(params)?)),
        "file_document" => Ok(ActionParams::FileDocument(parse::<FileDocumentParams>(params)?)),
        "delegate" => Ok(ActionParams::Delegate(parse::<DelegateParams>(params)?)),
        "escalate" => Ok(ActionParams::Escalate(parse::<EscalateParams>(params)?)),
        "ignore" => Ok(ActionParams::Ignore),
        other => Err(format!("unknown action: {other}")),
    }
}

/// Applies the high-impact, confidence-floor, and policy-blocker
/// validation rules, mutating `action_params` in place if a policy
/// blocker fires.
fn validate(action_params: &mut ActionParams, confidence: f64, policy: &PolicyBlockers) -> (bool, ValidationResult) {
    let mut warnings = Vec::new();
    let mut requires_approval = action_params.is_high_impact();

    if confidence < APPROVAL_CONFIDENCE_FLOOR {
        requires_approval = true;
    }
    if confidence < LOW_CONFIDENCE_FLOOR {
        warnings.push(ValidationWarning::LowConfidence);
    }

    let target = action_params.platform().map(ToString::to_string);
    let blocked = target.is_some_and(|platform| policy.forbidden_targets.iter().any(|forbidden| forbidden == &platform));
    if blocked {
        warnings.push(ValidationWarning::PolicyBlocker);
        action_params.blocked();
    }

    (requires_approval, ValidationResult { valid: true, warnings, errors: Vec::new() })
}

impl DecisionMaker {
    /// Builds a decision maker calling `model` at `temperature`, rejecting
    /// actions targeting any of `policy.forbidden_targets`.
    #[must_use]
    pub fn new(gateway: Arc<LlmGateway>, validator: Arc<ContractValidator>, model: String, temperature: f32, policy: PolicyBlockers) -> Self {
        Self { gateway, validator, model, temperature, policy }
    }

    /// Produces a `Decision` for `signal_id`/`cleaned_body` given its
    /// `classification`.
    ///
    /// # Errors
    ///
    /// Returns [`DecisionMakerError::Gateway`] if every provider fails, or
    /// [`DecisionMakerError::ValidationFailed`] if the payload fails
    /// schema validation or names an unrecognized action/parameter shape.
    pub async fn decide(
        &self,
        signal_id: &SignalId,
        cleaned_body: &str,
        classification: &Classification,
        now: Timestamp,
    ) -> Result<Decision, DecisionMakerError> {
        let started = Instant::now();
        let prompt = build_prompt(signal_id.as_str(), cleaned_body, classification);
        let messages = vec![ChatMessage::new(Role::User, prompt)];
        let options = ChatOptions {
            model: self.model.clone(),
            temperature: self.temperature,
            response_format: ResponseFormat::Json,
            ..ChatOptions::default()
        };

        let response = self.gateway.chat(&messages, &options).await?;
        let payload = response
            .parsed_json
            .ok_or_else(|| DecisionMakerError::ValidationFailed("response was not valid json".to_string()))?;

        self.validator
            .validate_decision(&payload)
            .map_err(|error| DecisionMakerError::ValidationFailed(error.to_string()))?;

        let raw: RawDecision =
            serde_json::from_value(payload).map_err(|error| DecisionMakerError::ValidationFailed(error.to_string()))?;

        let mut action_params =
            build_action_params(&raw.action, &raw.action_params).map_err(DecisionMakerError::ValidationFailed)?;

        let (mut requires_approval, validation) = validate(&mut action_params, raw.confidence, &self.policy);
        requires_approval = requires_approval || raw.requires_approval;

        let reasoning = if matches!(action_params.kind(), ActionKind::Ignore) && validation.warnings.contains(&ValidationWarning::PolicyBlocker) {
            "blocked by policy".to_string()
        } else {
            raw.reasoning
        };

        let processing_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let decision = Decision::new(
            DecisionId::generate(),
            signal_id.clone(),
            action_params,
            requires_approval,
            reasoning,
            raw.confidence,
            now,
            validation,
            processing_time_ms,
        )?;

        Ok(decision)
    }
}
