// crates/opsgate-reasoning/src/classifier.rs
// ============================================================================
// Module: Classifier (M2)
// Description: Produces a validated Classification for a PreprocessedSignal,
//              consulting the response cache and token budget before ever
//              calling the LLM gateway.
// Dependencies: opsgate-cache, opsgate-contract, opsgate-core, opsgate-llm
// ============================================================================

//! ## Overview
//! [`Classifier::classify`] is the Protocol described for M2: fingerprint,
//! cache lookup, budget check, gateway call with one retry on schema
//! validation failure, cache write, usage tracking.

use std::sync::Arc;

use opsgate_cache::fingerprint_of;
use opsgate_cache::ResponseCache;
use opsgate_contract::ContractValidator;
use opsgate_core::Category;
use opsgate_core::Classification;
use opsgate_core::CoreError;
use opsgate_core::Importance;
use opsgate_core::ResponseType;
use opsgate_core::Timestamp;
use opsgate_core::Urgency;
use opsgate_llm::ChatMessage;
use opsgate_llm::ChatOptions;
use opsgate_llm::LlmGateway;
use opsgate_llm::ResponseFormat;
use opsgate_llm::Role;
use opsgate_llm::TokenBudget;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

/// Errors raised while producing a `Classification`.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// The daily token budget for this provider would be exceeded.
    #[error("budget exceeded: {0}")]
    BudgetExceeded(String),
    /// Every configured provider failed.
    #[error("llm gateway failed: {0}")]
    Gateway(#[from] opsgate_llm::GatewayError),
    /// The payload did not validate, even after the one retry.
    #[error("classification payload invalid after retry: {0}")]
    ValidationFailed(String),
    /// A validated payload still failed to construct a `Classification`.
    #[error(transparent)]
    Invariant(#[from] CoreError),
}

/// Outcome of one classification call.
#[derive(Debug, Clone)]
pub struct ClassifyOutcome {
    /// The produced classification.
    pub classification: Classification,
    /// Whether this was served from the response cache.
    pub cached: bool,
}

/// Model/provider selection for classification calls.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Provider identifier, used for budget and pricing lookup.
    pub provider: String,
    /// Model identifier passed to the gateway.
    pub model: String,
    /// Sampling temperature; part of the cache fingerprint.
    pub temperature: f32,
}

/// Produces validated `Classification`s, backed by L5/L6/L7.
pub struct Classifier {
    gateway: Arc<LlmGateway>,
    budget: Arc<TokenBudget>,
    cache: Arc<ResponseCache>,
    validator: Arc<ContractValidator>,
    config: ClassifierConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawClassification {
    urgency: String,
    importance: String,
    category: String,
    confidence: f64,
    reasoning: String,
    #[serde(default)]
    suggested_actions: Vec<String>,
    requires_immediate: bool,
}

fn parse_urgency(value: &str) -> Urgency {
    match value {
        "critical" => Urgency::Critical,
        "high" => Urgency::High,
        "medium" => Urgency::Medium,
        _ => Urgency::Low,
    }
}

fn parse_importance(value: &str) -> Importance {
    match value {
        "high" => Importance::High,
        "medium" => Importance::Medium,
        _ => Importance::Low,
    }
}

fn parse_category(value: &str) -> Category {
    match value {
        "meeting" => Category::Meeting,
        "task" => Category::Task,
        "report" => Category::Report,
        "question" => Category::Question,
        "notification" => Category::Notification,
        "alert" => Category::Alert,
        "request" => Category::Request,
        "incident" => Category::Incident,
        "bug" => Category::Bug,
        "finance" => Category::Finance,
        "spam" => Category::Spam,
        "feature" => Category::Feature,
        _ => Category::Information,
    }
}

fn build_prompt(cleaned_body: &str, subject: Option<&str>) -> String {
    let subject_line = subject.map_or_else(String::new, |subject| format!("Subject: {subject}\n"));
    format!(
        "Classify the following signal. Respond as JSON matching the classification schema.\n{subject_line}Body: {cleaned_body}"
    )
}

pub(crate) fn normalized_for_fingerprint(cleaned_body: &str, subject: Option<&str>) -> String {
    let mut normalized = subject.unwrap_or("").to_lowercase();
    normalized.push('\n');
    normalized.push_str(&cleaned_body.to_lowercase());
    normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl Classifier {
    /// Builds a classifier over the given backing services.
    #[must_use]
    pub fn new(
        gateway: Arc<LlmGateway>,
        budget: Arc<TokenBudget>,
        cache: Arc<ResponseCache>,
        validator: Arc<ContractValidator>,
        config: ClassifierConfig,
    ) -> Self {
        Self { gateway, budget, cache, validator, config }
    }

    /// Classifies `cleaned_body` (and optional `subject`), consulting the
    /// cache first and falling back to the LLM gateway, with one retry on
    /// schema validation failure.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifierError::BudgetExceeded`] if the call would exceed
    /// today's token budget, [`ClassifierError::Gateway`] if every provider
    /// fails, or [`ClassifierError::ValidationFailed`] if the payload fails
    /// schema validation twice.
    pub async fn classify(
        &self,
        cleaned_body: &str,
        subject: Option<&str>,
        now: Timestamp,
    ) -> Result<ClassifyOutcome, ClassifierError> {
        let fingerprint = fingerprint_of(
            &normalized_for_fingerprint(cleaned_body, subject),
            &self.config.model,
            self.config.temperature,
            None,
        );

        if let Some(cached_payload) = self.cache.get(&fingerprint, now).await {
            let raw: RawClassification = serde_json::from_str(&cached_payload)
                .map_err(|error| ClassifierError::ValidationFailed(error.to_string()))?;
            let classification = build_classification(raw)?;
            return Ok(ClassifyOutcome { classification, cached: true });
        }

        let prompt = build_prompt(cleaned_body, subject);
        let messages = vec![ChatMessage::new(Role::User, prompt)];
        let estimated_tokens = TokenBudget::count_message_tokens(&messages);

        let check = self.budget.check_budget(estimated_tokens, &self.config.provider, now).await;
        if !check.allowed {
            return Err(ClassifierError::BudgetExceeded(
                check.reason.unwrap_or_else(|| "budget exceeded".to_string()),
            ));
        }

        let options = ChatOptions {
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            response_format: ResponseFormat::Json,
            ..ChatOptions::default()
        };

        let mut last_validation_error = String::new();
        for attempt in 0..2 {
            let response = self.gateway.chat(&messages, &options).await?;
            let Some(payload) = response.parsed_json.clone() else {
                last_validation_error = "response was not valid json".to_string();
                continue;
            };
            if let Err(error) = self.validator.validate_classification(&payload) {
                last_validation_error = error.to_string();
                warn!(attempt, %error, "classification payload failed schema validation");
                continue;
            }

            let raw: RawClassification = serde_json::from_value(payload.clone())
                .map_err(|error| ClassifierError::ValidationFailed(error.to_string()))?;
            let classification = build_classification(raw)?;

            self.cache
                .put(
                    fingerprint,
                    payload.to_string(),
                    ResponseType::Classification,
                    None,
                    response.usage.prompt_tokens,
                    response.usage.completion_tokens,
                    None,
                    now,
                )
                .await?;
            if let Err(error) = self
                .budget
                .track_usage(response.usage.prompt_tokens, response.usage.completion_tokens, &self.config.provider, now)
                .await
            {
                warn!(%error, "failed to persist token usage snapshot");
            }

            return Ok(ClassifyOutcome { classification, cached: false });
        }

        Err(ClassifierError::ValidationFailed(last_validation_error))
    }
}

fn build_classification(raw: RawClassification) -> Result<Classification, CoreError> {
    Classification::new(
        parse_urgency(&raw.urgency),
        parse_importance(&raw.importance),
        parse_category(&raw.category),
        raw.confidence,
        raw.reasoning,
        raw.suggested_actions,
        raw.requires_immediate,
    )
}
