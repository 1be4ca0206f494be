// crates/opsgate-cli/src/stub.rs
// ============================================================================
// Module: Stub Chat Provider and File Event Log Sink
// Description: A heuristic, keyword-matching ChatProvider standing in for a
//              real LLM backend, and an append-only JSON-lines EventLogSink.
// Purpose: Exercise the classification/decision contract end to end without
//          any network call or vendor SDK.
// Dependencies: opsgate-core, opsgate-llm, opsgate-reliability, async-trait,
//               serde_json, tokio
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use opsgate_core::TokenUsage;
use opsgate_llm::ChatMessage;
use opsgate_llm::ChatOptions;
use opsgate_llm::ChatProvider;
use opsgate_llm::ChatResponse;
use opsgate_llm::FinishReason;
use opsgate_llm::ProviderError;
use opsgate_reliability::EventLogSink;
use serde_json::json;
use serde_json::Value;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Classifies a signal body by keyword, standing in for a real LLM call.
///
/// Matches the closed `urgency`/`importance`/`category` vocabulary of the
/// classification schema, and the `category={:?}`-formatted debug summary
/// the decision prompt carries to pick an action.
pub struct StubChatProvider;

fn classify_payload(text: &str) -> Value {
    let lower = text.to_lowercase();
    let (urgency, importance, category, confidence) = if ["fire", "down", "incident", "outage"].iter().any(|k| lower.contains(k)) {
        ("critical", "high", "incident", 0.92)
    } else if ["invoice", "payment", "vendor"].iter().any(|k| lower.contains(k)) {
        ("medium", "high", "finance", 0.88)
    } else if ["bug", "exception", "stack trace", "error"].iter().any(|k| lower.contains(k)) {
        ("high", "medium", "bug", 0.85)
    } else if ["meeting", "calendar", "sync"].iter().any(|k| lower.contains(k)) {
        ("low", "low", "meeting", 0.8)
    } else if ["unsubscribe", "spam", "free prize"].iter().any(|k| lower.contains(k)) {
        ("low", "low", "spam", 0.4)
    } else {
        ("medium", "medium", "request", 0.75)
    };

    json!({
        "urgency": urgency,
        "importance": importance,
        "category": category,
        "confidence": confidence,
        "reasoning": format!("keyword match selected category '{category}' from the signal body"),
        "suggestedActions": [],
        "requiresImmediate": urgency == "critical",
    })
}

fn decision_payload(prompt: &str) -> Value {
    let (action, action_params, reasoning) = if prompt.contains("category=Incident") {
        ("escalate", json!({"platform": "chat", "reason": "production incident detected"}), "incidents are escalated immediately for human triage")
    } else if prompt.contains("category=Finance") {
        (
            "file_document",
            json!({"platform": "drive", "destination": "finance/invoices", "title": "incoming invoice", "touches_money": true}),
            "financial documents are filed and held for approval before archival",
        )
    } else if prompt.contains("category=Bug") {
        (
            "create_task",
            json!({"platform": "trello", "title": "investigate reported defect"}),
            "bug reports become tracked tasks for the engineering queue",
        )
    } else if prompt.contains("category=Spam") {
        ("ignore", json!({}), "low-confidence unsolicited content is ignored rather than acted on")
    } else {
        (
            "send_notification",
            json!({"platform": "chat", "recipient": "ops-channel", "message": "new signal received, see summary"}),
            "routine signals are surfaced as a notification for visibility",
        )
    };

    json!({
        "action": action,
        "actionParams": action_params,
        "requiresApproval": false,
        "reasoning": reasoning,
        "confidence": 0.8,
    })
}

#[async_trait]
impl ChatProvider for StubChatProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn chat(&self, messages: &[ChatMessage], _options: &ChatOptions) -> Result<ChatResponse, ProviderError> {
        let prompt = messages.last().map(|message| message.content.as_str()).unwrap_or_default();

        let payload = if prompt.starts_with("Classify the following signal") {
            classify_payload(prompt)
        } else {
            decision_payload(prompt)
        };

        Ok(ChatResponse {
            content: payload.to_string(),
            parsed_json: Some(payload),
            usage: TokenUsage { prompt_tokens: opsgate_llm::TokenBudget::count_tokens(prompt), completion_tokens: 32, estimated_cost_micros: 0 },
            finish_reason: FinishReason::Stop,
            provider: self.name().to_string(),
            model: "stub".to_string(),
            latency_ms: 0,
        })
    }
}

/// Appends one JSON line per event to a file, creating it if needed.
pub struct FileEventLogSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileEventLogSink {
    /// Builds a sink appending to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    async fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        Ok(())
    }
}

#[async_trait]
impl EventLogSink for FileEventLogSink {
    async fn append(&self, line: &str) -> Result<(), String> {
        let _guard = self.write_lock.lock().await;
        Self::append_line(&self.path, line).await.map_err(|error| error.to_string())
    }
}
