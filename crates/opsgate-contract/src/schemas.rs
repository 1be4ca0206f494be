// crates/opsgate-contract/src/schemas.rs
// ============================================================================
// Module: LLM Payload Schemas
// Description: JSON Schema definitions for raw LLM classification/decision
//              output, before it is parsed into opsgate-core types.
// Purpose: Encode the closed enums, confidence bounds, and reasoning length
//          invariants as a first-class schema, per the redesign note that
//          duck-typed LLM answers must be validated explicitly.
// Dependencies: serde_json
// ============================================================================

use serde_json::json;
use serde_json::Value;

/// Schema for the raw JSON payload M2 expects back from the LLM Gateway.
#[must_use]
pub fn classification_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "required": ["urgency", "importance", "category", "confidence", "reasoning", "requiresImmediate"],
        "additionalProperties": false,
        "properties": {
            "urgency": {
                "type": "string",
                "enum": ["critical", "high", "medium", "low"]
            },
            "importance": {
                "type": "string",
                "enum": ["high", "medium", "low"]
            },
            "category": {
                "type": "string",
                "enum": [
                    "meeting", "task", "report", "question", "notification",
                    "alert", "request", "information", "incident", "bug",
                    "finance", "spam", "feature"
                ]
            },
            "confidence": {
                "type": "number",
                "minimum": 0.0,
                "maximum": 1.0
            },
            "reasoning": {
                "type": "string",
                "minLength": 10,
                "maxLength": 500
            },
            "suggestedActions": {
                "type": "array",
                "items": { "type": "string" },
                "default": []
            },
            "requiresImmediate": {
                "type": "boolean"
            }
        }
    })
}

/// Schema for the raw JSON payload M3 expects back from the LLM Gateway.
#[must_use]
pub fn decision_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "required": ["action", "actionParams", "requiresApproval", "reasoning", "confidence"],
        "additionalProperties": false,
        "properties": {
            "action": {
                "type": "string",
                "enum": [
                    "create_task", "send_notification", "update_sheet",
                    "file_document", "delegate", "escalate", "ignore"
                ]
            },
            "actionParams": {
                "type": "object"
            },
            "requiresApproval": {
                "type": "boolean"
            },
            "reasoning": {
                "type": "string",
                "minLength": 10,
                "maxLength": 500
            },
            "confidence": {
                "type": "number",
                "minimum": 0.0,
                "maximum": 1.0
            }
        }
    })
}
