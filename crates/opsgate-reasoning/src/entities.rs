// crates/opsgate-reasoning/src/entities.rs
// ============================================================================
// Module: Entity Extraction (M1, stage 6, optional)
// Description: People, contextualized dates/money/URLs/file-references, and
//              action items with priority.
// Purpose: Give the Decision Maker richer context than the bare
//          ExtractedData the core type carries, without forcing every
//          caller to pay for it.
// Dependencies: opsgate-core, regex, crate::extraction
// ============================================================================

use std::sync::LazyLock;

use opsgate_core::ExtractedData;
use regex::Regex;

#[allow(clippy::expect_used, reason = "regex literals are fixed at compile time and known valid")]
static TITLED_PERSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(Mr|Mrs|Ms|Dr|Prof)\.?\s+[A-Z][a-z]+(?:\s+[A-Z][a-z]+)?").expect("valid regex")
});
#[allow(clippy::expect_used, reason = "regex literals are fixed at compile time and known valid")]
static ROLE_PERSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(manager|director|engineer|lead|owner|sponsor)\s+[A-Z][a-z]+\b").expect("valid regex")
});

const HIGH_PRIORITY_CUES: &[&str] = &["asap", "action item", "urgent", "immediately", "must"];
const LOW_PRIORITY_CUES: &[&str] = &["should", "could", "might consider"];
const ACTION_CUES: &[&str] = &[
    "please",
    "need to",
    "asap",
    "action item",
    "must",
    "should",
    "could",
    "might consider",
    "urgent",
    "immediately",
];

/// Priority assigned to a detected action item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionPriority {
    /// Carries an urgency cue (`asap`, `action item`, `urgent`, ...).
    High,
    /// Carries only a soft cue (`should`, `could`, ...).
    Low,
    /// Carries a cue but neither an urgency nor soft marker.
    Medium,
}

/// A sentence identified as describing a requested action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionItem {
    /// The sentence the cue was found in.
    pub text: String,
    /// Assigned priority.
    pub priority: ActionPriority,
}

/// A value extracted alongside the surrounding sentence it appeared in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contextualized {
    /// The extracted raw value.
    pub value: String,
    /// The sentence it was found in.
    pub context: String,
}

/// Entities pulled from cleaned body text, beyond the core `ExtractedData`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedEntities {
    /// People referenced by title+name or role+name.
    pub people: Vec<String>,
    /// Dates with the sentence they appeared in.
    pub dates_with_context: Vec<Contextualized>,
    /// Monetary amounts with the sentence they appeared in.
    pub money_with_context: Vec<Contextualized>,
    /// URLs with the sentence they appeared in.
    pub urls_with_context: Vec<Contextualized>,
    /// File references with the sentence they appeared in.
    pub file_references_with_context: Vec<Contextualized>,
    /// Sentences identified as action items.
    pub action_items: Vec<ActionItem>,
}

fn split_sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
        .collect()
}

fn classify_priority(sentence: &str) -> ActionPriority {
    let lower = sentence.to_lowercase();
    if HIGH_PRIORITY_CUES.iter().any(|cue| lower.contains(cue)) {
        ActionPriority::High
    } else if LOW_PRIORITY_CUES.iter().any(|cue| lower.contains(cue)) {
        ActionPriority::Low
    } else {
        ActionPriority::Medium
    }
}

fn people(text: &str) -> Vec<String> {
    let mut found: Vec<String> = TITLED_PERSON.find_iter(text).map(|m| m.as_str().to_string()).collect();
    found.extend(ROLE_PERSON.find_iter(text).map(|m| m.as_str().to_string()));
    let mut seen = std::collections::HashSet::new();
    found.retain(|item| seen.insert(item.clone()));
    found
}

fn with_context<'a>(values: impl Iterator<Item = &'a str>, sentences: &[&str]) -> Vec<Contextualized> {
    values
        .map(|value| {
            let context = sentences
                .iter()
                .find(|sentence| sentence.contains(value))
                .map_or(value, |sentence| sentence);
            Contextualized { value: value.to_string(), context: context.to_string() }
        })
        .collect()
}

/// Extracts people, contextualized values, and action items from cleaned
/// body text and its already-extracted structured data.
#[must_use]
pub(crate) fn extract(cleaned_body: &str, extracted: &ExtractedData) -> ExtractedEntities {
    let sentences = split_sentences(cleaned_body);

    let dates_with_context =
        with_context(extracted.dates.iter().map(|date| date.raw.as_str()), &sentences);
    let money_with_context =
        with_context(extracted.amounts.iter().map(|amount| amount.amount.as_str()), &sentences);
    let urls_with_context = with_context(extracted.urls.iter().map(String::as_str), &sentences);
    let file_references_with_context =
        with_context(extracted.file_references.iter().map(String::as_str), &sentences);

    let action_items = sentences
        .iter()
        .filter(|sentence| {
            let lower = sentence.to_lowercase();
            ACTION_CUES.iter().any(|cue| lower.contains(cue))
        })
        .map(|sentence| ActionItem { text: (*sentence).to_string(), priority: classify_priority(sentence) })
        .collect();

    ExtractedEntities {
        people: people(cleaned_body),
        dates_with_context,
        money_with_context,
        urls_with_context,
        file_references_with_context,
        action_items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_titled_person() {
        assert_eq!(people("Please loop in Dr. Smith on this"), vec!["Dr. Smith"]);
    }

    #[test]
    fn detects_role_person() {
        assert_eq!(people("ask manager Alvarez to approve"), vec!["manager Alvarez"]);
    }

    #[test]
    fn high_priority_action_item_detected() {
        let extracted = ExtractedData::default();
        let found = extract("We need this ASAP. Nothing else to report.", &extracted);
        assert_eq!(found.action_items.len(), 1);
        assert_eq!(found.action_items[0].priority, ActionPriority::High);
    }

    #[test]
    fn soft_cue_action_item_is_low_priority() {
        let extracted = ExtractedData::default();
        let found = extract("You should review this when you get a chance.", &extracted);
        assert_eq!(found.action_items[0].priority, ActionPriority::Low);
    }
}
