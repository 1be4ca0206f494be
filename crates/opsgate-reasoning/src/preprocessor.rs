// crates/opsgate-reasoning/src/preprocessor.rs
// ============================================================================
// Module: Signal Preprocessor (M1)
// Description: Orchestrates cleaning, structured-data extraction, language
//              detection, and optional entity extraction over a raw Signal.
// Purpose: Produce a PreprocessedSignal the Classifier can build a prompt
//          from, degrading gracefully on any stage failure.
// Dependencies: opsgate-core, crate::{cleaning, entities, extraction,
//               language}
// ============================================================================

use std::time::Duration;

use opsgate_core::CleaningStep;
use opsgate_core::CoreError;
use opsgate_core::ExtractedData;
use opsgate_core::NormalizedDate;
use opsgate_core::PreprocessedSignal;
use opsgate_core::Signal;
use opsgate_core::SignalMetadata;
use opsgate_core::SignalSource;
use opsgate_core::Timestamp;
use tracing::warn;

use crate::cleaning;
use crate::entities::ExtractedEntities;
use crate::extraction;
use crate::language;

/// Everything the Signal Preprocessor produces for one `Signal`: the core
/// type the rest of the pipeline consumes, plus the optional entity
/// extraction the core schema does not promote to a first-class field.
#[derive(Debug, Clone)]
pub struct PreprocessResult {
    /// The core `PreprocessedSignal` handed to the Classifier.
    pub signal: PreprocessedSignal,
    /// Entities extracted when entity extraction was requested and did not
    /// fail; `None` if skipped or if the stage itself failed.
    pub entities: Option<ExtractedEntities>,
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn sentence_count(text: &str) -> usize {
    text.split(['.', '!', '?']).filter(|sentence| !sentence.trim().is_empty()).count()
}

fn resolve_relative_dates(text: &str, now: Timestamp) -> Vec<NormalizedDate> {
    if !extraction::has_relative_date(text) {
        return Vec::new();
    }
    let lower = text.to_lowercase();
    let mut result = Vec::new();
    if lower.contains("today") {
        result.push(NormalizedDate { raw: "today".to_string(), iso: now.date_key() });
    }
    if lower.contains("tomorrow") {
        let tomorrow = now.plus(Duration::from_secs(24 * 60 * 60));
        result.push(NormalizedDate { raw: "tomorrow".to_string(), iso: tomorrow.date_key() });
    }
    result
}

fn extract_structured_data(cleaned_body: &str, now: Timestamp) -> ExtractedData {
    let mut dates = extraction::dates(cleaned_body);
    dates.extend(resolve_relative_dates(cleaned_body, now));

    ExtractedData {
        emails: extraction::emails(cleaned_body),
        phone_numbers: extraction::phone_numbers(cleaned_body),
        urls: extraction::urls(cleaned_body),
        file_references: extraction::file_references(cleaned_body),
        mentions: extraction::mentions(cleaned_body),
        dates,
        times: extraction::times(cleaned_body),
        amounts: extraction::amounts(cleaned_body),
    }
}

fn error_fallback(signal: &Signal) -> Result<PreprocessedSignal, CoreError> {
    PreprocessedSignal::new(
        signal.id.clone(),
        &signal.body,
        signal.subject.clone(),
        signal.body.clone(),
        ExtractedData::default(),
        SignalMetadata {
            language: "en".to_string(),
            language_confidence: 0.0,
            word_count: word_count(&signal.body),
            sentence_count: sentence_count(&signal.body),
            has_quoted_reply: false,
            has_signature: false,
            has_attachments: !signal.attachments.is_empty(),
            cleaning_steps: vec![CleaningStep::ErrorFallback],
        },
    )
}

/// Runs the full preprocessing pipeline over `signal`: cleaning, structured
/// extraction, language detection, and (if `extract_entities` is set)
/// entity extraction. If the cleaned result would violate the core
/// invariants (cleaned body longer than original, or empty without a
/// removal step), the signal is returned with `cleaning_steps =
/// [error_fallback]` and best-effort metadata instead of failing the run,
/// per the error policy: a preprocessing failure never aborts the
/// reasoning pipeline.
///
/// # Errors
///
/// Returns [`CoreError`] only if even the error-fallback construction
/// itself violates the core invariants, which would indicate a defect in
/// this crate.
pub fn preprocess(
    signal: &Signal,
    now: Timestamp,
    extract_entities: bool,
) -> Result<PreprocessResult, CoreError> {
    let is_email = signal.source == SignalSource::Email;
    let (cleaned_body, cleaning_steps, has_quoted_reply, has_signature) =
        cleaning::clean(&signal.body, is_email);
    let cleaned_subject = signal.subject.as_deref().map(cleaning::normalize_whitespace);
    let extracted_data = extract_structured_data(&cleaned_body, now);
    let guess = language::detect(&cleaned_body);

    let metadata = SignalMetadata {
        language: guess.language,
        language_confidence: guess.confidence,
        word_count: word_count(&cleaned_body),
        sentence_count: sentence_count(&cleaned_body),
        has_quoted_reply,
        has_signature,
        has_attachments: !signal.attachments.is_empty(),
        cleaning_steps,
    };

    let entities = extract_entities.then(|| crate::entities::extract(&cleaned_body, &extracted_data));

    match PreprocessedSignal::new(signal.id.clone(), &signal.body, cleaned_subject, cleaned_body, extracted_data, metadata) {
        Ok(preprocessed) => Ok(PreprocessResult { signal: preprocessed, entities }),
        Err(error) => {
            warn!(signal_id = %signal.id, %error, "cleaning stage produced an invalid signal, falling back to raw text");
            Ok(PreprocessResult { signal: error_fallback(signal)?, entities: None })
        }
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

    use opsgate_core::identifiers::SignalId;

    use super::*;

    fn signal(body: &str) -> Signal {
        Signal {
            id: SignalId::new("s1"),
            source: SignalSource::Email,
            subject: Some("  Re:   status update  ".to_string()),
            body: body.to_string(),
            sender: Some("ops@example.com".to_string()),
            timestamp: Timestamp::from_unix_millis(0),
            attachments: Vec::new(),
        }
    }

    #[test]
    fn preprocesses_a_plain_signal() {
        let result = preprocess(&signal("Please review the report by 5:00pm. Thanks!"), Timestamp::from_unix_millis(0), false)
            .expect("preprocess succeeds");
        assert!(result.signal.cleaned_body.contains("Please review"));
        assert_eq!(result.signal.metadata.language, "en");
        assert!(result.entities.is_none());
    }

    #[test]
    fn entity_extraction_runs_when_requested() {
        let result = preprocess(&signal("Please escalate this ASAP to Dr. Lee."), Timestamp::from_unix_millis(0), true)
            .expect("preprocess succeeds");
        let entities = result.entities.expect("entities requested");
        assert!(!entities.people.is_empty());
        assert!(!entities.action_items.is_empty());
    }

    #[test]
    fn idempotent_on_already_cleaned_text() {
        let first = preprocess(&signal("hello there, friend"), Timestamp::from_unix_millis(0), false).expect("first pass");
        let second_signal = Signal { body: first.signal.cleaned_body.clone(), ..signal("hello there, friend") };
        let second = preprocess(&second_signal, Timestamp::from_unix_millis(0), false).expect("second pass");
        assert_eq!(first.signal.cleaned_body, second.signal.cleaned_body);
    }
}
