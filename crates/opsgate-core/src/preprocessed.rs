// crates/opsgate-core/src/preprocessed.rs
// ============================================================================
// Module: Preprocessed Signal
// Description: Cleaned signal text plus structured extraction and metadata.
// Purpose: Carry the Signal Preprocessor's output into the Classifier.
// Dependencies: crate::{error, signal}, serde
// ============================================================================

//! ## Overview
//! `PreprocessedSignal` is derived from a `Signal` by the preprocessor. The
//! cleaned body is never longer than the original, and is non-empty whenever
//! the original body was non-empty and was not entirely signature/quote
//! boilerplate.

use serde::Deserialize;
use serde::Serialize;

use crate::error::CoreError;
use crate::identifiers::SignalId;

/// A monetary amount with its currency code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneyAmount {
    /// Raw numeric string as it appeared in text (avoids float rounding).
    pub amount: String,
    /// ISO 4217-ish currency code, e.g. `USD`.
    pub currency: String,
}

/// A date normalized to ISO-8601, with the verbatim source text retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedDate {
    /// Source text the date was extracted from.
    pub raw: String,
    /// Normalized `YYYY-MM-DD` form.
    pub iso: String,
}

/// Sets and sequences of structured data pulled out of a signal's text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedData {
    /// Distinct email addresses found in the text.
    #[serde(default)]
    pub emails: Vec<String>,
    /// Distinct US-format phone numbers found in the text.
    #[serde(default)]
    pub phone_numbers: Vec<String>,
    /// Distinct URLs found in the text.
    #[serde(default)]
    pub urls: Vec<String>,
    /// Distinct file references (by known extension) found in the text.
    #[serde(default)]
    pub file_references: Vec<String>,
    /// Distinct `@mentions` found in the text.
    #[serde(default)]
    pub mentions: Vec<String>,
    /// Dates found in the text, normalized to ISO-8601, in appearance order.
    #[serde(default)]
    pub dates: Vec<NormalizedDate>,
    /// Times found in the text (`HH:MM`, 24h), in appearance order.
    #[serde(default)]
    pub times: Vec<String>,
    /// Monetary amounts found in the text, in appearance order.
    #[serde(default)]
    pub amounts: Vec<MoneyAmount>,
}

/// A cleaning step the preprocessor applied, in application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleaningStep {
    /// Trailing quoted-reply block was stripped.
    QuotedReplyRemoved,
    /// Signature or confidentiality boilerplate was stripped.
    SignatureRemoved,
    /// Whitespace was normalized.
    WhitespaceNormalized,
    /// A stage failed and the original text was passed through unchanged.
    ErrorFallback,
}

/// Language detection result and structural counters for a cleaned signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalMetadata {
    /// Best-guess ISO 639-1 language code, default `en`.
    pub language: String,
    /// Confidence in the language guess, in `[0, 1]`.
    pub language_confidence: f64,
    /// Word count of the cleaned body.
    pub word_count: usize,
    /// Sentence count of the cleaned body.
    pub sentence_count: usize,
    /// Whether a quoted reply block was detected and stripped.
    pub has_quoted_reply: bool,
    /// Whether a signature block was detected and stripped.
    pub has_signature: bool,
    /// Whether the signal carried attachments.
    pub has_attachments: bool,
    /// Cleaning steps applied, in order.
    pub cleaning_steps: Vec<CleaningStep>,
}

/// Output of the Signal Preprocessor: a cleaned signal plus extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessedSignal {
    /// Identifier of the `Signal` this was derived from.
    pub signal_id: SignalId,
    /// Cleaned subject line, if the original had one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleaned_subject: Option<String>,
    /// Cleaned body text.
    pub cleaned_body: String,
    /// Structured data pulled from the cleaned body.
    pub extracted_data: ExtractedData,
    /// Language and structural metadata.
    pub metadata: SignalMetadata,
}

impl PreprocessedSignal {
    /// Builds a `PreprocessedSignal`, checking the length and emptiness
    /// invariants against the original body.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Invariant`] if `cleaned_body` is longer than
    /// `original_body`, or if `original_body` is non-empty but
    /// `cleaned_body` is empty while no cleaning step removed content.
    pub fn new(
        signal_id: SignalId,
        original_body: &str,
        cleaned_subject: Option<String>,
        cleaned_body: String,
        extracted_data: ExtractedData,
        metadata: SignalMetadata,
    ) -> Result<Self, CoreError> {
        if cleaned_body.len() > original_body.len() {
            return Err(CoreError::Invariant(
                "cleaned body must not be longer than the original body".to_string(),
            ));
        }
        let removed_content = metadata.has_quoted_reply || metadata.has_signature;
        if !original_body.is_empty() && cleaned_body.is_empty() && !removed_content {
            return Err(CoreError::Invariant(
                "cleaned body is empty but no content-removing step was recorded".to_string(),
            ));
        }
        Ok(Self {
            signal_id,
            cleaned_subject,
            cleaned_body,
            extracted_data,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::CleaningStep;
    use super::ExtractedData;
    use super::PreprocessedSignal;
    use super::SignalMetadata;
    use crate::identifiers::SignalId;

    fn metadata(has_signature: bool) -> SignalMetadata {
        SignalMetadata {
            language: "en".to_string(),
            language_confidence: 0.9,
            word_count: 3,
            sentence_count: 1,
            has_quoted_reply: false,
            has_signature,
            has_attachments: false,
            cleaning_steps: vec![CleaningStep::WhitespaceNormalized],
        }
    }

    #[test]
    fn rejects_cleaned_body_longer_than_original() {
        let result = PreprocessedSignal::new(
            SignalId::new("s1"),
            "hi",
            None,
            "hi there".to_string(),
            ExtractedData::default(),
            metadata(false),
        );
        assert!(result.is_err());
    }

    #[test]
    fn rejects_empty_cleaned_body_without_removal_step() {
        let result = PreprocessedSignal::new(
            SignalId::new("s1"),
            "hello",
            None,
            String::new(),
            ExtractedData::default(),
            metadata(false),
        );
        assert!(result.is_err());
    }

    #[test]
    fn allows_empty_cleaned_body_when_signature_removed() {
        let result = PreprocessedSignal::new(
            SignalId::new("s1"),
            "-- \nJane Doe",
            None,
            String::new(),
            ExtractedData::default(),
            metadata(true),
        );
        assert!(result.is_ok());
    }
}
