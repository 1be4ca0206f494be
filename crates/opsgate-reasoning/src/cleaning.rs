// crates/opsgate-reasoning/src/cleaning.rs
// ============================================================================
// Module: Signal Cleaning (M1, stages 1-3)
// Description: Quoted-reply removal, signature removal, whitespace
//              normalization.
// Purpose: Strip boilerplate that would otherwise dilute classification
//          prompts, while recording which stages actually fired.
// Dependencies: opsgate-core, regex
// ============================================================================

use std::sync::LazyLock;

use opsgate_core::CleaningStep;
use regex::Regex;

#[allow(clippy::expect_used, reason = "regex literals are fixed at compile time and known valid")]
static QUOTE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^(From:.*|Sent:.*|On .* wrote:)\s*$").expect("valid regex")
});
#[allow(clippy::expect_used, reason = "regex literals are fixed at compile time and known valid")]
static QUOTE_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^>.*$").expect("valid regex"));
#[allow(clippy::expect_used, reason = "regex literals are fixed at compile time and known valid")]
static SIGNATURE_DELIMITER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(--\s?|_{5,})\s*$").expect("valid regex"));
#[allow(clippy::expect_used, reason = "regex literals are fixed at compile time and known valid")]
static MOBILE_SIGNATURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mi)^sent from my (iphone|ipad|android|samsung).*$").expect("valid regex"));
#[allow(clippy::expect_used, reason = "regex literals are fixed at compile time and known valid")]
static CONFIDENTIALITY_BOILERPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)this (e-?mail|message) (and any attachments )?(is|are) confidential.*")
        .expect("valid regex")
});

/// Strips trailing reply blocks identified by known header lines and
/// `>`-prefixed quote lines. Returns the cleaned body and whether anything
/// was removed.
#[must_use]
pub fn remove_quoted_reply(body: &str) -> (String, bool) {
    if let Some(header_match) = QUOTE_HEADER.find(body) {
        let cleaned = body[..header_match.start()].trim_end().to_string();
        return (cleaned, true);
    }
    if QUOTE_LINE.is_match(body) {
        let cleaned: String = body
            .lines()
            .filter(|line| !QUOTE_LINE.is_match(line))
            .collect::<Vec<_>>()
            .join("\n");
        return (cleaned.trim_end().to_string(), true);
    }
    (body.to_string(), false)
}

/// Strips a trailing signature block (`-- `, long underscore rules, mobile
/// signature lines) and confidentiality boilerplate. Returns the cleaned
/// body and whether anything was removed.
#[must_use]
pub fn remove_signature(body: &str) -> (String, bool) {
    let mut removed = false;
    let mut cleaned = body.to_string();

    if let Some(delimiter_match) = SIGNATURE_DELIMITER.find(&cleaned) {
        cleaned = cleaned[..delimiter_match.start()].trim_end().to_string();
        removed = true;
    }
    if let Some(mobile_match) = MOBILE_SIGNATURE.find(&cleaned) {
        cleaned = cleaned[..mobile_match.start()].trim_end().to_string();
        removed = true;
    }
    if let Some(boilerplate_match) = CONFIDENTIALITY_BOILERPLATE.find(&cleaned) {
        cleaned = cleaned[..boilerplate_match.start()].trim_end().to_string();
        removed = true;
    }

    (cleaned, removed)
}

/// Collapses runs of spaces to one, caps consecutive newlines at two, trims
/// the ends, and normalizes CRLF to LF.
#[must_use]
pub fn normalize_whitespace(body: &str) -> String {
    let unified_newlines = body.replace("\r\n", "\n");
    let mut result = String::with_capacity(unified_newlines.len());
    let mut consecutive_newlines = 0;
    let mut last_was_space = false;

    for ch in unified_newlines.chars() {
        if ch == '\n' {
            consecutive_newlines += 1;
            last_was_space = false;
            if consecutive_newlines <= 2 {
                result.push(ch);
            }
        } else if ch == ' ' || ch == '\t' {
            consecutive_newlines = 0;
            if !last_was_space {
                result.push(' ');
            }
            last_was_space = true;
        } else {
            consecutive_newlines = 0;
            last_was_space = false;
            result.push(ch);
        }
    }

    result.trim().to_string()
}

/// Runs all cleaning stages, in order, returning the final body and which
/// steps fired.
#[must_use]
pub fn clean(raw_body: &str, is_email: bool) -> (String, Vec<CleaningStep>, bool, bool) {
    let mut steps = Vec::new();
    let mut body = raw_body.to_string();
    let mut has_quoted_reply = false;
    let mut has_signature = false;

    if is_email {
        let (cleaned, removed) = remove_quoted_reply(&body);
        body = cleaned;
        has_quoted_reply = removed;
        if removed {
            steps.push(CleaningStep::QuotedReplyRemoved);
        }
    }

    let (cleaned, removed) = remove_signature(&body);
    body = cleaned;
    has_signature = removed;
    if removed {
        steps.push(CleaningStep::SignatureRemoved);
    }

    body = normalize_whitespace(&body);
    steps.push(CleaningStep::WhitespaceNormalized);

    (body, steps, has_quoted_reply, has_signature)
}
