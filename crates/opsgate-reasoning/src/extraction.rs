// crates/opsgate-reasoning/src/extraction.rs
// ============================================================================
// Module: Structured-Data Extraction (M1, stage 4)
// Description: Pulls emails, phone numbers, URLs, file references,
//              mentions, dates, times, and monetary amounts out of cleaned
//              body text.
// Dependencies: opsgate-core, regex
// ============================================================================

use std::sync::LazyLock;

use opsgate_core::MoneyAmount;
use opsgate_core::NormalizedDate;
use regex::Regex;

#[allow(clippy::expect_used, reason = "regex literals are fixed at compile time and known valid")]
static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid regex"));
#[allow(clippy::expect_used, reason = "regex literals are fixed at compile time and known valid")]
static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+1[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b").expect("valid regex")
});
#[allow(clippy::expect_used, reason = "regex literals are fixed at compile time and known valid")]
static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s<>()]+[^\s<>().,;:!?]").expect("valid regex"));
#[allow(clippy::expect_used, reason = "regex literals are fixed at compile time and known valid")]
static FILE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[\w-]+\.(pdf|docx?|xlsx?|pptx?|csv|txt|png|jpe?g|zip|json|md)\b").expect("valid regex")
});
#[allow(clippy::expect_used, reason = "regex literals are fixed at compile time and known valid")]
static MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@[A-Za-z0-9_.-]+").expect("valid regex"));
#[allow(clippy::expect_used, reason = "regex literals are fixed at compile time and known valid")]
static MONEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:([$€£¥])\s?([\d,]+(?:\.\d{1,2})?)|([\d,]+(?:\.\d{1,2})?)\s?(USD|EUR|GBP|JPY|INR))")
        .expect("valid regex")
});
#[allow(clippy::expect_used, reason = "regex literals are fixed at compile time and known valid")]
static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").expect("valid regex"));
#[allow(clippy::expect_used, reason = "regex literals are fixed at compile time and known valid")]
static SLASH_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").expect("valid regex"));
#[allow(clippy::expect_used, reason = "regex literals are fixed at compile time and known valid")]
static WRITTEN_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|jun(?:e)?|jul(?:y)?|aug(?:ust)?|sep(?:tember)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\s+(\d{1,2}),?\s+(\d{4})\b",
    )
    .expect("valid regex")
});
#[allow(clippy::expect_used, reason = "regex literals are fixed at compile time and known valid")]
static TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2}):(\d{2})\s?(am|pm)?\b").expect("valid regex"));
#[allow(clippy::expect_used, reason = "regex literals are fixed at compile time and known valid")]
static EOD_COB: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b(eod|cob)\b").expect("valid regex"));
#[allow(clippy::expect_used, reason = "regex literals are fixed at compile time and known valid")]
static RELATIVE_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(today|tomorrow|next week|next month|last week|last month)\b").expect("valid regex"));

fn dedup(mut items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
    items
}

#[must_use]
pub(crate) fn emails(text: &str) -> Vec<String> {
    dedup(EMAIL.find_iter(text).map(|m| m.as_str().to_string()).collect())
}

#[must_use]
pub(crate) fn phone_numbers(text: &str) -> Vec<String> {
    dedup(PHONE.find_iter(text).map(|m| m.as_str().to_string()).collect())
}

#[must_use]
pub(crate) fn urls(text: &str) -> Vec<String> {
    dedup(URL.find_iter(text).map(|m| m.as_str().to_string()).collect())
}

#[must_use]
pub(crate) fn file_references(text: &str) -> Vec<String> {
    dedup(FILE_REFERENCE.find_iter(text).map(|m| m.as_str().to_string()).collect())
}

#[must_use]
pub(crate) fn mentions(text: &str) -> Vec<String> {
    dedup(MENTION.find_iter(text).map(|m| m.as_str().to_string()).collect())
}

fn currency_symbol_code(symbol: &str) -> &'static str {
    match symbol {
        "$" => "USD",
        "€" => "EUR",
        "£" => "GBP",
        "¥" => "JPY",
        _ => "USD",
    }
}

#[must_use]
pub(crate) fn amounts(text: &str) -> Vec<MoneyAmount> {
    MONEY
        .captures_iter(text)
        .map(|captures| {
            if let (Some(symbol), Some(amount)) = (captures.get(1), captures.get(2)) {
                MoneyAmount {
                    amount: amount.as_str().replace(',', ""),
                    currency: currency_symbol_code(symbol.as_str()).to_string(),
                }
            } else {
                let amount = captures.get(3).map_or("", |m| m.as_str());
                let code = captures.get(4).map_or("USD", |m| m.as_str());
                MoneyAmount {
                    amount: amount.replace(',', ""),
                    currency: code.to_uppercase(),
                }
            }
        })
        .collect()
}

fn month_number(name: &str) -> u32 {
    let lower = name.to_lowercase();
    match &lower[..3.min(lower.len())] {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => 1,
    }
}

#[must_use]
pub(crate) fn dates(text: &str) -> Vec<NormalizedDate> {
    let mut result = Vec::new();

    for captures in ISO_DATE.captures_iter(text) {
        result.push(NormalizedDate {
            raw: captures[0].to_string(),
            iso: format!("{}-{}-{}", &captures[1], &captures[2], &captures[3]),
        });
    }
    for captures in SLASH_DATE.captures_iter(text) {
        let month: u32 = captures[1].parse().unwrap_or(1);
        let day: u32 = captures[2].parse().unwrap_or(1);
        result.push(NormalizedDate {
            raw: captures[0].to_string(),
            iso: format!("{}-{month:02}-{day:02}", &captures[3]),
        });
    }
    for captures in WRITTEN_DATE.captures_iter(text) {
        let month = month_number(&captures[1]);
        let day: u32 = captures[2].parse().unwrap_or(1);
        result.push(NormalizedDate {
            raw: captures[0].to_string(),
            iso: format!("{}-{month:02}-{day:02}", &captures[3]),
        });
    }

    result
}

#[must_use]
pub(crate) fn has_relative_date(text: &str) -> bool {
    RELATIVE_DATE.is_match(text)
}

#[must_use]
pub(crate) fn times(text: &str) -> Vec<String> {
    let mut result: Vec<String> = TIME
        .captures_iter(text)
        .map(|captures| {
            let hour: u32 = captures[1].parse().unwrap_or(0);
            let minute = &captures[2];
            let meridiem = captures.get(3).map(|m| m.as_str().to_lowercase());
            let hour24 = match meridiem.as_deref() {
                Some("pm") if hour != 12 => hour + 12,
                Some("am") if hour == 12 => 0,
                _ => hour,
            };
            format!("{hour24:02}:{minute}")
        })
        .collect();

    if EOD_COB.is_match(text) {
        result.push("17:00".to_string());
    }

    dedup(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_email_and_mention() {
        assert_eq!(emails("reach me at jane@example.com please"), vec!["jane@example.com"]);
        assert_eq!(mentions("cc @bob.smith on this"), vec!["@bob.smith"]);
    }

    #[test]
    fn extracts_dollar_amount() {
        let found = amounts("the invoice is $1,200.50 total");
        assert_eq!(found[0].amount, "1200.50");
        assert_eq!(found[0].currency, "USD");
    }

    #[test]
    fn extracts_suffixed_currency_code() {
        let found = amounts("budget of 500 EUR approved");
        assert_eq!(found[0].amount, "500");
        assert_eq!(found[0].currency, "EUR");
    }

    #[test]
    fn normalizes_iso_and_slash_dates() {
        let found = dates("due 2026-03-05 or 3/5/2026");
        assert_eq!(found[0].iso, "2026-03-05");
        assert_eq!(found[1].iso, "2026-03-05");
    }

    #[test]
    fn eod_normalizes_to_five_pm() {
        assert!(times("please reply EOD").contains(&"17:00".to_string()));
    }

    #[test]
    fn twelve_hour_times_convert_to_24h() {
        assert_eq!(times("meet at 2:30pm")[0], "14:30");
    }
}
