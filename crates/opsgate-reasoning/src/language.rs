// crates/opsgate-reasoning/src/language.rs
// ============================================================================
// Module: Language Detection (M1, stage 5)
// Description: Closed-class word-set frequency match over a small set of
//              languages.
// Dependencies: none beyond std
// ============================================================================

const ENGLISH_WORDS: &[&str] = &[
    "the", "and", "is", "are", "to", "of", "for", "in", "on", "with", "this", "that", "please",
    "will", "we", "you", "have", "be", "at",
];
const SPANISH_WORDS: &[&str] = &[
    "el", "la", "los", "las", "de", "que", "y", "en", "un", "una", "por", "para", "con", "es",
    "son", "favor", "usted",
];
const FRENCH_WORDS: &[&str] = &[
    "le", "la", "les", "de", "et", "un", "une", "pour", "avec", "est", "sont", "vous", "nous",
    "merci", "svp",
];
const GERMAN_WORDS: &[&str] = &[
    "der", "die", "das", "und", "ist", "sind", "fuer", "mit", "sie", "wir", "bitte", "nicht",
    "ein", "eine",
];

/// Best-guess ISO 639-1 language code and the confidence behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageGuess {
    /// Detected language code, default `en`.
    pub language: String,
    /// Match confidence in `[0, 1]`. `0` for empty text.
    pub confidence: f64,
}

fn score(words: &[&str], wordset: &[&str]) -> usize {
    words.iter().filter(|word| wordset.contains(word)).count()
}

/// Guesses the language of `text` by frequency-matching lowercased words
/// against closed word sets for English, Spanish, French, and German.
/// Defaults to `en` with confidence `0.0` for empty text.
#[must_use]
pub(crate) fn detect(text: &str) -> LanguageGuess {
    let lowercase = text.to_lowercase();
    let words: Vec<&str> = lowercase
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect();

    if words.is_empty() {
        return LanguageGuess { language: "en".to_string(), confidence: 0.0 };
    }

    let candidates = [
        ("en", score(&words, ENGLISH_WORDS)),
        ("es", score(&words, SPANISH_WORDS)),
        ("fr", score(&words, FRENCH_WORDS)),
        ("de", score(&words, GERMAN_WORDS)),
    ];

    let (language, matches) = candidates
        .into_iter()
        .max_by_key(|(_, matches)| *matches)
        .unwrap_or(("en", 0));

    if matches == 0 {
        return LanguageGuess { language: "en".to_string(), confidence: 0.0 };
    }

    #[allow(clippy::cast_precision_loss, reason = "word counts fit comfortably in f64 mantissa")]
    let confidence = (matches as f64 / words.len() as f64).min(1.0);

    LanguageGuess { language: language.to_string(), confidence }
}

#[cfg(test)]
mod tests {
    use super::detect;

    #[test]
    fn empty_text_defaults_to_english_zero_confidence() {
        let guess = detect("");
        assert_eq!(guess.language, "en");
        assert_eq!(guess.confidence, 0.0);
    }

    #[test]
    fn english_sentence_is_detected() {
        let guess = detect("please review the report and let us know");
        assert_eq!(guess.language, "en");
        assert!(guess.confidence > 0.0);
    }

    #[test]
    fn spanish_sentence_is_detected() {
        let guess = detect("por favor revise el informe para usted");
        assert_eq!(guess.language, "es");
    }
}
