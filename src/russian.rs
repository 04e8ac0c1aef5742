//! Russian language support: processor rules, constants, and the full
//! Russian instruction registry.

use crate::checks::build_registry;
use crate::processor::{
    regexp_word_tokenize, LanguageProcessor, SentenceRules, SentenceSplitter,
};
use crate::registry::{InstructionRegistry, RegistryError};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::sync::Arc;

/// Options accepted by `detectable_format:constrained_response`.
/// Both em-dash and hyphen spellings circulate in datasets.
pub const CONSTRAINED_RESPONSE_OPTIONS: &[&str] = &[
    "Мой ответ \u{2014} да",
    "Мой ответ \u{2014} нет",
    "Мой ответ \u{2014} возможно",
    "Мой ответ - да",
    "Мой ответ - нет",
    "Мой ответ - возможно",
];

const RULES: SentenceRules = SentenceRules {
    alphabets: "[А-Яа-яA-Za-z]",
    prefixes: "г|гр|г-н|г-жа|д-р|к|к-т|м-р|п|с",
    suffixes: "ООО|ОАО|ЗАО|АО|ИП",
    starters: r"Он\s|Она\s|Оно\s|Они\s|Их\s|Мы\s|Но\s|Однако\s|Что\s|Это\s|Тот\s|Та\s",
    acronyms: r"[А-Я][.][А-Я][.](?:[А-Я][.])?",
    websites: "com|net|org|io|gov|edu|me|ru",
    specials: &[
        ("к.т.н.", "к<prd>т<prd>н<prd>"),
        ("д.т.н.", "д<prd>т<prd>н<prd>"),
    ],
};

static SPLITTER: Lazy<SentenceSplitter> = Lazy::new(|| SentenceSplitter::new(&RULES));

// Latin characters and ASCII symbols are stripped before lemmatization so
// only Cyrillic word forms reach the stemmer.
static LATIN_SYMBOLS: Lazy<Regex> = Lazy::new(|| {
    Regex::new("[A-Za-z0-9!#$%&'()*+,./:;<=>?@\\[\\]^_`{|}~\u{2014}\"-]+")
        .expect("static latin pattern")
});

/// Russian text analysis: `\w+` word boundaries, abbreviation-aware
/// sentence splitting, and Snowball-stemming lemmatization.
pub struct RussianProcessor {
    stemmer: Stemmer,
}

impl RussianProcessor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            stemmer: Stemmer::create(Algorithm::Russian),
        }
    }
}

impl Default for RussianProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageProcessor for RussianProcessor {
    fn code(&self) -> &'static str {
        "ru"
    }

    fn split_into_sentences(&self, text: &str) -> Vec<String> {
        SPLITTER.split(text)
    }

    fn word_tokenize(&self, text: &str) -> Vec<String> {
        regexp_word_tokenize(text)
    }

    fn lemmatize(&self, text: &str) -> String {
        let cleaned = LATIN_SYMBOLS.replace_all(text, " ");
        cleaned
            .split_whitespace()
            .map(|token| self.stemmer.stem(&token.to_lowercase()).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Build the Russian instruction registry with all built-in checks.
///
/// # Errors
///
/// Fails only if an id would be registered twice, which indicates a
/// programming error in the built-in table.
pub fn registry() -> Result<InstructionRegistry, RegistryError> {
    build_registry(
        Arc::new(RussianProcessor::new()),
        CONSTRAINED_RESPONSE_OPTIONS,
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_split_basic() {
        let p = RussianProcessor::new();
        let text = "Привет мир. Как дела? Хорошо!";
        assert_eq!(p.count_sentences(text), 3);
    }

    #[test]
    fn test_split_academic_abbreviation() {
        let p = RussianProcessor::new();
        assert_eq!(p.count_sentences("Иванов, к.т.н. по образованию, выступил."), 1);
    }

    #[test]
    fn test_split_empty() {
        let p = RussianProcessor::new();
        assert!(p.split_into_sentences("").is_empty());
    }

    #[test]
    fn test_count_words_cyrillic() {
        let p = RussianProcessor::new();
        assert_eq!(p.count_words("быстрая коричневая лиса"), 3);
    }

    #[test]
    fn test_lemmatize_normalizes_inflections() {
        let p = RussianProcessor::new();
        // Different case forms of the same noun collapse to one stem.
        assert_eq!(p.lemmatize("кошка"), p.lemmatize("кошки"));
    }

    #[test]
    fn test_lemmatize_strips_latin() {
        let p = RussianProcessor::new();
        let lemma = p.lemmatize("слово hello мир");
        assert!(!lemma.contains("hello"));
    }

    #[test]
    fn test_registry_builds() {
        let registry = registry().unwrap();
        assert!(registry.contains("keywords:frequency"));
        assert!(registry.contains("startend:quotation"));
    }
}
