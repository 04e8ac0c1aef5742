//! English language support: processor rules, constants, and the full
//! English instruction registry.

use crate::checks::build_registry;
use crate::processor::{
    regexp_word_tokenize, LanguageProcessor, SentenceRules, SentenceSplitter,
};
use crate::registry::{InstructionRegistry, RegistryError};
use once_cell::sync::Lazy;
use std::sync::Arc;

/// Options accepted by `detectable_format:constrained_response`.
pub const CONSTRAINED_RESPONSE_OPTIONS: &[&str] = &[
    "My answer is yes.",
    "My answer is no.",
    "My answer is maybe.",
];

const RULES: SentenceRules = SentenceRules {
    alphabets: "[A-Za-z]",
    prefixes: "Mr|St|Mrs|Ms|Dr",
    suffixes: "Inc|Ltd|Jr|Sr|Co",
    starters: r"Mr|Mrs|Ms|Dr|Prof|Capt|Cpt|Lt|He\s|She\s|It\s|They\s|Their\s|Our\s|We\s|But\s|However\s|That\s|This\s|Wherever",
    acronyms: r"[A-Z][.][A-Z][.](?:[A-Z][.])?",
    websites: "com|net|org|io|gov|edu|me",
    specials: &[("Ph.D.", "Ph<prd>D<prd>")],
};

static SPLITTER: Lazy<SentenceSplitter> = Lazy::new(|| SentenceSplitter::new(&RULES));

/// English text analysis: `\w+` word boundaries, abbreviation-aware
/// sentence splitting, and case-folding lemmatization.
#[derive(Debug, Default)]
pub struct EnglishProcessor;

impl EnglishProcessor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl LanguageProcessor for EnglishProcessor {
    fn code(&self) -> &'static str {
        "en"
    }

    fn split_into_sentences(&self, text: &str) -> Vec<String> {
        SPLITTER.split(text)
    }

    fn word_tokenize(&self, text: &str) -> Vec<String> {
        regexp_word_tokenize(text)
    }

    fn lemmatize(&self, text: &str) -> String {
        // Case folding is enough for English keyword matching; inflection
        // handling is a per-language policy.
        text.to_lowercase()
    }
}

/// Build the English instruction registry with all built-in checks.
///
/// # Errors
///
/// Fails only if an id would be registered twice, which indicates a
/// programming error in the built-in table.
pub fn registry() -> Result<InstructionRegistry, RegistryError> {
    build_registry(
        Arc::new(EnglishProcessor::new()),
        CONSTRAINED_RESPONSE_OPTIONS,
    )
}
