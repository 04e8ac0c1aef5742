//! Language processor capability: per-language sentence and word analysis.
//!
//! Instructions that depend on linguistic structure (sentence counts,
//! paragraph-initial words, capitalized-word tallies) go through this
//! interface rather than hard-coding one language's rules.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// ISO 639-1 codes of languages a response may be required to be written in.
pub static LANGUAGE_CODES: &[(&str, &str)] = &[
    ("en", "English"),
    ("es", "Spanish"),
    ("pt", "Portuguese"),
    ("ar", "Arabic"),
    ("hi", "Hindi"),
    ("fr", "French"),
    ("ru", "Russian"),
    ("de", "German"),
    ("ja", "Japanese"),
    ("it", "Italian"),
    ("bn", "Bengali"),
    ("uk", "Ukrainian"),
    ("th", "Thai"),
    ("ur", "Urdu"),
    ("ta", "Tamil"),
    ("te", "Telugu"),
    ("bg", "Bulgarian"),
    ("ko", "Korean"),
    ("pl", "Polish"),
    ("he", "Hebrew"),
    ("fa", "Persian"),
    ("vi", "Vietnamese"),
    ("ne", "Nepali"),
    ("sw", "Swahili"),
    ("kn", "Kannada"),
    ("mr", "Marathi"),
    ("gu", "Gujarati"),
    ("pa", "Punjabi"),
    ("ml", "Malayalam"),
    ("fi", "Finnish"),
];

/// Whether `code` names a supported language.
#[must_use]
pub fn language_is_supported(code: &str) -> bool {
    LANGUAGE_CODES.iter().any(|(c, _)| *c == code)
}

/// English name for a supported language code.
#[must_use]
pub fn language_name(code: &str) -> Option<&'static str> {
    LANGUAGE_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// Identify the language of `text` as an ISO 639-1 code.
///
/// Returns `None` when the detector cannot produce a confident answer
/// (e.g. empty or symbol-only text) or the detected language has no
/// ISO 639-1 mapping we support.
#[must_use]
pub fn detect_language_code(text: &str) -> Option<&'static str> {
    let info = whatlang::detect(text)?;
    match info.lang().code() {
        "eng" => Some("en"),
        "spa" => Some("es"),
        "por" => Some("pt"),
        "ara" => Some("ar"),
        "hin" => Some("hi"),
        "fra" => Some("fr"),
        "rus" => Some("ru"),
        "deu" => Some("de"),
        "jpn" => Some("ja"),
        "ita" => Some("it"),
        "ben" => Some("bn"),
        "ukr" => Some("uk"),
        "tha" => Some("th"),
        "urd" => Some("ur"),
        "tam" => Some("ta"),
        "tel" => Some("te"),
        "bul" => Some("bg"),
        "kor" => Some("ko"),
        "pol" => Some("pl"),
        "heb" => Some("he"),
        "pes" => Some("fa"),
        "vie" => Some("vi"),
        "nep" => Some("ne"),
        "kan" => Some("kn"),
        "mar" => Some("mr"),
        "guj" => Some("gu"),
        "pan" => Some("pa"),
        "mal" => Some("ml"),
        "fin" => Some("fi"),
        _ => None,
    }
}

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("static word pattern"));

/// Tokenize on `\w+` runs, the shared word-boundary rule for both
/// supported languages (Unicode-aware, so Cyrillic words count).
#[must_use]
pub fn regexp_word_tokenize(text: &str) -> Vec<String> {
    WORD_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Per-language text analysis capability.
///
/// All methods are pure functions of the input text. Empty input yields
/// zero counts and empty sequences, never an error.
pub trait LanguageProcessor: Send + Sync {
    /// ISO 639-1 code of the language this processor analyzes.
    fn code(&self) -> &'static str;

    fn split_into_sentences(&self, text: &str) -> Vec<String>;

    fn count_sentences(&self, text: &str) -> usize {
        self.split_into_sentences(text).len()
    }

    fn word_tokenize(&self, text: &str) -> Vec<String>;

    fn count_words(&self, text: &str) -> usize {
        self.word_tokenize(text).len()
    }

    /// Normalize inflections so keyword checks match morphological variants.
    fn lemmatize(&self, text: &str) -> String;

    /// Identify the language of `text`, if a detector can tell.
    fn detect_language(&self, text: &str) -> Option<&'static str> {
        detect_language_code(text)
    }
}

/// Errors from the language processor registry.
#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("language `{0}` is already registered")]
    DuplicateLanguage(String),

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),
}

/// Registry from language code to processor, built once at startup and
/// read-only afterwards.
#[derive(Default)]
pub struct LanguageRegistry {
    processors: BTreeMap<String, Arc<dyn LanguageProcessor>>,
}

impl LanguageRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processor under its language code.
    ///
    /// # Errors
    ///
    /// Fails if the code is already registered; a built-in language is
    /// never silently replaced.
    pub fn register(&mut self, processor: Arc<dyn LanguageProcessor>) -> Result<(), ProcessorError> {
        let code = processor.code().to_string();
        if self.processors.contains_key(&code) {
            return Err(ProcessorError::DuplicateLanguage(code));
        }
        self.processors.insert(code, processor);
        Ok(())
    }

    /// Look up the processor for a language code.
    ///
    /// # Errors
    ///
    /// Fails if no processor is registered for `code`.
    pub fn get(&self, code: &str) -> Result<Arc<dyn LanguageProcessor>, ProcessorError> {
        self.processors
            .get(code)
            .cloned()
            .ok_or_else(|| ProcessorError::UnsupportedLanguage(code.to_string()))
    }

    /// Registered language codes, in sorted order.
    #[must_use]
    pub fn codes(&self) -> Vec<&str> {
        self.processors.keys().map(String::as_str).collect()
    }
}

/// Language-specific tables driving the rule-based sentence splitter.
///
/// Character classes and alternations are regex fragments; alternation
/// groups must be non-capturing so the splitter controls group numbering.
pub struct SentenceRules {
    /// Character class matching one letter, e.g. `[A-Za-z]`.
    pub alphabets: &'static str,
    /// Abbreviation prefixes that do not end a sentence, e.g. `Mr|Dr`.
    pub prefixes: &'static str,
    /// Corporate suffixes, e.g. `Inc|Ltd`.
    pub suffixes: &'static str,
    /// Words that commonly start a new sentence after an abbreviation.
    pub starters: &'static str,
    /// Acronym pattern without capture groups, e.g. `[A-Z]\.[A-Z]\.(?:[A-Z]\.)?`.
    pub acronyms: &'static str,
    /// Website TLD alternation, e.g. `com|net|org`.
    pub websites: &'static str,
    /// Literal abbreviations replaced before rule application,
    /// e.g. `("Ph.D.", "Ph<prd>D<prd>")`.
    pub specials: &'static [(&'static str, &'static str)],
}

/// Rule-driven sentence splitter.
///
/// Works by protecting non-terminal periods with a `<prd>` placeholder,
/// marking genuine boundaries with `<stop>`, then splitting. Compiled
/// once per language.
pub struct SentenceSplitter {
    prefixes: Regex,
    websites: Regex,
    decimals: Regex,
    multi_dots: Regex,
    single_letter: Regex,
    acronym_starter: Regex,
    three_initials: Regex,
    two_initials: Regex,
    suffix_starter: Regex,
    suffix: Regex,
    trailing_letter: Regex,
    specials: &'static [(&'static str, &'static str)],
}

impl SentenceSplitter {
    /// Compile the splitter for one language's rules.
    ///
    /// Rule tables are static program data; a malformed fragment is a
    /// programming error, so compilation failures panic at startup.
    #[must_use]
    pub fn new(rules: &SentenceRules) -> Self {
        let a = rules.alphabets;
        let compile = |pattern: String| Regex::new(&pattern).expect("static sentence rule");
        Self {
            prefixes: compile(format!(r"({})[.]", rules.prefixes)),
            websites: compile(format!(r"[.]({})", rules.websites)),
            decimals: compile(r"([0-9])[.]([0-9])".to_string()),
            multi_dots: compile(r"\.{2,}".to_string()),
            single_letter: compile(format!(r"\s({a})[.] ")),
            acronym_starter: compile(format!(r"({}) ({})", rules.acronyms, rules.starters)),
            three_initials: compile(format!(r"({a})[.]({a})[.]({a})[.]")),
            two_initials: compile(format!(r"({a})[.]({a})[.]")),
            suffix_starter: compile(format!(r" ({})[.] ({})", rules.suffixes, rules.starters)),
            suffix: compile(format!(r" ({})[.]", rules.suffixes)),
            trailing_letter: compile(format!(r" ({a})[.]")),
            specials: rules.specials,
        }
    }

    /// Split `text` into trimmed sentences. Empty input yields no sentences.
    #[must_use]
    pub fn split(&self, text: &str) -> Vec<String> {
        let mut text = format!(" {text}  ").replace('\n', " ");
        for (literal, protected) in self.specials {
            text = text.replace(literal, protected);
        }
        let mut text = self.prefixes.replace_all(&text, "${1}<prd>").into_owned();
        text = self.websites.replace_all(&text, "<prd>${1}").into_owned();
        text = self
            .decimals
            .replace_all(&text, "${1}<prd>${2}")
            .into_owned();
        text = self
            .multi_dots
            .replace_all(&text, |caps: &regex::Captures<'_>| {
                format!("{}<stop>", "<prd>".repeat(caps[0].len()))
            })
            .into_owned();
        text = self
            .single_letter
            .replace_all(&text, " ${1}<prd> ")
            .into_owned();
        text = self
            .acronym_starter
            .replace_all(&text, "${1}<stop> ${2}")
            .into_owned();
        text = self
            .three_initials
            .replace_all(&text, "${1}<prd>${2}<prd>${3}<prd>")
            .into_owned();
        text = self
            .two_initials
            .replace_all(&text, "${1}<prd>${2}<prd>")
            .into_owned();
        text = self
            .suffix_starter
            .replace_all(&text, " ${1}<stop> ${2}")
            .into_owned();
        text = self.suffix.replace_all(&text, " ${1}<prd>").into_owned();
        text = self
            .trailing_letter
            .replace_all(&text, " ${1}<prd>")
            .into_owned();
        // Keep terminal punctuation inside closing quotes.
        text = text.replace(".\u{201d}", "\u{201d}.");
        text = text.replace(".\"", "\".");
        text = text.replace("!\"", "\"!");
        text = text.replace("?\"", "\"?");
        text = text.replace('.', ".<stop>");
        text = text.replace('?', "?<stop>");
        text = text.replace('!', "!<stop>");
        text = text.replace("<prd>", ".");

        let mut sentences: Vec<String> = text.split("<stop>").map(|s| s.trim().to_string()).collect();
        if sentences.last().is_some_and(String::is_empty) {
            sentences.pop();
        }
        sentences.retain(|s| !s.is_empty());
        sentences
    }
}
