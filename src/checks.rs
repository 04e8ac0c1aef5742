//! Built-in instruction implementations.
//!
//! Every check here is a pure predicate over the response text. Checks
//! that depend on linguistic structure (sentence counts, word counts,
//! lemmatized keyword matching, language identity) go through the shared
//! [`LanguageProcessor`]; the rest operate on the raw string. All kwargs
//! validation happens in the constructors so a malformed dataset entry
//! fails before any response is examined.

use crate::instruction::{Instruction, InstructionError, KwargsExt, Relation};
use crate::processor::{language_is_supported, LanguageProcessor};
use crate::registry::{InstructionRegistry, RegistryError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[.*?\]").expect("static pattern"));
static BULLET_STAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*\*[^\*].*$").expect("static pattern"));
static BULLET_DASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*-.*$").expect("static pattern"));
static HIGHLIGHT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*[^\n\*]*\*").expect("static pattern"));
static DOUBLE_HIGHLIGHT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*[^\n\*]*\*\*").expect("static pattern"));
static BLANK_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t\r]*\n").expect("static pattern"));

/// Quote pairs accepted by the quotation check. Straight quotes pair
/// with themselves; typographic quotes pair opener with closer.
const QUOTE_PAIRS: &[(char, char)] = &[
    ('"', '"'),
    ('\'', '\''),
    ('\u{201c}', '\u{201d}'),
    ('\u{2018}', '\u{2019}'),
    ('\u{00ab}', '\u{00bb}'),
];

/// Whether `text` has at least one cased character and no lowercase ones.
fn is_all_upper(text: &str) -> bool {
    let mut any_cased = false;
    for ch in text.chars() {
        if ch.is_lowercase() {
            return false;
        }
        if ch.is_uppercase() {
            any_cased = true;
        }
    }
    any_cased
}

/// Whether `text` has at least one cased character and no uppercase ones.
fn is_all_lower(text: &str) -> bool {
    let mut any_cased = false;
    for ch in text.chars() {
        if ch.is_uppercase() {
            return false;
        }
        if ch.is_lowercase() {
            any_cased = true;
        }
    }
    any_cased
}

fn case_insensitive(pattern: String, name: &str) -> Result<Regex, InstructionError> {
    Regex::new(&format!("(?i){pattern}"))
        .map_err(|e| InstructionError::invalid(name, e.to_string()))
}

// ---------------------------------------------------------------------------
// keywords:*
// ---------------------------------------------------------------------------

/// `keywords:existence`: every listed keyword must occur in the response.
///
/// Both the keywords and the response are lemmatized first, so inflected
/// forms count as occurrences in morphologically rich languages.
pub struct KeywordExistence {
    processor: Arc<dyn LanguageProcessor>,
    keywords: Vec<String>,
    patterns: Vec<Regex>,
}

impl KeywordExistence {
    pub fn new(
        processor: Arc<dyn LanguageProcessor>,
        keywords: Vec<String>,
    ) -> Result<Self, InstructionError> {
        let mut keywords = keywords;
        keywords.sort();
        let patterns = keywords
            .iter()
            .map(|kw| case_insensitive(regex::escape(&processor.lemmatize(kw)), "keywords"))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            processor,
            keywords,
            patterns,
        })
    }
}

impl Instruction for KeywordExistence {
    fn description(&self) -> String {
        format!("Include keywords {:?} in the response.", self.keywords)
    }

    fn check(&self, response: &str) -> bool {
        let lemmatized = self.processor.lemmatize(response);
        self.patterns.iter().all(|p| p.is_match(&lemmatized))
    }
}

/// `keywords:frequency`: a keyword must occur as a whole word with the
/// required frequency.
pub struct KeywordFrequency {
    processor: Arc<dyn LanguageProcessor>,
    keyword: String,
    pattern: Regex,
    frequency: usize,
    relation: Relation,
}

impl KeywordFrequency {
    pub fn new(
        processor: Arc<dyn LanguageProcessor>,
        keyword: &str,
        frequency: usize,
        relation: Relation,
    ) -> Result<Self, InstructionError> {
        let keyword = keyword.trim().to_string();
        let pattern = case_insensitive(
            format!(r"\b{}\b", regex::escape(&processor.lemmatize(&keyword))),
            "keyword",
        )?;
        Ok(Self {
            processor,
            keyword,
            pattern,
            frequency,
            relation,
        })
    }
}

impl Instruction for KeywordFrequency {
    fn description(&self) -> String {
        format!(
            "In your response, the word {} should appear {} {} times.",
            self.keyword,
            self.relation.as_str(),
            self.frequency
        )
    }

    fn check(&self, response: &str) -> bool {
        let lemmatized = self.processor.lemmatize(response);
        let occurrences = self.pattern.find_iter(&lemmatized).count();
        self.relation.compare(occurrences, self.frequency)
    }
}

/// `keywords:forbidden_words`: none of the listed words may occur as a
/// whole word in the response.
pub struct ForbiddenWords {
    processor: Arc<dyn LanguageProcessor>,
    words: Vec<String>,
    patterns: Vec<Regex>,
}

impl ForbiddenWords {
    pub fn new(
        processor: Arc<dyn LanguageProcessor>,
        words: Vec<String>,
    ) -> Result<Self, InstructionError> {
        let mut words = words;
        words.sort();
        words.dedup();
        let patterns = words
            .iter()
            .map(|word| {
                case_insensitive(
                    format!(r"\b{}\b", regex::escape(&processor.lemmatize(word))),
                    "forbidden_words",
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            processor,
            words,
            patterns,
        })
    }
}

impl Instruction for ForbiddenWords {
    fn description(&self) -> String {
        format!("Do not include keywords {:?} in the response.", self.words)
    }

    fn check(&self, response: &str) -> bool {
        let lemmatized = self.processor.lemmatize(response);
        !self.patterns.iter().any(|p| p.is_match(&lemmatized))
    }
}

/// `keywords:letter_frequency`: a single letter must appear with the
/// required frequency, counted case-insensitively over the whole response.
pub struct LetterFrequency {
    letter: char,
    frequency: usize,
    relation: Relation,
}

impl LetterFrequency {
    pub fn new(letter: &str, frequency: usize, relation: Relation) -> Result<Self, InstructionError> {
        let trimmed = letter.trim().to_lowercase();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) if ch.is_alphabetic() => Ok(Self {
                letter: ch,
                frequency,
                relation,
            }),
            _ => Err(InstructionError::invalid(
                "letter",
                format!("expected a single alphabetic character, got \"{letter}\""),
            )),
        }
    }
}

impl Instruction for LetterFrequency {
    fn description(&self) -> String {
        format!(
            "In your response, the letter {} should appear {} {} times.",
            self.letter,
            self.relation.as_str(),
            self.frequency
        )
    }

    fn check(&self, response: &str) -> bool {
        let count = response
            .to_lowercase()
            .chars()
            .filter(|ch| *ch == self.letter)
            .count();
        self.relation.compare(count, self.frequency)
    }
}

// ---------------------------------------------------------------------------
// language:*
// ---------------------------------------------------------------------------

/// `language:response_language`: the entire response must be written in
/// the configured language.
pub struct ResponseLanguage {
    processor: Arc<dyn LanguageProcessor>,
    language: String,
}

impl ResponseLanguage {
    pub fn new(
        processor: Arc<dyn LanguageProcessor>,
        language: &str,
    ) -> Result<Self, InstructionError> {
        if !language_is_supported(language) {
            return Err(InstructionError::invalid(
                "language",
                format!("unsupported language code \"{language}\""),
            ));
        }
        Ok(Self {
            processor,
            language: language.to_string(),
        })
    }
}

impl Instruction for ResponseLanguage {
    fn description(&self) -> String {
        format!(
            "Your ENTIRE response should be in {} language, no other language is allowed.",
            self.language
        )
    }

    fn check(&self, response: &str) -> bool {
        // Undetectable text counts as following the instruction.
        match self.processor.detect_language(&response.replace('\n', " ")) {
            Some(code) => code == self.language,
            None => true,
        }
    }
}

// ---------------------------------------------------------------------------
// length_constraints:*
// ---------------------------------------------------------------------------

/// `length_constraints:number_sentences`.
pub struct NumberOfSentences {
    processor: Arc<dyn LanguageProcessor>,
    num_sentences: usize,
    relation: Relation,
}

impl NumberOfSentences {
    #[must_use]
    pub fn new(
        processor: Arc<dyn LanguageProcessor>,
        num_sentences: usize,
        relation: Relation,
    ) -> Self {
        Self {
            processor,
            num_sentences,
            relation,
        }
    }
}

impl Instruction for NumberOfSentences {
    fn description(&self) -> String {
        format!(
            "Your response should contain {} {} sentences.",
            self.relation.as_str(),
            self.num_sentences
        )
    }

    fn check(&self, response: &str) -> bool {
        self.relation
            .compare(self.processor.count_sentences(response), self.num_sentences)
    }
}

/// `length_constraints:number_words`.
pub struct NumberOfWords {
    processor: Arc<dyn LanguageProcessor>,
    num_words: usize,
    relation: Relation,
}

impl NumberOfWords {
    #[must_use]
    pub fn new(processor: Arc<dyn LanguageProcessor>, num_words: usize, relation: Relation) -> Self {
        Self {
            processor,
            num_words,
            relation,
        }
    }
}

impl Instruction for NumberOfWords {
    fn description(&self) -> String {
        format!("Answer with {} {} words.", self.relation.as_str(), self.num_words)
    }

    fn check(&self, response: &str) -> bool {
        self.relation
            .compare(self.processor.count_words(response), self.num_words)
    }
}

/// `length_constraints:number_paragraphs`: the response must contain
/// exactly the required number of paragraphs, where paragraphs are
/// non-empty blocks separated by blank lines.
pub struct NumberOfParagraphs {
    num_paragraphs: usize,
}

impl NumberOfParagraphs {
    #[must_use]
    pub fn new(num_paragraphs: usize) -> Self {
        Self { num_paragraphs }
    }
}

impl Instruction for NumberOfParagraphs {
    fn description(&self) -> String {
        format!(
            "There should be {} paragraphs, separated by blank lines.",
            self.num_paragraphs
        )
    }

    fn check(&self, response: &str) -> bool {
        let paragraphs = BLANK_LINE_RE
            .split(response)
            .filter(|block| !block.trim().is_empty())
            .count();
        paragraphs == self.num_paragraphs
    }
}

/// `length_constraints:nth_paragraph_first_word`: the response must have
/// the required number of `\n\n`-separated paragraphs, and the nth one
/// must start with the configured word.
pub struct NthParagraphFirstWord {
    num_paragraphs: usize,
    nth_paragraph: usize,
    first_word: String,
}

impl NthParagraphFirstWord {
    pub fn new(
        num_paragraphs: usize,
        nth_paragraph: usize,
        first_word: &str,
    ) -> Result<Self, InstructionError> {
        if nth_paragraph == 0 || nth_paragraph > num_paragraphs {
            return Err(InstructionError::invalid(
                "nth_paragraph",
                format!("must be between 1 and {num_paragraphs}"),
            ));
        }
        Ok(Self {
            num_paragraphs,
            nth_paragraph,
            first_word: first_word.to_lowercase(),
        })
    }

    /// First alphabetic token of a paragraph, lowercased, with leading
    /// quotes removed and trailing punctuation cut off.
    fn leading_word(paragraph: &str) -> String {
        let word = paragraph.split_whitespace().next().unwrap_or("");
        let word = word.trim_start_matches('\'').trim_start_matches('"');
        let mut first_word = String::new();
        for ch in word.chars() {
            if matches!(ch, '.' | ',' | '?' | '!' | '\'' | '"') {
                break;
            }
            first_word.extend(ch.to_lowercase());
        }
        first_word
    }
}

impl Instruction for NthParagraphFirstWord {
    fn description(&self) -> String {
        format!(
            "There should be {} paragraphs separated by two new lines. \
             Paragraph {} must start with word {}.",
            self.num_paragraphs, self.nth_paragraph, self.first_word
        )
    }

    fn check(&self, response: &str) -> bool {
        let paragraphs: Vec<&str> = response.split("\n\n").collect();
        let num_paragraphs = paragraphs
            .iter()
            .filter(|p| !p.trim().is_empty())
            .count();

        if self.nth_paragraph > num_paragraphs {
            return false;
        }
        let paragraph = paragraphs[self.nth_paragraph - 1].trim();
        if paragraph.is_empty() {
            return false;
        }

        num_paragraphs == self.num_paragraphs
            && Self::leading_word(paragraph) == self.first_word
    }
}

// ---------------------------------------------------------------------------
// detectable_content:*
// ---------------------------------------------------------------------------

/// `detectable_content:number_placeholders`: at least N square-bracket
/// placeholders such as `[address]`.
pub struct NumberPlaceholders {
    num_placeholders: usize,
}

impl NumberPlaceholders {
    #[must_use]
    pub fn new(num_placeholders: usize) -> Self {
        Self { num_placeholders }
    }
}

impl Instruction for NumberPlaceholders {
    fn description(&self) -> String {
        format!(
            "The response must contain at least {} placeholders represented \
             by square brackets, such as [address].",
            self.num_placeholders
        )
    }

    fn check(&self, response: &str) -> bool {
        PLACEHOLDER_RE.find_iter(response).count() >= self.num_placeholders
    }
}

/// `detectable_content:postscript`: an explicit postscript at the end of
/// the response, starting with the configured marker.
pub struct Postscript {
    marker: String,
    pattern: Regex,
}

impl Postscript {
    pub fn new(marker: &str) -> Result<Self, InstructionError> {
        let marker = marker.trim().to_string();
        let pattern = match marker.as_str() {
            "P.P.S" => r"(?m)\s*p\.\s?p\.\s?s.*$".to_string(),
            "P.S." => r"(?m)\s*p\.\s?s\..*$".to_string(),
            other => format!(r"(?m)\s*{}.*$", regex::escape(&other.to_lowercase())),
        };
        let pattern = Regex::new(&pattern)
            .map_err(|e| InstructionError::invalid("postscript_marker", e.to_string()))?;
        Ok(Self { marker, pattern })
    }
}

impl Instruction for Postscript {
    fn description(&self) -> String {
        format!(
            "At the end of your response, please explicitly add a postscript \
             starting with {}.",
            self.marker
        )
    }

    fn check(&self, response: &str) -> bool {
        self.pattern.is_match(&response.to_lowercase())
    }
}

// ---------------------------------------------------------------------------
// detectable_format:*
// ---------------------------------------------------------------------------

/// `detectable_format:number_bullet_lists`: exactly N markdown bullet
/// points (`*` or `-` lines).
pub struct NumberBulletLists {
    num_bullets: usize,
}

impl NumberBulletLists {
    #[must_use]
    pub fn new(num_bullets: usize) -> Self {
        Self { num_bullets }
    }
}

impl Instruction for NumberBulletLists {
    fn description(&self) -> String {
        format!(
            "Your answer must contain exactly {} bullet points in markdown format.",
            self.num_bullets
        )
    }

    fn check(&self, response: &str) -> bool {
        let star = BULLET_STAR_RE.find_iter(response).count();
        let dash = BULLET_DASH_RE.find_iter(response).count();
        star + dash == self.num_bullets
    }
}

/// `detectable_format:constrained_response`: the response must contain
/// one of the fixed per-language answer options.
pub struct ConstrainedResponse {
    options: Vec<String>,
}

impl ConstrainedResponse {
    #[must_use]
    pub fn new(options: Vec<String>) -> Self {
        Self { options }
    }
}

impl Instruction for ConstrainedResponse {
    fn description(&self) -> String {
        format!("Answer with one of the following options: {:?}", self.options)
    }

    fn check(&self, response: &str) -> bool {
        let trimmed = response.trim();
        self.options.iter().any(|option| trimmed.contains(option))
    }
}

/// `detectable_format:number_highlighted_sections`: at least N non-empty
/// `*highlighted*` or `**highlighted**` markdown spans.
pub struct NumberHighlightedSections {
    num_highlights: usize,
}

impl NumberHighlightedSections {
    #[must_use]
    pub fn new(num_highlights: usize) -> Self {
        Self { num_highlights }
    }
}

impl Instruction for NumberHighlightedSections {
    fn description(&self) -> String {
        format!(
            "Highlight at least {} sections in your answer with markdown, \
             i.e. *highlighted section*.",
            self.num_highlights
        )
    }

    fn check(&self, response: &str) -> bool {
        let mut num_highlights = 0;
        for m in HIGHLIGHT_RE.find_iter(response) {
            if !m.as_str().trim_matches('*').trim().is_empty() {
                num_highlights += 1;
            }
        }
        for m in DOUBLE_HIGHLIGHT_RE.find_iter(response) {
            let inner = m
                .as_str()
                .strip_prefix("**")
                .and_then(|s| s.strip_suffix("**"))
                .unwrap_or("");
            if !inner.trim().is_empty() {
                num_highlights += 1;
            }
        }
        num_highlights >= self.num_highlights
    }
}

/// `detectable_format:multiple_sections`: at least N sections marked by
/// a splitter keyword followed by a section number.
pub struct MultipleSections {
    section_splitter: String,
    num_sections: usize,
    pattern: Regex,
}

impl MultipleSections {
    pub fn new(section_splitter: &str, num_sections: usize) -> Result<Self, InstructionError> {
        let section_splitter = section_splitter.trim().to_string();
        let pattern = Regex::new(&format!(r"\s?{}\s?\d+\s?", regex::escape(&section_splitter)))
            .map_err(|e| InstructionError::invalid("section_spliter", e.to_string()))?;
        Ok(Self {
            section_splitter,
            num_sections,
            pattern,
        })
    }
}

impl Instruction for MultipleSections {
    fn description(&self) -> String {
        format!(
            "Your response must have {} sections. Mark the beginning of each \
             section with {} X.",
            self.num_sections, self.section_splitter
        )
    }

    fn check(&self, response: &str) -> bool {
        let num_sections = self.pattern.split(response).count().saturating_sub(1);
        num_sections >= self.num_sections
    }
}

/// `detectable_format:json_format`: the entire response, after stripping
/// one optional pair of markdown code fences, must parse as JSON.
pub struct JsonFormat;

impl Instruction for JsonFormat {
    fn description(&self) -> String {
        "Entire output should be wrapped in JSON format. You can use markdown ticks such as ```."
            .to_string()
    }

    fn check(&self, response: &str) -> bool {
        let mut value = response.trim();
        for fence in ["```json", "```Json", "```JSON", "```"] {
            if let Some(stripped) = value.strip_prefix(fence) {
                value = stripped;
            }
        }
        if let Some(stripped) = value.strip_suffix("```") {
            value = stripped;
        }
        serde_json::from_str::<serde_json::Value>(value.trim()).is_ok()
    }
}

/// `detectable_format:title`: exactly one markdown `# `-prefixed line
/// with non-empty title text.
pub struct Title;

impl Instruction for Title {
    fn description(&self) -> String {
        "Your answer must contain a title as a markdown `# ` heading line.".to_string()
    }

    fn check(&self, response: &str) -> bool {
        let titles = response
            .lines()
            .filter(|line| {
                let line = line.trim_start();
                line.strip_prefix("# ")
                    .is_some_and(|rest| !rest.trim().is_empty())
            })
            .count();
        titles == 1
    }
}

// ---------------------------------------------------------------------------
// combination:*
// ---------------------------------------------------------------------------

/// `combination:two_responses`: two different answers separated by
/// exactly one `******` divider.
pub struct TwoResponses;

impl Instruction for TwoResponses {
    fn description(&self) -> String {
        "Give two different responses, separated by 6 asterisk symbols: ******.".to_string()
    }

    fn check(&self, response: &str) -> bool {
        let parts: Vec<&str> = response.split("******").collect();
        let mut valid = Vec::new();
        for (index, part) in parts.iter().enumerate() {
            if part.trim().is_empty() {
                if index != 0 && index != parts.len() - 1 {
                    return false;
                }
            } else {
                valid.push(*part);
            }
        }
        valid.len() == 2 && valid[0].trim() != valid[1].trim()
    }
}

/// `combination:repeat_prompt`: the response must begin by repeating the
/// prompt word for word.
pub struct RepeatPrompt {
    prompt_to_repeat: String,
}

impl RepeatPrompt {
    pub fn new(prompt_to_repeat: &str) -> Result<Self, InstructionError> {
        if prompt_to_repeat.is_empty() {
            return Err(InstructionError::invalid(
                "prompt_to_repeat",
                "must be non-empty",
            ));
        }
        Ok(Self {
            prompt_to_repeat: prompt_to_repeat.to_string(),
        })
    }
}

impl Instruction for RepeatPrompt {
    fn description(&self) -> String {
        "First repeat the request word for word without change, then give your answer."
            .to_string()
    }

    fn check(&self, response: &str) -> bool {
        response
            .trim()
            .to_lowercase()
            .starts_with(&self.prompt_to_repeat.trim().to_lowercase())
    }
}

// ---------------------------------------------------------------------------
// startend:*
// ---------------------------------------------------------------------------

/// `startend:end_checker`: the response must end with an exact phrase.
pub struct EndPhrase {
    end_phrase: String,
}

impl EndPhrase {
    #[must_use]
    pub fn new(end_phrase: &str) -> Self {
        Self {
            end_phrase: end_phrase.trim().to_lowercase(),
        }
    }
}

impl Instruction for EndPhrase {
    fn description(&self) -> String {
        format!(
            "Finish your response with this exact phrase: {}. \
             No other words should follow this phrase.",
            self.end_phrase
        )
    }

    fn check(&self, response: &str) -> bool {
        response
            .trim()
            .trim_matches('"')
            .to_lowercase()
            .ends_with(&self.end_phrase)
    }
}

/// `startend:quotation`: the trimmed response must start and end with a
/// matching pair of quotation marks.
pub struct Quotation;

impl Instruction for Quotation {
    fn description(&self) -> String {
        "Wrap your entire response with quotation marks.".to_string()
    }

    fn check(&self, response: &str) -> bool {
        let trimmed = response.trim();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next_back()) {
            (Some(first), Some(last)) => QUOTE_PAIRS
                .iter()
                .any(|(open, close)| first == *open && last == *close),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// change_case:*
// ---------------------------------------------------------------------------

/// `change_case:english_capital`: the response must be entirely in
/// capital letters and in the registry's language.
pub struct AllCapital {
    processor: Arc<dyn LanguageProcessor>,
}

impl AllCapital {
    #[must_use]
    pub fn new(processor: Arc<dyn LanguageProcessor>) -> Self {
        Self { processor }
    }
}

impl Instruction for AllCapital {
    fn description(&self) -> String {
        "Your entire response should be in all capital letters.".to_string()
    }

    fn check(&self, response: &str) -> bool {
        if !is_all_upper(response) {
            return false;
        }
        match self.processor.detect_language(&response.replace('\n', " ")) {
            Some(code) => code == self.processor.code(),
            None => true,
        }
    }
}

/// `change_case:english_lowercase`: the response must be entirely in
/// lowercase letters and in the registry's language.
pub struct AllLowercase {
    processor: Arc<dyn LanguageProcessor>,
}

impl AllLowercase {
    #[must_use]
    pub fn new(processor: Arc<dyn LanguageProcessor>) -> Self {
        Self { processor }
    }
}

impl Instruction for AllLowercase {
    fn description(&self) -> String {
        "Your entire response should be in all lowercase letters. \
         No capital letters are allowed."
            .to_string()
    }

    fn check(&self, response: &str) -> bool {
        if !is_all_lower(response) {
            return false;
        }
        match self.processor.detect_language(&response.replace('\n', " ")) {
            Some(code) => code == self.processor.code(),
            None => true,
        }
    }
}

/// `change_case:capital_word_frequency`: frequency of fully capitalized
/// words, tokenized by the language processor.
pub struct CapitalWordFrequency {
    processor: Arc<dyn LanguageProcessor>,
    frequency: usize,
    relation: Relation,
}

impl CapitalWordFrequency {
    #[must_use]
    pub fn new(processor: Arc<dyn LanguageProcessor>, frequency: usize, relation: Relation) -> Self {
        Self {
            processor,
            frequency,
            relation,
        }
    }
}

impl Instruction for CapitalWordFrequency {
    fn description(&self) -> String {
        format!(
            "In your response, words with all capital letters should appear {} {} times.",
            self.relation.as_str(),
            self.frequency
        )
    }

    fn check(&self, response: &str) -> bool {
        let capital_words = self
            .processor
            .word_tokenize(response)
            .iter()
            .filter(|word| is_all_upper(word))
            .count();
        self.relation.compare(capital_words, self.frequency)
    }
}

// ---------------------------------------------------------------------------
// punctuation:*
// ---------------------------------------------------------------------------

/// `punctuation:no_comma`: the response must not contain any commas.
pub struct NoComma;

impl Instruction for NoComma {
    fn description(&self) -> String {
        "In your entire response, refrain from the use of any commas.".to_string()
    }

    fn check(&self, response: &str) -> bool {
        !response.contains(',')
    }
}

// ---------------------------------------------------------------------------
// Registry assembly
// ---------------------------------------------------------------------------

/// Build the full built-in registry for one language.
///
/// `constrained_options` are the language's fixed answer options for
/// `detectable_format:constrained_response`.
///
/// # Errors
///
/// Fails only on a duplicate id in the built-in table.
pub fn build_registry(
    processor: Arc<dyn LanguageProcessor>,
    constrained_options: &[&str],
) -> Result<InstructionRegistry, RegistryError> {
    let options: Vec<String> = constrained_options.iter().map(ToString::to_string).collect();
    let mut registry = InstructionRegistry::new();

    {
        let p = Arc::clone(&processor);
        registry.register(
            "keywords:existence",
            Box::new(move |kw| {
                let keywords = kw.str_list_arg("keywords")?;
                Ok(Box::new(KeywordExistence::new(Arc::clone(&p), keywords)?))
            }),
        )?;
    }
    {
        let p = Arc::clone(&processor);
        registry.register(
            "keywords:frequency",
            Box::new(move |kw| {
                let keyword = kw.str_arg("keyword")?;
                let frequency = kw.usize_arg("frequency")?;
                let relation = kw.relation_arg("relation")?;
                Ok(Box::new(KeywordFrequency::new(
                    Arc::clone(&p),
                    &keyword,
                    frequency,
                    relation,
                )?))
            }),
        )?;
    }
    {
        let p = Arc::clone(&processor);
        registry.register(
            "keywords:forbidden_words",
            Box::new(move |kw| {
                let words = kw.str_list_arg("forbidden_words")?;
                Ok(Box::new(ForbiddenWords::new(Arc::clone(&p), words)?))
            }),
        )?;
    }
    registry.register(
        "keywords:letter_frequency",
        Box::new(|kw| {
            let letter = kw.str_arg("letter")?;
            let frequency = kw.usize_arg("let_frequency")?;
            let relation = kw.relation_arg("let_relation")?;
            Ok(Box::new(LetterFrequency::new(&letter, frequency, relation)?))
        }),
    )?;
    {
        let p = Arc::clone(&processor);
        registry.register(
            "language:response_language",
            Box::new(move |kw| {
                let language = kw.str_arg("language")?;
                Ok(Box::new(ResponseLanguage::new(Arc::clone(&p), &language)?))
            }),
        )?;
    }
    {
        let p = Arc::clone(&processor);
        registry.register(
            "length_constraints:number_sentences",
            Box::new(move |kw| {
                let num_sentences = kw.usize_arg("num_sentences")?;
                let relation = kw.relation_arg("relation")?;
                Ok(Box::new(NumberOfSentences::new(
                    Arc::clone(&p),
                    num_sentences,
                    relation,
                )))
            }),
        )?;
    }
    {
        let p = Arc::clone(&processor);
        registry.register(
            "length_constraints:number_words",
            Box::new(move |kw| {
                let num_words = kw.usize_arg("num_words")?;
                let relation = kw.relation_arg("relation")?;
                Ok(Box::new(NumberOfWords::new(Arc::clone(&p), num_words, relation)))
            }),
        )?;
    }
    registry.register(
        "length_constraints:number_paragraphs",
        Box::new(|kw| {
            let num_paragraphs = kw.usize_arg("num_paragraphs")?;
            Ok(Box::new(NumberOfParagraphs::new(num_paragraphs)))
        }),
    )?;
    registry.register(
        "length_constraints:nth_paragraph_first_word",
        Box::new(|kw| {
            let num_paragraphs = kw.usize_arg("num_paragraphs")?;
            let nth_paragraph = kw.usize_arg("nth_paragraph")?;
            let first_word = kw.str_arg("first_word")?;
            Ok(Box::new(NthParagraphFirstWord::new(
                num_paragraphs,
                nth_paragraph,
                &first_word,
            )?))
        }),
    )?;
    registry.register(
        "detectable_content:number_placeholders",
        Box::new(|kw| {
            let num_placeholders = kw.usize_arg("num_placeholders")?;
            Ok(Box::new(NumberPlaceholders::new(num_placeholders)))
        }),
    )?;
    registry.register(
        "detectable_content:postscript",
        Box::new(|kw| {
            let marker = kw.str_arg("postscript_marker")?;
            Ok(Box::new(Postscript::new(&marker)?))
        }),
    )?;
    registry.register(
        "detectable_format:number_bullet_lists",
        Box::new(|kw| {
            let num_bullets = kw.usize_arg("num_bullets")?;
            Ok(Box::new(NumberBulletLists::new(num_bullets)))
        }),
    )?;
    registry.register(
        "detectable_format:constrained_response",
        Box::new(move |_kw| Ok(Box::new(ConstrainedResponse::new(options.clone())))),
    )?;
    registry.register(
        "detectable_format:number_highlighted_sections",
        Box::new(|kw| {
            let num_highlights = kw.usize_arg("num_highlights")?;
            Ok(Box::new(NumberHighlightedSections::new(num_highlights)))
        }),
    )?;
    registry.register(
        "detectable_format:multiple_sections",
        Box::new(|kw| {
            let section_splitter = kw.str_arg("section_spliter")?;
            let num_sections = kw.usize_arg("num_sections")?;
            Ok(Box::new(MultipleSections::new(&section_splitter, num_sections)?))
        }),
    )?;
    registry.register("detectable_format:json_format", Box::new(|_kw| Ok(Box::new(JsonFormat))))?;
    registry.register("detectable_format:title", Box::new(|_kw| Ok(Box::new(Title))))?;
    registry.register("combination:two_responses", Box::new(|_kw| Ok(Box::new(TwoResponses))))?;
    registry.register(
        "combination:repeat_prompt",
        Box::new(|kw| {
            let prompt = kw.str_arg("prompt_to_repeat")?;
            Ok(Box::new(RepeatPrompt::new(&prompt)?))
        }),
    )?;
    registry.register(
        "startend:end_checker",
        Box::new(|kw| {
            let end_phrase = kw.str_arg("end_phrase")?;
            Ok(Box::new(EndPhrase::new(&end_phrase)))
        }),
    )?;
    registry.register("startend:quotation", Box::new(|_kw| Ok(Box::new(Quotation))))?;
    {
        let p = Arc::clone(&processor);
        registry.register(
            "change_case:english_capital",
            Box::new(move |_kw| Ok(Box::new(AllCapital::new(Arc::clone(&p))))),
        )?;
    }
    {
        let p = Arc::clone(&processor);
        registry.register(
            "change_case:english_lowercase",
            Box::new(move |_kw| Ok(Box::new(AllLowercase::new(Arc::clone(&p))))),
        )?;
    }
    {
        let p = Arc::clone(&processor);
        registry.register(
            "change_case:capital_word_frequency",
            Box::new(move |kw| {
                let frequency = kw.usize_arg("capital_frequency")?;
                let relation = kw.relation_arg("capital_relation")?;
                Ok(Box::new(CapitalWordFrequency::new(
                    Arc::clone(&p),
                    frequency,
                    relation,
                )))
            }),
        )?;
    }
    registry.register("punctuation:no_comma", Box::new(|_kw| Ok(Box::new(NoComma))))?;

    Ok(registry)
}
