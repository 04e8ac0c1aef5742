//! Strict/loose evaluation protocol and pass@k aggregation.
//!
//! Strict mode checks the literal response. Loose mode enumerates a
//! bounded, deterministic set of response variants and accepts the
//! example if any single variant satisfies every instruction at once;
//! otherwise it falls back to the strict verdict.

use crate::instruction::Kwargs;
use crate::pass_at_k::{hard_pass_at_k, pass_at_k, PassAtKError};
use crate::registry::{InstructionRegistry, RegistryError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::info;

/// Errors raised while evaluating a batch.
#[derive(Error, Debug)]
pub enum EvalError {
    #[error(
        "example `{key}` has {num_ids} instruction ids but {num_kwargs} kwargs entries"
    )]
    KwargsMismatch {
        key: String,
        num_ids: usize,
        num_kwargs: usize,
    },

    #[error("no response found for prompt: {0}")]
    MissingResponse(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    PassAtK(#[from] PassAtKError),
}

/// One dataset entry: a prompt with its declared instruction list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputExample {
    pub key: serde_json::Value,
    pub prompt: String,
    pub instruction_id_list: Vec<String>,
    pub kwargs: Vec<Kwargs>,
}

/// Per-example, per-mode evaluation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputExample {
    pub key: serde_json::Value,
    pub prompt: String,
    /// The literal response in strict mode; in loose mode the variant
    /// that satisfied all instructions, if one was found.
    pub response: String,
    pub instruction_id_list: Vec<String>,
    pub follow_all_instructions: bool,
    pub follow_instruction_list: Vec<bool>,
}

/// Pass@k scores for a single prompt across its sampled responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassAtKExample {
    pub key: serde_json::Value,
    pub prompt: String,
    pub instruction_id_list: Vec<String>,
    pub responses: Vec<String>,
    pub pass_at_k_score_strict: f64,
    pub pass_at_k_score_loose: f64,
}

/// Prompt- and instruction-level pass@k accuracy for one mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PassAtKMetrics {
    pub prompt_accuracy: f64,
    pub instruction_accuracy: f64,
}

/// Outputs of a full strict+loose batch run.
#[derive(Debug, Clone)]
pub struct EvalOutputs {
    pub strict: Vec<OutputExample>,
    pub loose: Vec<OutputExample>,
}

/// Outputs of a pass@k run.
#[derive(Debug, Clone)]
pub struct PassAtKRun {
    pub examples: Vec<PassAtKExample>,
    pub strict: PassAtKMetrics,
    pub loose: PassAtKMetrics,
}

/// One base transformation applied to a response in loose mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    RemoveFirstLine,
    RemoveLastLine,
    StripEmphasis,
    NormalizeQuotes,
}

impl Transform {
    /// The fixed application order. Changing this order or the set
    /// changes which near-miss responses are accepted, so it is part of
    /// the evaluation contract.
    pub const ALL: [Self; 4] = [
        Self::RemoveFirstLine,
        Self::RemoveLastLine,
        Self::StripEmphasis,
        Self::NormalizeQuotes,
    ];

    fn apply(self, text: &str) -> String {
        match self {
            Self::RemoveFirstLine => text
                .split_once('\n')
                .map_or_else(String::new, |(_, rest)| rest.to_string()),
            Self::RemoveLastLine => text
                .rsplit_once('\n')
                .map_or_else(String::new, |(head, _)| head.to_string()),
            Self::StripEmphasis => text.replace('*', ""),
            Self::NormalizeQuotes => text
                .replace(['\u{201c}', '\u{201d}', '\u{201e}'], "\"")
                .replace(['\u{2018}', '\u{2019}'], "'"),
        }
    }
}

/// Enumerate the loose-mode response variants in search order.
///
/// The power set of [`Transform::ALL`] is walked fewest-transforms
/// first (ties broken by subset encoding), each subset applied in the
/// fixed transform order, and each result trimmed. Duplicates are
/// removed keeping the earliest position, so the first entry is always
/// the trimmed original response.
#[must_use]
pub fn loose_variants(response: &str) -> Vec<String> {
    let mut masks: Vec<u32> = (0..1u32 << Transform::ALL.len()).collect();
    masks.sort_by_key(|mask| (mask.count_ones(), *mask));

    let mut variants: Vec<String> = Vec::with_capacity(masks.len());
    for mask in masks {
        let mut text = response.to_string();
        for (bit, transform) in Transform::ALL.iter().enumerate() {
            if mask & (1 << bit) != 0 {
                text = transform.apply(&text);
            }
        }
        let text = text.trim().to_string();
        if !variants.contains(&text) {
            variants.push(text);
        }
    }
    variants
}

/// Evaluates batches of examples against a per-language registry.
pub struct Evaluator {
    registry: InstructionRegistry,
}

impl Evaluator {
    #[must_use]
    pub fn new(registry: InstructionRegistry) -> Self {
        Self { registry }
    }

    fn instructions_for(
        &self,
        example: &InputExample,
    ) -> Result<Vec<Box<dyn crate::instruction::Instruction>>, EvalError> {
        if example.instruction_id_list.len() != example.kwargs.len() {
            return Err(EvalError::KwargsMismatch {
                key: example.key.to_string(),
                num_ids: example.instruction_id_list.len(),
                num_kwargs: example.kwargs.len(),
            });
        }
        example
            .instruction_id_list
            .iter()
            .zip(&example.kwargs)
            .map(|(id, kwargs)| self.registry.construct(id, kwargs).map_err(EvalError::from))
            .collect()
    }

    /// Check the literal response. A blank response fails every
    /// instruction.
    ///
    /// # Errors
    ///
    /// Fails on misaligned kwargs or an unconstructible instruction.
    pub fn check_strict(
        &self,
        example: &InputExample,
        response: &str,
    ) -> Result<OutputExample, EvalError> {
        let instructions = self.instructions_for(example)?;
        let non_blank = !response.trim().is_empty();
        let follow_instruction_list: Vec<bool> = instructions
            .iter()
            .map(|instruction| non_blank && instruction.check(response))
            .collect();

        Ok(OutputExample {
            key: example.key.clone(),
            prompt: example.prompt.clone(),
            response: response.to_string(),
            instruction_id_list: example.instruction_id_list.clone(),
            follow_all_instructions: follow_instruction_list.iter().all(|&b| b),
            follow_instruction_list,
        })
    }

    /// Search the loose variants for one that satisfies every
    /// instruction together; fall back to the strict verdict otherwise.
    ///
    /// # Errors
    ///
    /// Fails on misaligned kwargs or an unconstructible instruction.
    pub fn check_loose(
        &self,
        example: &InputExample,
        response: &str,
    ) -> Result<OutputExample, EvalError> {
        let instructions = self.instructions_for(example)?;

        for variant in loose_variants(response) {
            if variant.is_empty() {
                continue;
            }
            if instructions.iter().all(|instruction| instruction.check(&variant)) {
                let count = instructions.len();
                return Ok(OutputExample {
                    key: example.key.clone(),
                    prompt: example.prompt.clone(),
                    response: variant,
                    instruction_id_list: example.instruction_id_list.clone(),
                    follow_all_instructions: true,
                    follow_instruction_list: vec![true; count],
                });
            }
        }

        self.check_strict(example, response)
    }

    /// Run strict and loose evaluation over a batch.
    ///
    /// # Errors
    ///
    /// Fails if any prompt has no response, on misaligned kwargs, or on
    /// an unconstructible instruction.
    pub fn evaluate(
        &self,
        examples: &[InputExample],
        responses: &BTreeMap<String, String>,
    ) -> Result<EvalOutputs, EvalError> {
        info!(examples = examples.len(), "running strict evaluation");
        let strict = self.run_mode(examples, responses, Self::check_strict)?;
        info!(examples = examples.len(), "running loose evaluation");
        let loose = self.run_mode(examples, responses, Self::check_loose)?;
        Ok(EvalOutputs { strict, loose })
    }

    fn run_mode(
        &self,
        examples: &[InputExample],
        responses: &BTreeMap<String, String>,
        check: fn(&Self, &InputExample, &str) -> Result<OutputExample, EvalError>,
    ) -> Result<Vec<OutputExample>, EvalError> {
        examples
            .par_iter()
            .map(|example| {
                let response = responses
                    .get(&example.prompt)
                    .ok_or_else(|| EvalError::MissingResponse(example.prompt.clone()))?;
                check(self, example, response)
            })
            .collect()
    }

    /// Smoothed pass@k over `n` sampled responses per prompt.
    ///
    /// # Errors
    ///
    /// Fails when `k == 0` or any prompt has fewer than `k` responses,
    /// when a prompt has no response list, or on construction errors.
    pub fn evaluate_pass_at_k(
        &self,
        examples: &[InputExample],
        responses: &BTreeMap<String, Vec<String>>,
        k: usize,
    ) -> Result<PassAtKRun, EvalError> {
        info!(examples = examples.len(), k, "running pass@k evaluation");
        self.pass_at_k_run(examples, responses, |n, c| Ok(pass_at_k(n, c, k)?))
    }

    /// Hard pass@k: a prompt scores 1.0 iff one of its first `k`
    /// responses passes outright.
    ///
    /// # Errors
    ///
    /// Same error conditions as [`Self::evaluate_pass_at_k`].
    pub fn evaluate_pass_at_k_hard(
        &self,
        examples: &[InputExample],
        responses: &BTreeMap<String, Vec<String>>,
        k: usize,
    ) -> Result<PassAtKRun, EvalError> {
        info!(examples = examples.len(), k, "running hard pass@k evaluation");
        self.pass_at_k_hard_run(examples, responses, k)
    }

    fn pass_at_k_run(
        &self,
        examples: &[InputExample],
        responses: &BTreeMap<String, Vec<String>>,
        score: impl Fn(usize, usize) -> Result<f64, EvalError> + Sync,
    ) -> Result<PassAtKRun, EvalError> {
        let per_prompt: Vec<PromptScores> = examples
            .par_iter()
            .map(|example| {
                let response_list = responses
                    .get(&example.prompt)
                    .ok_or_else(|| EvalError::MissingResponse(example.prompt.clone()))?;
                let counts = self.sample_counts(example, response_list)?;
                let n = response_list.len();

                let instruction_strict = counts
                    .per_instruction_strict
                    .iter()
                    .map(|&c| score(n, c))
                    .collect::<Result<Vec<_>, _>>()?;
                let instruction_loose = counts
                    .per_instruction_loose
                    .iter()
                    .map(|&c| score(n, c))
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(PromptScores {
                    example: PassAtKExample {
                        key: example.key.clone(),
                        prompt: example.prompt.clone(),
                        instruction_id_list: example.instruction_id_list.clone(),
                        responses: response_list.clone(),
                        pass_at_k_score_strict: score(n, counts.all_strict)?,
                        pass_at_k_score_loose: score(n, counts.all_loose)?,
                    },
                    instruction_strict,
                    instruction_loose,
                })
            })
            .collect::<Result<_, EvalError>>()?;

        Ok(aggregate(per_prompt))
    }

    fn pass_at_k_hard_run(
        &self,
        examples: &[InputExample],
        responses: &BTreeMap<String, Vec<String>>,
        k: usize,
    ) -> Result<PassAtKRun, EvalError> {
        let per_prompt: Vec<PromptScores> = examples
            .par_iter()
            .map(|example| {
                let response_list = responses
                    .get(&example.prompt)
                    .ok_or_else(|| EvalError::MissingResponse(example.prompt.clone()))?;
                let outcomes = self.sample_outcomes(example, response_list)?;

                let hard = |passed: &[bool]| -> Result<f64, EvalError> {
                    Ok(if hard_pass_at_k(passed, k)? { 1.0 } else { 0.0 })
                };

                let num_instructions = example.instruction_id_list.len();
                let per_instruction = |per_sample: &[Vec<bool>]| -> Result<Vec<f64>, EvalError> {
                    (0..num_instructions)
                        .map(|idx| {
                            let column: Vec<bool> =
                                per_sample.iter().map(|flags| flags[idx]).collect();
                            hard(&column)
                        })
                        .collect()
                };

                Ok(PromptScores {
                    example: PassAtKExample {
                        key: example.key.clone(),
                        prompt: example.prompt.clone(),
                        instruction_id_list: example.instruction_id_list.clone(),
                        responses: response_list.clone(),
                        pass_at_k_score_strict: hard(&outcomes.all_strict)?,
                        pass_at_k_score_loose: hard(&outcomes.all_loose)?,
                    },
                    instruction_strict: per_instruction(&outcomes.per_sample_strict)?,
                    instruction_loose: per_instruction(&outcomes.per_sample_loose)?,
                })
            })
            .collect::<Result<_, EvalError>>()?;

        Ok(aggregate(per_prompt))
    }

    fn sample_counts(
        &self,
        example: &InputExample,
        response_list: &[String],
    ) -> Result<SampleCounts, EvalError> {
        let outcomes = self.sample_outcomes(example, response_list)?;
        let num_instructions = example.instruction_id_list.len();

        let column_count = |per_sample: &[Vec<bool>], idx: usize| {
            per_sample.iter().filter(|flags| flags[idx]).count()
        };

        Ok(SampleCounts {
            all_strict: outcomes.all_strict.iter().filter(|&&b| b).count(),
            all_loose: outcomes.all_loose.iter().filter(|&&b| b).count(),
            per_instruction_strict: (0..num_instructions)
                .map(|idx| column_count(&outcomes.per_sample_strict, idx))
                .collect(),
            per_instruction_loose: (0..num_instructions)
                .map(|idx| column_count(&outcomes.per_sample_loose, idx))
                .collect(),
        })
    }

    fn sample_outcomes(
        &self,
        example: &InputExample,
        response_list: &[String],
    ) -> Result<SampleOutcomes, EvalError> {
        let mut outcomes = SampleOutcomes::default();
        for response in response_list {
            let strict = self.check_strict(example, response)?;
            let loose = self.check_loose(example, response)?;
            outcomes.all_strict.push(strict.follow_all_instructions);
            outcomes.all_loose.push(loose.follow_all_instructions);
            outcomes.per_sample_strict.push(strict.follow_instruction_list);
            outcomes.per_sample_loose.push(loose.follow_instruction_list);
        }
        Ok(outcomes)
    }
}

struct PromptScores {
    example: PassAtKExample,
    instruction_strict: Vec<f64>,
    instruction_loose: Vec<f64>,
}

#[derive(Default)]
struct SampleOutcomes {
    all_strict: Vec<bool>,
    all_loose: Vec<bool>,
    per_sample_strict: Vec<Vec<bool>>,
    per_sample_loose: Vec<Vec<bool>>,
}

struct SampleCounts {
    all_strict: usize,
    all_loose: usize,
    per_instruction_strict: Vec<usize>,
    per_instruction_loose: Vec<usize>,
}

fn aggregate(per_prompt: Vec<PromptScores>) -> PassAtKRun {
    let mut examples = Vec::with_capacity(per_prompt.len());
    let (mut strict_prompt_sum, mut loose_prompt_sum) = (0.0f64, 0.0f64);
    let (mut strict_inst_sum, mut loose_inst_sum) = (0.0f64, 0.0f64);
    let mut instruction_total = 0usize;

    for scores in per_prompt {
        strict_prompt_sum += scores.example.pass_at_k_score_strict;
        loose_prompt_sum += scores.example.pass_at_k_score_loose;
        strict_inst_sum += scores.instruction_strict.iter().sum::<f64>();
        loose_inst_sum += scores.instruction_loose.iter().sum::<f64>();
        instruction_total += scores.instruction_strict.len();
        examples.push(scores.example);
    }

    let prompt_total = examples.len();
    let ratio = |sum: f64, total: usize| if total > 0 { sum / total as f64 } else { 0.0 };

    PassAtKRun {
        strict: PassAtKMetrics {
            prompt_accuracy: ratio(strict_prompt_sum, prompt_total),
            instruction_accuracy: ratio(strict_inst_sum, instruction_total),
        },
        loose: PassAtKMetrics {
            prompt_accuracy: ratio(loose_prompt_sum, prompt_total),
            instruction_accuracy: ratio(loose_inst_sum, instruction_total),
        },
        examples,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::english;
    use serde_json::json;

    fn evaluator() -> Evaluator {
        Evaluator::new(english::registry().unwrap())
    }

    fn example(ids: &[&str], kwargs: &[serde_json::Value]) -> InputExample {
        InputExample {
            key: json!(1),
            prompt: "Test prompt.".to_string(),
            instruction_id_list: ids.iter().map(ToString::to_string).collect(),
            kwargs: kwargs
                .iter()
                .map(|v| v.as_object().unwrap().clone())
                .collect(),
        }
    }

    #[test]
    fn test_loose_variants_order_and_dedup() {
        let variants = loose_variants("line one\nline two");
        // The trimmed original always comes first.
        assert_eq!(variants[0], "line one\nline two");
        assert!(variants.contains(&"line two".to_string()));
        assert!(variants.contains(&"line one".to_string()));
        // No duplicates survive.
        let mut sorted = variants.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), variants.len());
        assert!(variants.len() <= 16);
    }

    #[test]
    fn test_loose_variants_deterministic() {
        let text = "*Intro*\n\u{201c}Body\u{201d}\nOutro";
        assert_eq!(loose_variants(text), loose_variants(text));
    }

    #[test]
    fn test_strict_blank_response_fails_everything() {
        let eval = evaluator();
        let inp = example(&["punctuation:no_comma"], &[json!({})]);
        let out = eval.check_strict(&inp, "   \n  ").unwrap();
        assert!(!out.follow_all_instructions);
        assert_eq!(out.follow_instruction_list, vec![false]);
    }

    #[test]
    fn test_strict_pass_and_fail() {
        let eval = evaluator();
        let inp = example(&["punctuation:no_comma"], &[json!({})]);
        assert!(eval.check_strict(&inp, "Hello world").unwrap().follow_all_instructions);
        assert!(!eval.check_strict(&inp, "Hello, world").unwrap().follow_all_instructions);
    }

    #[test]
    fn test_loose_recovers_near_miss() {
        let eval = evaluator();
        let inp = example(&["change_case:english_lowercase"], &[json!({})]);
        // Stray capitalized first line; removing it satisfies the check.
        let response =
            "Sure! Here you go:\nall of the remaining text stays in quiet lowercase english words.";
        assert!(!eval.check_strict(&inp, response).unwrap().follow_all_instructions);
        let loose = eval.check_loose(&inp, response).unwrap();
        assert!(loose.follow_all_instructions);
        assert_eq!(
            loose.response,
            "all of the remaining text stays in quiet lowercase english words."
        );
    }

    #[test]
    fn test_loose_falls_back_to_strict() {
        let eval = evaluator();
        let inp = example(&["change_case:english_lowercase"], &[json!({})]);
        let out = eval.check_loose(&inp, "ALL CAPS EVERYWHERE").unwrap();
        assert!(!out.follow_all_instructions);
        assert_eq!(out.response, "ALL CAPS EVERYWHERE");
    }

    #[test]
    fn test_strict_implies_loose() {
        let eval = evaluator();
        let inp = example(
            &["punctuation:no_comma", "length_constraints:number_words"],
            &[json!({}), json!({"num_words": 3, "relation": "at least"})],
        );
        let response = "four words right here";
        let strict = eval.check_strict(&inp, response).unwrap();
        let loose = eval.check_loose(&inp, response).unwrap();
        assert!(strict.follow_all_instructions);
        assert!(loose.follow_all_instructions);
    }

    #[test]
    fn test_all_instructions_must_pass_on_same_variant() {
        let eval = evaluator();
        // The comma and the required keyword live on the same line: any
        // variant that drops the comma also drops the keyword.
        let inp = example(
            &["punctuation:no_comma", "keywords:existence"],
            &[json!({}), json!({"keywords": ["intro"]})],
        );
        let response = "The intro line, with a comma\nplain tail text";
        let out = eval.check_loose(&inp, response).unwrap();
        assert!(!out.follow_all_instructions);
    }

    #[test]
    fn test_kwargs_mismatch_rejected() {
        let eval = evaluator();
        let inp = example(&["punctuation:no_comma"], &[]);
        let err = eval.check_strict(&inp, "text").unwrap_err();
        assert!(matches!(err, EvalError::KwargsMismatch { .. }));
    }

    #[test]
    fn test_missing_response_aborts() {
        let eval = evaluator();
        let inp = example(&["punctuation:no_comma"], &[json!({})]);
        let responses = BTreeMap::new();
        let err = eval.evaluate(&[inp], &responses).unwrap_err();
        assert!(matches!(err, EvalError::MissingResponse(_)));
    }

    #[test]
    fn test_evaluate_batch() {
        let eval = evaluator();
        let inp = example(&["punctuation:no_comma"], &[json!({})]);
        let mut responses = BTreeMap::new();
        responses.insert(inp.prompt.clone(), "no commas here".to_string());
        let outputs = eval.evaluate(std::slice::from_ref(&inp), &responses).unwrap();
        assert_eq!(outputs.strict.len(), 1);
        assert_eq!(outputs.loose.len(), 1);
        assert!(outputs.strict[0].follow_all_instructions);
    }

    #[test]
    fn test_pass_at_k_known_value() {
        let eval = evaluator();
        let inp = example(&["punctuation:no_comma"], &[json!({})]);
        let mut responses = BTreeMap::new();
        // 5 samples, 2 passing: pass@2 = 0.7.
        responses.insert(
            inp.prompt.clone(),
            vec![
                "clean".to_string(),
                "dirty, one".to_string(),
                "clean again".to_string(),
                "dirty, two".to_string(),
                "dirty, three".to_string(),
            ],
        );
        let run = eval.evaluate_pass_at_k(&[inp], &responses, 2).unwrap();
        assert!((run.strict.prompt_accuracy - 0.7).abs() < 1e-12);
        assert_eq!(run.examples.len(), 1);
        assert!((run.examples[0].pass_at_k_score_strict - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_pass_at_k_insufficient_samples() {
        let eval = evaluator();
        let inp = example(&["punctuation:no_comma"], &[json!({})]);
        let mut responses = BTreeMap::new();
        responses.insert(inp.prompt.clone(), vec!["one".to_string()]);
        let err = eval.evaluate_pass_at_k(&[inp], &responses, 5).unwrap_err();
        assert!(matches!(err, EvalError::PassAtK(_)));
    }

    #[test]
    fn test_hard_pass_at_k_first_k_only() {
        let eval = evaluator();
        let inp = example(&["punctuation:no_comma"], &[json!({})]);
        let mut responses = BTreeMap::new();
        // The only passing sample sits outside the first 2 draws.
        responses.insert(
            inp.prompt.clone(),
            vec![
                "fails, here".to_string(),
                "fails, too".to_string(),
                "passes".to_string(),
            ],
        );
        let run = eval.evaluate_pass_at_k_hard(&[inp.clone()], &responses, 2).unwrap();
        assert!((run.strict.prompt_accuracy - 0.0).abs() < 1e-12);
        let run = eval.evaluate_pass_at_k_hard(&[inp], &responses, 3).unwrap();
        assert!((run.strict.prompt_accuracy - 1.0).abs() < 1e-12);
    }
}
