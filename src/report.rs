//! Aggregate accuracy reports over evaluation outputs.
//!
//! Report keys are stable (`eval_results_strict` / `eval_results_loose`)
//! so downstream tooling can consume the JSON form across versions.

use crate::evaluator::{EvalOutputs, OutputExample, PassAtKMetrics, PassAtKRun};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tabled::{Table, Tabled};

/// Accuracy metrics for one evaluation mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeMetrics {
    pub prompt_accuracy: f64,
    pub instruction_accuracy: f64,
    pub prompt_total: usize,
    pub prompt_correct: usize,
    pub instruction_total: usize,
    pub instruction_correct: usize,
    /// Accuracy per instruction category (the part before `:`).
    pub category_accuracy: BTreeMap<String, f64>,
    /// Accuracy per full instruction identifier.
    pub per_instruction_accuracy: BTreeMap<String, f64>,
}

impl ModeMetrics {
    /// Tally one mode's outputs. Duplicate identifier occurrences in a
    /// single example count independently.
    #[must_use]
    pub fn from_outputs(outputs: &[OutputExample]) -> Self {
        let mut prompt_correct = 0usize;
        let mut instruction_total = 0usize;
        let mut instruction_correct = 0usize;
        let mut category_totals: BTreeMap<String, (usize, usize)> = BTreeMap::new();
        let mut id_totals: BTreeMap<String, (usize, usize)> = BTreeMap::new();

        for output in outputs {
            if output.follow_all_instructions {
                prompt_correct += 1;
            }
            instruction_total += output.instruction_id_list.len();

            for (id, &followed) in output
                .instruction_id_list
                .iter()
                .zip(&output.follow_instruction_list)
            {
                if followed {
                    instruction_correct += 1;
                }
                let category = id.split(':').next().unwrap_or(id).to_string();
                let cat = category_totals.entry(category).or_default();
                cat.0 += 1;
                cat.1 += usize::from(followed);
                let per_id = id_totals.entry(id.clone()).or_default();
                per_id.0 += 1;
                per_id.1 += usize::from(followed);
            }
        }

        let prompt_total = outputs.len();
        let ratio = |correct: usize, total: usize| {
            if total > 0 {
                correct as f64 / total as f64
            } else {
                0.0
            }
        };

        Self {
            prompt_accuracy: ratio(prompt_correct, prompt_total),
            instruction_accuracy: ratio(instruction_correct, instruction_total),
            prompt_total,
            prompt_correct,
            instruction_total,
            instruction_correct,
            category_accuracy: category_totals
                .into_iter()
                .map(|(k, (total, correct))| (k, ratio(correct, total)))
                .collect(),
            per_instruction_accuracy: id_totals
                .into_iter()
                .map(|(k, (total, correct))| (k, ratio(correct, total)))
                .collect(),
        }
    }
}

/// Full strict+loose evaluation report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalReport {
    pub eval_results_strict: ModeMetrics,
    pub eval_results_loose: ModeMetrics,
    pub generated_at: DateTime<Utc>,
    pub framework_version: String,
}

#[derive(Tabled)]
struct ModeRow {
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Prompt Acc")]
    prompt_accuracy: String,
    #[tabled(rename = "Instruction Acc")]
    instruction_accuracy: String,
}

#[derive(Tabled)]
struct IdRow {
    #[tabled(rename = "Instruction")]
    id: String,
    #[tabled(rename = "Strict")]
    strict: String,
    #[tabled(rename = "Loose")]
    loose: String,
}

impl EvalReport {
    #[must_use]
    pub fn from_outputs(outputs: &EvalOutputs) -> Self {
        Self {
            eval_results_strict: ModeMetrics::from_outputs(&outputs.strict),
            eval_results_loose: ModeMetrics::from_outputs(&outputs.loose),
            generated_at: Utc::now(),
            framework_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Serialize to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Render a terminal summary with per-mode and per-instruction tables.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mode_rows = vec![
            ModeRow {
                mode: "strict".to_string(),
                prompt_accuracy: format!(
                    "{:.4} ({}/{})",
                    self.eval_results_strict.prompt_accuracy,
                    self.eval_results_strict.prompt_correct,
                    self.eval_results_strict.prompt_total
                ),
                instruction_accuracy: format!(
                    "{:.4} ({}/{})",
                    self.eval_results_strict.instruction_accuracy,
                    self.eval_results_strict.instruction_correct,
                    self.eval_results_strict.instruction_total
                ),
            },
            ModeRow {
                mode: "loose".to_string(),
                prompt_accuracy: format!(
                    "{:.4} ({}/{})",
                    self.eval_results_loose.prompt_accuracy,
                    self.eval_results_loose.prompt_correct,
                    self.eval_results_loose.prompt_total
                ),
                instruction_accuracy: format!(
                    "{:.4} ({}/{})",
                    self.eval_results_loose.instruction_accuracy,
                    self.eval_results_loose.instruction_correct,
                    self.eval_results_loose.instruction_total
                ),
            },
        ];

        let id_rows: Vec<IdRow> = self
            .eval_results_strict
            .per_instruction_accuracy
            .iter()
            .map(|(id, strict)| IdRow {
                id: id.clone(),
                strict: format!("{strict:.4}"),
                loose: self
                    .eval_results_loose
                    .per_instruction_accuracy
                    .get(id)
                    .map_or_else(|| "-".to_string(), |v| format!("{v:.4}")),
            })
            .collect();

        let mut out = String::new();
        out.push_str("Instruction Following Evaluation\n");
        out.push_str(&format!("Generated: {}\n\n", self.generated_at.to_rfc3339()));
        out.push_str(&Table::new(mode_rows).to_string());
        if !id_rows.is_empty() {
            out.push_str("\n\nPer-instruction accuracy:\n");
            out.push_str(&Table::new(id_rows).to_string());
        }
        out.push('\n');
        out
    }
}

/// Pass@k report for both modes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassAtKReport {
    pub eval_results_strict: PassAtKMetrics,
    pub eval_results_loose: PassAtKMetrics,
    pub k: usize,
    pub num_prompts: usize,
    pub generated_at: DateTime<Utc>,
    pub framework_version: String,
}

impl PassAtKReport {
    #[must_use]
    pub fn from_run(run: &PassAtKRun, k: usize) -> Self {
        Self {
            eval_results_strict: run.strict,
            eval_results_loose: run.loose,
            k,
            num_prompts: run.examples.len(),
            generated_at: Utc::now(),
            framework_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Serialize to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[must_use]
    pub fn to_text(&self) -> String {
        let rows = vec![
            ModeRow {
                mode: "strict".to_string(),
                prompt_accuracy: format!("{:.4}", self.eval_results_strict.prompt_accuracy),
                instruction_accuracy: format!(
                    "{:.4}",
                    self.eval_results_strict.instruction_accuracy
                ),
            },
            ModeRow {
                mode: "loose".to_string(),
                prompt_accuracy: format!("{:.4}", self.eval_results_loose.prompt_accuracy),
                instruction_accuracy: format!(
                    "{:.4}",
                    self.eval_results_loose.instruction_accuracy
                ),
            },
        ];

        let mut out = String::new();
        out.push_str(&format!(
            "Pass@{} over {} prompts\n\n",
            self.k, self.num_prompts
        ));
        out.push_str(&Table::new(rows).to_string());
        out.push('\n');
        out
    }
}
