//! # ifcheck
//!
//! Instruction-following evaluation for language model responses.
//!
//! A dataset declares, per prompt, a list of machine-checkable
//! instructions ("use no commas", "write exactly 3 paragraphs",
//! "respond only in Russian") with per-instruction keyword arguments.
//! This crate checks free-form responses against those declarations and
//! aggregates accuracy.
//!
//! ## Architecture
//!
//! ```text
//! Input JSONL (prompt + instruction ids + kwargs)
//!        ↓
//! Per-language InstructionRegistry (id → constructor)
//!        ↓
//! Evaluator: strict check, then loose variant search
//!        ↓
//! Per-example outputs (JSONL) + accuracy report (JSON/terminal)
//!        ↓
//! Optional pass@k estimation over repeated samples
//! ```
//!
//! Strict mode checks the literal response. Loose mode enumerates a
//! bounded power set of deterministic text transforms (line removal,
//! emphasis stripping, quote normalization) and accepts the example if
//! any single variant satisfies every instruction at once. With `n`
//! samples per prompt, [`pass_at_k::pass_at_k`] gives the unbiased
//! estimate of solving a prompt within `k` draws.

pub mod checks;
pub mod config;
pub mod dataset;
pub mod english;
pub mod evaluator;
pub mod instruction;
pub mod pass_at_k;
pub mod processor;
pub mod registry;
pub mod report;
pub mod russian;

pub use config::{ConfigError, EvalSettings, Language};
pub use dataset::{
    read_input_examples, read_response_lists, read_responses, write_outputs,
    write_pass_at_k_outputs, DatasetError,
};
pub use evaluator::{
    loose_variants, EvalError, EvalOutputs, Evaluator, InputExample, OutputExample,
    PassAtKExample, PassAtKMetrics, PassAtKRun, Transform,
};
pub use instruction::{Instruction, InstructionError, Kwargs, Relation};
pub use pass_at_k::{hard_pass_at_k, pass_at_k, PassAtKError};
pub use processor::{LanguageProcessor, LanguageRegistry, ProcessorError, SentenceSplitter};
pub use registry::{InstructionBuilder, InstructionRegistry, RegistryError};
pub use report::{EvalReport, ModeMetrics, PassAtKReport};
