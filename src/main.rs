//! ifcheck CLI
//!
//! Evaluates instruction-following of model responses against JSONL
//! datasets, in strict and loose modes, with optional pass@k analysis.

use clap::{Parser, Subcommand};
use ifcheck::{
    read_input_examples, read_response_lists, read_responses, write_outputs,
    write_pass_at_k_outputs, EvalReport, EvalSettings, Evaluator, Language, PassAtKReport,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ifcheck")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run strict and loose evaluation over a response file
    Evaluate {
        /// Input data JSONL file (prompts + instruction lists)
        #[arg(long)]
        input_data: PathBuf,

        /// JSONL file with one response per prompt
        #[arg(long)]
        input_response_data: PathBuf,

        /// Directory for reports and per-example outputs
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Evaluation language (en, ru)
        #[arg(long)]
        language: Option<String>,

        /// Optional YAML settings file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Estimate pass@k over multiple sampled responses per prompt
    PassAtK {
        /// Input data JSONL file (prompts + instruction lists)
        #[arg(long)]
        input_data: PathBuf,

        /// JSONL file with a response list per prompt
        #[arg(long)]
        input_response_data: PathBuf,

        /// Number of samples to consider per prompt
        #[arg(short, long)]
        k: usize,

        /// Score each prompt by its first k samples only, instead of
        /// the smoothed estimator
        #[arg(long)]
        hard: bool,

        /// Directory for reports and per-prompt outputs
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Evaluation language (en, ru)
        #[arg(long)]
        language: Option<String>,

        /// Optional YAML settings file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn load_settings(
    config: Option<&Path>,
    language: Option<&str>,
    output_dir: Option<&Path>,
) -> anyhow::Result<EvalSettings> {
    let mut settings = match config {
        Some(path) => EvalSettings::from_file(path)?,
        None => EvalSettings::default(),
    };
    // Command-line flags win over the file.
    if let Some(language) = language {
        settings.language = Language::from_str(language)?;
    }
    if let Some(output_dir) = output_dir {
        settings.output_dir = output_dir.display().to_string();
    }
    Ok(settings)
}

fn run_evaluate(
    input_data: &Path,
    input_response_data: &Path,
    settings: &EvalSettings,
) -> anyhow::Result<()> {
    let examples = read_input_examples(input_data)?;
    let responses = read_responses(input_response_data)?;
    let evaluator = Evaluator::new(settings.language.registry()?);

    let outputs = evaluator.evaluate(&examples, &responses)?;
    let report = EvalReport::from_outputs(&outputs);

    let output_dir = Path::new(&settings.output_dir);
    std::fs::create_dir_all(output_dir)?;
    std::fs::write(output_dir.join("eval_report.json"), report.to_json()?)?;
    if settings.write_outputs {
        write_outputs(&output_dir.join("eval_results_strict.jsonl"), &outputs.strict)?;
        write_outputs(&output_dir.join("eval_results_loose.jsonl"), &outputs.loose)?;
    }

    println!("{}", report.to_text());
    Ok(())
}

fn run_pass_at_k(
    input_data: &Path,
    input_response_data: &Path,
    k: usize,
    hard: bool,
    settings: &EvalSettings,
) -> anyhow::Result<()> {
    let examples = read_input_examples(input_data)?;
    let responses = read_response_lists(input_response_data)?;
    let evaluator = Evaluator::new(settings.language.registry()?);

    let run = if hard {
        evaluator.evaluate_pass_at_k_hard(&examples, &responses, k)?
    } else {
        evaluator.evaluate_pass_at_k(&examples, &responses, k)?
    };
    let report = PassAtKReport::from_run(&run, k);

    let output_dir = Path::new(&settings.output_dir);
    std::fs::create_dir_all(output_dir)?;
    std::fs::write(output_dir.join("pass_at_k_report.json"), report.to_json()?)?;
    if settings.write_outputs {
        write_pass_at_k_outputs(&output_dir.join("pass_at_k_results.jsonl"), &run.examples)?;
    }

    println!("{}", report.to_text());
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if cli.verbose {
        tracing::info!("Verbose mode enabled");
    }

    let result = match cli.command {
        Commands::Evaluate {
            input_data,
            input_response_data,
            output_dir,
            language,
            config,
        } => load_settings(config.as_deref(), language.as_deref(), output_dir.as_deref())
            .and_then(|settings| run_evaluate(&input_data, &input_response_data, &settings)),
        Commands::PassAtK {
            input_data,
            input_response_data,
            k,
            hard,
            output_dir,
            language,
            config,
        } => load_settings(config.as_deref(), language.as_deref(), output_dir.as_deref())
            .and_then(|settings| {
                run_pass_at_k(&input_data, &input_response_data, k, hard, &settings)
            }),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
