//! End-to-end tests: JSONL datasets through evaluation to reports.

#![allow(clippy::unwrap_used)]
#![allow(clippy::needless_raw_string_hashes)]

use ifcheck::{
    english, loose_variants, read_input_examples, read_response_lists, read_responses, russian,
    write_outputs, EvalReport, Evaluator, InputExample, Language, PassAtKReport,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::io::Write;
use tempfile::NamedTempFile;

fn jsonl_file(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    file
}

fn example(prompt: &str, ids: &[&str], kwargs: &[serde_json::Value]) -> InputExample {
    InputExample {
        key: json!(prompt.len()),
        prompt: prompt.to_string(),
        instruction_id_list: ids.iter().map(ToString::to_string).collect(),
        kwargs: kwargs
            .iter()
            .map(|v| v.as_object().cloned().unwrap_or_default())
            .collect(),
    }
}

#[test]
fn evaluates_dataset_from_jsonl_files() {
    let inputs = jsonl_file(&[
        r#"{"key": 1, "prompt": "No commas please.", "instruction_id_list": ["punctuation:no_comma"], "kwargs": [{}]}"#,
        r#"{"key": 2, "prompt": "At least five words.", "instruction_id_list": ["length_constraints:number_words"], "kwargs": [{"num_words": 5, "relation": "at least"}]}"#,
    ]);
    let responses = jsonl_file(&[
        r#"{"prompt": "No commas please.", "response": "A reply without any commas at all."}"#,
        r#"{"prompt": "At least five words.", "response": "Too short."}"#,
    ]);

    let examples = read_input_examples(inputs.path()).unwrap();
    let response_map = read_responses(responses.path()).unwrap();
    let evaluator = Evaluator::new(english::registry().unwrap());
    let outputs = evaluator.evaluate(&examples, &response_map).unwrap();

    assert!(outputs.strict[0].follow_all_instructions);
    assert!(!outputs.strict[1].follow_all_instructions);

    let report = EvalReport::from_outputs(&outputs);
    assert_eq!(report.eval_results_strict.prompt_total, 2);
    assert_eq!(report.eval_results_strict.prompt_correct, 1);
    let json = report.to_json().unwrap();
    assert!(json.contains("eval_results_strict"));
    assert!(json.contains("eval_results_loose"));
}

#[test]
fn writes_outputs_as_jsonl() {
    let evaluator = Evaluator::new(english::registry().unwrap());
    let inp = example("p", &["punctuation:no_comma"], &[json!({})]);
    let mut responses = BTreeMap::new();
    responses.insert("p".to_string(), "clean text".to_string());
    let outputs = evaluator.evaluate(&[inp], &responses).unwrap();

    let file = NamedTempFile::new().unwrap();
    write_outputs(file.path(), &outputs.strict).unwrap();
    let contents = std::fs::read_to_string(file.path()).unwrap();
    assert_eq!(contents.lines().count(), 1);
    let record: serde_json::Value = serde_json::from_str(contents.trim()).unwrap();
    assert_eq!(record["follow_all_instructions"], json!(true));
}

#[test]
fn strict_pass_implies_loose_pass() {
    let evaluator = Evaluator::new(english::registry().unwrap());
    let cases = [
        (
            example(
                "a",
                &["punctuation:no_comma", "detectable_format:title"],
                &[json!({}), json!({})],
            ),
            "# A Title\n\nBody without commas.",
        ),
        (
            example(
                "b",
                &["length_constraints:number_paragraphs"],
                &[json!({"num_paragraphs": 2})],
            ),
            "First block.\n\nSecond block.",
        ),
        (
            example("c", &["startend:quotation"], &[json!({})]),
            "\u{201c}A curly quoted reply.\u{201d}",
        ),
    ];

    for (inp, response) in &cases {
        let strict = evaluator.check_strict(inp, response).unwrap();
        let loose = evaluator.check_loose(inp, response).unwrap();
        for (s, l) in strict
            .follow_instruction_list
            .iter()
            .zip(&loose.follow_instruction_list)
        {
            assert!(!s || *l, "strict pass must imply loose pass");
        }
    }
}

#[test]
fn loose_evaluation_is_deterministic() {
    let evaluator = Evaluator::new(english::registry().unwrap());
    let inp = example("p", &["punctuation:no_comma"], &[json!({})]);
    let response = "Okay, here goes:\nplain text body\n*wrapped, emphasis*";
    let first = evaluator.check_loose(&inp, response).unwrap();
    let second = evaluator.check_loose(&inp, response).unwrap();
    assert_eq!(first.response, second.response);
    assert_eq!(first.follow_instruction_list, second.follow_instruction_list);
    assert_eq!(loose_variants(response), loose_variants(response));
}

#[test]
fn loose_accepts_quote_normalized_json() {
    let evaluator = Evaluator::new(english::registry().unwrap());
    let inp = example("p", &["detectable_format:json_format"], &[json!({})]);
    let response = "{\u{201c}answer\u{201d}: 42}";
    assert!(
        !evaluator
            .check_strict(&inp, response)
            .unwrap()
            .follow_all_instructions
    );
    assert!(
        evaluator
            .check_loose(&inp, response)
            .unwrap()
            .follow_all_instructions
    );
}

#[test]
fn blank_response_fails_strict_everywhere() {
    let evaluator = Evaluator::new(english::registry().unwrap());
    let inp = example(
        "p",
        &["punctuation:no_comma", "detectable_format:json_format"],
        &[json!({}), json!({})],
    );
    let out = evaluator.check_strict(&inp, "").unwrap();
    assert_eq!(out.follow_instruction_list, vec![false, false]);
}

#[test]
fn russian_registry_evaluates_russian_text() {
    let evaluator = Evaluator::new(russian::registry().unwrap());
    let inp = example(
        "p",
        &["keywords:existence", "punctuation:no_comma"],
        &[json!({"keywords": ["собака"]}), json!({})],
    );
    // Inflected form matches through stemming.
    let out = evaluator
        .check_strict(&inp, "Во дворе играют собаки и кошки без остановки.")
        .unwrap();
    assert_eq!(out.follow_instruction_list, vec![true, true]);
}

#[test]
fn pass_at_k_pipeline_from_jsonl() {
    let inputs = jsonl_file(&[
        r#"{"key": 1, "prompt": "No commas.", "instruction_id_list": ["punctuation:no_comma"], "kwargs": [{}]}"#,
    ]);
    let responses = jsonl_file(&[
        r#"{"prompt": "No commas.", "responses": ["clean", "dirty, one", "clean again", "dirty, two", "dirty, three"]}"#,
    ]);

    let examples = read_input_examples(inputs.path()).unwrap();
    let response_map = read_response_lists(responses.path()).unwrap();
    let evaluator = Evaluator::new(Language::En.registry().unwrap());

    // n = 5 samples, c = 2 correct, k = 2 gives 1 - (3/5)(2/4) = 0.7.
    let run = evaluator
        .evaluate_pass_at_k(&examples, &response_map, 2)
        .unwrap();
    assert!((run.strict.prompt_accuracy - 0.7).abs() < 1e-12);

    let report = PassAtKReport::from_run(&run, 2);
    let json = report.to_json().unwrap();
    let parsed: PassAtKReport = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.k, 2);
    assert_eq!(parsed.num_prompts, 1);
}

#[test]
fn duplicate_instruction_ids_evaluate_independently() {
    let evaluator = Evaluator::new(english::registry().unwrap());
    let inp = example(
        "p",
        &["keywords:frequency", "keywords:frequency"],
        &[
            json!({"keyword": "tree", "frequency": 1, "relation": "at least"}),
            json!({"keyword": "tree", "frequency": 5, "relation": "at least"}),
        ],
    );
    let out = evaluator
        .check_strict(&inp, "One tree stands in the field.")
        .unwrap();
    assert_eq!(out.follow_instruction_list, vec![true, false]);
    assert!(!out.follow_all_instructions);

    let report = EvalReport::from_outputs(&ifcheck::EvalOutputs {
        strict: vec![out.clone()],
        loose: vec![out],
    });
    assert_eq!(report.eval_results_strict.instruction_total, 2);
    assert!(
        (report.eval_results_strict.per_instruction_accuracy["keywords:frequency"] - 0.5).abs()
            < 1e-12
    );
}

#[test]
fn unknown_instruction_id_is_an_error() {
    let evaluator = Evaluator::new(english::registry().unwrap());
    let inp = example("p", &["keywords:does_not_exist"], &[json!({})]);
    assert!(evaluator.check_strict(&inp, "text").is_err());
}
