//! Demo: pass@k estimation over repeated samples of one prompt
use ifcheck::{english, pass_at_k, Evaluator, InputExample, PassAtKReport};
use serde_json::json;
use std::collections::BTreeMap;

fn main() -> anyhow::Result<()> {
    println!("=== Pass@k Demo ===\n");

    // The closed form first: 5 samples, 2 of them passing.
    for k in 1..=5 {
        println!("pass@{k} (n=5, c=2) = {:.4}", pass_at_k(5, 2, k)?);
    }
    println!();

    let example = InputExample {
        key: json!(1),
        prompt: "Reply without commas.".to_string(),
        instruction_id_list: vec!["punctuation:no_comma".to_string()],
        kwargs: vec![serde_json::Map::new()],
    };

    let mut responses = BTreeMap::new();
    responses.insert(
        example.prompt.clone(),
        vec![
            "Sure thing and here it is.".to_string(),
            "Well, that depends.".to_string(),
            "A clean reply with no pauses at all.".to_string(),
            "First, second, third.".to_string(),
            "Yes, of course.".to_string(),
        ],
    );

    let evaluator = Evaluator::new(english::registry()?);
    let run = evaluator.evaluate_pass_at_k(&[example], &responses, 2)?;
    let report = PassAtKReport::from_run(&run, 2);
    println!("{}", report.to_text());
    Ok(())
}
