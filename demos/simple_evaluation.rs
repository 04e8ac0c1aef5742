//! Demo: evaluating a handful of responses in strict and loose mode
use ifcheck::{english, EvalReport, Evaluator, InputExample};
use serde_json::json;
use std::collections::BTreeMap;

fn kwargs(value: serde_json::Value) -> ifcheck::Kwargs {
    value.as_object().cloned().unwrap_or_default()
}

fn main() -> anyhow::Result<()> {
    println!("=== ifcheck Demo ===\n");

    let examples = vec![
        InputExample {
            key: json!(1),
            prompt: "Describe your garden without using commas.".to_string(),
            instruction_id_list: vec!["punctuation:no_comma".to_string()],
            kwargs: vec![kwargs(json!({}))],
        },
        InputExample {
            key: json!(2),
            prompt: "Answer in at least 10 words, with a markdown title.".to_string(),
            instruction_id_list: vec![
                "length_constraints:number_words".to_string(),
                "detectable_format:title".to_string(),
            ],
            kwargs: vec![
                kwargs(json!({"num_words": 10, "relation": "at least"})),
                kwargs(json!({})),
            ],
        },
    ];

    let mut responses = BTreeMap::new();
    responses.insert(
        examples[0].prompt.clone(),
        "The roses grow beside the old stone wall and the herbs sit in clay pots."
            .to_string(),
    );
    // Near miss: a stray closing line that loose mode can drop.
    responses.insert(
        examples[1].prompt.clone(),
        "# My Garden\n\nThe garden holds roses and herbs and a very old apple tree.\nHope that helps!"
            .to_string(),
    );

    let evaluator = Evaluator::new(english::registry()?);
    let outputs = evaluator.evaluate(&examples, &responses)?;

    for (strict, loose) in outputs.strict.iter().zip(&outputs.loose) {
        println!("prompt:  {}", strict.prompt);
        println!("strict:  {:?}", strict.follow_instruction_list);
        println!("loose:   {:?}\n", loose.follow_instruction_list);
    }

    let report = EvalReport::from_outputs(&outputs);
    println!("{}", report.to_text());
    Ok(())
}
