//! JSONL dataset I/O.
//!
//! Input files carry one example per line with `key`, `prompt`,
//! `instruction_id_list` and index-aligned `kwargs`. Response files map
//! a prompt to either a single `response` string or a `responses` list
//! for pass@k runs.

use crate::evaluator::{InputExample, OutputExample, PassAtKExample};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Errors from dataset reading and writing.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON on line {line} of {path}: {source}")]
    Json {
        path: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "example `{key}` on line {line} has {num_ids} instruction ids but {num_kwargs} kwargs entries"
    )]
    KwargsMismatch {
        key: String,
        line: usize,
        num_ids: usize,
        num_kwargs: usize,
    },

    #[error("duplicate response for prompt on line {line}: {prompt}")]
    DuplicateResponse { line: usize, prompt: String },
}

fn io_err(path: &Path, source: std::io::Error) -> DatasetError {
    DatasetError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn read_lines<T, F>(path: &Path, mut parse: F) -> Result<Vec<T>, DatasetError>
where
    F: FnMut(usize, &str) -> Result<T, DatasetError>,
    T: Sized,
{
    let file = File::open(path).map_err(|e| io_err(path, e))?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| io_err(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(parse(index + 1, &line)?);
    }
    Ok(records)
}

/// Read input examples, validating the instruction/kwargs alignment
/// invariant on every line.
///
/// # Errors
///
/// Fails on I/O errors, malformed JSON, or misaligned kwargs.
pub fn read_input_examples(path: &Path) -> Result<Vec<InputExample>, DatasetError> {
    read_lines(path, |line_no, line| {
        let example: InputExample =
            serde_json::from_str(line).map_err(|source| DatasetError::Json {
                path: path.display().to_string(),
                line: line_no,
                source,
            })?;
        if example.instruction_id_list.len() != example.kwargs.len() {
            return Err(DatasetError::KwargsMismatch {
                key: example.key.to_string(),
                line: line_no,
                num_ids: example.instruction_id_list.len(),
                num_kwargs: example.kwargs.len(),
            });
        }
        Ok(example)
    })
}

#[derive(Deserialize)]
struct ResponseRecord {
    prompt: String,
    response: String,
}

#[derive(Deserialize)]
struct ResponseListRecord {
    prompt: String,
    #[serde(alias = "response")]
    responses: ResponseField,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ResponseField {
    One(String),
    Many(Vec<String>),
}

/// Read a single-response file into a prompt → response map.
///
/// # Errors
///
/// Fails on I/O errors, malformed JSON, or a prompt appearing twice.
pub fn read_responses(path: &Path) -> Result<BTreeMap<String, String>, DatasetError> {
    let records: Vec<(usize, ResponseRecord)> = read_lines(path, |line_no, line| {
        serde_json::from_str(line)
            .map(|record| (line_no, record))
            .map_err(|source| DatasetError::Json {
                path: path.display().to_string(),
                line: line_no,
                source,
            })
    })?;

    let mut map = BTreeMap::new();
    for (line, record) in records {
        if map.insert(record.prompt.clone(), record.response).is_some() {
            return Err(DatasetError::DuplicateResponse {
                line,
                prompt: record.prompt,
            });
        }
    }
    Ok(map)
}

/// Read a multi-response file into a prompt → sampled-responses map.
/// A plain `response` string is treated as a one-element sample list.
///
/// # Errors
///
/// Fails on I/O errors, malformed JSON, or a prompt appearing twice.
pub fn read_response_lists(path: &Path) -> Result<BTreeMap<String, Vec<String>>, DatasetError> {
    let records: Vec<(usize, ResponseListRecord)> = read_lines(path, |line_no, line| {
        serde_json::from_str(line)
            .map(|record| (line_no, record))
            .map_err(|source| DatasetError::Json {
                path: path.display().to_string(),
                line: line_no,
                source,
            })
    })?;

    let mut map = BTreeMap::new();
    for (line, record) in records {
        let responses = match record.responses {
            ResponseField::One(response) => vec![response],
            ResponseField::Many(responses) => responses,
        };
        if map.insert(record.prompt.clone(), responses).is_some() {
            return Err(DatasetError::DuplicateResponse {
                line,
                prompt: record.prompt,
            });
        }
    }
    Ok(map)
}

fn write_jsonl<T: serde::Serialize>(path: &Path, records: &[T]) -> Result<(), DatasetError> {
    let file = File::create(path).map_err(|e| io_err(path, e))?;
    let mut writer = BufWriter::new(file);
    for record in records {
        let line = serde_json::to_string(record).map_err(|source| DatasetError::Json {
            path: path.display().to_string(),
            line: 0,
            source,
        })?;
        writeln!(writer, "{line}").map_err(|e| io_err(path, e))?;
    }
    writer.flush().map_err(|e| io_err(path, e))
}

/// Write per-example evaluation outputs as JSONL.
///
/// # Errors
///
/// Fails on I/O or serialization errors.
pub fn write_outputs(path: &Path, outputs: &[OutputExample]) -> Result<(), DatasetError> {
    write_jsonl(path, outputs)
}

/// Write per-prompt pass@k results as JSONL.
///
/// # Errors
///
/// Fails on I/O or serialization errors.
pub fn write_pass_at_k_outputs(
    path: &Path,
    outputs: &[PassAtKExample],
) -> Result<(), DatasetError> {
    write_jsonl(path, outputs)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write as IoWrite;
    use tempfile::NamedTempFile;

    fn jsonl_file(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    #[test]
    fn test_read_input_examples() {
        let file = jsonl_file(&[
            r#"{"key": 1, "prompt": "Write without commas.", "instruction_id_list": ["punctuation:no_comma"], "kwargs": [{}]}"#,
            r#"{"key": 2, "prompt": "Use three words.", "instruction_id_list": ["length_constraints:number_words"], "kwargs": [{"num_words": 3, "relation": "at least"}]}"#,
        ]);
        let examples = read_input_examples(file.path()).unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0].instruction_id_list, vec!["punctuation:no_comma"]);
        assert_eq!(examples[1].kwargs[0]["num_words"], 3);
    }

    #[test]
    fn test_read_input_examples_skips_blank_lines() {
        let file = jsonl_file(&[
            r#"{"key": 1, "prompt": "p", "instruction_id_list": [], "kwargs": []}"#,
            "",
        ]);
        assert_eq!(read_input_examples(file.path()).unwrap().len(), 1);
    }

    #[test]
    fn test_misaligned_kwargs_rejected() {
        let file = jsonl_file(&[
            r#"{"key": 1, "prompt": "p", "instruction_id_list": ["punctuation:no_comma"], "kwargs": []}"#,
        ]);
        let err = read_input_examples(file.path()).unwrap_err();
        assert!(matches!(err, DatasetError::KwargsMismatch { line: 1, .. }));
    }

    #[test]
    fn test_malformed_json_names_line() {
        let file = jsonl_file(&[
            r#"{"key": 1, "prompt": "p", "instruction_id_list": [], "kwargs": []}"#,
            "not json",
        ]);
        let err = read_input_examples(file.path()).unwrap_err();
        assert!(matches!(err, DatasetError::Json { line: 2, .. }));
    }

    #[test]
    fn test_read_responses() {
        let file = jsonl_file(&[
            r#"{"prompt": "a", "response": "first"}"#,
            r#"{"prompt": "b", "response": "second"}"#,
        ]);
        let responses = read_responses(file.path()).unwrap();
        assert_eq!(responses["a"], "first");
        assert_eq!(responses["b"], "second");
    }

    #[test]
    fn test_duplicate_prompt_rejected() {
        let file = jsonl_file(&[
            r#"{"prompt": "a", "response": "first"}"#,
            r#"{"prompt": "a", "response": "again"}"#,
        ]);
        let err = read_responses(file.path()).unwrap_err();
        assert!(matches!(err, DatasetError::DuplicateResponse { line: 2, .. }));
    }

    #[test]
    fn test_read_response_lists_accepts_both_shapes() {
        let file = jsonl_file(&[
            r#"{"prompt": "a", "responses": ["one", "two"]}"#,
            r#"{"prompt": "b", "response": "single"}"#,
        ]);
        let responses = read_response_lists(file.path()).unwrap();
        assert_eq!(responses["a"], vec!["one", "two"]);
        assert_eq!(responses["b"], vec!["single"]);
    }

    #[test]
    fn test_write_outputs_round_trip() {
        use crate::evaluator::OutputExample;
        use serde_json::json;

        let outputs = vec![OutputExample {
            key: json!(7),
            prompt: "p".to_string(),
            response: "r".to_string(),
            instruction_id_list: vec!["punctuation:no_comma".to_string()],
            follow_all_instructions: true,
            follow_instruction_list: vec![true],
        }];
        let file = NamedTempFile::new().unwrap();
        write_outputs(file.path(), &outputs).unwrap();

        let contents = std::fs::read_to_string(file.path()).unwrap();
        let parsed: OutputExample = serde_json::from_str(contents.trim()).unwrap();
        assert_eq!(parsed.key, json!(7));
        assert!(parsed.follow_all_instructions);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_input_examples(Path::new("/nonexistent/input.jsonl")).unwrap_err();
        assert!(matches!(err, DatasetError::Io { .. }));
    }
}
