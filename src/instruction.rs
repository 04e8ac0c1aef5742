//! Instruction abstraction: a single machine-checkable constraint over
//! response text, parameterized by keyword configuration.

use serde_json::Value;
use thiserror::Error;

/// Keyword configuration for one instruction, as carried in dataset records.
pub type Kwargs = serde_json::Map<String, Value>;

/// Errors raised while constructing an instruction from kwargs.
///
/// These indicate a malformed dataset entry and abort the run; they are
/// never produced by `check` itself.
#[derive(Error, Debug)]
pub enum InstructionError {
    #[error("missing required argument `{0}`")]
    MissingArgument(String),

    #[error("argument `{name}` is invalid: {reason}")]
    InvalidArgument { name: String, reason: String },
}

impl InstructionError {
    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// A single checkable constraint bound to its configuration.
///
/// `check` must be a pure, deterministic, total function over any string
/// input. A response that merely fails to satisfy the constraint returns
/// `false`; it is never an error.
pub trait Instruction: Send + Sync {
    /// Human-readable description of the constraint.
    fn description(&self) -> String;

    /// Whether `response` satisfies the constraint.
    fn check(&self, response: &str) -> bool;
}

impl std::fmt::Debug for dyn Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Instruction({})", self.description())
    }
}

/// Relational operator used by threshold-style instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    LessThan,
    AtLeast,
}

impl Relation {
    /// Parse the wire form (`"less than"` / `"at least"`) of the named argument.
    pub fn parse(name: &str, value: &str) -> Result<Self, InstructionError> {
        match value {
            "less than" => Ok(Self::LessThan),
            "at least" => Ok(Self::AtLeast),
            other => Err(InstructionError::invalid(
                name,
                format!("expected \"less than\" or \"at least\", got \"{other}\""),
            )),
        }
    }

    /// Compare an observed count against the configured threshold.
    #[must_use]
    pub fn compare(self, actual: usize, threshold: usize) -> bool {
        match self {
            Self::LessThan => actual < threshold,
            Self::AtLeast => actual >= threshold,
        }
    }

    /// The wire form, used when describing instructions.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LessThan => "less than",
            Self::AtLeast => "at least",
        }
    }
}

/// Typed accessors over [`Kwargs`]. Missing or badly typed values fail
/// construction eagerly rather than weakening the check.
pub trait KwargsExt {
    fn str_arg(&self, name: &str) -> Result<String, InstructionError>;
    fn usize_arg(&self, name: &str) -> Result<usize, InstructionError>;
    fn str_list_arg(&self, name: &str) -> Result<Vec<String>, InstructionError>;
    fn relation_arg(&self, name: &str) -> Result<Relation, InstructionError>;
}

impl KwargsExt for Kwargs {
    fn str_arg(&self, name: &str) -> Result<String, InstructionError> {
        match self.get(name) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(InstructionError::invalid(
                name,
                format!("expected a string, got {other}"),
            )),
            None => Err(InstructionError::MissingArgument(name.to_string())),
        }
    }

    fn usize_arg(&self, name: &str) -> Result<usize, InstructionError> {
        match self.get(name) {
            Some(Value::Number(n)) => n
                .as_u64()
                .map(|v| v as usize)
                .ok_or_else(|| InstructionError::invalid(name, "expected a non-negative integer")),
            Some(other) => Err(InstructionError::invalid(
                name,
                format!("expected an integer, got {other}"),
            )),
            None => Err(InstructionError::MissingArgument(name.to_string())),
        }
    }

    fn str_list_arg(&self, name: &str) -> Result<Vec<String>, InstructionError> {
        match self.get(name) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(InstructionError::invalid(
                        name,
                        format!("expected a list of strings, found {other}"),
                    )),
                })
                .collect(),
            Some(other) => Err(InstructionError::invalid(
                name,
                format!("expected a list of strings, got {other}"),
            )),
            None => Err(InstructionError::MissingArgument(name.to_string())),
        }
    }

    fn relation_arg(&self, name: &str) -> Result<Relation, InstructionError> {
        let raw = self.str_arg(name)?;
        Relation::parse(name, &raw)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kwargs(value: Value) -> Kwargs {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_relation_parse() {
        assert_eq!(
            Relation::parse("relation", "less than").unwrap(),
            Relation::LessThan
        );
        assert_eq!(
            Relation::parse("relation", "at least").unwrap(),
            Relation::AtLeast
        );
        assert!(Relation::parse("relation", "exactly").is_err());
    }

    #[test]
    fn test_relation_compare() {
        assert!(Relation::LessThan.compare(2, 3));
        assert!(!Relation::LessThan.compare(3, 3));
        assert!(Relation::AtLeast.compare(3, 3));
        assert!(!Relation::AtLeast.compare(2, 3));
    }

    #[test]
    fn test_str_arg() {
        let kw = kwargs(json!({"keyword": "banana"}));
        assert_eq!(kw.str_arg("keyword").unwrap(), "banana");
        assert!(matches!(
            kw.str_arg("missing"),
            Err(InstructionError::MissingArgument(_))
        ));
    }

    #[test]
    fn test_str_arg_wrong_type() {
        let kw = kwargs(json!({"keyword": 7}));
        assert!(matches!(
            kw.str_arg("keyword"),
            Err(InstructionError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_usize_arg() {
        let kw = kwargs(json!({"frequency": 3}));
        assert_eq!(kw.usize_arg("frequency").unwrap(), 3);

        let kw = kwargs(json!({"frequency": -1}));
        assert!(kw.usize_arg("frequency").is_err());
    }

    #[test]
    fn test_str_list_arg() {
        let kw = kwargs(json!({"keywords": ["a", "b"]}));
        assert_eq!(kw.str_list_arg("keywords").unwrap(), vec!["a", "b"]);

        let kw = kwargs(json!({"keywords": ["a", 1]}));
        assert!(kw.str_list_arg("keywords").is_err());
    }

    #[test]
    fn test_relation_arg() {
        let kw = kwargs(json!({"relation": "at least"}));
        assert_eq!(kw.relation_arg("relation").unwrap(), Relation::AtLeast);
    }
}
