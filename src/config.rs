//! Run configuration and per-language registry selection.
//!
//! Settings load from an optional YAML file; command-line flags take
//! precedence over file values.

use crate::registry::{InstructionRegistry, RegistryError};
use crate::{english, russian};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unsupported evaluation language: {0}")]
    UnsupportedLanguage(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Languages with a built-in instruction registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Ru,
}

impl Language {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ru => "ru",
        }
    }

    /// Build this language's full instruction registry.
    ///
    /// # Errors
    ///
    /// Fails only on a duplicate id in a built-in table.
    pub fn registry(self) -> Result<InstructionRegistry, RegistryError> {
        match self {
            Self::En => english::registry(),
            Self::Ru => russian::registry(),
        }
    }
}

impl FromStr for Language {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "en" => Ok(Self::En),
            "ru" => Ok(Self::Ru),
            other => Err(ConfigError::UnsupportedLanguage(other.to_string())),
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Evaluation settings, loadable from YAML.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvalSettings {
    /// Language registry to evaluate against.
    #[serde(default = "default_language")]
    pub language: Language,
    /// Directory for JSON reports and JSONL outputs.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Also write per-example JSONL outputs next to the report.
    #[serde(default = "default_write_outputs")]
    pub write_outputs: bool,
}

const fn default_language() -> Language {
    Language::En
}

fn default_output_dir() -> String {
    "results".to_string()
}

const fn default_write_outputs() -> bool {
    true
}

impl Default for EvalSettings {
    fn default() -> Self {
        Self {
            language: default_language(),
            output_dir: default_output_dir(),
            write_outputs: default_write_outputs(),
        }
    }
}

impl EvalSettings {
    /// Load settings from a YAML file.
    ///
    /// # Errors
    ///
    /// Fails on I/O or YAML parse errors.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }
}
