//! Instruction registry: the extensibility seam mapping stable
//! `"category:name"` identifiers to instruction constructors.
//!
//! One registry exists per supported language. It is populated once at
//! startup and only read afterwards, so evaluation can share it across
//! worker threads without locking.

use crate::instruction::{Instruction, InstructionError, Kwargs};
use std::collections::BTreeMap;
use thiserror::Error;

/// Constructor for one instruction type, binding kwargs at build time.
pub type InstructionBuilder =
    Box<dyn Fn(&Kwargs) -> Result<Box<dyn Instruction>, InstructionError> + Send + Sync>;

/// Errors from registry operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("instruction id `{0}` is already registered")]
    DuplicateInstruction(String),

    #[error("unknown instruction id: {0}")]
    UnknownInstruction(String),

    #[error("failed to construct instruction `{id}`: {source}")]
    Construction {
        id: String,
        #[source]
        source: InstructionError,
    },
}

/// Registration table from instruction id to constructor.
#[derive(Default)]
pub struct InstructionRegistry {
    builders: BTreeMap<String, InstructionBuilder>,
}

impl InstructionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a constructor under `id`.
    ///
    /// # Errors
    ///
    /// Fails if `id` is already registered; built-in checks are never
    /// silently overridden.
    pub fn register(&mut self, id: &str, builder: InstructionBuilder) -> Result<(), RegistryError> {
        if self.builders.contains_key(id) {
            return Err(RegistryError::DuplicateInstruction(id.to_string()));
        }
        self.builders.insert(id.to_string(), builder);
        Ok(())
    }

    /// Whether `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.builders.contains_key(id)
    }

    /// All registered ids, in sorted order.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.builders.keys().map(String::as_str).collect()
    }

    /// Construct an instruction instance, validating kwargs eagerly.
    ///
    /// # Errors
    ///
    /// Fails for an unknown id or for missing/invalid kwargs.
    pub fn construct(
        &self,
        id: &str,
        kwargs: &Kwargs,
    ) -> Result<Box<dyn Instruction>, RegistryError> {
        let builder = self
            .builders
            .get(id)
            .ok_or_else(|| RegistryError::UnknownInstruction(id.to_string()))?;
        builder(kwargs).map_err(|source| RegistryError::Construction {
            id: id.to_string(),
            source,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct AlwaysTrue;

    impl Instruction for AlwaysTrue {
        fn description(&self) -> String {
            "Always satisfied.".to_string()
        }
        fn check(&self, _response: &str) -> bool {
            true
        }
    }

    fn trivial_builder() -> InstructionBuilder {
        Box::new(|_kwargs| Ok(Box::new(AlwaysTrue)))
    }

    #[test]
    fn test_register_and_construct() {
        let mut registry = InstructionRegistry::new();
        registry.register("test:always", trivial_builder()).unwrap();

        let instruction = registry.construct("test:always", &Kwargs::new()).unwrap();
        assert!(instruction.check("anything"));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = InstructionRegistry::new();
        registry.register("keywords:existence", trivial_builder()).unwrap();
        let err = registry
            .register("keywords:existence", trivial_builder())
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateInstruction(_)));
    }

    #[test]
    fn test_unknown_id_fails() {
        let registry = InstructionRegistry::new();
        let err = registry.construct("no:such", &Kwargs::new()).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownInstruction(_)));
        assert!(err.to_string().contains("no:such"));
    }

    #[test]
    fn test_construction_error_carries_id() {
        let mut registry = InstructionRegistry::new();
        registry
            .register(
                "test:strict",
                Box::new(|_kwargs| {
                    Err(InstructionError::MissingArgument("num_words".to_string()))
                }),
            )
            .unwrap();

        let err = registry.construct("test:strict", &Kwargs::new()).unwrap_err();
        assert!(matches!(err, RegistryError::Construction { .. }));
        assert!(err.to_string().contains("test:strict"));
    }

    #[test]
    fn test_ids_sorted() {
        let mut registry = InstructionRegistry::new();
        registry.register("b:second", trivial_builder()).unwrap();
        registry.register("a:first", trivial_builder()).unwrap();
        assert_eq!(registry.ids(), vec!["a:first", "b:second"]);
    }
}
