//! Mutators for the continuous random loop
//!
//! A mutator is stateless: it changes either one field of a JSON payload or
//! the header list, drawing randomness from the caller's RNG. The built-in set
//! comes from [`registry`]; custom ones are loaded from YAML files by
//! [`custom::load_dir`].

pub mod body;
pub mod custom;
pub mod headers;

use rand::RngCore;
use serde_json::Value;

use negfuzz_core::http::Header;
use negfuzz_core::mutation::{FieldPath, MutationError};

pub use custom::{CustomMutator, CustomMutatorConfig, CustomMutatorKind, MutatorLoadError};

/// What part of the request a mutator changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutatorCapability {
    Body,
    Headers,
}

pub trait Mutator: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn capability(&self) -> MutatorCapability;

    /// Mutate the value at `field` in `payload`.
    ///
    /// # Errors
    ///
    /// Returns error if the field cannot be resolved in `payload`.
    fn mutate_body(
        &self,
        payload: &Value,
        _field: &FieldPath,
        _rng: &mut dyn RngCore,
    ) -> Result<Value, MutationError> {
        Ok(payload.clone())
    }

    /// Mutate the header list.
    fn mutate_headers(&self, headers: &[Header], _rng: &mut dyn RngCore) -> Vec<Header> {
        headers.to_vec()
    }
}

impl std::fmt::Debug for dyn Mutator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mutator")
            .field("name", &self.name())
            .field("capability", &self.capability())
            .finish()
    }
}

/// Every built-in mutator.
#[must_use]
pub fn registry() -> Vec<Box<dyn Mutator>> {
    vec![
        Box::new(body::RandomString),
        Box::new(body::EmptyString),
        Box::new(body::NullValue),
        Box::new(body::HugeNumber),
        Box::new(body::VeryLongString),
        Box::new(body::ZeroWidthChars),
        Box::new(body::TypeConfusion),
        Box::new(body::RemoveField),
        Box::new(headers::RemoveHeader),
        Box::new(headers::DuplicateHeader),
        Box::new(headers::RandomHeaderValue),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn registry_names_are_unique() {
        let all = registry();
        let names: HashSet<&str> = all.iter().map(|m| m.name()).collect();
        assert_eq!(names.len(), all.len());
        assert!(all.iter().any(|m| m.capability() == MutatorCapability::Headers));
        assert!(all.iter().all(|m| !m.description().is_empty()));
    }
}
