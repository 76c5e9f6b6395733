//! User-defined mutators loaded from YAML files
//!
//! One mutator per file:
//!
//! ```yaml
//! name: sql-quotes
//! type: TRAIL
//! values:
//!   - "'"
//!   - "' OR 1=1 --"
//! ```
//!
//! `values` may instead name a line-delimited file, resolved relative to the
//! mutator file. Blank lines and lines starting with `#` are ignored.

use std::path::{Path, PathBuf};

use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use negfuzz_core::mutation::{FieldPath, MutationError, apply_strategy, insert_root_field, replace_field};
use negfuzz_core::strategy::{FuzzingStrategy, stringify};

use super::body::pick;
use super::{Mutator, MutatorCapability};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomMutatorKind {
    /// Append the value to the field
    Trail,
    /// Insert the value in the middle of the field
    Insert,
    /// Prepend the value to the field
    Prefix,
    /// Replace the field with the value
    Replace,
    /// Replace the whole payload with the value
    ReplaceBody,
    /// Add a root key whose name and value are both the value
    InBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValuesSource {
    Inline(Vec<Value>),
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomMutatorConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CustomMutatorKind,
    pub values: ValuesSource,
}

#[derive(Debug, Clone)]
pub struct CustomMutator {
    name: String,
    description: String,
    kind: CustomMutatorKind,
    values: Vec<String>,
}

impl CustomMutator {
    /// Build from an inline value list.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: CustomMutatorKind, values: Vec<String>) -> Self {
        let name = name.into();
        Self {
            description: format!("custom {kind:?} mutator '{name}'"),
            name,
            kind,
            values,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> CustomMutatorKind {
        self.kind
    }

    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Load one mutator definition.
    ///
    /// # Errors
    ///
    /// Returns error if the file or its values file cannot be read or parsed,
    /// or if it yields no values.
    pub fn load_file(path: &Path) -> Result<Self, MutatorLoadError> {
        let content = std::fs::read_to_string(path).map_err(|source| MutatorLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: CustomMutatorConfig =
            serde_yml::from_str(&content).map_err(|source| MutatorLoadError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let values = match config.values {
            ValuesSource::Inline(list) => list.iter().map(stringify).collect(),
            ValuesSource::File(file) => {
                let base = path.parent().unwrap_or_else(|| Path::new("."));
                read_values_file(&base.join(file))?
            }
        };
        if values.is_empty() {
            return Err(MutatorLoadError::NoValues(path.to_path_buf()));
        }
        Ok(Self::new(config.name, config.kind, values))
    }
}

fn read_values_file(path: &Path) -> Result<Vec<String>, MutatorLoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| MutatorLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(content
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Load every `.yml`/`.yaml` file in `dir`. Bad files are skipped with a warning.
#[must_use]
pub fn load_dir(dir: &Path) -> Vec<CustomMutator> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), "cannot read custom mutators directory: {e}");
            return Vec::new();
        }
    };
    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext == "yml" || ext == "yaml")
        })
        .collect();
    paths.sort();

    let mut mutators = Vec::with_capacity(paths.len());
    for path in paths {
        match CustomMutator::load_file(&path) {
            Ok(m) => {
                debug!(name = %m.name, file = %path.display(), "loaded custom mutator");
                mutators.push(m);
            }
            Err(e) => warn!("skipping custom mutator: {e}"),
        }
    }
    mutators
}

impl Mutator for CustomMutator {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn capability(&self) -> MutatorCapability {
        MutatorCapability::Body
    }

    fn mutate_body(&self, payload: &Value, field: &FieldPath, rng: &mut dyn RngCore) -> Result<Value, MutationError> {
        let Some(value) = pick(&self.values, rng) else {
            return Ok(payload.clone());
        };
        let strategy = match self.kind {
            CustomMutatorKind::Trail => FuzzingStrategy::trail(value.as_str()),
            CustomMutatorKind::Prefix => FuzzingStrategy::prefix(value.as_str()),
            CustomMutatorKind::Insert => FuzzingStrategy::insert(value.as_str()),
            CustomMutatorKind::Replace => {
                return replace_field(payload, field, &Value::String(value.clone()));
            }
            CustomMutatorKind::ReplaceBody => {
                return Ok(serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.clone())));
            }
            CustomMutatorKind::InBody => {
                return insert_root_field(payload, value, Value::String(value.clone()));
            }
        };
        apply_strategy(payload, field, &strategy).map(|d| d.json)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MutatorLoadError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid mutator file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yml::Error,
    },
    #[error("Mutator file {0} has no values")]
    NoValues(PathBuf),
}
