//! Path-keyed value files: reference data, user headers, extra query params
//!
//! All three share one YAML shape:
//!
//! ```yaml
//! all:
//!   tenant: acme
//! /pets/{id}:
//!   id: "42"
//!   owner: negfuzz_remove_field
//! ```
//!
//! Entries under `all` apply to every path; a path's own entries win.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

/// Key whose entries apply to every path.
pub const ALL_PATHS_KEY: &str = "all";
/// Value that removes the field from the payload instead of setting it.
pub const REMOVE_FIELD_SENTINEL: &str = "negfuzz_remove_field";
/// Value that sets the field to JSON `null`.
pub const NULL_SENTINEL: &str = "negfuzz_null";

/// What a reference-data entry does to a field.
#[derive(Debug, Clone, PartialEq)]
pub enum RefValue {
    Remove,
    Null,
    /// A fixed value or an expression still to be evaluated
    Value(Value),
}

impl RefValue {
    #[must_use]
    pub fn from_raw(raw: &Value) -> Self {
        match raw.as_str() {
            Some(REMOVE_FIELD_SENTINEL) => Self::Remove,
            Some(NULL_SENTINEL) => Self::Null,
            _ => Self::Value(raw.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathValues {
    entries: BTreeMap<String, BTreeMap<String, Value>>,
}

impl PathValues {
    /// Load a YAML value file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is not a path → key → value map.
    pub fn load(path: &Path) -> Result<Self, ValuesFileError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ValuesFileError::Io(path.to_path_buf(), e.to_string()))?;
        Self::from_yaml_str(&content)
            .map_err(|e| ValuesFileError::Parse(path.to_path_buf(), e.to_string()))
    }

    /// Parse YAML content. An empty document yields an empty table.
    ///
    /// # Errors
    ///
    /// Returns the YAML error when the content does not have the expected shape.
    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let entries: Option<BTreeMap<String, Option<BTreeMap<String, Value>>>> =
            serde_yml::from_str(content)?;
        let entries = entries
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k, v.unwrap_or_default()))
            .collect();
        Ok(Self { entries })
    }

    /// Load `path` when given; a missing optional file is an empty table.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load).
    pub fn load_optional(path: Option<&Path>) -> Result<Self, ValuesFileError> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    /// Entries for `path` merged over the `all` entries.
    #[must_use]
    pub fn for_path(&self, path: &str) -> BTreeMap<String, Value> {
        let mut merged = self
            .entries
            .get(ALL_PATHS_KEY)
            .cloned()
            .unwrap_or_default();
        if let Some(own) = self.entries.get(path) {
            merged.extend(own.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        merged
    }

    /// Same as [`for_path`](Self::for_path) with values as strings.
    #[must_use]
    pub fn strings_for_path(&self, path: &str) -> Vec<(String, String)> {
        self.for_path(path)
            .into_iter()
            .map(|(k, v)| {
                let s = match v {
                    Value::String(s) => s,
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                (k, s)
            })
            .collect()
    }

    /// Whether `field` is controlled by reference data for `path`.
    #[must_use]
    pub fn controls(&self, path: &str, field: &str) -> bool {
        [ALL_PATHS_KEY, path]
            .iter()
            .any(|p| self.entries.get(*p).is_some_and(|m| m.contains_key(field)))
    }

    pub fn insert(&mut self, path: impl Into<String>, key: impl Into<String>, value: Value) {
        self.entries
            .entry(path.into())
            .or_default()
            .insert(key.into(), value);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValuesFileError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Invalid value file {0}: {1}")]
    Parse(PathBuf, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    const SAMPLE: &str = r#"
all:
  tenant: acme
  id: "0"
/pets/{id}:
  id: "42"
  owner: negfuzz_remove_field
  nickname: negfuzz_null
  age: 3
"#;

    #[test]
    fn path_entries_win_over_all() {
        let values = PathValues::from_yaml_str(SAMPLE).unwrap();
        let merged = values.for_path("/pets/{id}");
        assert_eq!(merged["id"], json!("42"));
        assert_eq!(merged["tenant"], json!("acme"));
        assert_eq!(merged["age"], json!(3));

        let other = values.for_path("/owners");
        assert_eq!(other.len(), 2);
        assert_eq!(other["id"], json!("0"));
    }

    #[test]
    fn sentinels() {
        let values = PathValues::from_yaml_str(SAMPLE).unwrap();
        let merged = values.for_path("/pets/{id}");
        assert_eq!(RefValue::from_raw(&merged["owner"]), RefValue::Remove);
        assert_eq!(RefValue::from_raw(&merged["nickname"]), RefValue::Null);
        assert_eq!(
            RefValue::from_raw(&merged["id"]),
            RefValue::Value(json!("42"))
        );
    }

    #[test]
    fn controls_checks_all_and_path() {
        let values = PathValues::from_yaml_str(SAMPLE).unwrap();
        assert!(values.controls("/pets/{id}", "owner"));
        assert!(values.controls("/anything", "tenant"));
        assert!(!values.controls("/anything", "owner"));
    }

    #[test]
    fn empty_and_null_sections() {
        assert!(PathValues::from_yaml_str("").unwrap().is_empty());
        let values = PathValues::from_yaml_str("/pets:\n").unwrap();
        assert!(values.for_path("/pets").is_empty());
    }

    #[test]
    fn strings_for_headers() {
        let values = PathValues::from_yaml_str("all:\n  X-Retry: 3\n  X-Name: bob\n").unwrap();
        let pairs = values.strings_for_path("/x");
        assert!(pairs.contains(&("X-Retry".to_string(), "3".to_string())));
        assert!(pairs.contains(&("X-Name".to_string(), "bob".to_string())));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let values = PathValues::load(file.path()).unwrap();
        assert!(!values.is_empty());
    }

    #[test]
    fn load_errors() {
        let missing = PathValues::load(Path::new("/definitely/not/here.yml"));
        assert!(matches!(missing, Err(ValuesFileError::Io(_, _))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"- just\n- a list\n").unwrap();
        let bad = PathValues::load(file.path());
        assert!(matches!(bad, Err(ValuesFileError::Parse(_, _))));
    }

    #[test]
    fn optional_missing_is_empty() {
        assert!(PathValues::load_optional(None).unwrap().is_empty());
    }
}
