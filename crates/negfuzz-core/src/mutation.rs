//! Field mutation engine
//!
//! Resolves field-path expressions such as `address#street`,
//! `items[*].name` or `matrix[0][1]` inside a JSON document and applies a
//! [`FuzzingStrategy`] to every matched value.
//!
//! Segments are separated by `#` when the path contains one, otherwise by `.`.
//! `[n]` indexes into an array, `[*]` matches every element.

use serde_json::Value;

use crate::strategy::FuzzingStrategy;

/// One step in a field path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
    Wildcard,
}

/// A parsed field-path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    segments: Vec<Segment>,
}

impl FieldPath {
    /// Parse a field-path expression.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError::InvalidPath`] on empty paths or malformed brackets.
    pub fn parse(raw: &str) -> Result<Self, MutationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(MutationError::InvalidPath(raw.to_string()));
        }
        let separator = if trimmed.contains('#') { '#' } else { '.' };
        let mut segments = Vec::new();
        for part in trimmed.split(separator) {
            parse_part(part, raw, &mut segments)?;
        }
        if segments.is_empty() {
            return Err(MutationError::InvalidPath(raw.to_string()));
        }
        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Last key segment, e.g. `street` for `address#street`.
    #[must_use]
    pub fn leaf_name(&self) -> Option<&str> {
        self.segments.iter().rev().find_map(|s| match s {
            Segment::Key(k) => Some(k.as_str()),
            Segment::Index(_) | Segment::Wildcard => None,
        })
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_part(part: &str, raw: &str, out: &mut Vec<Segment>) -> Result<(), MutationError> {
    let invalid = || MutationError::InvalidPath(raw.to_string());
    let (name, mut rest) = match part.find('[') {
        Some(idx) => (&part[..idx], &part[idx..]),
        None => (part, ""),
    };
    if !name.is_empty() {
        out.push(Segment::Key(name.to_string()));
    } else if rest.is_empty() {
        return Err(invalid());
    }
    while !rest.is_empty() {
        let close = rest.find(']').ok_or_else(invalid)?;
        let inner = rest.get(1..close).ok_or_else(invalid)?;
        if inner == "*" || inner.is_empty() {
            out.push(Segment::Wildcard);
        } else {
            let idx = inner.parse::<usize>().map_err(|_| invalid())?;
            out.push(Segment::Index(idx));
        }
        rest = &rest[close + 1..];
        if !rest.is_empty() && !rest.starts_with('[') {
            return Err(invalid());
        }
    }
    Ok(())
}

/// Result of applying a strategy to a document.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzedDocument {
    /// The mutated document
    pub json: Value,
    /// The literal value written into the field (first match for wildcards)
    pub fuzzed_value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    #[error("invalid field path '{0}'")]
    InvalidPath(String),
    #[error("field '{0}' not found in payload")]
    FieldNotFound(String),
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),
}

// ── Lookup ──

/// All values matched by `path`.
#[must_use]
pub fn get_values<'a>(doc: &'a Value, path: &FieldPath) -> Vec<&'a Value> {
    let mut current = vec![doc];
    for segment in &path.segments {
        let mut next = Vec::new();
        for node in current {
            match (segment, node) {
                (Segment::Key(k), Value::Object(map)) => next.extend(map.get(k)),
                (Segment::Index(i), Value::Array(arr)) => next.extend(arr.get(*i)),
                (Segment::Wildcard, Value::Array(arr)) => next.extend(arr.iter()),
                _ => {}
            }
        }
        if next.is_empty() {
            return next;
        }
        current = next;
    }
    current
}

/// Whether `path` resolves to at least one value in `doc`.
#[must_use]
pub fn field_exists(doc: &Value, path: &FieldPath) -> bool {
    !get_values(doc, path).is_empty()
}

// ── Mutation ──

/// Apply `strategy` to every value matched by `path`.
///
/// # Errors
///
/// Returns [`MutationError::FieldNotFound`] if nothing matches, so callers can
/// skip the test instead of reporting a request that never carried the fuzz.
pub fn apply_strategy(
    doc: &Value,
    path: &FieldPath,
    strategy: &FuzzingStrategy,
) -> Result<FuzzedDocument, MutationError> {
    let mut json = doc.clone();
    let mut first: Option<Value> = None;
    let touched = visit_mut(&mut json, &path.segments, &mut |slot| {
        let fuzzed = strategy.process(slot);
        if first.is_none() {
            first = Some(fuzzed.clone());
        }
        *slot = fuzzed;
    });
    if touched == 0 {
        return Err(MutationError::FieldNotFound(path.raw.clone()));
    }
    Ok(FuzzedDocument {
        json,
        fuzzed_value: first.unwrap_or(Value::Null),
    })
}

/// Overwrite every value matched by `path` with `value`.
///
/// # Errors
///
/// Returns [`MutationError::FieldNotFound`] if nothing matches.
pub fn replace_field(doc: &Value, path: &FieldPath, value: &Value) -> Result<Value, MutationError> {
    apply_strategy(doc, path, &FuzzingStrategy::replace(value.clone())).map(|d| d.json)
}

/// Remove the key(s) matched by `path`.
///
/// # Errors
///
/// Returns [`MutationError::FieldNotFound`] if nothing matches or the path
/// does not end in an object key.
pub fn remove_field(doc: &Value, path: &FieldPath) -> Result<Value, MutationError> {
    let not_found = || MutationError::FieldNotFound(path.raw.clone());
    let (last, parents) = path.segments.split_last().ok_or_else(not_found)?;
    let Segment::Key(key) = last else {
        return Err(not_found());
    };
    let mut json = doc.clone();
    let mut removed = 0usize;
    if parents.is_empty() {
        if let Value::Object(map) = &mut json {
            removed += usize::from(map.remove(key).is_some());
        }
    } else {
        visit_mut(&mut json, parents, &mut |slot| {
            if let Value::Object(map) = slot {
                removed += usize::from(map.remove(key).is_some());
            }
        });
    }
    if removed == 0 {
        return Err(not_found());
    }
    Ok(json)
}

/// Insert `value` under `key` at the root of an object payload.
///
/// # Errors
///
/// Returns [`MutationError::InvalidJson`] if the root is not an object.
pub fn insert_root_field(doc: &Value, key: &str, value: Value) -> Result<Value, MutationError> {
    let mut json = doc.clone();
    match &mut json {
        Value::Object(map) => {
            map.insert(key.to_string(), value);
            Ok(json)
        }
        other => Err(MutationError::InvalidJson(format!(
            "cannot add '{key}' to non-object root {}",
            type_name(other)
        ))),
    }
}

fn visit_mut(node: &mut Value, segments: &[Segment], f: &mut dyn FnMut(&mut Value)) -> usize {
    let Some((head, tail)) = segments.split_first() else {
        f(node);
        return 1;
    };
    match (head, node) {
        (Segment::Key(k), Value::Object(map)) => map
            .get_mut(k)
            .map_or(0, |child| visit_mut(child, tail, f)),
        (Segment::Index(i), Value::Array(arr)) => arr
            .get_mut(*i)
            .map_or(0, |child| visit_mut(child, tail, f)),
        (Segment::Wildcard, Value::Array(arr)) => {
            arr.iter_mut().map(|child| visit_mut(child, tail, f)).sum()
        }
        _ => 0,
    }
}

const fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
