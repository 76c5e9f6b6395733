//! URL construction: path parameters, query parameters, and body cleanup

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use url::Url;

use negfuzz_core::http::ServiceData;
use negfuzz_core::strategy::stringify;

/// A path template with its placeholders filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub path: String,
    /// Names substituted into the path
    pub consumed: BTreeSet<String>,
}

/// Fill `{name}` placeholders in `template` using `lookup`.
///
/// A segment with a placeholder that does not resolve is dropped entirely.
#[must_use]
pub fn resolve_path(template: &str, lookup: impl Fn(&str) -> Option<String>) -> ResolvedPath {
    let mut consumed = BTreeSet::new();
    let mut segments = Vec::new();
    for segment in template.split('/') {
        if let Some(filled) = fill_segment(segment, &lookup, &mut consumed) {
            segments.push(filled);
        }
    }
    let mut path = segments.join("/");
    if path.is_empty() {
        path.push('/');
    }
    ResolvedPath { path, consumed }
}

fn fill_segment(
    segment: &str,
    lookup: &impl Fn(&str) -> Option<String>,
    consumed: &mut BTreeSet<String>,
) -> Option<String> {
    let mut out = String::with_capacity(segment.len());
    let mut rest = segment;
    let mut used = Vec::new();
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        let name = &rest[open + 1..open + close];
        let value = lookup(name)?;
        out.push_str(&rest[..open]);
        out.push_str(&value);
        used.push(name.to_string());
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);
    consumed.extend(used);
    Some(out)
}

/// Path parameter value from a payload: a top-level, non-null field.
#[must_use]
pub fn payload_path_value(payload: &Value, name: &str) -> Option<String> {
    match payload.get(name) {
        None | Some(Value::Null) => None,
        Some(v) => Some(stringify(v)),
    }
}

/// Query pairs taken from payload fields declared as query parameters.
///
/// Null values are dropped and arrays repeat the key. Names consumed as path
/// parameters are left out unless also declared as path parameters.
#[must_use]
pub fn payload_query_pairs(
    data: &ServiceData,
    payload: &Value,
    consumed: &BTreeSet<String>,
) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for name in data.query_params() {
        if consumed.contains(name) && !data.path_params().contains(name) {
            continue;
        }
        match payload.get(name) {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) => pairs.extend(
                items
                    .iter()
                    .filter(|v| !v.is_null())
                    .map(|v| (name.clone(), stringify(v))),
            ),
            Some(v) => pairs.push((name.clone(), stringify(v))),
        }
    }
    pairs
}

/// Join `base_url` and `path`, then append `query` pairs when there are any.
///
/// # Errors
///
/// Returns error if the joined string is not a valid URL.
pub fn build_url(
    base_url: &str,
    path: &str,
    query: &[(String, String)],
) -> Result<String, url::ParseError> {
    let joined = format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'));
    let mut url = Url::parse(&joined)?;
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url.to_string())
}

/// Remove top-level query-parameter fields from a body document.
#[must_use]
pub fn strip_query_fields(mut body: Value, query_params: &BTreeSet<String>) -> Value {
    if let Value::Object(map) = &mut body {
        for name in query_params {
            map.remove(name);
        }
    }
    body
}

/// Payload as `application/x-www-form-urlencoded` pairs. Non-objects encode to nothing.
#[must_use]
pub fn form_encode(payload: &Value) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    if let Value::Object(map) = payload {
        for (key, value) in map {
            match value {
                Value::Null => {}
                Value::Array(items) => {
                    for item in items {
                        serializer.append_pair(key, &stringify(item));
                    }
                }
                other => {
                    serializer.append_pair(key, &stringify(other));
                }
            }
        }
    }
    serializer.finish()
}

/// Look up a path parameter in priority order: `pinned` values, then
/// `supplied` (when present), then the payload.
#[must_use]
pub fn path_value(
    name: &str,
    pinned: &BTreeMap<String, String>,
    supplied: Option<&BTreeMap<String, String>>,
    payload: &Value,
) -> Option<String> {
    pinned
        .get(name)
        .or_else(|| supplied.and_then(|s| s.get(name)))
        .cloned()
        .or_else(|| payload_path_value(payload, name))
}
