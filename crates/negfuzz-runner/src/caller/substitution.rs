//! Reference-data substitution and DELETE correlation

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use negfuzz_core::context::{GlobalContext, name_variants};
use negfuzz_core::http::{HttpMethod, ServiceData};
use negfuzz_core::mutation::{FieldPath, get_values, remove_field, replace_field};
use negfuzz_core::operation::template_params;
use negfuzz_core::refdata::RefValue;
use negfuzz_core::strategy::stringify;

use crate::dsl::Dsl;

/// Override payload fields with reference data.
///
/// Fields under test are left alone. A value that cannot be applied (bad path,
/// field absent from this payload) is skipped with a debug log.
#[must_use]
pub fn apply_ref_data(
    mut doc: Value,
    data: &ServiceData,
    refs: &BTreeMap<String, Value>,
    dsl: &Dsl,
) -> Value {
    let original = doc.clone();
    for (field, raw) in refs {
        if data.tested_fields().contains(field) {
            continue;
        }
        let path = match FieldPath::parse(field) {
            Ok(path) => path,
            Err(e) => {
                debug!(field = %field, error = %e, "skipping reference data entry");
                continue;
            }
        };
        let applied = match RefValue::from_raw(raw) {
            RefValue::Remove => remove_field(&doc, &path),
            RefValue::Null => replace_field(&doc, &path, &Value::Null),
            RefValue::Value(v) => replace_field(&doc, &path, &dsl.evaluate_value(&v, &original)),
        };
        match applied {
            Ok(updated) => doc = updated,
            Err(e) => debug!(field = %field, error = %e, "reference data not applied"),
        }
    }
    doc
}

/// Path parameter values pinned by reference data, DSL-evaluated.
/// Sentinel values never pin a parameter.
#[must_use]
pub fn pinned_path_values(
    data: &ServiceData,
    refs: &BTreeMap<String, Value>,
    dsl: &Dsl,
    payload: &Value,
) -> BTreeMap<String, String> {
    template_params(data.relative_path())
        .into_iter()
        .filter_map(|name| {
            let raw = refs.get(&name)?;
            match RefValue::from_raw(raw) {
                RefValue::Value(v) => Some((name, stringify(&dsl.evaluate_value(&v, payload)))),
                RefValue::Remove | RefValue::Null => None,
            }
        })
        .collect()
}

/// For a DELETE, take the most recent stored POST body of the sibling
/// collection and read each path parameter from it, trying the raw, camelCase,
/// snake_case and kebab-case spellings of the name.
///
/// Returns an empty map when nothing was stored.
#[must_use]
pub fn correlate_delete(data: &ServiceData, global: &GlobalContext) -> BTreeMap<String, String> {
    let mut resolved = BTreeMap::new();
    if data.method() != HttpMethod::Delete {
        return resolved;
    }
    let Some(body) = global.consume_post_for_delete(data.contract_path()) else {
        debug!(path = data.contract_path(), "no stored POST to correlate DELETE with");
        return resolved;
    };
    let Ok(stored) = serde_json::from_str::<Value>(&body) else {
        debug!(path = data.contract_path(), "stored POST body is not JSON");
        return resolved;
    };
    for name in template_params(data.contract_path()) {
        let found = name_variants(&name).into_iter().find_map(|variant| {
            let path = FieldPath::parse(&variant).ok()?;
            get_values(&stored, &path)
                .into_iter()
                .find(|v| !v.is_null())
                .map(stringify)
        });
        if let Some(value) = found {
            resolved.insert(name, value);
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use negfuzz_core::refdata::{NULL_SENTINEL, REMOVE_FIELD_SENTINEL};
    use serde_json::json;

    fn refs() -> BTreeMap<String, Value> {
        BTreeMap::from([
            ("name".to_string(), json!("fixed")),
            ("owner#id".to_string(), json!(42)),
            ("legacy".to_string(), json!(REMOVE_FIELD_SENTINEL)),
            ("nick".to_string(), json!(NULL_SENTINEL)),
            ("absent".to_string(), json!("x")),
            ("copy".to_string(), json!("${name}")),
        ])
    }

    fn payload() -> Value {
        json!({"name": "gen", "owner": {"id": 1}, "legacy": true, "nick": "n", "copy": ""})
    }

    #[test]
    fn overrides_sentinels_and_missing_fields() {
        let data = ServiceData::builder("/pets", HttpMethod::Post).build();
        let out = apply_ref_data(payload(), &data, &refs(), &Dsl::default());
        assert_eq!(out["name"], "fixed");
        assert_eq!(out["owner"]["id"], 42);
        assert!(out.get("legacy").is_none());
        assert_eq!(out["nick"], Value::Null);
        assert!(out.get("absent").is_none());
        assert_eq!(out["copy"], "gen");
    }

    #[test]
    fn tested_fields_are_not_overridden() {
        let data = ServiceData::builder("/pets", HttpMethod::Post)
            .tested_fields(["name"])
            .build();
        let out = apply_ref_data(payload(), &data, &refs(), &Dsl::default());
        assert_eq!(out["name"], "gen");
    }

    #[test]
    fn pinned_values_exclude_sentinels() {
        let data = ServiceData::builder("/pets/{petId}/{nick}", HttpMethod::Get).build();
        let refs = BTreeMap::from([
            ("petId".to_string(), json!(9)),
            ("nick".to_string(), json!(REMOVE_FIELD_SENTINEL)),
        ]);
        let pinned = pinned_path_values(&data, &refs, &Dsl::default(), &json!({}));
        assert_eq!(pinned, BTreeMap::from([("petId".to_string(), "9".to_string())]));
    }

    #[test]
    fn delete_resolves_id_from_stored_post() {
        let global = GlobalContext::default();
        global.record_post_success("/items", r#"{"item_id": "abc", "name": "x"}"#);
        let data = ServiceData::builder("/items/{itemId}", HttpMethod::Delete).build();
        let resolved = correlate_delete(&data, &global);
        assert_eq!(resolved["itemId"], "abc");
        assert_eq!(global.stored_posts("/items"), 0);
    }

    #[test]
    fn delete_without_stored_post_is_empty() {
        let global = GlobalContext::default();
        let data = ServiceData::builder("/items/{id}", HttpMethod::Delete).build();
        assert!(correlate_delete(&data, &global).is_empty());
    }

    #[test]
    fn non_delete_does_not_consume() {
        let global = GlobalContext::default();
        global.record_post_success("/items", r#"{"id": 1}"#);
        let data = ServiceData::builder("/items/{id}", HttpMethod::Get).build();
        assert!(correlate_delete(&data, &global).is_empty());
        assert_eq!(global.stored_posts("/items"), 1);
    }
}
