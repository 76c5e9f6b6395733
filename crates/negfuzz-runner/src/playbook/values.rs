//! Fuzz value pools for field playbooks

use serde_json::{Value, json};

use negfuzz_core::operation::{FieldInfo, FieldType};

/// Values whose JSON type differs from the field's declared type.
#[must_use]
pub fn type_confusion(declared: FieldType) -> Vec<Value> {
    let mut values = Vec::new();

    // Strings a lenient parser may coerce
    if declared != FieldType::String {
        values.push(json!(""));
        values.push(json!("123"));
        values.push(json!("true"));
    }

    if !matches!(declared, FieldType::Integer | FieldType::Number) {
        values.push(json!(0));
        values.push(json!(42));
    }

    // Integer field receiving a float
    if declared != FieldType::Number {
        values.push(json!(2.5));
    }

    if declared != FieldType::Boolean {
        values.push(json!(true));
        values.push(json!(false));
    }

    if declared != FieldType::Array {
        values.push(json!([]));
        values.push(json!([1]));
    }

    if declared != FieldType::Object {
        values.push(json!({}));
    }

    values
}

/// Integers at common storage and parser limits.
#[must_use]
pub fn integer_boundaries() -> Vec<Value> {
    let mut values: Vec<i64> = vec![-1, 0];
    values.extend([
        i64::from(i32::MIN) - 1,
        i64::from(i32::MAX) + 1,
        i64::from(u32::MAX) + 1,
        i64::MIN,
        i64::MAX,
    ]);
    // JavaScript Number.MAX_SAFE_INTEGER and the first unsafe one
    values.extend([(1i64 << 53) - 1, 1i64 << 53]);
    values.into_iter().map(|v| json!(v)).collect()
}

/// Strings that tend to break naive handling.
#[must_use]
pub fn abusive_strings() -> Vec<Value> {
    vec![
        json!(" "),
        json!("null"),
        json!("NaN"),
        json!("abc\0def"),
        json!("\u{202E}abc"),
        json!("line1\r\nline2"),
        json!("{{7*7}}"),
        json!("${7*7}"),
        json!("../../../etc/passwd"),
        json!("{\"key\":\"value\"}"),
    ]
}

/// Boundary pool for the field's type. Booleans and containers have none.
#[must_use]
pub fn boundaries(declared: FieldType) -> Vec<Value> {
    match declared {
        FieldType::Integer | FieldType::Number => integer_boundaries(),
        FieldType::String => abusive_strings(),
        FieldType::Boolean | FieldType::Object | FieldType::Array => Vec::new(),
    }
}

/// A string one character longer than the field's declared maximum.
#[must_use]
pub fn over_max_length(field: &FieldInfo) -> Option<Value> {
    let max = field.max_length?;
    Some(Value::String("a".repeat(max.saturating_add(1))))
}
