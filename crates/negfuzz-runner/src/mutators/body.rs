//! Built-in payload mutators

use rand::{Rng, RngCore};
use serde_json::{Value, json};

use negfuzz_core::mutation::{FieldPath, MutationError, apply_strategy, remove_field, replace_field};
use negfuzz_core::strategy::FuzzingStrategy;

use super::{Mutator, MutatorCapability};

const ZERO_WIDTH: &[char] = &['\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}'];

/// Random alphanumeric string of `len` characters.
pub fn random_alnum(rng: &mut dyn RngCore, len: usize) -> String {
    const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    (0..len)
        .map(|_| char::from(CHARS[rng.gen_range(0..CHARS.len())]))
        .collect()
}

/// Values of a different JSON type than the usual string/number field.
fn type_confusion_values() -> Vec<Value> {
    vec![
        json!(""),
        json!("123"),
        json!("true"),
        json!(0),
        json!(2.5),
        json!(true),
        json!(false),
        json!([]),
        json!([1]),
        json!({}),
    ]
}

pub(super) fn pick<'a, T>(values: &'a [T], rng: &mut dyn RngCore) -> Option<&'a T> {
    if values.is_empty() {
        None
    } else {
        values.get(rng.gen_range(0..values.len()))
    }
}

pub struct RandomString;

impl Mutator for RandomString {
    fn name(&self) -> &str {
        "random-string"
    }
    fn description(&self) -> &str {
        "replace the field with a random alphanumeric string"
    }
    fn capability(&self) -> MutatorCapability {
        MutatorCapability::Body
    }
    fn mutate_body(&self, payload: &Value, field: &FieldPath, rng: &mut dyn RngCore) -> Result<Value, MutationError> {
        let len = rng.gen_range(1..=64);
        replace_field(payload, field, &Value::String(random_alnum(rng, len)))
    }
}

pub struct EmptyString;

impl Mutator for EmptyString {
    fn name(&self) -> &str {
        "empty-string"
    }
    fn description(&self) -> &str {
        "replace the field with an empty string"
    }
    fn capability(&self) -> MutatorCapability {
        MutatorCapability::Body
    }
    fn mutate_body(&self, payload: &Value, field: &FieldPath, _rng: &mut dyn RngCore) -> Result<Value, MutationError> {
        replace_field(payload, field, &json!(""))
    }
}

pub struct NullValue;

impl Mutator for NullValue {
    fn name(&self) -> &str {
        "null-value"
    }
    fn description(&self) -> &str {
        "replace the field with null"
    }
    fn capability(&self) -> MutatorCapability {
        MutatorCapability::Body
    }
    fn mutate_body(&self, payload: &Value, field: &FieldPath, _rng: &mut dyn RngCore) -> Result<Value, MutationError> {
        replace_field(payload, field, &Value::Null)
    }
}

pub struct HugeNumber;

impl Mutator for HugeNumber {
    fn name(&self) -> &str {
        "huge-number"
    }
    fn description(&self) -> &str {
        "replace the field with a number at or past common integer limits"
    }
    fn capability(&self) -> MutatorCapability {
        MutatorCapability::Body
    }
    fn mutate_body(&self, payload: &Value, field: &FieldPath, rng: &mut dyn RngCore) -> Result<Value, MutationError> {
        let candidates = [
            json!(i64::MAX),
            json!(i64::MIN),
            json!(u64::MAX),
            json!(i64::from(i32::MAX) + 1),
            json!(i64::from(i32::MIN) - 1),
            json!(9_007_199_254_740_993_u64),
            json!(1.0e308),
            json!(-1.0e308),
        ];
        let value = pick(&candidates, rng).cloned().unwrap_or(Value::Null);
        replace_field(payload, field, &value)
    }
}

pub struct VeryLongString;

impl Mutator for VeryLongString {
    fn name(&self) -> &str {
        "very-long-string"
    }
    fn description(&self) -> &str {
        "replace the field with a string of 10 000 to 50 000 characters"
    }
    fn capability(&self) -> MutatorCapability {
        MutatorCapability::Body
    }
    fn mutate_body(&self, payload: &Value, field: &FieldPath, rng: &mut dyn RngCore) -> Result<Value, MutationError> {
        let len = rng.gen_range(10_000..=50_000);
        replace_field(payload, field, &Value::String("a".repeat(len)))
    }
}

pub struct ZeroWidthChars;

impl Mutator for ZeroWidthChars {
    fn name(&self) -> &str {
        "zero-width-chars"
    }
    fn description(&self) -> &str {
        "insert zero-width characters into the field value"
    }
    fn capability(&self) -> MutatorCapability {
        MutatorCapability::Body
    }
    fn mutate_body(&self, payload: &Value, field: &FieldPath, rng: &mut dyn RngCore) -> Result<Value, MutationError> {
        let c = pick(ZERO_WIDTH, rng).copied().unwrap_or('\u{200B}');
        let strategy = match rng.gen_range(0..3) {
            0 => FuzzingStrategy::prefix(c.to_string()),
            1 => FuzzingStrategy::trail(c.to_string()),
            _ => FuzzingStrategy::insert(c.to_string()),
        };
        apply_strategy(payload, field, &strategy).map(|d| d.json)
    }
}

pub struct TypeConfusion;

impl Mutator for TypeConfusion {
    fn name(&self) -> &str {
        "type-confusion"
    }
    fn description(&self) -> &str {
        "replace the field with a value of another JSON type"
    }
    fn capability(&self) -> MutatorCapability {
        MutatorCapability::Body
    }
    fn mutate_body(&self, payload: &Value, field: &FieldPath, rng: &mut dyn RngCore) -> Result<Value, MutationError> {
        let values = type_confusion_values();
        let value = pick(&values, rng).cloned().unwrap_or(Value::Null);
        replace_field(payload, field, &value)
    }
}

pub struct RemoveField;

impl Mutator for RemoveField {
    fn name(&self) -> &str {
        "remove-field"
    }
    fn description(&self) -> &str {
        "remove the field from the payload"
    }
    fn capability(&self) -> MutatorCapability {
        MutatorCapability::Body
    }
    fn mutate_body(&self, payload: &Value, field: &FieldPath, _rng: &mut dyn RngCore) -> Result<Value, MutationError> {
        remove_field(payload, field)
    }
}
