//! Fuzzing strategies: how a single value gets mutated
//!
//! A strategy is an immutable `(kind, payload)` pair. `process` is a pure
//! function of both: the same strategy applied to the same value always yields
//! the same result.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mutation operation applied to one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyKind {
    /// Leave the value untouched
    None,
    /// Do not run this test at all; the payload carries the reason
    Skip,
    /// Discard the existing value
    Replace,
    /// Append the payload
    Trail,
    /// Prepend the payload
    Prefix,
    /// Insert the payload in the middle
    Insert,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::None => "NONE",
            Self::Skip => "SKIP",
            Self::Replace => "REPLACE",
            Self::Trail => "TRAIL",
            Self::Prefix => "PREFIX",
            Self::Insert => "INSERT",
        };
        f.write_str(label)
    }
}

/// A mutation rule for one value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzingStrategy {
    kind: StrategyKind,
    payload: Value,
}

impl FuzzingStrategy {
    #[must_use]
    pub const fn none() -> Self {
        Self {
            kind: StrategyKind::None,
            payload: Value::Null,
        }
    }

    /// A strategy that short-circuits the test; `reason` is reported as the skip reason.
    #[must_use]
    pub fn skip(reason: impl Into<String>) -> Self {
        Self {
            kind: StrategyKind::Skip,
            payload: Value::String(reason.into()),
        }
    }

    #[must_use]
    pub fn replace(payload: impl Into<Value>) -> Self {
        Self {
            kind: StrategyKind::Replace,
            payload: payload.into(),
        }
    }

    #[must_use]
    pub fn trail(payload: impl Into<String>) -> Self {
        Self {
            kind: StrategyKind::Trail,
            payload: Value::String(payload.into()),
        }
    }

    #[must_use]
    pub fn prefix(payload: impl Into<String>) -> Self {
        Self {
            kind: StrategyKind::Prefix,
            payload: Value::String(payload.into()),
        }
    }

    #[must_use]
    pub fn insert(payload: impl Into<String>) -> Self {
        Self {
            kind: StrategyKind::Insert,
            payload: Value::String(payload.into()),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> StrategyKind {
        self.kind
    }

    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    #[must_use]
    pub const fn is_skip(&self) -> bool {
        matches!(self.kind, StrategyKind::Skip)
    }

    /// Reason attached to a SKIP strategy, if any.
    #[must_use]
    pub fn skip_reason(&self) -> Option<&str> {
        if self.is_skip() {
            self.payload.as_str()
        } else {
            None
        }
    }

    /// Apply the strategy to `value`.
    ///
    /// REPLACE returns the payload as-is. TRAIL, PREFIX and INSERT stringify
    /// the existing value first and always return a string containing it.
    #[must_use]
    pub fn process(&self, value: &Value) -> Value {
        match self.kind {
            StrategyKind::None | StrategyKind::Skip => value.clone(),
            StrategyKind::Replace => self.payload.clone(),
            StrategyKind::Trail => {
                let mut out = stringify(value);
                out.push_str(&stringify(&self.payload));
                Value::String(out)
            }
            StrategyKind::Prefix => {
                let mut out = stringify(&self.payload);
                out.push_str(&stringify(value));
                Value::String(out)
            }
            StrategyKind::Insert => {
                let existing = stringify(value);
                let at = middle_byte_index(&existing);
                let mut out = String::with_capacity(existing.len() + 8);
                out.push_str(&existing[..at]);
                out.push_str(&stringify(&self.payload));
                out.push_str(&existing[at..]);
                Value::String(out)
            }
        }
    }

    /// String form of [`process`](Self::process), for header values and query strings.
    #[must_use]
    pub fn process_str(&self, value: &str) -> String {
        stringify(&self.process(&Value::String(value.to_string())))
    }

    /// Guess which strategy produced `fuzz_value` from its shape.
    ///
    /// Leading whitespace or control characters mean PREFIX, trailing ones
    /// mean TRAIL, anything else is a REPLACE with the whole value.
    #[must_use]
    pub fn infer(fuzz_value: &str) -> Self {
        if fuzz_value.trim().is_empty() {
            return Self::replace(fuzz_value);
        }
        let leading: String = fuzz_value
            .chars()
            .take_while(|c| is_padding_char(*c))
            .collect();
        if !leading.is_empty() {
            return Self::prefix(leading);
        }
        let mut trailing: Vec<char> = fuzz_value
            .chars()
            .rev()
            .take_while(|c| is_padding_char(*c))
            .collect();
        if !trailing.is_empty() {
            trailing.reverse();
            return Self::trail(trailing.into_iter().collect::<String>());
        }
        Self::replace(fuzz_value)
    }
}

impl Default for FuzzingStrategy {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Display for FuzzingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            StrategyKind::None => write!(f, "NONE"),
            _ => write!(f, "{} with {}", self.kind, truncate(&stringify(&self.payload), 40)),
        }
    }
}

/// Apply the strategy that produced `fuzz_value` to a user-supplied value.
///
/// Used when a fuzzed header also has a configured value: the configured
/// value is kept and the fuzzing is re-applied on top of it.
#[must_use]
pub fn merge_fuzzing(fuzz_value: &str, supplied: &str) -> String {
    FuzzingStrategy::infer(fuzz_value).process_str(supplied)
}

/// String form of a JSON value: strings unquoted, everything else as JSON.
#[must_use]
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_padding_char(c: char) -> bool {
    c.is_whitespace() || c.is_control() || matches!(c, '\u{200B}'..='\u{200F}' | '\u{FEFF}')
}

fn middle_byte_index(s: &str) -> usize {
    let chars = s.chars().count();
    if chars == 0 {
        return 0;
    }
    s.char_indices()
        .nth(chars / 2)
        .map_or(s.len(), |(idx, _)| idx)
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let head: String = s.chars().take(max_chars).collect();
    format!("{head}…")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn replace_discards_existing_value() {
        let s = FuzzingStrategy::replace("fuzzed");
        assert_eq!(s.process(&json!("value")), json!("fuzzed"));
        assert_eq!(s.process(&json!(42)), json!("fuzzed"));
    }

    #[test]
    fn replace_keeps_non_string_payload() {
        let s = FuzzingStrategy::replace(Value::Null);
        assert_eq!(s.process(&json!("value")), Value::Null);
        let n = FuzzingStrategy::replace(json!(9_999_999_999_i64));
        assert_eq!(n.process(&json!(1)), json!(9_999_999_999_i64));
    }

    #[test]
    fn trail_and_prefix_concatenate() {
        assert_eq!(
            FuzzingStrategy::trail(" ").process(&json!("abc")),
            json!("abc ")
        );
        assert_eq!(
            FuzzingStrategy::prefix("\t").process(&json!("abc")),
            json!("\tabc")
        );
    }

    #[test]
    fn insert_goes_in_the_middle() {
        assert_eq!(
            FuzzingStrategy::insert("X").process(&json!("abcd")),
            json!("abXcd")
        );
        assert_eq!(
            FuzzingStrategy::insert("X").process(&json!("abc")),
            json!("aXbc")
        );
    }

    #[test]
    fn insert_into_empty_is_position_zero() {
        assert_eq!(FuzzingStrategy::insert("X").process(&json!("")), json!("X"));
    }

    #[test]
    fn insert_respects_char_boundaries() {
        assert_eq!(
            FuzzingStrategy::insert("-").process(&json!("äöüß")),
            json!("äö-üß")
        );
    }

    #[test]
    fn non_string_targets_are_stringified() {
        assert_eq!(
            FuzzingStrategy::trail("0").process(&json!(12)),
            json!("120")
        );
        assert_eq!(
            FuzzingStrategy::prefix("x").process(&json!(true)),
            json!("xtrue")
        );
    }

    #[test]
    fn none_and_skip_leave_value_unchanged() {
        assert_eq!(FuzzingStrategy::none().process(&json!("v")), json!("v"));
        let skip = FuzzingStrategy::skip("not applicable");
        assert_eq!(skip.process(&json!("v")), json!("v"));
        assert!(skip.is_skip());
        assert_eq!(skip.skip_reason(), Some("not applicable"));
        assert_eq!(FuzzingStrategy::replace("x").skip_reason(), None);
    }

    #[test]
    fn infer_recognizes_shapes() {
        assert_eq!(FuzzingStrategy::infer("  abc").kind(), StrategyKind::Prefix);
        assert_eq!(FuzzingStrategy::infer("abc\u{0000}").kind(), StrategyKind::Trail);
        assert_eq!(FuzzingStrategy::infer("abc").kind(), StrategyKind::Replace);
        assert_eq!(FuzzingStrategy::infer("   ").kind(), StrategyKind::Replace);
    }

    #[test]
    fn merge_fuzzing_reapplies_on_supplied_value() {
        assert_eq!(merge_fuzzing("  placeholder", "Bearer t"), "  Bearer t");
        assert_eq!(merge_fuzzing("placeholder\t", "Bearer t"), "Bearer t\t");
        assert_eq!(merge_fuzzing("fuzzed", "Bearer t"), "fuzzed");
    }

    #[test]
    fn display_includes_kind() {
        assert_eq!(FuzzingStrategy::none().to_string(), "NONE");
        assert_eq!(FuzzingStrategy::trail("x").to_string(), "TRAIL with x");
    }

    proptest! {
        #[test]
        fn concatenating_kinds_retain_original(original in ".{0,40}", payload in ".{0,10}") {
            let value = Value::String(original.clone());
            for s in [
                FuzzingStrategy::trail(payload.clone()),
                FuzzingStrategy::prefix(payload.clone()),
                FuzzingStrategy::insert(payload.clone()),
            ] {
                let out = stringify(&s.process(&value));
                if matches!(s.kind(), StrategyKind::Insert) {
                    let at = middle_byte_index(&original);
                    prop_assert!(out.starts_with(&original[..at]));
                    prop_assert!(out.ends_with(&original[at..]));
                } else {
                    prop_assert!(out.contains(&original));
                }
                prop_assert_eq!(out.chars().count(), original.chars().count() + payload.chars().count());
            }
        }

        #[test]
        fn process_is_deterministic(original in ".{0,20}", payload in ".{0,10}") {
            let value = Value::String(original);
            for s in [
                FuzzingStrategy::replace(payload.clone()),
                FuzzingStrategy::trail(payload.clone()),
                FuzzingStrategy::prefix(payload.clone()),
                FuzzingStrategy::insert(payload.clone()),
            ] {
                prop_assert_eq!(s.process(&value), s.process(&value));
            }
        }

        #[test]
        fn replace_ignores_prior_value(a in ".{0,20}", b in ".{0,20}") {
            let s = FuzzingStrategy::replace("constant");
            prop_assert_eq!(s.process(&Value::String(a)), s.process(&Value::String(b)));
        }
    }
}
