//! Response classification against an expected response code family

use regex::Regex;
use serde_json::Value;

use super::Outcome;
use crate::codes::ResponseCodeFamily;
use crate::http::HttpResponse;
use crate::strategy::stringify;

/// Which expectation governs a fuzzed field's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectationKind {
    RequiredFieldFuzzed,
    OptionalFieldFuzzed,
    PatternViolation,
}

/// The three expected-code families a field playbook declares.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldExpectations {
    pub required_fuzzed: ResponseCodeFamily,
    pub optional_fuzzed: ResponseCodeFamily,
    /// Applies when the field has a pattern and the fuzzed value breaks it
    pub pattern_violation: Option<ResponseCodeFamily>,
}

impl FieldExpectations {
    /// Same family whatever the field looks like.
    #[must_use]
    pub fn uniform(family: ResponseCodeFamily) -> Self {
        Self {
            required_fuzzed: family.clone(),
            optional_fuzzed: family,
            pattern_violation: None,
        }
    }

    /// Pick the governing family for one fuzzed value.
    #[must_use]
    pub fn select(
        &self,
        required: bool,
        pattern: Option<&str>,
        fuzzed_value: &Value,
    ) -> (ExpectationKind, &ResponseCodeFamily) {
        if let Some(family) = &self.pattern_violation {
            if pattern.is_some_and(|p| violates_pattern(p, fuzzed_value)) {
                return (ExpectationKind::PatternViolation, family);
            }
        }
        if required {
            (ExpectationKind::RequiredFieldFuzzed, &self.required_fuzzed)
        } else {
            (ExpectationKind::OptionalFieldFuzzed, &self.optional_fuzzed)
        }
    }
}

/// Whether `value` fails to match `pattern`. Uncompilable patterns never count.
#[must_use]
pub fn violates_pattern(pattern: &str, value: &Value) -> bool {
    Regex::new(pattern).is_ok_and(|re| !re.is_match(&stringify(value)))
}

/// Outcome plus a human-readable reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub outcome: Outcome,
    pub reason: String,
}

/// Judge `response` against `expected`.
///
/// Transport failures are errors. A code in the expected family is a success.
/// A code the contract documents for the operation is a warning. Anything else
/// is an error; a 2xx here means the service accepted invalid input.
#[must_use]
pub fn classify(
    response: &HttpResponse,
    expected: &ResponseCodeFamily,
    documented: &[String],
) -> Classification {
    let code = response.status_code;
    if let Some(failure) = response.transport_failure_kind() {
        return Classification {
            outcome: Outcome::Error,
            reason: format!("{failure} ({code}), expected {expected}"),
        };
    }
    if response.is_synthetic() {
        return Classification {
            outcome: Outcome::Error,
            reason: format!("transport failure ({code}), expected {expected}"),
        };
    }
    if expected.matches(code) {
        return Classification {
            outcome: Outcome::Success,
            reason: format!("expected {expected}, got {code}"),
        };
    }
    if documented
        .iter()
        .any(|label| ResponseCodeFamily::label_covers(label, code))
    {
        return Classification {
            outcome: Outcome::Warning,
            reason: format!("documented response code {code}, expected {expected}"),
        };
    }
    let reason = if ResponseCodeFamily::two_xx().matches(code) {
        format!("invalid input accepted: expected {expected}, got {code}")
    } else {
        format!("unexpected response code {code}, expected {expected}")
    };
    Classification {
        outcome: Outcome::Error,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::TransportFailure;
    use serde_json::json;

    fn response(code: u16) -> HttpResponse {
        HttpResponse::new(code, vec![], String::new(), 1)
    }

    fn documented() -> Vec<String> {
        vec!["200".into(), "404".into()]
    }

    #[test]
    fn expected_code_is_success() {
        let c = classify(&response(400), &ResponseCodeFamily::four_xx(), &documented());
        assert_eq!(c.outcome, Outcome::Success);
    }

    #[test]
    fn documented_unexpected_is_warning() {
        let c = classify(&response(404), &ResponseCodeFamily::four_xx_bad_request(), &documented());
        assert_eq!(c.outcome, Outcome::Warning);
    }

    #[test]
    fn accepted_invalid_input_is_error() {
        let c = classify(&response(201), &ResponseCodeFamily::four_xx(), &documented());
        assert_eq!(c.outcome, Outcome::Error);
        assert!(c.reason.contains("invalid input accepted"));
    }

    #[test]
    fn documented_2xx_is_only_a_warning() {
        let c = classify(&response(200), &ResponseCodeFamily::four_xx(), &documented());
        assert_eq!(c.outcome, Outcome::Warning);
    }

    #[test]
    fn undocumented_server_error() {
        let c = classify(&response(500), &ResponseCodeFamily::four_xx(), &documented());
        assert_eq!(c.outcome, Outcome::Error);
        assert!(c.reason.contains("unexpected response code 500"));
    }

    #[test]
    fn transport_failure_is_error_even_with_default_label() {
        let r = HttpResponse::transport_failure(TransportFailure::ReadTimeout, "", 1);
        let c = classify(&r, &ResponseCodeFamily::four_xx(), &["default".to_string()]);
        assert_eq!(c.outcome, Outcome::Error);
        assert!(c.reason.contains("read timeout"));
    }

    #[test]
    fn pattern_override_only_when_violated() {
        let exp = FieldExpectations {
            required_fuzzed: ResponseCodeFamily::four_xx_bad_request(),
            optional_fuzzed: ResponseCodeFamily::two_xx_or_four_xx(),
            pattern_violation: Some(ResponseCodeFamily::four_xx()),
        };
        let (kind, _) = exp.select(false, Some("^[a-z]+$"), &json!("abc "));
        assert_eq!(kind, ExpectationKind::PatternViolation);
        let (kind, _) = exp.select(false, Some("^[a-z ]+$"), &json!("abc "));
        assert_eq!(kind, ExpectationKind::OptionalFieldFuzzed);
        let (kind, fam) = exp.select(true, None, &json!("abc "));
        assert_eq!(kind, ExpectationKind::RequiredFieldFuzzed);
        assert_eq!(fam, &ResponseCodeFamily::four_xx_bad_request());
    }

    #[test]
    fn bad_pattern_is_ignored() {
        assert!(!violates_pattern("(", &json!("x")));
        assert!(violates_pattern("^\\d+$", &json!("12a")));
        assert!(!violates_pattern("^\\d+$", &json!(12)));
    }
}
