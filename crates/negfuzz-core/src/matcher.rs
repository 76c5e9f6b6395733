//! Response match predicates for the random mutation loop
//!
//! A response that matches any configured predicate is "interesting".

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::codes::ResponseCodeFamily;
use crate::http::HttpResponse;

/// Declarative form of a [`ResponseMatcher`], as found in configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchConfig {
    #[serde(default)]
    pub codes: Vec<ResponseCodeFamily>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_regex: Option<String>,
    #[serde(default)]
    pub sizes: Vec<usize>,
    #[serde(default)]
    pub words: Vec<usize>,
    #[serde(default)]
    pub lines: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_above_ms: Option<u64>,
    #[serde(default)]
    pub input_reflected: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ResponseMatcher {
    codes: Vec<ResponseCodeFamily>,
    body: Option<Regex>,
    sizes: Vec<usize>,
    words: Vec<usize>,
    lines: Vec<usize>,
    response_time_above_ms: Option<u64>,
    input_reflected: bool,
}

impl ResponseMatcher {
    /// Compile a matcher from its configuration.
    ///
    /// # Errors
    ///
    /// Returns the regex error when `body_regex` does not compile.
    pub fn from_config(config: &MatchConfig) -> Result<Self, regex::Error> {
        let body = config.body_regex.as_deref().map(Regex::new).transpose()?;
        Ok(Self {
            codes: config.codes.clone(),
            body,
            sizes: config.sizes.clone(),
            words: config.words.clone(),
            lines: config.lines.clone(),
            response_time_above_ms: config.response_time_above_ms,
            input_reflected: config.input_reflected,
        })
    }

    #[must_use]
    pub fn codes(mut self, family: ResponseCodeFamily) -> Self {
        self.codes.push(family);
        self
    }

    #[must_use]
    pub fn body(mut self, regex: Regex) -> Self {
        self.body = Some(regex);
        self
    }

    #[must_use]
    pub const fn input_reflected(mut self) -> Self {
        self.input_reflected = true;
        self
    }

    #[must_use]
    pub const fn response_time_above(mut self, ms: u64) -> Self {
        self.response_time_above_ms = Some(ms);
        self
    }

    /// True when no predicate is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
            && self.body.is_none()
            && self.sizes.is_empty()
            && self.words.is_empty()
            && self.lines.is_empty()
            && self.response_time_above_ms.is_none()
            && !self.input_reflected
    }

    /// Whether `response` matches any predicate. `fuzzed_input` is the value
    /// that was injected, used by the reflection check.
    #[must_use]
    pub fn matches(&self, response: &HttpResponse, fuzzed_input: &str) -> bool {
        self.describe_match(response, fuzzed_input).is_some()
    }

    /// Name of the first predicate that matches, if any.
    #[must_use]
    pub fn describe_match(&self, response: &HttpResponse, fuzzed_input: &str) -> Option<String> {
        if let Some(family) = self.codes.iter().find(|f| response.matches(f)) {
            return Some(format!("response code {} matches {family}", response.status_code));
        }
        if let Some(re) = self.body.as_ref().filter(|re| re.is_match(&response.body)) {
            return Some(format!("body matches /{}/", re.as_str()));
        }
        if self.sizes.contains(&response.content_length_bytes) {
            return Some(format!("body size {}", response.content_length_bytes));
        }
        if self.words.contains(&response.words) {
            return Some(format!("body word count {}", response.words));
        }
        if self.lines.contains(&response.lines) {
            return Some(format!("body line count {}", response.lines));
        }
        if let Some(limit) = self.response_time_above_ms {
            if response.response_time_ms > limit {
                return Some(format!(
                    "response time {}ms above {limit}ms",
                    response.response_time_ms
                ));
            }
        }
        if self.input_reflected && !fuzzed_input.is_empty() && response.body.contains(fuzzed_input) {
            return Some("fuzzed input reflected in response".to_string());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(code: u16, body: &str, ms: u64) -> HttpResponse {
        HttpResponse::new(code, vec![], body.to_string(), ms)
    }

    #[test]
    fn empty_matcher_matches_nothing() {
        let m = ResponseMatcher::default();
        assert!(m.is_empty());
        assert!(!m.matches(&response(500, "boom", 1), "x"));
    }

    #[test]
    fn code_family_match() {
        let m = ResponseMatcher::default().codes(ResponseCodeFamily::Class(5));
        assert!(m.matches(&response(503, "", 1), ""));
        assert!(!m.matches(&response(400, "", 1), ""));
    }

    #[test]
    fn body_regex_and_metrics() {
        let cfg = MatchConfig {
            body_regex: Some("(?i)stack ?trace".into()),
            words: vec![3],
            ..MatchConfig::default()
        };
        let m = ResponseMatcher::from_config(&cfg).unwrap();
        assert!(m.matches(&response(400, "java StackTrace here", 1), ""));
        assert!(m.matches(&response(400, "one two three", 1), ""));
        assert!(!m.matches(&response(400, "fine", 1), ""));
    }

    #[test]
    fn bad_regex_is_rejected() {
        let cfg = MatchConfig {
            body_regex: Some("(".into()),
            ..MatchConfig::default()
        };
        assert!(ResponseMatcher::from_config(&cfg).is_err());
    }

    #[test]
    fn reflection_and_timing() {
        let m = ResponseMatcher::default().input_reflected().response_time_above(100);
        assert!(m.matches(&response(400, "bad value <script>", 5), "<script>"));
        assert!(!m.matches(&response(400, "bad value", 5), "<script>"));
        let why = m.describe_match(&response(400, "", 250), "zzz").unwrap();
        assert!(why.contains("250ms"));
    }

    #[test]
    fn config_from_toml() {
        let cfg: MatchConfig = toml::from_str(
            r#"
codes = ["5XX", "200"]
input_reflected = true
"#,
        )
        .unwrap();
        assert_eq!(cfg.codes.len(), 2);
        assert!(cfg.input_reflected);
    }
}
