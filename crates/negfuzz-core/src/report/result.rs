//! Per-test-case result records

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Outcome;
use crate::http::{Header, HttpMethod, HttpRequest, HttpResponse};

/// Why a test case was not executed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum SkipReason {
    /// Field is an object or array
    NonPrimitive,
    /// Field selects a schema variant
    Discriminator,
    /// Field value is pinned by reference data
    RefDataControlled,
    /// Playbook does not apply to the field's schema type
    SchemaMismatch,
    /// Field or header listed in the skip configuration
    ExplicitlySkipped,
    /// Field path does not resolve in this payload
    FieldNotInPayload,
    /// Playbook produced nothing to send
    NoFuzzValues,
    /// A SKIP strategy declined the test
    Declined(String),
}

impl SkipReason {
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::NonPrimitive => "field is not a primitive".to_string(),
            Self::Discriminator => "field is a discriminator".to_string(),
            Self::RefDataControlled => "field is controlled by reference data".to_string(),
            Self::SchemaMismatch => "field schema does not match playbook".to_string(),
            Self::ExplicitlySkipped => "explicitly skipped".to_string(),
            Self::FieldNotInPayload => "field not present in payload".to_string(),
            Self::NoFuzzValues => "no fuzz values".to_string(),
            Self::Declined(why) => why.clone(),
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.description())
    }
}

/// Snapshot of the HTTP response kept in a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResponseSnapshot {
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<Header>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default)]
    pub response_time_ms: u64,
}

impl From<&HttpResponse> for ResponseSnapshot {
    fn from(r: &HttpResponse) -> Self {
        Self {
            status_code: r.status_code,
            headers: r.headers.clone(),
            body: (!r.body.is_empty()).then(|| r.body.clone()),
            response_time_ms: r.response_time_ms,
        }
    }
}

/// Result of one test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TestCaseResult {
    /// Unique identifier, also sent in the User-Agent
    pub id: String,
    /// Playbook that produced the test
    pub playbook: String,
    /// What the test did, e.g. "send trailing spaces in field 'name'"
    pub scenario: String,
    /// Contract path
    pub path: String,
    pub method: HttpMethod,
    pub outcome: Outcome,
    pub reason: String,
    /// Expected response code family, if the test was executed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<HttpRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseSnapshot>,
    /// Additional context
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
}

impl TestCaseResult {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        playbook: impl Into<String>,
        scenario: impl Into<String>,
        path: impl Into<String>,
        method: HttpMethod,
        outcome: Outcome,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            playbook: playbook.into(),
            scenario: scenario.into(),
            path: path.into(),
            method,
            outcome,
            reason: reason.into(),
            expected: None,
            skip_reason: None,
            request: None,
            response: None,
            context: BTreeMap::new(),
        }
    }

    /// A skipped result carrying its reason
    #[must_use]
    pub fn skipped(
        id: impl Into<String>,
        playbook: impl Into<String>,
        scenario: impl Into<String>,
        path: impl Into<String>,
        method: HttpMethod,
        reason: SkipReason,
    ) -> Self {
        let mut result = Self::new(
            id,
            playbook,
            scenario,
            path,
            method,
            Outcome::Skipped,
            reason.description(),
        );
        result.skip_reason = Some(reason);
        result
    }

    #[must_use]
    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    #[must_use]
    pub fn with_exchange(mut self, request: HttpRequest, response: &HttpResponse) -> Self {
        self.request = Some(request);
        self.response = Some(ResponseSnapshot::from(response));
        self
    }

    /// Add context entry
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}
