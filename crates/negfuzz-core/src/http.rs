//! Request intent and wire-level exchange records
//!
//! [`ServiceData`] describes what a test case wants to send. It is built once,
//! never mutated, and consumed by exactly one call. [`HttpRequest`] and
//! [`HttpResponse`] record what actually went over the wire.

use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codes::ResponseCodeFamily;

/// Default content type for request bodies.
pub const APPLICATION_JSON: &str = "application/json";
/// Content type for PATCH bodies when JSON-Patch is configured.
pub const APPLICATION_JSON_PATCH: &str = "application/json-patch+json";
/// Form-encoded content type; payloads get re-encoded as form pairs.
pub const APPLICATION_FORM: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
}

impl HttpMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Trace => "TRACE",
        }
    }

    /// Methods whose payload travels in the request body rather than the URL.
    #[must_use]
    pub const fn has_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            "TRACE" => Ok(Self::Trace),
            other => Err(format!("unsupported HTTP method '{other}'")),
        }
    }
}

/// One header occurrence. Collections of these are ordered and may repeat names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Case-insensitive lookup of the first header named `name`.
#[must_use]
pub fn find_header<'a>(headers: &'a [Header], name: &str) -> Option<&'a Header> {
    headers.iter().find(|h| h.is(name))
}

// ── Request intent ──

/// Everything one test case wants to send.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceData {
    test_id: String,
    contract_path: String,
    relative_path: String,
    method: HttpMethod,
    headers: Vec<Header>,
    payload: String,
    content_type: String,
    path_params_payload: Option<String>,
    replace_ref_data: bool,
    replace_url_params: bool,
    add_user_headers: bool,
    valid_json: bool,
    skipped_headers: BTreeSet<String>,
    tested_fields: BTreeSet<String>,
    fuzzed_headers: BTreeSet<String>,
    path_params: BTreeSet<String>,
    query_params: BTreeSet<String>,
}

impl ServiceData {
    /// Start building a request for `contract_path` (e.g. `/pets/{id}`).
    #[must_use]
    pub fn builder(contract_path: impl Into<String>, method: HttpMethod) -> ServiceDataBuilder {
        let contract_path = contract_path.into();
        ServiceDataBuilder {
            data: Self {
                test_id: String::new(),
                relative_path: contract_path.clone(),
                contract_path,
                method,
                headers: Vec::new(),
                payload: String::new(),
                content_type: APPLICATION_JSON.to_string(),
                path_params_payload: None,
                replace_ref_data: true,
                replace_url_params: true,
                add_user_headers: true,
                valid_json: true,
                skipped_headers: BTreeSet::new(),
                tested_fields: BTreeSet::new(),
                fuzzed_headers: BTreeSet::new(),
                path_params: BTreeSet::new(),
                query_params: BTreeSet::new(),
            },
        }
    }

    #[must_use]
    pub fn test_id(&self) -> &str {
        &self.test_id
    }
    #[must_use]
    pub fn contract_path(&self) -> &str {
        &self.contract_path
    }
    #[must_use]
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }
    #[must_use]
    pub const fn method(&self) -> HttpMethod {
        self.method
    }
    #[must_use]
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }
    /// Payload used to resolve path parameters when it differs from the body.
    #[must_use]
    pub fn path_params_payload(&self) -> &str {
        self.path_params_payload.as_deref().unwrap_or(&self.payload)
    }
    #[must_use]
    pub const fn replace_ref_data(&self) -> bool {
        self.replace_ref_data
    }
    #[must_use]
    pub const fn replace_url_params(&self) -> bool {
        self.replace_url_params
    }
    #[must_use]
    pub const fn add_user_headers(&self) -> bool {
        self.add_user_headers
    }
    #[must_use]
    pub const fn valid_json(&self) -> bool {
        self.valid_json
    }
    #[must_use]
    pub const fn skipped_headers(&self) -> &BTreeSet<String> {
        &self.skipped_headers
    }
    #[must_use]
    pub const fn tested_fields(&self) -> &BTreeSet<String> {
        &self.tested_fields
    }
    #[must_use]
    pub const fn fuzzed_headers(&self) -> &BTreeSet<String> {
        &self.fuzzed_headers
    }
    #[must_use]
    pub const fn path_params(&self) -> &BTreeSet<String> {
        &self.path_params
    }
    #[must_use]
    pub const fn query_params(&self) -> &BTreeSet<String> {
        &self.query_params
    }

    /// Whether `name` is one of the headers being fuzzed (case-insensitive).
    #[must_use]
    pub fn is_fuzzed_header(&self, name: &str) -> bool {
        self.fuzzed_headers.iter().any(|h| h.eq_ignore_ascii_case(name))
    }

    /// Whether `name` must be stripped before sending (case-insensitive).
    #[must_use]
    pub fn is_skipped_header(&self, name: &str) -> bool {
        self.skipped_headers.iter().any(|h| h.eq_ignore_ascii_case(name))
    }
}

/// Builder for [`ServiceData`]. Headers are copied in, never shared.
#[derive(Debug, Clone)]
pub struct ServiceDataBuilder {
    data: ServiceData,
}

impl ServiceDataBuilder {
    #[must_use]
    pub fn test_id(mut self, id: impl Into<String>) -> Self {
        self.data.test_id = id.into();
        self
    }
    #[must_use]
    pub const fn method(mut self, method: HttpMethod) -> Self {
        self.data.method = method;
        self
    }
    #[must_use]
    pub fn relative_path(mut self, path: impl Into<String>) -> Self {
        self.data.relative_path = path.into();
        self
    }
    #[must_use]
    pub fn headers(mut self, headers: &[Header]) -> Self {
        self.data.headers = headers.to_vec();
        self
    }
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.headers.push(Header::new(name, value));
        self
    }
    #[must_use]
    pub fn payload(mut self, payload: impl Into<String>) -> Self {
        self.data.payload = payload.into();
        self
    }
    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.data.content_type = content_type.into();
        self
    }
    #[must_use]
    pub fn path_params_payload(mut self, payload: impl Into<String>) -> Self {
        self.data.path_params_payload = Some(payload.into());
        self
    }
    #[must_use]
    pub const fn replace_ref_data(mut self, on: bool) -> Self {
        self.data.replace_ref_data = on;
        self
    }
    #[must_use]
    pub const fn replace_url_params(mut self, on: bool) -> Self {
        self.data.replace_url_params = on;
        self
    }
    #[must_use]
    pub const fn add_user_headers(mut self, on: bool) -> Self {
        self.data.add_user_headers = on;
        self
    }
    #[must_use]
    pub const fn valid_json(mut self, on: bool) -> Self {
        self.data.valid_json = on;
        self
    }
    #[must_use]
    pub fn skipped_headers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data.skipped_headers.extend(names.into_iter().map(Into::into));
        self
    }
    #[must_use]
    pub fn tested_fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data.tested_fields.extend(names.into_iter().map(Into::into));
        self
    }
    #[must_use]
    pub fn fuzzed_headers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data.fuzzed_headers.extend(names.into_iter().map(Into::into));
        self
    }
    #[must_use]
    pub fn path_params<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data.path_params.extend(names.into_iter().map(Into::into));
        self
    }
    #[must_use]
    pub fn query_params<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data.query_params.extend(names.into_iter().map(Into::into));
        self
    }
    #[must_use]
    pub fn build(self) -> ServiceData {
        self.data
    }
}

// ── Wire records ──

/// The request as sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<Header>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,
}

/// Reserved transport-failure codes. Each maps to one fixed code in 900–999.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransportFailure {
    EmptyReply,
    ConnectionRefused,
    ReadTimeout,
    ConnectTimeout,
    ProtocolError,
    ConnectionReset,
    RedirectLoop,
    Other,
}

impl TransportFailure {
    pub const ALL: [Self; 8] = [
        Self::EmptyReply,
        Self::ConnectionRefused,
        Self::ReadTimeout,
        Self::ConnectTimeout,
        Self::ProtocolError,
        Self::ConnectionReset,
        Self::RedirectLoop,
        Self::Other,
    ];

    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::EmptyReply => 952,
            Self::ConnectionRefused => 953,
            Self::ReadTimeout => 954,
            Self::ConnectTimeout => 956,
            Self::ProtocolError => 957,
            Self::ConnectionReset => 958,
            Self::RedirectLoop => 959,
            Self::Other => 999,
        }
    }

    /// Fixed phrase that always appears in the synthetic body.
    #[must_use]
    pub const fn phrase(self) -> &'static str {
        match self {
            Self::EmptyReply => "empty reply from server",
            Self::ConnectionRefused => "connection refused",
            Self::ReadTimeout => "read timeout",
            Self::ConnectTimeout => "connect timeout",
            Self::ProtocolError => "protocol error",
            Self::ConnectionReset => "connection reset",
            Self::RedirectLoop => "too many redirects",
            Self::Other => "transport failure",
        }
    }

    #[must_use]
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.code() == code)
    }
}

impl std::fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.phrase())
    }
}

/// The response as received, or a synthetic stand-in for a transport failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HttpResponse {
    pub status_code: u16,
    pub headers: Vec<Header>,
    pub body: String,
    /// Body as JSON; non-JSON bodies are wrapped as `{"notAJson": body}`
    pub json_body: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub response_time_ms: u64,
    pub content_length_bytes: usize,
    pub words: usize,
    pub lines: usize,
}

impl HttpResponse {
    /// Build a response record, deriving body metrics and the JSON view.
    #[must_use]
    pub fn new(
        status_code: u16,
        headers: Vec<Header>,
        body: String,
        response_time_ms: u64,
    ) -> Self {
        let content_type = find_header(&headers, "content-type").map(|h| h.value.clone());
        let json_body = json_view(&body);
        Self {
            status_code,
            content_length_bytes: body.len(),
            words: body.split_whitespace().count(),
            lines: body.lines().count(),
            headers,
            body,
            json_body,
            content_type,
            response_time_ms,
        }
    }

    /// Synthetic response for a transport failure. `detail` is appended to the fixed phrase.
    #[must_use]
    pub fn transport_failure(failure: TransportFailure, detail: &str, response_time_ms: u64) -> Self {
        let message = if detail.is_empty() {
            failure.phrase().to_string()
        } else {
            format!("{}: {detail}", failure.phrase())
        };
        let body = serde_json::json!({
            "negfuzzError": message,
            "code": failure.code(),
        })
        .to_string();
        Self::new(
            failure.code(),
            vec![Header::new("Content-Type", APPLICATION_JSON)],
            body,
            response_time_ms,
        )
    }

    #[must_use]
    pub const fn is_synthetic(&self) -> bool {
        crate::codes::is_synthetic(self.status_code)
    }

    #[must_use]
    pub fn transport_failure_kind(&self) -> Option<TransportFailure> {
        TransportFailure::from_code(self.status_code)
    }

    #[must_use]
    pub fn matches(&self, family: &ResponseCodeFamily) -> bool {
        family.matches(self.status_code)
    }
}

/// JSON view of a body: parsed JSON, or `{"notAJson": body}`.
#[must_use]
pub fn json_view(body: &str) -> Value {
    if body.trim().is_empty() {
        return serde_json::json!({});
    }
    serde_json::from_str(body).unwrap_or_else(|_| serde_json::json!({ "notAJson": body }))
}
