//! Already-walked contract metadata for one (path, method)
//!
//! A contract walker produces one [`OperationData`] per operation; executors
//! only ever read it.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::codes::ResponseCodeFamily;
use crate::http::{APPLICATION_JSON, HttpMethod};

/// Schema type of a field or header, as declared in the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl FieldType {
    /// Primitive fields can be fuzzed by value; objects and arrays cannot.
    #[must_use]
    pub const fn is_primitive(self) -> bool {
        !matches!(self, Self::Object | Self::Array)
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    /// Field path, e.g. `address#street` or `items[*].name`
    pub path: String,
    #[serde(default, rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    /// Value pattern (regex) the contract declares
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default)]
    pub discriminator: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

impl FieldInfo {
    #[must_use]
    pub fn new(path: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            path: path.into(),
            field_type,
            required: false,
            pattern: None,
            discriminator: false,
            max_length: None,
        }
    }

    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    #[must_use]
    pub const fn discriminator(mut self) -> Self {
        self.discriminator = true;
        self
    }

    #[must_use]
    pub const fn with_max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderInfo {
    pub name: String,
    #[serde(default, rename = "type")]
    pub header_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub example: String,
}

impl HeaderInfo {
    #[must_use]
    pub fn new(name: impl Into<String>, example: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            header_type: FieldType::String,
            required: false,
            example: example.into(),
        }
    }

    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Everything the engine needs to know about one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationData {
    /// Contract path template, e.g. `/pets/{id}`
    pub path: String,
    pub method: HttpMethod,
    /// Example payload as a JSON string
    #[serde(default)]
    pub payload: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default)]
    pub fields: Vec<FieldInfo>,
    #[serde(default)]
    pub headers: Vec<HeaderInfo>,
    #[serde(default)]
    pub query_params: BTreeSet<String>,
    #[serde(default)]
    pub path_params: BTreeSet<String>,
    /// Response code labels the contract documents (`"200"`, `"4XX"`, `"default"`)
    #[serde(default)]
    pub response_codes: Vec<String>,
}

fn default_content_type() -> String {
    APPLICATION_JSON.to_string()
}

impl OperationData {
    #[must_use]
    pub fn new(path: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            path: path.into(),
            method,
            payload: String::new(),
            content_type: default_content_type(),
            fields: Vec::new(),
            headers: Vec::new(),
            query_params: BTreeSet::new(),
            path_params: BTreeSet::new(),
            response_codes: Vec::new(),
        }
    }

    /// Label like `POST /pets`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    #[must_use]
    pub fn field(&self, path: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.path == path)
    }

    /// Whether the contract documents `code` for this operation.
    #[must_use]
    pub fn documents(&self, code: u16) -> bool {
        self.response_codes
            .iter()
            .any(|label| ResponseCodeFamily::label_covers(label, code))
    }

    /// Path parameter names appearing as `{name}` segments in the template.
    #[must_use]
    pub fn template_params(&self) -> Vec<String> {
        template_params(&self.path)
    }
}

/// `{name}` placeholders in a path template, in order.
#[must_use]
pub fn template_params(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = path;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        out.push(rest[open + 1..open + close].to_string());
        rest = &rest[open + close + 1..];
    }
    out
}
