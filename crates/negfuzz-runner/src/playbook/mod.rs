//! Playbooks: declarative test generators
//!
//! A playbook is a configuration record, not code. Field, header and body
//! playbooks state what to send and which response codes to expect, and hand
//! the iteration to the matching executor. Stateful playbooks run after every
//! ordinary playbook has finished, since they consume correlation state the
//! ordinary ones produce. The continuous random loop lives in [`random`].

pub mod catalog;
pub mod random;
pub mod stateful;
pub mod values;

use serde_json::Value;

use negfuzz_core::codes::ResponseCodeFamily;
use negfuzz_core::http::{APPLICATION_JSON, HttpMethod};
use negfuzz_core::operation::{FieldInfo, FieldType, HeaderInfo, OperationData};
use negfuzz_core::report::FieldExpectations;
use negfuzz_core::strategy::FuzzingStrategy;

use crate::executor::{
    ExecutionContext, FieldFuzzing, HeaderFuzzing, SimpleRequest, Variant, execute_fields,
    execute_headers, execute_simple,
};

pub use random::{RandomPlaybook, RandomRun, StopConditions};
pub use stateful::StatefulCheck;

/// What a playbook targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Field,
    Header,
    Body,
    Stateful,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Field => "field",
            Self::Header => "header",
            Self::Body => "body",
            Self::Stateful => "stateful",
        })
    }
}

// ── Field playbooks ──

/// Where a field playbook gets its fuzz values.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueSource {
    /// The same strategies for every field
    Fixed(Vec<FuzzingStrategy>),
    /// Values of another JSON type than the field's
    TypeConfusion,
    /// Limits for the field's type
    Boundaries,
    /// One character past the declared maximum length
    OverMaxLength,
    /// Leave the field out
    Remove,
}

#[derive(Debug, Clone)]
pub struct FieldPlaybook {
    pub name: &'static str,
    /// Scenario prefix, completed with the field path
    pub description: &'static str,
    pub expectations: FieldExpectations,
    pub values: ValueSource,
    /// Field types the playbook applies to; empty means all
    pub field_types: Vec<FieldType>,
    /// Skip objects and arrays
    pub primitives_only: bool,
    pub skip_methods: Vec<HttpMethod>,
}

impl FieldFuzzing for FieldPlaybook {
    fn name(&self) -> &str {
        self.name
    }

    fn scenario(&self, field: &FieldInfo) -> String {
        format!("{} in field '{}'", self.description, field.path)
    }

    fn expectations(&self) -> &FieldExpectations {
        &self.expectations
    }

    fn applies_to(&self, field: &FieldInfo) -> bool {
        self.field_types.is_empty() || self.field_types.contains(&field.field_type)
    }

    fn variants(&self, field: &FieldInfo) -> Vec<Variant> {
        let replace_all = |values: Vec<Value>| -> Vec<Variant> {
            values
                .into_iter()
                .map(|v| Variant::Strategy(FuzzingStrategy::replace(v)))
                .collect()
        };
        match &self.values {
            ValueSource::Fixed(strategies) => strategies.iter().cloned().map(Variant::from).collect(),
            ValueSource::TypeConfusion => replace_all(values::type_confusion(field.field_type)),
            ValueSource::Boundaries => replace_all(values::boundaries(field.field_type)),
            ValueSource::OverMaxLength => replace_all(values::over_max_length(field).into_iter().collect()),
            ValueSource::Remove => vec![Variant::Remove],
        }
    }

    fn primitives_only(&self) -> bool {
        self.primitives_only
    }
}

// ── Header playbooks ──

#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValues {
    Fixed(Vec<FuzzingStrategy>),
    Remove,
}

#[derive(Debug, Clone)]
pub struct HeaderPlaybook {
    pub name: &'static str,
    pub description: &'static str,
    pub required_expected: ResponseCodeFamily,
    pub optional_expected: ResponseCodeFamily,
    pub values: HeaderValues,
    pub skip_methods: Vec<HttpMethod>,
}

impl HeaderFuzzing for HeaderPlaybook {
    fn name(&self) -> &str {
        self.name
    }

    fn scenario(&self, header: &HeaderInfo) -> String {
        format!("{} in header '{}'", self.description, header.name)
    }

    fn expected(&self, header: &HeaderInfo) -> &ResponseCodeFamily {
        if header.required {
            &self.required_expected
        } else {
            &self.optional_expected
        }
    }

    fn variants(&self, _header: &HeaderInfo) -> Vec<Variant> {
        match &self.values {
            HeaderValues::Fixed(strategies) => strategies.iter().cloned().map(Variant::from).collect(),
            HeaderValues::Remove => vec![Variant::Remove],
        }
    }
}

// ── Body playbooks ──

/// The whole request body a body playbook sends.
#[derive(Debug, Clone, PartialEq)]
pub enum BodySource {
    /// A JSON document, subject to reference data
    Json(&'static str),
    /// Bytes sent exactly as given
    Raw(&'static str),
    /// The example payload cut in half
    TruncatedExample,
    /// The example payload wrapped in a JSON array
    ExampleInArray,
    /// The example payload unchanged
    Example,
}

impl BodySource {
    /// Body text and whether it must go out verbatim.
    #[must_use]
    pub fn render(&self, example: &str) -> (String, bool) {
        match self {
            Self::Json(json) => ((*json).to_string(), true),
            Self::Raw(raw) => ((*raw).to_string(), false),
            Self::TruncatedExample => {
                let cut = example
                    .char_indices()
                    .nth(example.chars().count() / 2)
                    .map_or(example.len(), |(i, _)| i);
                (example[..cut].to_string(), false)
            }
            Self::ExampleInArray => (format!("[{example}]"), true),
            Self::Example => (example.to_string(), true),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BodyPlaybook {
    pub name: &'static str,
    pub description: &'static str,
    pub expected: ResponseCodeFamily,
    pub body: BodySource,
    /// Content type sent instead of the operation's
    pub content_type: Option<&'static str>,
    pub skip_methods: Vec<HttpMethod>,
}

impl BodyPlaybook {
    /// One test for `op`.
    pub fn run(&self, ctx: &ExecutionContext, op: &OperationData) {
        let (body, valid_json) = self.body.render(&op.payload);
        let mut request = SimpleRequest::new(self.name, self.description, self.expected.clone());
        request = if valid_json {
            request.payload(body)
        } else {
            request.raw_payload(body)
        };
        if let Some(content_type) = self.content_type {
            request = request.content_type(content_type);
        }
        execute_simple(ctx, op, &request);
    }
}

// ── Stateful playbooks ──

#[derive(Debug, Clone)]
pub struct StatefulPlaybook {
    pub name: &'static str,
    pub description: &'static str,
    pub expected: ResponseCodeFamily,
    pub check: StatefulCheck,
}

// ── Playbook ──

#[derive(Debug, Clone)]
pub enum Playbook {
    Field(FieldPlaybook),
    Header(HeaderPlaybook),
    Body(BodyPlaybook),
    Stateful(StatefulPlaybook),
}

impl Playbook {
    #[must_use]
    pub const fn capability(&self) -> Capability {
        match self {
            Self::Field(_) => Capability::Field,
            Self::Header(_) => Capability::Header,
            Self::Body(_) => Capability::Body,
            Self::Stateful(_) => Capability::Stateful,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Field(p) => p.name,
            Self::Header(p) => p.name,
            Self::Body(p) => p.name,
            Self::Stateful(p) => p.name,
        }
    }

    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Field(p) => p.description,
            Self::Header(p) => p.description,
            Self::Body(p) => p.description,
            Self::Stateful(p) => p.description,
        }
    }

    /// Whether the playbook has anything to do for `op`.
    #[must_use]
    pub fn applies_to(&self, op: &OperationData) -> bool {
        match self {
            Self::Field(p) => !p.skip_methods.contains(&op.method) && !op.fields.is_empty(),
            Self::Header(p) => !p.skip_methods.contains(&op.method) && !op.headers.is_empty(),
            Self::Body(p) => {
                op.method.has_body()
                    && !p.skip_methods.contains(&op.method)
                    && (p.content_type.is_some() || op.content_type.starts_with(APPLICATION_JSON))
            }
            Self::Stateful(p) => p.check.applies_to(op),
        }
    }

    /// Run every test of this playbook against `op`.
    pub fn run(&self, ctx: &ExecutionContext, op: &OperationData) {
        if !self.applies_to(op) {
            return;
        }
        match self {
            Self::Field(p) => execute_fields(ctx, op, p),
            Self::Header(p) => execute_headers(ctx, op, p),
            Self::Body(p) => p.run(ctx, op),
            Self::Stateful(p) => stateful::run(ctx, op, p),
        }
    }
}

// ── Registry ──

/// Ordered list of playbooks to run.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    playbooks: Vec<Playbook>,
}

impl Registry {
    #[must_use]
    pub const fn new(playbooks: Vec<Playbook>) -> Self {
        Self { playbooks }
    }

    /// Every built-in playbook.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(catalog::all())
    }

    /// Built-in playbooks narrowed by the `playbooks` / `skip_playbooks` lists.
    ///
    /// # Errors
    ///
    /// Returns error if either list names an unknown playbook.
    pub fn from_selection(only: &[String], skip: &[String]) -> Result<Self, PlaybookError> {
        let registry = Self::builtin();
        for name in only.iter().chain(skip) {
            if registry.get(name).is_none() {
                return Err(PlaybookError::UnknownPlaybook(name.clone()));
            }
        }
        let playbooks = registry
            .playbooks
            .into_iter()
            .filter(|p| only.is_empty() || only.iter().any(|n| n == p.name()))
            .filter(|p| !skip.iter().any(|n| n == p.name()))
            .collect();
        Ok(Self::new(playbooks))
    }

    pub fn push(&mut self, playbook: Playbook) {
        self.playbooks.push(playbook);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Playbook> {
        self.playbooks.iter().find(|p| p.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Playbook> {
        self.playbooks.iter()
    }

    /// Playbooks of the first phase.
    pub fn ordinary(&self) -> impl Iterator<Item = &Playbook> {
        self.iter().filter(|p| p.capability() != Capability::Stateful)
    }

    /// Playbooks of the second phase.
    pub fn stateful(&self) -> impl Iterator<Item = &Playbook> {
        self.iter().filter(|p| p.capability() == Capability::Stateful)
    }

    pub fn by_capability(&self, capability: Capability) -> impl Iterator<Item = &Playbook> {
        self.iter().filter(move |p| p.capability() == capability)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.playbooks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.playbooks.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlaybookError {
    #[error("Unknown playbook '{0}'")]
    UnknownPlaybook(String),
    #[error("Random playbook needs at least one stop condition (max_tests, max_errors or max_duration_secs)")]
    NoStopCondition,
    #[error("Random playbook has no mutators")]
    NoMutators,
    #[error("Invalid match pattern: {0}")]
    InvalidMatcher(#[from] regex::Error),
}
