//! Single-request executor

use negfuzz_core::codes::ResponseCodeFamily;
use negfuzz_core::http::{Header, HttpMethod};
use negfuzz_core::operation::OperationData;

use super::{Dispatch, ExecutionContext, service_data};

/// One request built from the operation, with optional overrides.
#[derive(Debug, Clone)]
pub struct SimpleRequest {
    pub playbook: String,
    pub scenario: String,
    pub expected: ResponseCodeFamily,
    pub payload: Option<String>,
    pub headers: Option<Vec<Header>>,
    pub method: Option<HttpMethod>,
    pub relative_path: Option<String>,
    pub content_type: Option<String>,
    pub valid_json: bool,
    pub replace_ref_data: bool,
    pub add_user_headers: bool,
    pub skipped_headers: Vec<String>,
}

impl SimpleRequest {
    #[must_use]
    pub fn new(
        playbook: impl Into<String>,
        scenario: impl Into<String>,
        expected: ResponseCodeFamily,
    ) -> Self {
        Self {
            playbook: playbook.into(),
            scenario: scenario.into(),
            expected,
            payload: None,
            headers: None,
            method: None,
            relative_path: None,
            content_type: None,
            valid_json: true,
            replace_ref_data: true,
            add_user_headers: true,
            skipped_headers: Vec::new(),
        }
    }

    #[must_use]
    pub fn payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Payload that must be sent exactly as given.
    #[must_use]
    pub fn raw_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self.valid_json = false;
        self
    }

    #[must_use]
    pub fn headers(mut self, headers: Vec<Header>) -> Self {
        self.headers = Some(headers);
        self
    }

    #[must_use]
    pub const fn method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
        self
    }

    /// Concrete path to request instead of the operation's template.
    #[must_use]
    pub fn relative_path(mut self, path: impl Into<String>) -> Self {
        self.relative_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    #[must_use]
    pub const fn replace_ref_data(mut self, on: bool) -> Self {
        self.replace_ref_data = on;
        self
    }

    #[must_use]
    pub const fn add_user_headers(mut self, on: bool) -> Self {
        self.add_user_headers = on;
        self
    }

    #[must_use]
    pub fn skip_header(mut self, name: impl Into<String>) -> Self {
        self.skipped_headers.push(name.into());
        self
    }
}

/// Run `request` against `op` as one test case.
pub fn execute_simple(ctx: &ExecutionContext, op: &OperationData, request: &SimpleRequest) {
    let mut case = ctx.test_case(&request.playbook, request.scenario.clone(), op);
    if let Some(method) = request.method {
        case.method = method;
    }
    ctx.run_test_case(&case, || {
        let mut builder = service_data(op, &case)
            .valid_json(request.valid_json)
            .replace_ref_data(request.replace_ref_data)
            .add_user_headers(request.add_user_headers)
            .skipped_headers(request.skipped_headers.iter().cloned());
        if let Some(payload) = &request.payload {
            builder = builder.payload(payload.clone());
        }
        if let Some(headers) = &request.headers {
            builder = builder.headers(headers);
        }
        if let Some(method) = request.method {
            builder = builder.method(method);
        }
        if let Some(path) = &request.relative_path {
            builder = builder.relative_path(path.clone());
        }
        if let Some(content_type) = &request.content_type {
            builder = builder.content_type(content_type.clone());
        }
        let data = builder.build();
        match ctx.dispatch(&case, &data)? {
            Dispatch::Planned => Ok(None),
            Dispatch::Sent(exchange) => Ok(Some(case.judge(op, exchange, &request.expected))),
        }
    });
}
