//! Executors: the select → check → mutate → call → classify → report protocol
//!
//! [`simple`] runs one request, [`fields`] iterates the operation's fields and
//! [`headers`] its headers. All of them go through [`ExecutionContext`], which
//! owns the caller, the reporter and the dry-run switch, and converts any
//! executor error into a reported error result.

pub mod fields;
pub mod headers;
pub mod simple;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use negfuzz_core::codes::ResponseCodeFamily;
use negfuzz_core::context::GlobalContext;
use negfuzz_core::dryrun::DryRunRecorder;
use negfuzz_core::http::{Header, HttpMethod, ServiceData, ServiceDataBuilder};
use negfuzz_core::mutation::MutationError;
use negfuzz_core::operation::OperationData;
use negfuzz_core::refdata::PathValues;
use negfuzz_core::report::{Outcome, Reporter, SkipReason, TestCaseResult, classify};
use negfuzz_core::strategy::FuzzingStrategy;

use crate::caller::{Caller, CallerError, Exchange};

pub use fields::{FieldFuzzing, execute_fields};
pub use headers::{HeaderFuzzing, execute_headers};
pub use simple::{SimpleRequest, execute_simple};

/// One way of fuzzing a target.
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    /// Apply a strategy to the target's current value
    Strategy(FuzzingStrategy),
    /// Leave the target out of the request
    Remove,
}

impl Variant {
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Strategy(s) => s.to_string(),
            Self::Remove => "REMOVE".to_string(),
        }
    }
}

impl From<FuzzingStrategy> for Variant {
    fn from(strategy: FuzzingStrategy) -> Self {
        Self::Strategy(strategy)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Caller(#[from] CallerError),
    #[error(transparent)]
    Mutation(#[from] MutationError),
}

/// What happened at the dispatch boundary.
#[derive(Debug)]
pub enum Dispatch {
    Sent(Exchange),
    /// Dry run: the test was counted, nothing was sent
    Planned,
}

/// Identity of one test case.
#[derive(Debug, Clone)]
pub struct TestCase {
    pub id: String,
    pub playbook: String,
    pub scenario: String,
    pub path: String,
    pub method: HttpMethod,
}

impl TestCase {
    #[must_use]
    pub fn skipped(&self, reason: SkipReason) -> TestCaseResult {
        TestCaseResult::skipped(
            self.id.clone(),
            self.playbook.clone(),
            self.scenario.clone(),
            self.path.clone(),
            self.method,
            reason,
        )
    }

    #[must_use]
    pub fn result(&self, outcome: Outcome, reason: impl Into<String>) -> TestCaseResult {
        TestCaseResult::new(
            self.id.clone(),
            self.playbook.clone(),
            self.scenario.clone(),
            self.path.clone(),
            self.method,
            outcome,
            reason,
        )
    }

    /// Classify `exchange` against `expected` and build the result.
    #[must_use]
    pub fn judge(
        &self,
        op: &OperationData,
        exchange: Exchange,
        expected: &ResponseCodeFamily,
    ) -> TestCaseResult {
        let verdict = classify(&exchange.response, expected, &op.response_codes);
        self.result(verdict.outcome, verdict.reason)
            .with_expected(expected.to_string())
            .with_exchange(exchange.request, &exchange.response)
    }
}

/// Shared state for running test cases. One per run, shared by all workers.
pub struct ExecutionContext {
    caller: Arc<dyn Caller>,
    reporter: Arc<dyn Reporter>,
    global: Arc<GlobalContext>,
    dry_run: Option<Arc<DryRunRecorder>>,
    ref_data: PathValues,
    skip_fields: BTreeSet<String>,
    skip_headers: BTreeSet<String>,
    next_id: AtomicU64,
}

impl ExecutionContext {
    #[must_use]
    pub fn new(
        caller: Arc<dyn Caller>,
        reporter: Arc<dyn Reporter>,
        global: Arc<GlobalContext>,
    ) -> Self {
        Self {
            caller,
            reporter,
            global,
            dry_run: None,
            ref_data: PathValues::default(),
            skip_fields: BTreeSet::new(),
            skip_headers: BTreeSet::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Count tests into `recorder` instead of sending them.
    #[must_use]
    pub fn with_dry_run(mut self, recorder: Arc<DryRunRecorder>) -> Self {
        self.dry_run = Some(recorder);
        self
    }

    /// Reference data used to decide which fields are pinned.
    #[must_use]
    pub fn with_ref_data(mut self, ref_data: PathValues) -> Self {
        self.ref_data = ref_data;
        self
    }

    #[must_use]
    pub fn with_skip_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_skip_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_headers = headers
            .into_iter()
            .map(|h| h.into().to_ascii_lowercase())
            .collect();
        self
    }

    #[must_use]
    pub fn caller(&self) -> &dyn Caller {
        self.caller.as_ref()
    }

    #[must_use]
    pub fn global(&self) -> &GlobalContext {
        &self.global
    }

    #[must_use]
    pub const fn is_dry_run(&self) -> bool {
        self.dry_run.is_some()
    }

    #[must_use]
    pub const fn ref_data(&self) -> &PathValues {
        &self.ref_data
    }

    /// Whether `field` (full path or leaf name) is configured to be skipped.
    #[must_use]
    pub fn is_skipped_field(&self, path: &str, leaf: Option<&str>) -> bool {
        self.skip_fields.contains(path) || leaf.is_some_and(|l| self.skip_fields.contains(l))
    }

    #[must_use]
    pub fn is_skipped_header(&self, name: &str) -> bool {
        self.skip_headers.contains(&name.to_ascii_lowercase())
    }

    /// Allocate a test case identity.
    #[must_use]
    pub fn test_case(
        &self,
        playbook: &str,
        scenario: impl Into<String>,
        op: &OperationData,
    ) -> TestCase {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        TestCase {
            id: format!("Test {n}"),
            playbook: playbook.to_string(),
            scenario: scenario.into(),
            path: op.path.clone(),
            method: op.method,
        }
    }

    /// Send `data`, or count it when this is a dry run.
    ///
    /// # Errors
    ///
    /// Returns error if the caller cannot build or send the request.
    pub fn dispatch(&self, case: &TestCase, data: &ServiceData) -> Result<Dispatch, ExecutorError> {
        if let Some(recorder) = &self.dry_run {
            recorder.record(&case.path, case.method, &case.playbook);
            return Ok(Dispatch::Planned);
        }
        Ok(Dispatch::Sent(self.caller.call(data)?))
    }

    pub fn report(&self, result: TestCaseResult) {
        debug!(
            id = %result.id,
            playbook = %result.playbook,
            outcome = %result.outcome,
            reason = %result.reason,
            "test case finished"
        );
        self.reporter.report(result);
    }

    /// Run one test case inside the error boundary.
    ///
    /// `body` returns the result to report, or `None` when nothing should be
    /// reported (dry run). An error becomes an error result; it never
    /// propagates. Returns the reported outcome.
    pub fn run_test_case(
        &self,
        case: &TestCase,
        body: impl FnOnce() -> Result<Option<TestCaseResult>, ExecutorError>,
    ) -> Option<Outcome> {
        let result = match body() {
            Ok(Some(result)) => result,
            Ok(None) => return None,
            Err(e) => case.result(Outcome::Error, format!("unexpected exception: {e}")),
        };
        let outcome = result.outcome;
        self.report(result);
        Some(outcome)
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("base_url", &self.caller.base_url())
            .field("dry_run", &self.is_dry_run())
            .finish_non_exhaustive()
    }
}

/// Request intent for `op` with its example payload and headers.
#[must_use]
pub fn service_data(op: &OperationData, case: &TestCase) -> ServiceDataBuilder {
    let headers: Vec<Header> = op
        .headers
        .iter()
        .map(|h| Header::new(h.name.clone(), h.example.clone()))
        .collect();
    ServiceData::builder(op.path.clone(), op.method)
        .test_id(case.id.clone())
        .headers(&headers)
        .payload(op.payload.clone())
        .content_type(op.content_type.clone())
        .query_params(op.query_params.iter().cloned())
        .path_params(op.path_params.iter().cloned())
}


#[cfg(test)]
mod tests {
    use super::testing::{FakeCaller, context};
    use super::*;

    #[test]
    fn errors_become_error_results() {
        let (ctx, reporter) = context(Arc::new(FakeCaller::answering(200)));
        let op = OperationData::new("/pets", HttpMethod::Post);
        let case = ctx.test_case("Boom", "fails", &op);
        ctx.run_test_case(&case, || {
            Err(MutationError::FieldNotFound("name".into()).into())
        });
        let results = reporter.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].outcome, Outcome::Error);
        assert!(results[0].reason.starts_with("unexpected exception:"));
    }

    #[test]
    fn ids_are_unique() {
        let (ctx, _) = context(Arc::new(FakeCaller::answering(200)));
        let op = OperationData::new("/pets", HttpMethod::Get);
        let a = ctx.test_case("P", "s", &op);
        let b = ctx.test_case("P", "s", &op);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn dry_run_dispatch_sends_nothing() {
        let caller = Arc::new(FakeCaller::answering(200));
        let recorder = Arc::new(DryRunRecorder::new());
        let (ctx, _) = context(caller.clone());
        let ctx = ctx.with_dry_run(recorder.clone());
        let op = OperationData::new("/pets", HttpMethod::Get);
        let case = ctx.test_case("P", "s", &op);
        let data = service_data(&op, &case).build();
        assert!(matches!(ctx.dispatch(&case, &data).unwrap(), Dispatch::Planned));
        assert!(caller.sent().is_empty());
        assert_eq!(recorder.total(), 1);
    }

    #[test]
    fn skip_lists() {
        let (ctx, _) = context(Arc::new(FakeCaller::answering(200)));
        let ctx = ctx.with_skip_fields(["id"]).with_skip_headers(["X-Trace"]);
        assert!(ctx.is_skipped_field("owner#id", Some("id")));
        assert!(!ctx.is_skipped_field("name", Some("name")));
        assert!(ctx.is_skipped_header("x-trace"));
    }
}
