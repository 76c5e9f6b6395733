//! Report module - outcomes, result records, classification, and run summary

mod classify;
mod outcome;
mod result;
mod summary;

pub use classify::{
    Classification, ExpectationKind, FieldExpectations, classify, violates_pattern,
};
pub use outcome::Outcome;
pub use result::{ResponseSnapshot, SkipReason, TestCaseResult};
pub use summary::{RunSummary, Verdict, VerdictStatus};

use parking_lot::Mutex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Everything a run produced
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RunReport {
    pub summary: RunSummary,
    pub results: Vec<TestCaseResult>,
}

impl RunReport {
    #[must_use]
    pub fn new(results: Vec<TestCaseResult>) -> Self {
        Self {
            summary: RunSummary::from_results(&results),
            results,
        }
    }
}

/// JSON Schema of [`RunReport`].
///
/// # Errors
///
/// Returns error if the schema cannot be serialized
pub fn generate_schema() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&schemars::schema_for!(RunReport))
}

/// JSON Schema of [`crate::DryRunPlan`].
///
/// # Errors
///
/// Returns error if the schema cannot be serialized
pub fn generate_dry_run_schema() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&schemars::schema_for!(crate::DryRunPlan))
}

/// Sink for test case results. Shared by every worker.
pub trait Reporter: Send + Sync {
    fn report(&self, result: TestCaseResult);
}

/// Keeps every result in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    results: Mutex<Vec<TestCaseResult>>,
}

impl MemoryReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn results(&self) -> Vec<TestCaseResult> {
        self.results.lock().clone()
    }

    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary::from_results(&self.results.lock())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.lock().is_empty()
    }
}

impl Reporter for MemoryReporter {
    fn report(&self, result: TestCaseResult) {
        self.results.lock().push(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;

    #[test]
    fn memory_reporter_collects_and_summarizes() {
        let reporter = MemoryReporter::new();
        assert!(reporter.is_empty());
        reporter.report(TestCaseResult::new(
            "1", "p", "s", "/a", HttpMethod::Get, Outcome::Success, "ok",
        ));
        reporter.report(TestCaseResult::skipped(
            "2", "p", "s", "/a", HttpMethod::Get, SkipReason::NoFuzzValues,
        ));
        assert_eq!(reporter.len(), 2);
        let summary = reporter.summary();
        assert_eq!(summary.success, 1);
        assert_eq!(summary.skipped, 1);

        let report = RunReport::new(reporter.results());
        assert_eq!(report.summary.total, 2);
    }

    #[test]
    fn schemas_have_titles() {
        let parsed: serde_json::Value = serde_json::from_str(&generate_schema().unwrap()).unwrap();
        assert_eq!(parsed.get("title").and_then(|v| v.as_str()), Some("RunReport"));
        let parsed: serde_json::Value =
            serde_json::from_str(&generate_dry_run_schema().unwrap()).unwrap();
        assert_eq!(parsed.get("title").and_then(|v| v.as_str()), Some("DryRunPlan"));
    }
}
