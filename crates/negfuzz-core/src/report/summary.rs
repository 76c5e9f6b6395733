//! Run summary: outcome counts and the final pass/fail verdict

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{Outcome, TestCaseResult};

/// Counts per outcome
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RunSummary {
    pub total: u64,
    pub success: u64,
    pub warnings: u64,
    pub errors: u64,
    pub skipped: u64,
}

impl RunSummary {
    #[must_use]
    pub fn from_results(results: &[TestCaseResult]) -> Self {
        let mut summary = Self::default();
        for r in results {
            summary.record(r.outcome);
        }
        summary
    }

    pub fn record(&mut self, outcome: Outcome) {
        self.total += 1;
        match outcome {
            Outcome::Success => self.success += 1,
            Outcome::Warning => self.warnings += 1,
            Outcome::Error => self.errors += 1,
            Outcome::Skipped => self.skipped += 1,
        }
    }

    /// Worst outcome seen, `None` for an empty run.
    #[must_use]
    pub const fn worst(&self) -> Option<Outcome> {
        if self.errors > 0 {
            Some(Outcome::Error)
        } else if self.warnings > 0 {
            Some(Outcome::Warning)
        } else if self.success > 0 {
            Some(Outcome::Success)
        } else if self.skipped > 0 {
            Some(Outcome::Skipped)
        } else {
            None
        }
    }

    /// Highest exit code among all outcomes
    #[must_use]
    pub fn exit_code(&self, strict: bool) -> i32 {
        self.worst().map_or(0, |o| o.exit_code(strict))
    }

    /// Determine verdict.
    ///
    /// PASS requires at least one executed test and no outcome that fails the
    /// run under `strict`.
    #[must_use]
    pub fn verdict(&self, strict: bool) -> Verdict {
        let exit_code = self.exit_code(strict);
        let executed = self.total - self.skipped;

        let status = if executed > 0 && exit_code == 0 {
            VerdictStatus::Pass
        } else {
            VerdictStatus::Fail
        };

        let reason = if executed == 0 {
            "No tests were executed".to_string()
        } else if status == VerdictStatus::Pass && self.warnings == 0 {
            "All tests passed".to_string()
        } else {
            format!(
                "{} tests: {} success, {} warning, {} error, {} skipped",
                self.total, self.success, self.warnings, self.errors, self.skipped
            )
        };

        Verdict {
            status,
            exit_code,
            reason,
        }
    }
}

/// Final verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub status: VerdictStatus,
    pub exit_code: i32,
    pub reason: String,
}

/// Pass or fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictStatus {
    Pass,
    Fail,
}

impl std::fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(outcomes: &[Outcome]) -> RunSummary {
        let mut s = RunSummary::default();
        for o in outcomes {
            s.record(*o);
        }
        s
    }

    #[test]
    fn empty_run_is_fail_with_exit_zero() {
        let v = RunSummary::default().verdict(true);
        assert_eq!(v.status, VerdictStatus::Fail);
        assert_eq!(v.exit_code, 0);
        assert!(v.reason.contains("No tests were executed"));
    }

    #[test]
    fn only_skips_is_fail() {
        let v = summary(&[Outcome::Skipped, Outcome::Skipped]).verdict(false);
        assert_eq!(v.status, VerdictStatus::Fail);
    }

    #[test]
    fn all_success_is_pass() {
        let v = summary(&[Outcome::Success, Outcome::Skipped]).verdict(true);
        assert_eq!(v.status, VerdictStatus::Pass);
        assert_eq!(v.reason, "All tests passed");
    }

    #[test]
    fn warnings_depend_on_strict() {
        let s = summary(&[Outcome::Success, Outcome::Warning]);
        assert_eq!(s.verdict(false).status, VerdictStatus::Pass);
        assert_eq!(s.verdict(true).status, VerdictStatus::Fail);
        assert_eq!(s.verdict(true).exit_code, 1);
    }

    #[test]
    fn errors_fail_and_are_counted() {
        let s = summary(&[Outcome::Success, Outcome::Error, Outcome::Warning]);
        let v = s.verdict(false);
        assert_eq!(v.status, VerdictStatus::Fail);
        assert_eq!(v.exit_code, 1);
        assert!(v.reason.contains("1 error"));
        assert_eq!(s.worst(), Some(Outcome::Error));
    }
}
