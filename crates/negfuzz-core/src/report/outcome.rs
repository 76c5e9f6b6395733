//! Test case outcomes
//!
//! The outcome determines the exit code: only errors fail a lenient run.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How a test case ended.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Not executed (exit 0)
    Skipped,
    /// Response code in the expected family (exit 0)
    Success,
    /// Documented but unexpected response code (exit 0, or 1 if strict)
    Warning,
    /// Undocumented code, accepted invalid input, or transport failure (exit 1)
    Error,
}

impl Outcome {
    /// Convert outcome to exit code
    ///
    /// - strict=true: Warning becomes exit 1
    /// - strict=false: Warning is exit 0
    #[must_use]
    pub const fn exit_code(self, strict: bool) -> i32 {
        match self {
            Self::Skipped | Self::Success => 0,
            Self::Warning => {
                if strict {
                    1
                } else {
                    0
                }
            }
            Self::Error => 1,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_skipped_and_success_zero() {
        assert_eq!(Outcome::Skipped.exit_code(true), 0);
        assert_eq!(Outcome::Success.exit_code(true), 0);
    }

    #[test]
    fn exit_code_warning_depends_on_strict() {
        assert_eq!(Outcome::Warning.exit_code(false), 0);
        assert_eq!(Outcome::Warning.exit_code(true), 1);
    }

    #[test]
    fn exit_code_error_always_one() {
        assert_eq!(Outcome::Error.exit_code(false), 1);
    }

    #[test]
    fn outcome_ordering() {
        assert!(Outcome::Success < Outcome::Warning);
        assert!(Outcome::Warning < Outcome::Error);
    }

    #[test]
    fn outcome_serialization() {
        let json = serde_json::to_string(&Outcome::Warning).unwrap();
        assert_eq!(json, "\"warning\"");

        let parsed: Outcome = serde_json::from_str("\"skipped\"").unwrap();
        assert_eq!(parsed, Outcome::Skipped);
    }
}
