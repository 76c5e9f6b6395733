//! Dry run plan types and config validation
//!
//! Describes which tests *would* run without sending any requests.
//! Used for pre-flight validation and CI previews.

use std::collections::BTreeMap;
use std::path::Path;

use parking_lot::Mutex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Config;
use crate::http::HttpMethod;

// ── Plan types ──

/// Complete dry run plan: operations, test counts, and config warnings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DryRunPlan {
    /// Per-operation plan
    pub operations: Vec<OperationPlan>,
    /// Total tests that would run
    pub total_tests: u64,
    /// Config validation results
    pub validations: Vec<Validation>,
}

/// Planned tests for a single operation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OperationPlan {
    /// Operation label, e.g. "POST /api/users"
    pub operation: String,
    pub method: HttpMethod,
    /// Path template
    pub path: String,
    /// Total tests for this operation
    pub total: u32,
    /// Tests per playbook
    pub playbooks: BTreeMap<String, u32>,
}

/// A validation check result.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Validation {
    pub check: String,
    pub status: ValidationStatus,
    pub message: String,
}

/// Status of a validation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Ok,
    Warning,
    Error,
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

// ── Recording ──

/// Counts would-be tests while a dry run walks the playbooks. Shared by workers.
#[derive(Debug, Default)]
pub struct DryRunRecorder {
    counts: Mutex<BTreeMap<(String, HttpMethod), BTreeMap<String, u32>>>,
}

impl DryRunRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, path: &str, method: HttpMethod, playbook: &str) {
        let mut counts = self.counts.lock();
        *counts
            .entry((path.to_string(), method))
            .or_default()
            .entry(playbook.to_string())
            .or_insert(0) += 1;
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts
            .lock()
            .values()
            .flat_map(BTreeMap::values)
            .map(|n| u64::from(*n))
            .sum()
    }

    /// Snapshot the counts into a plan.
    #[must_use]
    pub fn plan(&self, validations: Vec<Validation>) -> DryRunPlan {
        let counts = self.counts.lock();
        let operations: Vec<OperationPlan> = counts
            .iter()
            .map(|((path, method), playbooks)| OperationPlan {
                operation: format!("{method} {path}"),
                method: *method,
                path: path.clone(),
                total: playbooks.values().sum(),
                playbooks: playbooks.clone(),
            })
            .collect();
        let total_tests = operations.iter().map(|op| u64::from(op.total)).sum();
        DryRunPlan {
            operations,
            total_tests,
            validations,
        }
    }
}

// ── Config validation ──

/// Patterns that suggest a placeholder value rather than a real credential.
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-token",
    "your_token",
    "YOUR_TOKEN",
    "your-password",
    "YOUR_PASSWORD",
    "TODO",
    "CHANGEME",
    "changeme",
    "changeit",
    "placeholder",
    "xxx",
    "XXX",
    "replace-me",
    "REPLACE_ME",
    "secret",
];

/// Validate config and produce validation results.
#[must_use]
pub fn validate_config(config: &Config) -> Vec<Validation> {
    let mut checks = Vec::new();

    // Base URL
    if config.base_url.starts_with("http://") || config.base_url.starts_with("https://") {
        checks.push(ok("base_url", format!("base_url: {}", config.base_url)));
    } else {
        checks.push(Validation {
            check: "base_url".into(),
            status: ValidationStatus::Warning,
            message: format!(
                "base_url: {} (missing http:// or https:// prefix)",
                config.base_url
            ),
        });
    }

    // Value files and keystore
    let files = [
        ("reference_data", config.reference_data.as_deref()),
        ("headers_file", config.headers_file.as_deref()),
        ("query_params_file", config.query_params_file.as_deref()),
        ("custom_mutators_dir", config.custom_mutators_dir.as_deref()),
        ("keystore", config.http.keystore.as_deref()),
        ("auth_script", config.auth.script.as_deref()),
    ];
    for (check, path) in files {
        if let Some(path) = path {
            checks.push(file_check(check, path));
        }
    }

    // Credentials: check for placeholders
    let secrets = [
        ("basic_password", config.auth.basic_password.as_deref()),
        ("keystore_password", config.http.keystore_password.as_deref()),
    ];
    for (check, value) in secrets {
        let Some(value) = value else { continue };
        let hit = PLACEHOLDER_PATTERNS.iter().find(|p| value.contains(*p));
        match hit {
            Some(pattern) => checks.push(Validation {
                check: check.into(),
                status: ValidationStatus::Warning,
                message: format!("{check}: contains '{pattern}', may be placeholder"),
            }),
            None if value.contains('<') && value.contains('>') => checks.push(Validation {
                check: check.into(),
                status: ValidationStatus::Warning,
                message: format!("{check}: contains '<...>' placeholder"),
            }),
            None => checks.push(ok(check, format!("{check}: configured"))),
        }
    }

    // Rate limit
    if config.rate_limit_per_minute == Some(0) {
        checks.push(Validation {
            check: "rate_limit".into(),
            status: ValidationStatus::Error,
            message: "rate_limit_per_minute: 0 would never send a request".into(),
        });
    }

    if config.workers == 0 {
        checks.push(Validation {
            check: "workers".into(),
            status: ValidationStatus::Error,
            message: "workers: must be at least 1".into(),
        });
    }

    checks
}

fn ok(check: &str, message: String) -> Validation {
    Validation {
        check: check.into(),
        status: ValidationStatus::Ok,
        message,
    }
}

fn file_check(check: &str, path: &Path) -> Validation {
    if path.exists() {
        ok(check, format!("{check}: {} (exists)", path.display()))
    } else {
        Validation {
            check: check.into(),
            status: ValidationStatus::Error,
            message: format!("{check}: {} (not found)", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn validate_placeholder_password() {
        let mut cfg = Config::default();
        cfg.auth.basic_password = Some("CHANGEME".into());
        let checks = validate_config(&cfg);
        let c = checks.iter().find(|c| c.check == "basic_password").unwrap();
        assert_eq!(c.status, ValidationStatus::Warning);
    }

    #[test]
    fn validate_angle_bracket_password() {
        let mut cfg = Config::default();
        cfg.http.keystore_password = Some("<pass>".into());
        let checks = validate_config(&cfg);
        let c = checks.iter().find(|c| c.check == "keystore_password").unwrap();
        assert_eq!(c.status, ValidationStatus::Warning);
    }

    #[test]
    fn validate_real_password_ok() {
        let mut cfg = Config::default();
        cfg.auth.basic_password = Some("h7Gk2pQz".into());
        let checks = validate_config(&cfg);
        let c = checks.iter().find(|c| c.check == "basic_password").unwrap();
        assert_eq!(c.status, ValidationStatus::Ok);
    }

    #[test]
    fn validate_bad_base_url() {
        let cfg = Config {
            base_url: "localhost:8080".into(),
            ..Config::default()
        };
        let checks = validate_config(&cfg);
        let url_check = checks.iter().find(|c| c.check == "base_url").unwrap();
        assert_eq!(url_check.status, ValidationStatus::Warning);
    }

    #[test]
    fn validate_missing_files() {
        let cfg = Config {
            reference_data: Some(PathBuf::from("nonexistent-refdata.yml")),
            ..Config::default()
        };
        let checks = validate_config(&cfg);
        let c = checks.iter().find(|c| c.check == "reference_data").unwrap();
        assert_eq!(c.status, ValidationStatus::Error);
    }

    #[test]
    fn validate_zero_rate_limit() {
        let cfg = Config {
            rate_limit_per_minute: Some(0),
            ..Config::default()
        };
        assert!(validate_config(&cfg).iter().any(|c| c.check == "rate_limit"));
    }

    #[test]
    fn recorder_builds_plan() {
        let recorder = DryRunRecorder::new();
        recorder.record("/users", HttpMethod::Post, "LeadingSpacesInFields");
        recorder.record("/users", HttpMethod::Post, "LeadingSpacesInFields");
        recorder.record("/users", HttpMethod::Post, "RemoveHeaders");
        recorder.record("/users/{id}", HttpMethod::Delete, "DeletedResourcesNotAvailable");
        assert_eq!(recorder.total(), 4);

        let plan = recorder.plan(validate_config(&Config::default()));
        assert_eq!(plan.total_tests, 4);
        assert_eq!(plan.operations.len(), 2);
        let post = plan
            .operations
            .iter()
            .find(|op| op.method == HttpMethod::Post)
            .unwrap();
        assert_eq!(post.total, 3);
        assert_eq!(post.playbooks["LeadingSpacesInFields"], 2);

        assert!(
            plan.validations
                .iter()
                .all(|v| v.status != ValidationStatus::Error)
        );
    }
}
