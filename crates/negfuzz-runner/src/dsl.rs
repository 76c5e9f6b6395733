//! Value expressions in reference data and header files
//!
//! An expression is dispatched on its prefix to a fixed provider table:
//!
//! | form              | resolves to                              |
//! |-------------------|------------------------------------------|
//! | `$$NAME`          | environment variable `NAME`              |
//! | `${name}`         | request payload field, then environment  |
//! | `$request.a.b`    | request payload field (`#` also allowed) |
//! | `T(uuid)` etc.    | built-in function                        |
//! | `auth_script`     | output of the configured auth script     |
//!
//! `${...}` may also appear inside a longer string (`Bearer ${auth_script}`).
//! Anything that does not resolve is returned unchanged.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use negfuzz_core::mutation::{FieldPath, get_values};
use negfuzz_core::strategy::stringify;

use crate::auth::AuthScript;

/// Literal that resolves to the auth script output.
pub const AUTH_SCRIPT: &str = "auth_script";

#[derive(Debug, Clone, Default)]
pub struct Dsl {
    auth: Option<Arc<AuthScript>>,
}

impl Dsl {
    #[must_use]
    pub fn new(auth: Option<Arc<AuthScript>>) -> Self {
        Self { auth }
    }

    /// Evaluate `expr` against `payload`. Unresolvable expressions come back as-is.
    #[must_use]
    pub fn evaluate(&self, expr: &str, payload: &Value) -> String {
        self.resolve(expr, payload)
            .unwrap_or_else(|| self.interpolate(expr, payload))
    }

    /// Evaluate string values; other JSON values are returned unchanged.
    #[must_use]
    pub fn evaluate_value(&self, raw: &Value, payload: &Value) -> Value {
        match raw {
            Value::String(s) => Value::String(self.evaluate(s, payload)),
            other => other.clone(),
        }
    }

    fn resolve(&self, expr: &str, payload: &Value) -> Option<String> {
        if expr == AUTH_SCRIPT {
            return self.auth_credential();
        }
        if let Some(name) = expr.strip_prefix("$$") {
            return std::env::var(name).ok();
        }
        if let Some(path) = expr
            .strip_prefix("$request.")
            .or_else(|| expr.strip_prefix("$request#"))
        {
            return payload_field(payload, path);
        }
        if let Some(name) = expr.strip_prefix("T(").and_then(|r| r.strip_suffix(')')) {
            return builtin(name.trim());
        }
        if let Some(name) = expr.strip_prefix("${").and_then(|r| r.strip_suffix('}')) {
            if !name.contains("${") {
                return self.variable(name, payload);
            }
        }
        None
    }

    fn variable(&self, name: &str, payload: &Value) -> Option<String> {
        if name == AUTH_SCRIPT {
            return self.auth_credential();
        }
        payload_field(payload, name).or_else(|| std::env::var(name).ok())
    }

    fn interpolate(&self, expr: &str, payload: &Value) -> String {
        let mut out = String::with_capacity(expr.len());
        let mut rest = expr;
        while let Some(start) = rest.find("${") {
            let Some(len) = rest[start..].find('}') else {
                break;
            };
            let name = &rest[start + 2..start + len];
            out.push_str(&rest[..start]);
            match self.variable(name, payload) {
                Some(v) => out.push_str(&v),
                None => out.push_str(&rest[start..=start + len]),
            }
            rest = &rest[start + len + 1..];
        }
        out.push_str(rest);
        out
    }

    fn auth_credential(&self) -> Option<String> {
        let auth = self.auth.as_ref()?;
        match auth.credential() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("{e}");
                None
            }
        }
    }
}

fn payload_field(payload: &Value, path: &str) -> Option<String> {
    let parsed = FieldPath::parse(path).ok()?;
    let found = get_values(payload, &parsed).into_iter().next();
    if found.is_none() {
        debug!(field = path, "expression field not present in payload");
    }
    found.map(stringify)
}

fn builtin(name: &str) -> Option<String> {
    let now = chrono::Utc::now();
    match name {
        "uuid" => Some(random_uuid()),
        "now" => Some(now.to_rfc3339()),
        "today" => Some(now.format("%Y-%m-%d").to_string()),
        "timestamp" => Some(now.timestamp().to_string()),
        "timestamp_ms" => Some(now.timestamp_millis().to_string()),
        _ => None,
    }
}

/// Random version 4 UUID.
#[must_use]
pub fn random_uuid() -> String {
    Uuid::new_v4().to_string()
}
