//! Request header assembly
//!
//! Order matters: mandatory headers (only if absent), then user headers from
//! the headers file, then basic auth (only if absent), then removal of skipped
//! headers. The same [`ServiceData`] always yields the same header list.
//!
//! Turning user headers off still keeps the credential-carrying ones
//! (see [`is_auth_header`]).

use std::hash::{DefaultHasher, Hash, Hasher};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;

use negfuzz_core::http::{
    APPLICATION_JSON, APPLICATION_JSON_PATCH, Header, HttpMethod, ServiceData, find_header,
};
use negfuzz_core::refdata::PathValues;
use negfuzz_core::strategy::merge_fuzzing;

use crate::dsl::Dsl;

pub const TRACE_ID_HEADER: &str = "X-Trace-Id";

/// Settings that shape every request's headers.
#[derive(Debug, Clone, Default)]
pub struct HeaderSettings {
    pub json_patch_for_patch: bool,
    /// Pre-encoded `Basic ...` credential
    pub basic_auth: Option<String>,
    pub skip_headers: Vec<String>,
}

impl HeaderSettings {
    #[must_use]
    pub fn basic_credential(username: &str, password: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
    }
}

/// Build the header list for `data`.
#[must_use]
pub fn assemble(
    data: &ServiceData,
    settings: &HeaderSettings,
    user_headers: &PathValues,
    dsl: &Dsl,
    payload: &Value,
) -> Vec<Header> {
    let mut headers = data.headers().to_vec();
    add_mandatory(&mut headers, data, settings);
    apply_user_headers(&mut headers, data, user_headers, dsl, payload);
    if let Some(credential) = &settings.basic_auth {
        add_if_absent(&mut headers, "Authorization", credential);
    }
    headers.retain(|h| {
        !data.is_skipped_header(&h.name)
            && !settings.skip_headers.iter().any(|s| h.is(s))
    });
    headers
}

fn add_mandatory(headers: &mut Vec<Header>, data: &ServiceData, settings: &HeaderSettings) {
    let content_type = if data.method() == HttpMethod::Patch && settings.json_patch_for_patch {
        APPLICATION_JSON_PATCH
    } else {
        data.content_type()
    };
    add_if_absent(headers, "Accept", APPLICATION_JSON);
    add_if_absent(headers, "Content-Type", content_type);
    add_if_absent(
        headers,
        "User-Agent",
        &format!("negfuzz/{} ({})", env!("CARGO_PKG_VERSION"), data.test_id()),
    );
    add_if_absent(headers, TRACE_ID_HEADER, &trace_id(data.test_id()));
}

fn apply_user_headers(
    headers: &mut Vec<Header>,
    data: &ServiceData,
    user_headers: &PathValues,
    dsl: &Dsl,
    payload: &Value,
) {
    for (name, raw) in user_headers.strings_for_path(data.contract_path()) {
        if !data.add_user_headers() && !is_auth_header(&name) {
            continue;
        }
        let value = dsl.evaluate(&raw, payload);
        if data.is_fuzzed_header(&name) {
            for header in headers.iter_mut().filter(|h| h.is(&name)) {
                header.value = merge_fuzzing(&header.value, &value);
            }
            continue;
        }
        let mut replaced = false;
        for header in headers.iter_mut().filter(|h| h.is(&name)) {
            header.value.clone_from(&value);
            replaced = true;
        }
        if !replaced {
            headers.push(Header::new(name, value));
        }
    }
}

/// Headers that carry credentials: `Authorization`, `Proxy-Authorization`,
/// and names mentioning an auth, token or API key.
#[must_use]
pub fn is_auth_header(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    ["auth", "token", "api-key", "apikey", "api_key"]
        .iter()
        .any(|marker| lower.contains(marker))
}

fn add_if_absent(headers: &mut Vec<Header>, name: &str, value: &str) {
    if find_header(headers, name).is_none() {
        headers.push(Header::new(name, value));
    }
}

/// 32 hex chars derived from the test id.
#[must_use]
pub fn trace_id(test_id: &str) -> String {
    let mut high = DefaultHasher::new();
    test_id.hash(&mut high);
    let mut low = DefaultHasher::new();
    (test_id, "negfuzz").hash(&mut low);
    format!("{:016x}{:016x}", high.finish(), low.finish())
}
