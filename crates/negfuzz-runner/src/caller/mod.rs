//! Service caller: turns a [`ServiceData`] into one executed HTTP exchange
//!
//! Pipeline: reference-data substitution, DELETE correlation, content-type
//! conversion, URL and header assembly, rate limiting, send. Transport
//! failures come back as synthetic responses; only local problems (no HTTP
//! client, unbuildable URL, unparsable payload) are errors.

pub mod endpoint;
pub mod headers;
pub mod rate;
pub mod substitution;
pub mod transport;

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{debug, warn};

use negfuzz_core::config::Config;
use negfuzz_core::context::GlobalContext;
use negfuzz_core::http::{APPLICATION_FORM, HttpMethod, HttpRequest, HttpResponse, ServiceData};
use negfuzz_core::refdata::{PathValues, ValuesFileError};

use crate::auth::AuthScript;
use crate::dsl::Dsl;

pub use headers::HeaderSettings;
pub use rate::RateLimiter;
pub use transport::ClientInitError;

/// One request and the response it got.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub request: HttpRequest,
    pub response: HttpResponse,
}

/// Executes request intents. Shared by every worker.
pub trait Caller: Send + Sync {
    /// Send `data` and return what went over the wire.
    ///
    /// # Errors
    ///
    /// Returns error only for local problems; transport failures are synthetic responses.
    fn call(&self, data: &ServiceData) -> Result<Exchange, CallerError>;

    /// Base URL every request path is joined to.
    fn base_url(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
pub enum CallerError {
    #[error("HTTP client unavailable: {0}")]
    ClientUnavailable(String),
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error(transparent)]
    ValuesFile(#[from] ValuesFileError),
    #[error("Payload is not valid JSON: {0}")]
    InvalidPayload(String),
}

/// The production [`Caller`] over a pooled blocking client.
#[derive(Debug)]
pub struct ServiceCaller {
    client: Result<Client, String>,
    base_url: String,
    retries: u32,
    supplied_path_params: BTreeMap<String, String>,
    header_settings: HeaderSettings,
    ref_data: PathValues,
    user_headers: PathValues,
    query_params: PathValues,
    dsl: Dsl,
    limiter: Option<RateLimiter>,
    global: Arc<GlobalContext>,
}

impl ServiceCaller {
    /// Build a caller from `config`, loading the path-keyed value files.
    ///
    /// A client that cannot be initialized (bad keystore, bad proxy) does not
    /// fail construction: it is logged and every call reports it.
    ///
    /// # Errors
    ///
    /// Returns error if a configured value file cannot be read or parsed.
    pub fn new(config: &Config, global: Arc<GlobalContext>) -> Result<Self, CallerError> {
        let client = transport::build_client(&config.http).map_err(|e| {
            warn!(error = %e, "HTTP client disabled");
            e.to_string()
        });
        let auth = config
            .auth
            .script
            .as_ref()
            .map(|path| Arc::new(AuthScript::new(path, config.auth.refresh_interval_secs)));
        let basic_auth = config.auth.basic_username.as_deref().map(|user| {
            HeaderSettings::basic_credential(user, config.auth.basic_password.as_deref().unwrap_or_default())
        });
        let limiter = config
            .rate_limit_per_minute
            .and_then(|rpm| RateLimiter::per_minute(rpm, config.rate_limit_burst));

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            retries: config.http.retries,
            supplied_path_params: config.path_params.clone(),
            header_settings: HeaderSettings {
                json_patch_for_patch: config.json_patch_for_patch,
                basic_auth,
                skip_headers: config.skip_headers.clone(),
            },
            ref_data: PathValues::load_optional(config.reference_data.as_deref())?,
            user_headers: PathValues::load_optional(config.headers_file.as_deref())?,
            query_params: PathValues::load_optional(config.query_params_file.as_deref())?,
            dsl: Dsl::new(auth),
            limiter,
            global,
        })
    }

    #[must_use]
    pub fn with_ref_data(mut self, values: PathValues) -> Self {
        self.ref_data = values;
        self
    }

    #[must_use]
    pub fn with_headers(mut self, values: PathValues) -> Self {
        self.user_headers = values;
        self
    }

    #[must_use]
    pub fn with_query_params(mut self, values: PathValues) -> Self {
        self.query_params = values;
        self
    }

    /// Reference data in effect, used to decide which fields are pinned.
    #[must_use]
    pub const fn ref_data(&self) -> &PathValues {
        &self.ref_data
    }

    #[must_use]
    pub fn global(&self) -> &Arc<GlobalContext> {
        &self.global
    }

    /// Build the request for `data` without sending it.
    ///
    /// # Errors
    ///
    /// Returns error if the payload is not JSON when it should be, or the URL cannot be built.
    pub fn prepare(&self, data: &ServiceData) -> Result<HttpRequest, CallerError> {
        let payload = parse_payload(data)?;
        let refs = if data.replace_ref_data() {
            self.ref_data.for_path(data.contract_path())
        } else {
            BTreeMap::new()
        };
        let payload = match payload {
            Some(doc) if !refs.is_empty() => {
                Some(substitution::apply_ref_data(doc, data, &refs, &self.dsl))
            }
            other => other,
        };
        let empty = Value::Object(serde_json::Map::new());
        let doc = payload.as_ref().unwrap_or(&empty);

        // Path parameters: pinned by reference data or correlation, then supplied, then payload
        let mut pinned = substitution::pinned_path_values(data, &refs, &self.dsl, doc);
        if data.replace_ref_data() {
            pinned.extend(substitution::correlate_delete(data, &self.global));
        }
        let path_source = if data.path_params_payload() == data.payload() {
            doc.clone()
        } else {
            serde_json::from_str::<Value>(data.path_params_payload()).unwrap_or_else(|_| doc.clone())
        };
        let supplied = data.replace_url_params().then_some(&self.supplied_path_params);
        let resolved = endpoint::resolve_path(data.relative_path(), |name| {
            endpoint::path_value(name, &pinned, supplied, &path_source)
        });

        let mut query = endpoint::payload_query_pairs(data, doc, &resolved.consumed);
        for (name, raw) in self.query_params.strings_for_path(data.contract_path()) {
            query.push((name, self.dsl.evaluate(&raw, doc)));
        }
        let url = endpoint::build_url(&self.base_url, &resolved.path, &query).map_err(|source| {
            CallerError::InvalidUrl {
                url: format!("{}{}", self.base_url, resolved.path),
                source,
            }
        })?;

        let headers = headers::assemble(data, &self.header_settings, &self.user_headers, &self.dsl, doc);

        let body = if data.method().has_body() {
            match payload {
                Some(doc) => {
                    let doc = endpoint::strip_query_fields(doc, data.query_params());
                    if data.content_type().starts_with(APPLICATION_FORM) {
                        endpoint::form_encode(&doc)
                    } else {
                        doc.to_string()
                    }
                }
                None => data.payload().to_string(),
            }
        } else {
            String::new()
        };

        Ok(HttpRequest {
            method: data.method(),
            url,
            headers,
            body,
        })
    }

    fn record_correlation(&self, data: &ServiceData, exchange: &Exchange) {
        let code = exchange.response.status_code;
        if !(200..300).contains(&code) {
            return;
        }
        match data.method() {
            HttpMethod::Post => self
                .global
                .record_post_success(data.contract_path(), exchange.response.body.clone()),
            HttpMethod::Delete => self.global.record_successful_delete(exchange.request.url.clone()),
            _ => {}
        }
    }
}

impl Caller for ServiceCaller {
    fn call(&self, data: &ServiceData) -> Result<Exchange, CallerError> {
        let client = self
            .client
            .as_ref()
            .map_err(|e| CallerError::ClientUnavailable(e.clone()))?;
        let request = self.prepare(data)?;
        if let Some(limiter) = &self.limiter {
            limiter.acquire();
        }
        debug!(test = data.test_id(), method = %request.method, url = %request.url, "sending");
        let response = transport::send(client, &request, self.retries);
        debug!(test = data.test_id(), status = response.status_code, ms = response.response_time_ms, "received");
        let exchange = Exchange { request, response };
        self.record_correlation(data, &exchange);
        Ok(exchange)
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// The payload as JSON, `None` when it is meant to be sent verbatim.
fn parse_payload(data: &ServiceData) -> Result<Option<Value>, CallerError> {
    let raw = data.payload();
    let is_json_type = data.content_type().contains("json") || data.content_type().starts_with(APPLICATION_FORM);
    if !data.valid_json() || !is_json_type {
        return Ok(None);
    }
    if raw.trim().is_empty() {
        return Ok(Some(Value::Object(serde_json::Map::new())));
    }
    serde_json::from_str(raw)
        .map(Some)
        .map_err(|e| CallerError::InvalidPayload(e.to_string()))
}
