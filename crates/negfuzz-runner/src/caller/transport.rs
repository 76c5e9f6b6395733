//! Blocking HTTP transport and transport-failure normalization
//!
//! Builds the pooled client from [`HttpConfig`] and sends one [`HttpRequest`].
//! Anything that goes wrong below HTTP is turned into a synthetic response in
//! the 900–999 range, so callers always get an [`HttpResponse`] back.

use std::error::Error as _;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Method, Proxy};
use tracing::debug;

use negfuzz_core::config::HttpConfig;
use negfuzz_core::http::{Header, HttpMethod, HttpRequest, HttpResponse, TransportFailure};

/// Build the shared client.
///
/// Server certificates are never validated; the system under test usually
/// runs with self-signed certificates.
///
/// # Errors
///
/// Returns error if the keystore cannot be read or parsed, or the proxy URL is invalid.
pub fn build_client(config: &HttpConfig) -> Result<Client, ClientInitError> {
    let mut builder = Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true);

    if let Some(path) = &config.keystore {
        let der = std::fs::read(path).map_err(|source| ClientInitError::ReadKeystore {
            path: path.clone(),
            source,
        })?;
        let password = config.keystore_password.as_deref().unwrap_or_default();
        let identity = reqwest::Identity::from_pkcs12_der(&der, password).map_err(|source| {
            ClientInitError::InvalidKeystore {
                path: path.clone(),
                source,
            }
        })?;
        builder = builder.identity(identity);
    }

    if let Some(url) = &config.proxy {
        let proxy = Proxy::all(url).map_err(|source| ClientInitError::InvalidProxy {
            url: url.clone(),
            source,
        })?;
        builder = builder.proxy(proxy);
    }

    builder = if config.http2_prior_knowledge {
        builder.http2_prior_knowledge()
    } else if config.http2 {
        builder
    } else {
        builder.http1_only()
    };

    builder.build().map_err(ClientInitError::Build)
}

#[derive(Debug, thiserror::Error)]
pub enum ClientInitError {
    #[error("Cannot read keystore {path}: {source}")]
    ReadKeystore {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid keystore {path}: {source}")]
    InvalidKeystore {
        path: PathBuf,
        #[source]
        source: reqwest::Error,
    },
    #[error("Invalid proxy URL '{url}': {source}")]
    InvalidProxy {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Cannot build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

// ── Sending ──

/// Send `request`, retrying up to `retries` extra times when the connection
/// cannot be established. Never fails: transport problems become synthetic responses.
pub fn send(client: &Client, request: &HttpRequest, retries: u32) -> HttpResponse {
    let start = Instant::now();
    let mut attempt = 0;
    loop {
        match send_once(client, request) {
            Ok(response) => return read_response(response, start),
            Err(e) if e.is_connect() && attempt < retries => {
                attempt += 1;
                debug!(url = %request.url, attempt, error = %e, "connection failed, retrying");
            }
            Err(e) => return failure_response(&e, start),
        }
    }
}

fn send_once(client: &Client, request: &HttpRequest) -> reqwest::Result<Response> {
    let mut builder = client.request(to_reqwest_method(request.method), &request.url);
    for header in &request.headers {
        match wire_header(header) {
            Some((name, value)) => builder = builder.header(name, value),
            None => debug!(header = %header.name, "dropping header not representable on the wire"),
        }
    }
    if !request.body.is_empty() {
        builder = builder.body(request.body.clone());
    }
    builder.send()
}

fn wire_header(header: &Header) -> Option<(HeaderName, HeaderValue)> {
    let name = HeaderName::from_bytes(header.name.as_bytes()).ok()?;
    let value = HeaderValue::from_str(&header.value).ok()?;
    Some((name, value))
}

fn read_response(response: Response, start: Instant) -> HttpResponse {
    let status = response.status().as_u16();
    let headers: Vec<Header> = response
        .headers()
        .iter()
        .map(|(name, value)| {
            Header::new(
                name.as_str(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    match response.text() {
        Ok(body) => HttpResponse::new(status, headers, body, elapsed_ms(start)),
        Err(e) => failure_response(&e, start),
    }
}

fn failure_response(error: &reqwest::Error, start: Instant) -> HttpResponse {
    let failure = classify_failure(error);
    debug!(code = failure.code(), error = %error, "transport failure");
    HttpResponse::transport_failure(failure, &error_chain(error), elapsed_ms(start))
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

const fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Options => Method::OPTIONS,
        HttpMethod::Trace => Method::TRACE,
    }
}

// ── Failure mapping ──

/// Map a client error onto the fixed synthetic-code table.
fn classify_failure(error: &reqwest::Error) -> TransportFailure {
    if error.is_timeout() {
        return if error.is_connect() {
            TransportFailure::ConnectTimeout
        } else {
            TransportFailure::ReadTimeout
        };
    }
    if error.is_redirect() {
        return TransportFailure::RedirectLoop;
    }
    if let Some(kind) = io_error_kind(error) {
        match kind {
            io::ErrorKind::ConnectionRefused => return TransportFailure::ConnectionRefused,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => return TransportFailure::ConnectionReset,
            io::ErrorKind::UnexpectedEof => return TransportFailure::EmptyReply,
            io::ErrorKind::TimedOut => {
                return if error.is_connect() {
                    TransportFailure::ConnectTimeout
                } else {
                    TransportFailure::ReadTimeout
                };
            }
            _ => {}
        }
    }
    classify_message(&error_chain(error).to_ascii_lowercase())
}

fn classify_message(message: &str) -> TransportFailure {
    if message.contains("connection refused") {
        TransportFailure::ConnectionRefused
    } else if message.contains("connection reset") || message.contains("broken pipe") {
        TransportFailure::ConnectionReset
    } else if message.contains("connection closed before message completed")
        || message.contains("empty reply")
        || message.contains("unexpected eof")
    {
        TransportFailure::EmptyReply
    } else if message.contains("invalid http")
        || message.contains("invalid status")
        || message.contains("invalid header")
        || message.contains("parse")
        || message.contains("protocol")
        || message.contains("decoding")
    {
        TransportFailure::ProtocolError
    } else if message.contains("timed out") {
        TransportFailure::ReadTimeout
    } else {
        TransportFailure::Other
    }
}

fn io_error_kind(error: &reqwest::Error) -> Option<io::ErrorKind> {
    let mut source = error.source();
    while let Some(err) = source {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        source = err.source();
    }
    None
}

/// Error and all its sources joined with ": ".
fn error_chain(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(err) = source {
        let text = err.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = err.source();
    }
    message
}
