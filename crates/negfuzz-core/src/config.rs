//! Run configuration for negative API testing

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::context::DEFAULT_MAX_STORED_POSTS;
use crate::matcher::MatchConfig;

/// Run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the service under test
    pub base_url: String,

    /// Reference data file (YAML, path → field → value)
    #[serde(default)]
    pub reference_data: Option<PathBuf>,

    /// User headers file (YAML, path → header → value)
    #[serde(default)]
    pub headers_file: Option<PathBuf>,

    /// Extra query parameters file (YAML, path → param → value)
    #[serde(default)]
    pub query_params_file: Option<PathBuf>,

    /// Directory of custom mutator definitions
    #[serde(default)]
    pub custom_mutators_dir: Option<PathBuf>,

    /// Values for URL path parameters, by parameter name
    #[serde(default)]
    pub path_params: BTreeMap<String, String>,

    /// Fields never fuzzed
    #[serde(default)]
    pub skip_fields: Vec<String>,

    /// Headers never fuzzed and never sent
    #[serde(default)]
    pub skip_headers: Vec<String>,

    /// Run only these playbooks (all when empty)
    #[serde(default)]
    pub playbooks: Vec<String>,

    /// Playbooks never run
    #[serde(default)]
    pub skip_playbooks: Vec<String>,

    /// Requests per minute across all workers (unlimited when absent)
    #[serde(default)]
    pub rate_limit_per_minute: Option<u32>,

    /// Requests allowed back-to-back before the limit applies
    #[serde(default = "default_burst")]
    pub rate_limit_burst: u32,

    /// Send PATCH bodies as `application/json-patch+json`
    #[serde(default)]
    pub json_patch_for_patch: bool,

    /// Plan tests without sending anything
    #[serde(default)]
    pub dry_run: bool,

    /// Operations processed in parallel
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// POST bodies kept per path for DELETE correlation
    #[serde(default = "default_max_stored_posts")]
    pub max_stored_posts: usize,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub random: RandomConfig,
}

fn default_burst() -> u32 {
    1
}

fn default_workers() -> usize {
    4
}

fn default_max_stored_posts() -> usize {
    DEFAULT_MAX_STORED_POSTS
}

/// Transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Overall deadline for one exchange
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Extra attempts after a connection failure
    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default)]
    pub http2: bool,

    /// Speak HTTP/2 without negotiation
    #[serde(default)]
    pub http2_prior_knowledge: bool,

    #[serde(default)]
    pub proxy: Option<String>,

    /// PKCS#12 keystore for mutual TLS
    #[serde(default)]
    pub keystore: Option<PathBuf>,

    #[serde(default)]
    pub keystore_password: Option<String>,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> u32 {
    1
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            timeout_secs: default_timeout(),
            retries: default_retries(),
            http2: false,
            http2_prior_knowledge: false,
            proxy: None,
            keystore: None,
            keystore_password: None,
        }
    }
}

/// Credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub basic_username: Option<String>,

    #[serde(default)]
    pub basic_password: Option<String>,

    /// Executable whose output is the credential (`auth_script` in value files)
    #[serde(default)]
    pub script: Option<PathBuf>,

    /// Seconds between script runs; 0 runs it once
    #[serde(default)]
    pub refresh_interval_secs: u64,
}

/// Continuous random mutation settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RandomConfig {
    #[serde(default)]
    pub max_duration_secs: Option<u64>,

    #[serde(default)]
    pub max_errors: Option<u64>,

    #[serde(default)]
    pub max_tests: Option<u64>,

    /// Seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default, rename = "match")]
    pub matchers: MatchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            reference_data: None,
            headers_file: None,
            query_params_file: None,
            custom_mutators_dir: None,
            path_params: BTreeMap::new(),
            skip_fields: Vec::new(),
            skip_headers: Vec::new(),
            playbooks: Vec::new(),
            skip_playbooks: Vec::new(),
            rate_limit_per_minute: None,
            rate_limit_burst: default_burst(),
            json_patch_for_patch: false,
            dry_run: false,
            workers: default_workers(),
            max_stored_posts: default_max_stored_posts(),
            http: HttpConfig::default(),
            auth: AuthConfig::default(),
            random: RandomConfig::default(),
        }
    }
}

impl Config {
    /// Load config from file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        }
    }

    /// Load from the first default location that exists, or defaults.
    ///
    /// # Errors
    ///
    /// Returns error if a candidate file exists but cannot be parsed
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load_from_dir(Path::new("."))
    }

    /// Same as [`load_default`](Self::load_default) rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns error if a candidate file exists but cannot be parsed
    pub fn load_from_dir(dir: &Path) -> Result<Self, ConfigError> {
        let candidates = [".negfuzz.toml", ".negfuzz.json", "negfuzz.toml"];

        for name in candidates {
            let path = dir.join(name);
            if path.exists() {
                return Self::load(&path);
            }
        }

        Ok(Self::default())
    }

    /// Whether basic auth credentials are configured.
    #[must_use]
    pub fn has_basic_auth(&self) -> bool {
        self.auth.basic_username.is_some()
    }

    /// Example config file
    #[must_use]
    pub fn example() -> &'static str {
        r#"# negfuzz configuration

# Service under test
base_url = "http://localhost:8080"

# Path-keyed YAML value files
# reference_data = "refData.yml"
# headers_file = "headers.yml"
# query_params_file = "queryParams.yml"
# custom_mutators_dir = "mutators"

# Never fuzz these
# skip_fields = ["id"]
# skip_headers = ["X-Request-Id"]

# Playbook selection (all built-in playbooks when empty)
# playbooks = ["TrailingSpacesInFields", "RemoveHeaders"]
# skip_playbooks = ["BoundaryValuesInFields"]

# Throttle requests (unlimited when absent)
# rate_limit_per_minute = 120
# rate_limit_burst = 1

# json_patch_for_patch = false
# dry_run = false
workers = 4
max_stored_posts = 10

# Values for URL path parameters
# [path_params]
# petId = "1"

[http]
connect_timeout_secs = 10
timeout_secs = 30
retries = 1
# http2 = false
# http2_prior_knowledge = false
# proxy = "http://127.0.0.1:3128"
# keystore = "client.p12"
# keystore_password = "changeit"

[auth]
# basic_username = "user"
# basic_password = "secret"
# script = "./get-token.sh"
refresh_interval_secs = 0

[random]
# Stop after whichever comes first
max_tests = 100
# max_duration_secs = 300
# max_errors = 10
# seed = 42

[random.match]
codes = ["5XX"]
# body_regex = "(?i)exception"
input_reflected = true
"#
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Parse error: {0}")]
    Parse(String),
}
