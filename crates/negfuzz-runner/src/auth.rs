//! External auth script whose output is used as a credential
//!
//! The script runs without arguments; stdout followed by stderr, trimmed, is
//! the credential. Results are cached and refreshed once the interval has
//! elapsed. An interval of 0 runs the script only once.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{debug, warn};

#[derive(Debug)]
struct Cached {
    value: String,
    fetched_at: Instant,
}

#[derive(Debug)]
pub struct AuthScript {
    path: PathBuf,
    refresh: Option<Duration>,
    cache: RwLock<Option<Cached>>,
}

impl AuthScript {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, refresh_interval_secs: u64) -> Self {
        Self {
            path: path.into(),
            refresh: (refresh_interval_secs > 0).then(|| Duration::from_secs(refresh_interval_secs)),
            cache: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current credential, running the script when the cache is empty or stale.
    ///
    /// Callers arriving during a refresh may run the script concurrently; the
    /// last writer wins.
    ///
    /// # Errors
    ///
    /// Returns error if the script cannot be started.
    pub fn credential(&self) -> Result<String, AuthError> {
        if let Some(cached) = self.cache.read().as_ref() {
            if !self.is_stale(cached) {
                return Ok(cached.value.clone());
            }
        }
        let value = self.run()?;
        *self.cache.write() = Some(Cached {
            value: value.clone(),
            fetched_at: Instant::now(),
        });
        Ok(value)
    }

    fn is_stale(&self, cached: &Cached) -> bool {
        self.refresh
            .is_some_and(|interval| cached.fetched_at.elapsed() >= interval)
    }

    fn run(&self) -> Result<String, AuthError> {
        debug!(script = %self.path.display(), "running auth script");
        let output = Command::new(&self.path)
            .output()
            .map_err(|source| AuthError::Spawn {
                path: self.path.clone(),
                source,
            })?;
        if !output.status.success() {
            warn!(
                script = %self.path.display(),
                status = %output.status,
                "auth script exited unsuccessfully, using its output anyway"
            );
        }
        let mut merged = String::from_utf8_lossy(&output.stdout).into_owned();
        merged.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(merged.trim().to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Cannot run auth script {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("auth.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn output_is_trimmed_and_merged() {
        let dir = tempfile::tempdir().unwrap();
        let auth = AuthScript::new(script(dir.path(), "echo token\nprintf err >&2"), 0);
        assert_eq!(auth.credential().unwrap(), "token\nerr");
    }

    #[test]
    fn zero_interval_runs_once() {
        let dir = tempfile::tempdir().unwrap();
        let counter = dir.path().join("count");
        let body = format!("echo x >> {0}\nwc -l < {0}", counter.display());
        let auth = AuthScript::new(script(dir.path(), &body), 0);
        let first = auth.credential().unwrap();
        let second = auth.credential().unwrap();
        assert_eq!(first, second);
        assert_eq!(std::fs::read_to_string(&counter).unwrap().lines().count(), 1);
    }

    #[test]
    fn missing_script_is_an_error() {
        let auth = AuthScript::new("/definitely/not/a/script", 0);
        assert!(matches!(auth.credential(), Err(AuthError::Spawn { .. })));
    }
}
