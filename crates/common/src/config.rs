//! Run configuration
//!
//! Defaults < TOML file < `CASEKIT_*` environment variables < CLI flags.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::selector::SelectorPolicy;

/// Join a path against a base URL, normalizing slashes at the seam.
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Whether a case keeps going after a failed assertion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionMode {
    /// Record the failure and continue with the next assertion
    Soft,
    /// Abort the case at the first failed assertion
    #[default]
    Hard,
}

impl std::str::FromStr for AssertionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "soft" => Ok(AssertionMode::Soft),
            "hard" => Ok(AssertionMode::Hard),
            other => Err(Error::InvalidConfig(format!(
                "unknown assertion mode: {other} (expected soft|hard)"
            ))),
        }
    }
}

/// Configuration for a test run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Base URL joined against relative paths in `visit` steps
    pub base_url: String,

    /// Soft or hard assertion mode
    pub mode: AssertionMode,

    /// Strict (data-attribute-only) or lenient selector policy
    pub selector_policy: SelectorPolicy,

    /// Retry budget for selector resolution and condition waits
    pub timeout_ms: u64,

    /// Initial poll interval; doubles on each retry
    pub poll_interval_ms: u64,

    /// Upper bound for the backed-off poll interval
    pub backoff_cap_ms: u64,

    /// Number of isolated workers; 1 means sequential execution
    pub workers: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            mode: AssertionMode::default(),
            selector_policy: SelectorPolicy::default(),
            timeout_ms: 4000,
            poll_interval_ms: 50,
            backoff_cap_ms: 500,
            workers: 1,
        }
    }
}

impl RunConfig {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply `CASEKIT_*` environment variable overrides.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("CASEKIT_BASE_URL") {
            self.base_url = url;
        }
        if let Ok(mode) = std::env::var("CASEKIT_MODE") {
            self.mode = mode.parse()?;
        }
        if let Ok(policy) = std::env::var("CASEKIT_SELECTOR_POLICY") {
            self.selector_policy = policy.parse()?;
        }
        if let Ok(timeout) = std::env::var("CASEKIT_TIMEOUT_MS") {
            self.timeout_ms = timeout
                .parse()
                .map_err(|_| Error::InvalidConfig(format!("CASEKIT_TIMEOUT_MS: {timeout}")))?;
        }
        if let Ok(workers) = std::env::var("CASEKIT_WORKERS") {
            self.workers = workers
                .parse()
                .map_err(|_| Error::InvalidConfig(format!("CASEKIT_WORKERS: {workers}")))?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(Error::InvalidConfig("base_url must not be empty".into()));
        }
        if self.workers == 0 {
            return Err(Error::InvalidConfig("workers must be at least 1".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::InvalidConfig("poll_interval_ms must be non-zero".into()));
        }
        Ok(())
    }

    /// Join a relative path against the base URL. Absolute URLs pass
    /// through untouched so cross-origin steps remain possible.
    pub fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        join_url(&self.base_url, path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_millis(self.backoff_cap_ms)
    }
}
