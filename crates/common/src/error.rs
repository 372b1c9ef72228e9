//! Error types for casekit

use thiserror::Error;

/// Result type alias using the casekit Error
pub type Result<T> = std::result::Result<T, Error>;

/// Casekit error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("no element matched {selector} after {waited_ms}ms")]
    NotFound { selector: String, waited_ms: u64 },

    #[error("timed out after {timeout_ms}ms waiting for: {what}")]
    TimedOut { what: String, timeout_ms: u64 },

    #[error("unknown network alias: @{0}")]
    UnknownAlias(String),

    #[error("unstable selector {value:?}: {kind} selectors are rejected under the strict policy")]
    UnstableSelector { kind: crate::selector::SelectorKind, value: String },

    #[error("isolation violation: {0}")]
    IsolationViolation(String),

    #[error("seed rejected by backend: {0}")]
    RejectedByBackend(String),

    #[error("driver unavailable: {0}")]
    DriverUnavailable(String),

    #[error("assertion failed: {0}")]
    AssertionFailed(String),

    #[error("case aborted")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("case spec error: {0}")]
    SpecParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the error must abort the whole run rather than a single
    /// case. Every other kind is reported against the current case and the
    /// run continues with its siblings.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::DriverUnavailable(_))
    }
}
