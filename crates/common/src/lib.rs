//! Casekit Common Library
//!
//! Shared types for the casekit test-run orchestration core: the selector
//! model, run configuration, report model, error type, and the traits that
//! form the seam to the external browser driver and backend API.

pub mod config;
pub mod driver;
pub mod error;
pub mod report;
pub mod selector;
pub mod state;

// Re-export commonly used types
pub use config::{join_url, AssertionMode, RunConfig};
pub use driver::{CookieJar, DomDriver, SeedOutcome, StateBackend, StateMutation, StorageEntries};
pub use error::{Error, Result};
pub use report::{AssertionResult, CaseOutcome, RunReport};
pub use selector::{ElementHandle, SelectorDescriptor, SelectorKind, SelectorPolicy};
pub use state::StateSnapshot;

/// Casekit version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
