//! Driver traits
//!
//! The orchestration core never touches a DOM or a network stack itself; it
//! reaches the browser through `DomDriver` and the application backend
//! through `StateBackend`. Production drivers adapt a real automation
//! bridge; tests script an in-memory fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Result;
use crate::selector::{ElementHandle, SelectorDescriptor};

pub type CookieJar = BTreeMap<String, String>;
pub type StorageEntries = BTreeMap<String, String>;

/// Narrow interface to the external DOM/browser driver.
///
/// Implementations signal a lost connection with
/// [`Error::DriverUnavailable`](crate::error::Error::DriverUnavailable),
/// which aborts the entire run.
#[async_trait]
pub trait DomDriver: Send + Sync {
    /// Navigate the session to an absolute URL.
    async fn visit(&self, url: &str) -> Result<()>;

    /// One-shot element query; retrying is the resolver's job, not the
    /// driver's. `scope` restricts the query to descendants of a handle.
    async fn query(
        &self,
        descriptor: &SelectorDescriptor,
        scope: Option<&ElementHandle>,
    ) -> Result<Vec<ElementHandle>>;

    /// Dispatch a DOM event (`click`, `input`, ...) on a resolved element.
    async fn dispatch_event(&self, target: &ElementHandle, event: &str) -> Result<()>;

    async fn read_cookies(&self) -> Result<CookieJar>;
    async fn write_cookies(&self, cookies: &CookieJar) -> Result<()>;

    async fn read_storage(&self) -> Result<StorageEntries>;
    async fn write_storage(&self, entries: &StorageEntries) -> Result<()>;

    /// Open an isolated session against the same bridge. Parallel workers
    /// each own one; cookies, storage and navigation state are never
    /// shared between sessions.
    async fn open_session(&self) -> Result<Arc<dyn DomDriver>>;

    /// Liveness probe, checked before the run starts.
    async fn ping(&self) -> Result<()>;
}

/// A direct-API state change applied against the backend, bypassing the UI
/// (e.g. a synthetic login instead of typing credentials into a form).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMutation {
    /// Backend endpoint, relative to the configured base URL
    pub endpoint: String,
    /// Request payload forwarded verbatim
    pub payload: serde_json::Value,
}

impl StateMutation {
    pub fn new(endpoint: impl Into<String>, payload: serde_json::Value) -> Self {
        Self { endpoint: endpoint.into(), payload }
    }
}

/// Backend verdict on a seed mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeedOutcome {
    /// Mutation applied; a returned session token is installed into the
    /// browser session by the snapshotter.
    Applied { auth_token: Option<String> },
    /// Backend refused the mutation
    Rejected { reason: String },
}

/// Seam to the application backend for programmatic state setup
#[async_trait]
pub trait StateBackend: Send + Sync {
    async fn apply(&self, mutation: &StateMutation) -> Result<SeedOutcome>;
}
