//! Session state capture, restore and programmatic seeding
//!
//! The snapshotter is the isolation mechanism: the runner captures a
//! baseline once, restores it before every case, and diffs the observed
//! state against it to catch cases that leak. Seeding goes through the
//! backend API directly instead of driving the UI.

use std::sync::Arc;
use tracing::{debug, info};

use casekit_common::driver::{DomDriver, SeedOutcome, StateBackend, StateMutation};
use casekit_common::error::{Error, Result};
use casekit_common::state::StateSnapshot;

/// Cookie under which the session credential travels
pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// Captures and restores session state through the DOM driver
pub struct Snapshotter {
    driver: Arc<dyn DomDriver>,
    backend: Option<Arc<dyn StateBackend>>,
}

impl Snapshotter {
    pub fn new(driver: Arc<dyn DomDriver>) -> Self {
        Self { driver, backend: None }
    }

    pub fn with_backend(driver: Arc<dyn DomDriver>, backend: Arc<dyn StateBackend>) -> Self {
        Self { driver, backend: Some(backend) }
    }

    /// Capture the current session state. The auth token cookie is split
    /// out so reports and diffs can name it explicitly.
    pub async fn capture(&self) -> Result<StateSnapshot> {
        let mut cookies = self.driver.read_cookies().await?;
        let storage = self.driver.read_storage().await?;
        let auth_token = cookies.remove(AUTH_TOKEN_COOKIE);
        Ok(StateSnapshot { cookies, storage, auth_token })
    }

    /// Restore a snapshot. Afterwards the session is indistinguishable
    /// from one freshly carrying exactly the captured state.
    pub async fn restore(&self, snapshot: &StateSnapshot) -> Result<()> {
        let mut cookies = snapshot.cookies.clone();
        if let Some(token) = &snapshot.auth_token {
            cookies.insert(AUTH_TOKEN_COOKIE.to_string(), token.clone());
        }
        self.driver.write_cookies(&cookies).await?;
        self.driver.write_storage(&snapshot.storage).await?;
        debug!("session state restored");
        Ok(())
    }

    /// Apply a state mutation against the backend API, bypassing the UI.
    /// A session token returned by the backend is installed into the
    /// browser session, so e.g. a seeded login is effective immediately.
    pub async fn seed(&self, mutation: &StateMutation) -> Result<SeedOutcome> {
        let backend = self.backend.as_ref().ok_or_else(|| {
            Error::InvalidConfig("seed requires a state backend".into())
        })?;

        let outcome = backend.apply(mutation).await?;
        match &outcome {
            SeedOutcome::Applied { auth_token } => {
                info!(endpoint = %mutation.endpoint, "state seeded");
                if let Some(token) = auth_token {
                    let mut cookies = self.driver.read_cookies().await?;
                    cookies.insert(AUTH_TOKEN_COOKIE.to_string(), token.clone());
                    self.driver.write_cookies(&cookies).await?;
                }
            }
            SeedOutcome::Rejected { reason } => {
                debug!(endpoint = %mutation.endpoint, reason = %reason, "seed rejected");
            }
        }
        Ok(outcome)
    }

    /// Diff the live state against a baseline. A non-empty result means
    /// the previously-run case leaked state past its restore point.
    pub async fn residual_state(&self, baseline: &StateSnapshot) -> Result<Vec<String>> {
        let current = self.capture().await?;
        Ok(baseline.diff(&current))
    }
}
