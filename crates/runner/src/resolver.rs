//! Selector resolution with retry and backoff
//!
//! A query that matches nothing is retried until the budget runs out: the
//! element may simply not have rendered yet. Polling starts fast and backs
//! off so a slow page is not hammered. The loop observes the owning case's
//! cancellation token and exits promptly when the case aborts.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use casekit_common::config::RunConfig;
use casekit_common::driver::DomDriver;
use casekit_common::error::{Error, Result};
use casekit_common::selector::{ElementHandle, SelectorDescriptor, SelectorPolicy};

/// Retry parameters for a resolve call
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Total retry budget
    pub timeout: Duration,
    /// First poll interval; doubles on each miss
    pub initial_poll: Duration,
    /// Backoff ceiling
    pub backoff_cap: Duration,
    /// Selector policy enforced before the first query
    pub policy: SelectorPolicy,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(4000),
            initial_poll: Duration::from_millis(50),
            backoff_cap: Duration::from_millis(500),
            policy: SelectorPolicy::default(),
        }
    }
}

impl ResolveOptions {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            timeout: config.timeout(),
            initial_poll: config.poll_interval(),
            backoff_cap: config.backoff_cap(),
            policy: config.selector_policy,
        }
    }
}

/// Resolves selector descriptors to live element handles via the driver
pub struct SelectorResolver {
    driver: Arc<dyn DomDriver>,
    options: ResolveOptions,
}

impl SelectorResolver {
    pub fn new(driver: Arc<dyn DomDriver>, options: ResolveOptions) -> Self {
        Self { driver, options }
    }

    /// Resolve a descriptor to a non-empty set of handles, retrying until
    /// the budget is exhausted. Surfaces `UnstableSelector` before the
    /// first query under the strict policy and `NotFound` after the last
    /// miss. Driver errors propagate unchanged.
    pub async fn resolve(
        &self,
        descriptor: &SelectorDescriptor,
        scope: Option<&ElementHandle>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ElementHandle>> {
        descriptor.check_policy(self.options.policy)?;

        let start = Instant::now();
        let deadline = start + self.options.timeout;
        let mut poll = self.options.initial_poll;
        let mut attempts = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            attempts += 1;
            let handles = self.driver.query(descriptor, scope).await?;
            if !handles.is_empty() {
                trace!(selector = %descriptor, attempts, "resolved {} element(s)", handles.len());
                return Ok(handles);
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(selector = %descriptor, attempts, "selector never matched");
                return Err(Error::NotFound {
                    selector: descriptor.to_string(),
                    waited_ms: (now - start).as_millis() as u64,
                });
            }

            let sleep_for = poll.min(deadline - now);
            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(sleep_for) => {}
            }
            poll = (poll * 2).min(self.options.backoff_cap);
        }
    }

    /// Single query with no retry. Used by count assertions where zero
    /// matches is an acceptable answer, not a condition to wait out.
    pub async fn resolve_now(
        &self,
        descriptor: &SelectorDescriptor,
        scope: Option<&ElementHandle>,
    ) -> Result<Vec<ElementHandle>> {
        descriptor.check_policy(self.options.policy)?;
        self.driver.query(descriptor, scope).await
    }
}
