//! Explicit condition waiting
//!
//! The alternative to sleeping for a fixed number of milliseconds: a
//! condition names what the case is actually waiting for and is polled
//! cooperatively. The predicate is checked before any sleep, so a condition
//! that is already true never waits, and the wait is bounded by its timeout.

use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use casekit_common::config::RunConfig;
use casekit_common::error::{Error, Result};

use crate::intercept::{AliasRegistry, InterceptedRequest};

/// What a predicate poll observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionPoll {
    Ready,
    Pending,
}

/// Terminal states of a wait: Pending -> Satisfied | TimedOut | Cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Satisfied,
    TimedOut,
    Cancelled,
}

/// A one-shot named condition with its polling parameters
pub struct Condition {
    name: String,
    timeout: Option<Duration>,
    poll_interval: Option<Duration>,
    predicate: Box<dyn FnMut() -> ConditionPoll + Send>,
}

impl Condition {
    pub fn new(
        name: impl Into<String>,
        predicate: impl FnMut() -> ConditionPoll + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            timeout: None,
            poll_interval: None,
            predicate: Box::new(predicate),
        }
    }

    /// Convenience constructor for a plain boolean predicate.
    pub fn from_fn(
        name: impl Into<String>,
        mut predicate: impl FnMut() -> bool + Send + 'static,
    ) -> Self {
        Self::new(name, move || {
            if predicate() {
                ConditionPoll::Ready
            } else {
                ConditionPoll::Pending
            }
        })
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

/// Polls conditions to completion on the current case's control flow
#[derive(Debug, Clone)]
pub struct ConditionWaiter {
    default_timeout: Duration,
    default_poll: Duration,
}

impl ConditionWaiter {
    pub fn new(default_timeout: Duration, default_poll: Duration) -> Self {
        Self { default_timeout, default_poll }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(config.timeout(), config.poll_interval())
    }

    /// Drive a condition to a terminal state. The predicate is evaluated
    /// immediately, then once per poll interval until the timeout elapses
    /// or the owning case aborts.
    pub async fn wait(&self, mut condition: Condition, cancel: &CancellationToken) -> WaitOutcome {
        let timeout = condition.timeout.unwrap_or(self.default_timeout);
        let poll = condition.poll_interval.unwrap_or(self.default_poll);
        let deadline = Instant::now() + timeout;

        loop {
            if cancel.is_cancelled() {
                return WaitOutcome::Cancelled;
            }
            if (condition.predicate)() == ConditionPoll::Ready {
                trace!(condition = %condition.name, "satisfied");
                return WaitOutcome::Satisfied;
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(condition = %condition.name, timeout_ms = timeout.as_millis() as u64, "timed out");
                return WaitOutcome::TimedOut;
            }

            let sleep_for = poll.min(deadline - now);
            tokio::select! {
                _ = cancel.cancelled() => return WaitOutcome::Cancelled,
                _ = tokio::time::sleep(sleep_for) => {}
            }
        }
    }

    /// Like [`wait`](Self::wait) but maps non-satisfied outcomes to errors,
    /// for use with `?` inside case bodies.
    pub async fn require(&self, condition: Condition, cancel: &CancellationToken) -> Result<()> {
        let name = condition.name.clone();
        let timeout = condition.timeout.unwrap_or(self.default_timeout);
        match self.wait(condition, cancel).await {
            WaitOutcome::Satisfied => Ok(()),
            WaitOutcome::TimedOut => Err(Error::TimedOut {
                what: name,
                timeout_ms: timeout.as_millis() as u64,
            }),
            WaitOutcome::Cancelled => Err(Error::Cancelled),
        }
    }

    /// Wait for a network interception registered under `tag`. An event
    /// that arrived before the wait satisfies it immediately; a tag that
    /// was never registered fails with `UnknownAlias` without consuming
    /// the timeout.
    pub async fn wait_for_alias(
        &self,
        registry: &AliasRegistry,
        tag: &str,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<InterceptedRequest> {
        let notify = registry.notify_handle(tag)?;
        let timeout = timeout.unwrap_or(self.default_timeout);
        let deadline = Instant::now() + timeout;

        loop {
            // Arm the wakeup before checking the buffer so an event recorded
            // between the check and the await is not missed.
            let notified = notify.notified();

            if let Some(event) = registry.take(tag)? {
                trace!(alias = tag, "interception consumed");
                return Ok(event);
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = notified => {}
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(Error::TimedOut {
                        what: format!("@{tag}"),
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
            }
        }
    }
}
