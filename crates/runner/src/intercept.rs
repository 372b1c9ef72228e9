//! Network interception aliases
//!
//! A case registers an alias for a request it intends to wait on
//! (`register("login", POST /login)`), the driver integration feeds
//! observed requests into the registry, and the waiter consumes them by
//! tag. Events are buffered per tag, so an interception that fires before
//! the wait still satisfies it.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, trace};

use casekit_common::error::{Error, Result};

/// Matches intercepted requests against a registered alias
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMatcher {
    pub method: String,
    pub path: String,
}

impl RequestMatcher {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self { method: method.into().to_ascii_uppercase(), path: path.into() }
    }

    pub fn matches(&self, request: &InterceptedRequest) -> bool {
        self.method.eq_ignore_ascii_case(&request.method) && self.path == request.path
    }
}

/// A request observed by the interception layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterceptedRequest {
    pub method: String,
    pub path: String,
    pub status: u16,
    #[serde(default)]
    pub body: serde_json::Value,
}

struct AliasEntry {
    matcher: RequestMatcher,
    pending: VecDeque<InterceptedRequest>,
    notify: Arc<Notify>,
}

/// Tag-keyed registry of network interceptions
#[derive(Default)]
pub struct AliasRegistry {
    entries: Mutex<HashMap<String, AliasEntry>>,
}

impl AliasRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a matcher under a tag. Re-registering a tag replaces its
    /// matcher and drops any buffered events from the old one.
    pub fn register(&self, tag: impl Into<String>, matcher: RequestMatcher) {
        let tag = tag.into();
        debug!(alias = %tag, method = %matcher.method, path = %matcher.path, "alias registered");
        let mut entries = self.entries.lock();
        match entries.get_mut(&tag) {
            Some(entry) => {
                entry.matcher = matcher;
                entry.pending.clear();
            }
            None => {
                entries.insert(
                    tag,
                    AliasEntry {
                        matcher,
                        pending: VecDeque::new(),
                        notify: Arc::new(Notify::new()),
                    },
                );
            }
        }
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.entries.lock().contains_key(tag)
    }

    /// Feed an observed request into the registry. Every alias whose
    /// matcher accepts the request buffers one event and wakes its waiters.
    pub fn record(&self, request: InterceptedRequest) {
        let entries = &mut *self.entries.lock();
        for (tag, entry) in entries.iter_mut() {
            if entry.matcher.matches(&request) {
                trace!(alias = %tag, path = %request.path, "interception buffered");
                entry.pending.push_back(request.clone());
                entry.notify.notify_waiters();
            }
        }
    }

    /// Pop the oldest buffered event for a tag, if any.
    pub fn take(&self, tag: &str) -> Result<Option<InterceptedRequest>> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(tag).ok_or_else(|| Error::UnknownAlias(tag.into()))?;
        Ok(entry.pending.pop_front())
    }

    /// Wakeup handle for a tag, used by the waiter to park between polls.
    pub fn notify_handle(&self, tag: &str) -> Result<Arc<Notify>> {
        let entries = self.entries.lock();
        let entry = entries.get(tag).ok_or_else(|| Error::UnknownAlias(tag.into()))?;
        Ok(entry.notify.clone())
    }
}
