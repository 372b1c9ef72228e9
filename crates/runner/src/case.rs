//! Test cases and the per-case execution context
//!
//! A case body receives a `CaseContext` by value and drives everything
//! through it: navigation, selector resolution, explicit waits, seeding
//! and assertions. Bodies must not share mutable state with other cases;
//! each one starts from a restored baseline and its outcome may not depend
//! on execution order.

use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use casekit_common::config::{AssertionMode, RunConfig};
use casekit_common::driver::{DomDriver, SeedOutcome, StateMutation};
use casekit_common::error::{Error, Result};
use casekit_common::report::AssertionResult;
use casekit_common::selector::{ElementHandle, SelectorDescriptor};

use crate::intercept::{AliasRegistry, InterceptedRequest, RequestMatcher};
use crate::resolver::{ResolveOptions, SelectorResolver};
use crate::snapshot::Snapshotter;
use crate::waiter::{Condition, ConditionWaiter};

/// Boxed async case body. The context is moved in; assertion results flow
/// back to the runner through a shared buffer.
pub type CaseBody = Box<dyn Fn(CaseContext) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A named, independent test case
pub struct TestCase {
    pub name: String,
    pub tags: Vec<String>,
    body: CaseBody,
}

impl TestCase {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(CaseContext) -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        Self { name: name.into(), tags: Vec::new(), body: Box::new(body) }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub(crate) fn body(&self) -> &CaseBody {
        &self.body
    }
}

impl std::fmt::Debug for TestCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

/// Ordered collection of cases, executed in declaration order
#[derive(Debug, Default)]
pub struct Suite {
    cases: Vec<TestCase>,
}

impl Suite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a case (`defineCase`). Declaration order is run order.
    pub fn case<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(CaseContext) -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        self.cases.push(TestCase::new(name, body));
        self
    }

    pub fn register(&mut self, case: TestCase) {
        self.cases.push(case);
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Keep only cases carrying the given tag.
    pub fn filter_tag(mut self, tag: &str) -> Self {
        self.cases.retain(|c| c.tags.iter().any(|t| t == tag));
        self
    }

    pub(crate) fn into_cases(self) -> Vec<TestCase> {
        self.cases
    }
}

/// Per-case facade handed to the body; owns the case's assertion stream
pub struct CaseContext {
    case_name: String,
    config: RunConfig,
    driver: Arc<dyn DomDriver>,
    resolver: SelectorResolver,
    waiter: ConditionWaiter,
    snapshotter: Arc<Snapshotter>,
    aliases: Arc<AliasRegistry>,
    cancel: CancellationToken,
    mode: AssertionMode,
    results: Arc<Mutex<Vec<AssertionResult>>>,
}

impl CaseContext {
    pub(crate) fn new(
        case_name: String,
        config: RunConfig,
        driver: Arc<dyn DomDriver>,
        snapshotter: Arc<Snapshotter>,
        aliases: Arc<AliasRegistry>,
        cancel: CancellationToken,
        results: Arc<Mutex<Vec<AssertionResult>>>,
    ) -> Self {
        let resolver = SelectorResolver::new(driver.clone(), ResolveOptions::from_config(&config));
        let waiter = ConditionWaiter::from_config(&config);
        let mode = config.mode;
        Self {
            case_name,
            config,
            driver,
            resolver,
            waiter,
            snapshotter,
            aliases,
            cancel,
            mode,
            results,
        }
    }

    pub fn case_name(&self) -> &str {
        &self.case_name
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    // -- navigation ------------------------------------------------------

    /// Navigate to a path joined against the configured base URL.
    pub async fn visit(&self, path: &str) -> Result<()> {
        let url = self.config.resolve_url(path);
        debug!(case = %self.case_name, %url, "visit");
        self.driver.visit(&url).await
    }

    // -- selectors -------------------------------------------------------

    /// Resolve a descriptor to a non-empty set of handles, retrying until
    /// the configured budget runs out.
    pub async fn resolve(&self, descriptor: &SelectorDescriptor) -> Result<Vec<ElementHandle>> {
        self.resolver.resolve(descriptor, None, &self.cancel).await
    }

    /// Resolve within the subtree of an already-resolved element.
    pub async fn resolve_within(
        &self,
        descriptor: &SelectorDescriptor,
        scope: &ElementHandle,
    ) -> Result<Vec<ElementHandle>> {
        self.resolver.resolve(descriptor, Some(scope), &self.cancel).await
    }

    /// Resolve expecting exactly one match.
    pub async fn resolve_one(&self, descriptor: &SelectorDescriptor) -> Result<ElementHandle> {
        let mut handles = self.resolve(descriptor).await?;
        if handles.len() > 1 {
            warn!(selector = %descriptor, "expected one match, got {}", handles.len());
        }
        Ok(handles.swap_remove(0))
    }

    /// One-shot query with no retry; zero matches is a valid answer.
    pub async fn query_count(&self, descriptor: &SelectorDescriptor) -> Result<usize> {
        Ok(self.resolver.resolve_now(descriptor, None).await?.len())
    }

    pub async fn dispatch(&self, target: &ElementHandle, event: &str) -> Result<()> {
        self.driver.dispatch_event(target, event).await
    }

    // -- waiting ---------------------------------------------------------

    /// Wait for a named condition; errors with `TimedOut` past the budget.
    pub async fn wait_until(&self, condition: Condition) -> Result<()> {
        self.waiter.require(condition, &self.cancel).await
    }

    /// Wait until a selector matches at least once (visibility wait).
    pub async fn wait_visible(&self, descriptor: &SelectorDescriptor) -> Result<()> {
        self.resolve(descriptor).await.map(|_| ())
    }

    pub fn register_alias(&self, tag: impl Into<String>, matcher: RequestMatcher) {
        self.aliases.register(tag, matcher);
    }

    /// Wait for a registered network interception by tag.
    pub async fn wait_for_alias(&self, tag: &str) -> Result<InterceptedRequest> {
        self.waiter.wait_for_alias(&self.aliases, tag, None, &self.cancel).await
    }

    pub async fn wait_for_alias_within(
        &self,
        tag: &str,
        timeout: Duration,
    ) -> Result<InterceptedRequest> {
        self.waiter.wait_for_alias(&self.aliases, tag, Some(timeout), &self.cancel).await
    }

    // -- state -----------------------------------------------------------

    /// Seed application state through the backend API. A rejection is
    /// surfaced as `RejectedByBackend` and fails the case.
    pub async fn seed(&self, mutation: StateMutation) -> Result<()> {
        match self.snapshotter.seed(&mutation).await? {
            SeedOutcome::Applied { .. } => Ok(()),
            SeedOutcome::Rejected { reason } => Err(Error::RejectedByBackend(reason)),
        }
    }

    // -- assertions ------------------------------------------------------

    /// Record one assertion outcome. In soft mode a failure is recorded
    /// and the body continues; in hard mode it aborts the case via `?`.
    pub fn assert(&self, passed: bool, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        let mut results = self.results.lock();
        let index = results.len();
        results.push(AssertionResult {
            case_name: self.case_name.clone(),
            assertion_index: index,
            passed,
            message: message.clone(),
        });
        drop(results);

        if passed {
            return Ok(());
        }
        debug!(case = %self.case_name, index, %message, "assertion failed");
        match self.mode {
            AssertionMode::Soft => Ok(()),
            AssertionMode::Hard => Err(Error::AssertionFailed(message)),
        }
    }

    pub fn assert_text_eq(&self, handle: &ElementHandle, expected: &str) -> Result<()> {
        self.assert(
            handle.text == expected,
            format!("text of <{}> equals {:?} (was {:?})", handle.tag, expected, handle.text),
        )
    }

    pub fn assert_text_contains(&self, handle: &ElementHandle, needle: &str) -> Result<()> {
        self.assert(
            handle.text.contains(needle),
            format!("text of <{}> contains {:?} (was {:?})", handle.tag, needle, handle.text),
        )
    }

    pub fn assert_attribute(&self, handle: &ElementHandle, name: &str, expected: &str) -> Result<()> {
        let actual = handle.attribute(name);
        self.assert(
            actual == Some(expected),
            format!("attribute {name:?} equals {expected:?} (was {actual:?})"),
        )
    }

    pub fn assert_count(
        &self,
        descriptor: &SelectorDescriptor,
        actual: usize,
        expected: usize,
    ) -> Result<()> {
        self.assert(
            actual == expected,
            format!("{descriptor} matches {expected} element(s) (was {actual})"),
        )
    }
}
