//! Selector resolution behavior: strict policy, retry with backoff,
//! exhaustion of the retry budget.

mod support;

use std::time::Duration;
use tokio_util::sync::CancellationToken;

use casekit_runner::common::driver::DomDriver;
use casekit_runner::common::error::Error;
use casekit_runner::common::selector::{SelectorDescriptor, SelectorPolicy};
use casekit_runner::resolver::{ResolveOptions, SelectorResolver};

use support::{FakeDriver, FakeElement};

fn options(policy: SelectorPolicy) -> ResolveOptions {
    ResolveOptions {
        timeout: Duration::from_millis(500),
        initial_poll: Duration::from_millis(10),
        backoff_cap: Duration::from_millis(50),
        policy,
    }
}

#[tokio::test]
async fn strict_policy_rejects_css_class_selector() {
    let driver = FakeDriver::new();
    driver.add_element("/", FakeElement::new("button").attr("class", "button primary"));
    driver.visit("http://app.local/").await.unwrap();

    let resolver = SelectorResolver::new(driver.clone(), options(SelectorPolicy::Strict));
    let cancel = CancellationToken::new();

    let err = resolver
        .resolve(&SelectorDescriptor::css(".button"), None, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnstableSelector { .. }));
    // Rejected before the first query, not after retrying.
    assert_eq!(driver.query_count(), 0);
}

#[tokio::test]
async fn strict_policy_accepts_data_attribute() {
    let driver = FakeDriver::new();
    driver.add_element("/", FakeElement::new("a").data_cy("link"));
    driver.visit("http://app.local/").await.unwrap();

    let resolver = SelectorResolver::new(driver.clone(), options(SelectorPolicy::Strict));
    let cancel = CancellationToken::new();

    let handles = resolver
        .resolve(&SelectorDescriptor::attribute("data-cy=link"), None, &cancel)
        .await
        .unwrap();
    assert_eq!(handles.len(), 1);
    assert_eq!(handles[0].tag, "a");
}

#[tokio::test]
async fn resolve_retries_until_element_renders() {
    let driver = FakeDriver::new();
    // Element only matches from the third query onwards.
    driver.add_element_after("/", FakeElement::new("div").data_cy("late"), 3);
    driver.visit("http://app.local/").await.unwrap();

    let resolver = SelectorResolver::new(driver.clone(), options(SelectorPolicy::Lenient));
    let cancel = CancellationToken::new();

    let handles = resolver
        .resolve(&SelectorDescriptor::attribute("data-cy=late"), None, &cancel)
        .await
        .unwrap();
    assert_eq!(handles.len(), 1);
    assert!(driver.query_count() >= 3);
}

#[tokio::test]
async fn resolve_surfaces_not_found_after_budget() {
    let driver = FakeDriver::new();
    driver.visit("http://app.local/").await.unwrap();

    let resolver = SelectorResolver::new(driver.clone(), options(SelectorPolicy::Lenient));
    let cancel = CancellationToken::new();

    let err = resolver
        .resolve(&SelectorDescriptor::attribute("data-cy=ghost"), None, &cancel)
        .await
        .unwrap_err();
    match err {
        Error::NotFound { selector, waited_ms } => {
            assert!(selector.contains("data-cy=ghost"));
            assert!(waited_ms >= 500);
        }
        other => panic!("unexpected error: {other}"),
    }
    // Retried more than once inside the budget.
    assert!(driver.query_count() > 1);
}

#[tokio::test]
async fn resolve_stops_on_cancellation() {
    let driver = FakeDriver::new();
    driver.visit("http://app.local/").await.unwrap();

    let resolver = SelectorResolver::new(
        driver.clone(),
        ResolveOptions { timeout: Duration::from_secs(30), ..options(SelectorPolicy::Lenient) },
    );
    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();

    let handle = tokio::spawn(async move {
        resolver
            .resolve(&SelectorDescriptor::attribute("data-cy=never"), None, &task_cancel)
            .await
    });
    tokio::time::sleep(Duration::from_millis(30)).await;
    cancel.cancel();

    let result = handle.await.unwrap();
    assert!(matches!(result, Err(Error::Cancelled)));
}
