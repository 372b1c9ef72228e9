//! Case independence: fresh baseline per case, order-insensitive outcomes,
//! and detection of cross-case state leakage.

mod support;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use casekit_runner::common::config::{AssertionMode, RunConfig};
use casekit_runner::common::driver::{DomDriver, StateMutation};
use casekit_runner::common::report::RunReport;
use casekit_runner::common::SelectorDescriptor;
use casekit_runner::{Suite, TestRunner};

use support::{FakeDriver, FakeElement, VALID_PASS};

fn config() -> RunConfig {
    RunConfig {
        mode: AssertionMode::Soft,
        timeout_ms: 300,
        poll_interval_ms: 10,
        ..Default::default()
    }
}

/// A case that asserts the `theme` cookie is unset, then sets it.
fn theme_case(driver: Arc<FakeDriver>) -> impl Fn(casekit_runner::CaseContext) -> futures::future::BoxFuture<'static, casekit_runner::common::Result<()>> + Send + Sync {
    move |ctx| {
        let driver = driver.clone();
        Box::pin(async move {
            ctx.assert(driver.cookie("theme").is_none(), "starts from a clean session")?;
            let mut cookies = driver.read_cookies().await?;
            cookies.insert("theme".into(), "dark".into());
            driver.write_cookies(&cookies).await?;
            Ok(())
        })
    }
}

async fn run_in_order(order: &[&str]) -> RunReport {
    let driver = FakeDriver::new();
    driver.add_element("/", FakeElement::new("h1").data_cy("title").text("Home"));

    let mut suite = Suite::new();
    for name in order {
        match *name {
            "mutates-theme" => {
                suite = suite.case("mutates-theme", theme_case(driver.clone()));
            }
            "reads-title" => {
                suite = suite.case("reads-title", |ctx| {
                    Box::pin(async move {
                        ctx.visit("/").await?;
                        let title = ctx
                            .resolve_one(&casekit_runner::common::SelectorDescriptor::attribute(
                                "data-cy=title",
                            ))
                            .await?;
                        ctx.assert_text_eq(&title, "Home")?;
                        Ok(())
                    })
                });
            }
            other => panic!("unknown case: {other}"),
        }
    }

    TestRunner::new(config(), driver).run(suite).await.unwrap()
}

fn outcomes_by_name(report: &RunReport) -> HashMap<String, bool> {
    report.cases.iter().map(|c| (c.name.clone(), c.passed)).collect()
}

#[tokio::test]
async fn outcomes_do_not_depend_on_execution_order() {
    let forward = run_in_order(&["mutates-theme", "reads-title"]).await;
    let reverse = run_in_order(&["reads-title", "mutates-theme"]).await;
    assert_eq!(outcomes_by_name(&forward), outcomes_by_name(&reverse));
}

#[tokio::test]
async fn baseline_restore_gives_each_case_a_fresh_session() {
    // Both instances of the mutating case must see a clean session: the
    // runner restores the baseline between them.
    let driver = FakeDriver::new();
    let suite = Suite::new()
        .case("first-writer", theme_case(driver.clone()))
        .case("second-writer", theme_case(driver.clone()));

    let report = TestRunner::new(config(), driver).run(suite).await.unwrap();

    // The clean-session assertion passed in both cases...
    for case in &report.cases {
        let first = report
            .assertions
            .iter()
            .find(|a| a.case_name == case.name && a.assertion_index == 0)
            .unwrap();
        assert!(first.passed, "{} did not start clean", case.name);
    }
}

#[tokio::test]
async fn leaked_state_is_flagged_against_the_leaking_case() {
    let driver = FakeDriver::new();
    let leaky_driver = driver.clone();

    let suite = Suite::new()
        .case("leaky", move |ctx| {
            let driver = leaky_driver.clone();
            Box::pin(async move {
                // A cookie the baseline restore cannot remove again.
                driver.set_cookie("theme", "dark");
                driver.make_sticky("theme");
                ctx.assert(true, "did its work")?;
                Ok(())
            })
        })
        .case("clean", |ctx| {
            Box::pin(async move {
                ctx.assert(true, "unaffected sibling")?;
                Ok(())
            })
        });

    let report = TestRunner::new(config(), driver).run(suite).await.unwrap();

    let leaky = report.cases.iter().find(|c| c.name == "leaky").unwrap();
    assert!(!leaky.passed);
    assert!(leaky.error.as_deref().unwrap().contains("isolation violation"));

    // The violation is one more assertion-level entry on the leaky case.
    let violation = report
        .assertions
        .iter()
        .find(|a| a.case_name == "leaky" && !a.passed)
        .unwrap();
    assert!(violation.message.contains("theme"));

    let clean = report.cases.iter().find(|c| c.name == "clean").unwrap();
    assert!(clean.passed);
}

#[tokio::test]
async fn parallel_workers_do_not_disturb_each_others_sessions() {
    // Each worker owns its own session: a sibling worker's baseline
    // restore must not clear state a case is using mid-flight.
    let driver = FakeDriver::new();
    let backend = driver.backend();

    let mut suite = Suite::new();
    for email in ["alpha@email.com", "beta@email.com"] {
        suite = suite.case(format!("profile for {email}"), move |ctx| {
            Box::pin(async move {
                ctx.seed(StateMutation::new(
                    "/login",
                    serde_json::json!({ "email": email, "pass": VALID_PASS }),
                ))
                .await?;
                // Long enough for the sibling worker to finish and restore.
                tokio::time::sleep(Duration::from_millis(80)).await;
                ctx.visit("/profile").await?;
                let handle = ctx
                    .resolve_one(&SelectorDescriptor::attribute("data-cy=profile-email"))
                    .await?;
                ctx.assert_text_eq(&handle, email)?;
                Ok(())
            })
        });
    }

    let config = RunConfig { workers: 2, ..config() };
    let report = TestRunner::new(config, driver).with_backend(backend).run(suite).await.unwrap();
    assert!(report.all_passed(), "report: {report:?}");
}

#[tokio::test]
async fn parallel_workers_keep_declaration_order_in_report() {
    let driver = FakeDriver::new();
    let mut suite = Suite::new();
    for i in 0..4 {
        suite = suite.case(format!("case-{i}"), move |ctx| {
            Box::pin(async move {
                ctx.assert(true, "trivial check")?;
                Ok(())
            })
        });
    }

    let config = RunConfig { workers: 2, ..config() };
    let report = TestRunner::new(config, driver).run(suite).await.unwrap();

    let names: Vec<&str> = report.cases.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["case-0", "case-1", "case-2", "case-3"]);
    assert!(report.all_passed());
}
