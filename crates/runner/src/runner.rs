//! Case execution
//!
//! Runs the suite's cases in declaration order, each against a freshly
//! restored baseline snapshot. With `workers > 1` cases are distributed
//! round-robin over isolated workers; each worker opens its own driver
//! session, captures its own baseline and owns its own snapshotter, so one
//! worker's restore can never touch state a sibling's case is using. The
//! reporter buffers per case and merges in declaration order, so parallel
//! runs produce the same report layout as sequential ones.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use casekit_common::config::RunConfig;
use casekit_common::driver::{DomDriver, StateBackend};
use casekit_common::error::{Error, Result};
use casekit_common::report::{CaseOutcome, RunReport};
use casekit_common::state::StateSnapshot;

use crate::case::{CaseContext, Suite, TestCase};
use crate::intercept::AliasRegistry;
use crate::reporter::RunReporter;
use crate::snapshot::Snapshotter;

/// Orchestrates a suite run end to end
pub struct TestRunner {
    config: RunConfig,
    driver: Arc<dyn DomDriver>,
    backend: Option<Arc<dyn StateBackend>>,
    aliases: Arc<AliasRegistry>,
}

impl TestRunner {
    pub fn new(config: RunConfig, driver: Arc<dyn DomDriver>) -> Self {
        Self { config, driver, backend: None, aliases: Arc::new(AliasRegistry::new()) }
    }

    /// Attach a state backend for programmatic seeding.
    pub fn with_backend(mut self, backend: Arc<dyn StateBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// The interception registry; driver integrations feed observed
    /// requests into it.
    pub fn aliases(&self) -> Arc<AliasRegistry> {
        self.aliases.clone()
    }

    /// Run every case in the suite and produce the finalized report.
    ///
    /// The only error this returns is a fatal one (driver connection loss
    /// or a harness defect); ordinary case failures land in the report.
    pub async fn run(&self, suite: Suite) -> Result<RunReport> {
        self.config.validate()?;

        // Driver loss is the one fatal condition; probe before doing work.
        self.driver.ping().await?;

        let cases: Vec<(usize, TestCase)> = suite.into_cases().into_iter().enumerate().collect();
        info!("Running {} case(s)...", cases.len());

        let reporter = RunReporter::new();

        let workers = self.config.workers.min(cases.len().max(1));
        if workers <= 1 {
            run_worker(
                self.config.clone(),
                self.driver.clone(),
                self.backend.clone(),
                self.aliases.clone(),
                cases,
                reporter.clone(),
            )
            .await?;
        } else {
            let mut buckets: Vec<Vec<(usize, TestCase)>> =
                (0..workers).map(|_| Vec::new()).collect();
            for (i, entry) in cases.into_iter().enumerate() {
                buckets[i % workers].push(entry);
            }

            let mut handles = Vec::with_capacity(workers);
            for bucket in buckets {
                // Each worker owns an isolated session; snapshots are
                // never shared across workers.
                let session = self.driver.open_session().await?;
                handles.push(tokio::spawn(run_worker(
                    self.config.clone(),
                    session,
                    self.backend.clone(),
                    self.aliases.clone(),
                    bucket,
                    reporter.clone(),
                )));
            }
            for handle in handles {
                handle
                    .await
                    .map_err(|e| Error::Internal(format!("worker panicked: {e}")))??;
            }
        }

        let report = reporter.finalize();
        info!(
            "Case results: {} passed, {} failed ({} ms)",
            report.passed_cases, report.failed_cases, report.duration_ms
        );
        Ok(report)
    }
}

/// Execute one worker's share of the suite sequentially against the
/// worker's own driver session.
async fn run_worker(
    config: RunConfig,
    driver: Arc<dyn DomDriver>,
    backend: Option<Arc<dyn StateBackend>>,
    aliases: Arc<AliasRegistry>,
    cases: Vec<(usize, TestCase)>,
    reporter: RunReporter,
) -> Result<()> {
    let snapshotter = Arc::new(match backend {
        Some(backend) => Snapshotter::with_backend(driver.clone(), backend),
        None => Snapshotter::new(driver.clone()),
    });
    let baseline = snapshotter.capture().await?;

    // The case that last ran on this worker, for attributing leaks, and
    // the leaks already reported so an unremovable one is flagged once.
    let mut previous: Option<(usize, String)> = None;
    let mut known_leaks: Vec<String> = Vec::new();

    for (index, case) in cases {
        // Within-case mutations (logins, clicks, seeds) are expected and
        // rolled back here; only state that survives the restore is a
        // leak, attributed to the case that last ran on this worker.
        snapshotter.restore(&baseline).await?;
        check_isolation(&snapshotter, &baseline, previous.as_ref(), &reporter, &mut known_leaks)
            .await?;

        let cancel = CancellationToken::new();
        let results = Arc::new(Mutex::new(Vec::new()));
        let ctx = CaseContext::new(
            case.name.clone(),
            config.clone(),
            driver.clone(),
            snapshotter.clone(),
            aliases.clone(),
            cancel.clone(),
            results.clone(),
        );

        let start = Instant::now();
        let result = (case.body())(ctx).await;
        // Release any waiter or resolver loop the body left behind.
        cancel.cancel();

        let assertions = std::mem::take(&mut *results.lock());
        let duration_ms = start.elapsed().as_millis() as u64;
        let failed = assertions.iter().filter(|a| !a.passed).count();

        let mut fatal = None;
        let case_error = match result {
            Ok(()) => None,
            // Hard-mode abort: the failure is already recorded as an
            // assertion, the case outcome just reflects it.
            Err(Error::AssertionFailed(_)) => None,
            Err(e) if e.is_fatal() => {
                let message = e.to_string();
                fatal = Some(e);
                Some(message)
            }
            Err(e) => Some(e.to_string()),
        };

        let passed = case_error.is_none() && failed == 0;
        if passed {
            info!("✓ {} ({} ms)", case.name, duration_ms);
        } else {
            error!(
                "✗ {} - {}",
                case.name,
                case_error.as_deref().unwrap_or("assertion failure")
            );
        }

        let total_assertions = assertions.len();
        for assertion in assertions {
            reporter.record(index, assertion);
        }
        reporter.record_case(
            index,
            CaseOutcome {
                name: case.name.clone(),
                passed,
                assertions: total_assertions,
                failed_assertions: failed,
                duration_ms,
                error: case_error,
            },
        );

        if let Some(e) = fatal {
            error!("aborting run: {}", e);
            return Err(e);
        }

        previous = Some((index, case.name));
    }

    // The last case gets the same leak scrutiny as the others.
    snapshotter.restore(&baseline).await?;
    check_isolation(&snapshotter, &baseline, previous.as_ref(), &reporter, &mut known_leaks)
        .await?;
    Ok(())
}

/// Verify the restore actually took: diff live state against the baseline
/// and attribute anything that survived to the case that last ran on this
/// worker.
async fn check_isolation(
    snapshotter: &Snapshotter,
    baseline: &StateSnapshot,
    previous: Option<&(usize, String)>,
    reporter: &RunReporter,
    known_leaks: &mut Vec<String>,
) -> Result<()> {
    let leaks: Vec<String> = snapshotter
        .residual_state(baseline)
        .await?
        .into_iter()
        .filter(|leak| !known_leaks.contains(leak))
        .collect();
    if leaks.is_empty() {
        return Ok(());
    }
    known_leaks.extend(leaks.iter().cloned());
    if let Some((index, name)) = previous {
        let violation = Error::IsolationViolation(leaks.join("; "));
        warn!(case = %name, "{}", violation);
        reporter.flag_violation(*index, name, violation.to_string());
    } else {
        // Unrestorable state before the first case means the environment,
        // not a case, is at fault.
        warn!("session state differs from baseline before the first case: {}", leaks.join("; "));
    }
    Ok(())
}
