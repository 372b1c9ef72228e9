//! Assertion-level run reporting
//!
//! The reporter is the only resource shared across workers. Appends go
//! into per-case buffers under a lock; finalize merges the buffers in case
//! declaration order, so the final report is deterministic regardless of
//! how workers interleaved.

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use casekit_common::report::{AssertionResult, CaseOutcome, RunReport};

#[derive(Default)]
struct CaseBuffer {
    assertions: Vec<AssertionResult>,
    outcome: Option<CaseOutcome>,
}

struct Inner {
    started: Instant,
    buffers: BTreeMap<usize, CaseBuffer>,
}

/// Collects per-assertion results, keyed by case declaration index
#[derive(Clone)]
pub struct RunReporter {
    inner: Arc<Mutex<Inner>>,
}

impl Default for RunReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl RunReporter {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner { started: Instant::now(), buffers: BTreeMap::new() })),
        }
    }

    /// Append one assertion result for a case. Never merged or collapsed.
    pub fn record(&self, case_index: usize, result: AssertionResult) {
        let mut inner = self.inner.lock();
        inner.buffers.entry(case_index).or_default().assertions.push(result);
    }

    pub fn record_case(&self, case_index: usize, outcome: CaseOutcome) {
        let mut inner = self.inner.lock();
        inner.buffers.entry(case_index).or_default().outcome = Some(outcome);
    }

    /// Retroactively fail a case that leaked state past its restore point.
    /// The violation lands as one more failed assertion on that case so it
    /// stays visible at assertion granularity.
    pub fn flag_violation(&self, case_index: usize, case_name: &str, message: String) {
        let mut inner = self.inner.lock();
        let buffer = inner.buffers.entry(case_index).or_default();
        let index = buffer.assertions.len();
        buffer.assertions.push(AssertionResult {
            case_name: case_name.to_string(),
            assertion_index: index,
            passed: false,
            message: message.clone(),
        });
        match buffer.outcome.as_mut() {
            Some(outcome) => {
                outcome.passed = false;
                outcome.failed_assertions += 1;
                outcome.assertions += 1;
                outcome.error.get_or_insert(message);
            }
            None => {
                buffer.outcome = Some(CaseOutcome {
                    name: case_name.to_string(),
                    passed: false,
                    assertions: 1,
                    failed_assertions: 1,
                    duration_ms: 0,
                    error: Some(message),
                });
            }
        }
    }

    /// Merge all buffers into the final report. Called once, after every
    /// case has completed.
    pub fn finalize(&self) -> RunReport {
        let inner = self.inner.lock();
        let mut cases = Vec::new();
        let mut assertions = Vec::new();

        for buffer in inner.buffers.values() {
            assertions.extend(buffer.assertions.iter().cloned());
            if let Some(outcome) = &buffer.outcome {
                cases.push(outcome.clone());
            }
        }

        let passed_cases = cases.iter().filter(|c| c.passed).count();
        let failed_cases = cases.len() - passed_cases;

        RunReport {
            total_cases: cases.len(),
            passed_cases,
            failed_cases,
            duration_ms: inner.started.elapsed().as_millis() as u64,
            finished_at: Utc::now(),
            cases,
            assertions,
        }
    }
}
