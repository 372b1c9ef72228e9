//! Run report model
//!
//! One `AssertionResult` per assertion, never merged: a case with N
//! assertions yields N independent pass/fail entries so a reader can tell
//! exactly which assertion broke, not just which case.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a single assertion within a case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionResult {
    pub case_name: String,
    pub assertion_index: usize,
    pub passed: bool,
    pub message: String,
}

/// Outcome of a whole case: passed iff every assertion passed and no
/// case-level error occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseOutcome {
    pub name: String,
    pub passed: bool,
    pub assertions: usize,
    pub failed_assertions: usize,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Aggregated result of a run, finalized once all cases complete
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub total_cases: usize,
    pub passed_cases: usize,
    pub failed_cases: usize,
    pub duration_ms: u64,
    pub finished_at: DateTime<Utc>,
    pub cases: Vec<CaseOutcome>,
    /// Ordered per-assertion results, grouped by case declaration order
    pub assertions: Vec<AssertionResult>,
}

impl RunReport {
    pub fn all_passed(&self) -> bool {
        self.failed_cases == 0
    }

    /// Process exit code contract: 0 iff all assertions passed.
    pub fn exit_code(&self) -> i32 {
        if self.all_passed() {
            0
        } else {
            1
        }
    }
}
