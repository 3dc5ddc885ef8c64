//! Test case and test suite results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::payload::TestPayload;

/// Outcome of a single isolated test case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestCaseResult {
    /// Test name.
    pub name: String,

    /// Whether the body returned without error.
    pub success: bool,

    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,

    /// Error message when the body failed.
    pub error: Option<String>,

    /// Domain fields set by the body.
    #[serde(default)]
    pub payload: TestPayload,
}

impl TestCaseResult {
    pub fn passed(name: impl Into<String>, duration_ms: u64, payload: TestPayload) -> Self {
        Self {
            name: name.into(),
            success: true,
            duration_ms,
            error: None,
            payload,
        }
    }

    pub fn failed(name: impl Into<String>, duration_ms: u64, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success: false,
            duration_ms,
            error: Some(error.into()),
            payload: TestPayload::default(),
        }
    }

    /// Executed cleanly but flagged an unacceptable outcome.
    pub fn has_issue(&self) -> bool {
        self.success && self.payload.has_issue()
    }
}

/// Aggregate statistics over a suite run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SuiteSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub issue_count: usize,
    /// passed / total, 0.0 for an empty suite.
    pub success_rate: f64,
    pub overall_success: bool,
}

impl SuiteSummary {
    /// Compute the summary over a set of results.
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a TestCaseResult>) -> Self {
        let mut total = 0usize;
        let mut passed = 0usize;
        let mut issue_count = 0usize;

        for r in results {
            total += 1;
            if r.success {
                passed += 1;
                if r.payload.has_issue() {
                    issue_count += 1;
                }
            }
        }

        let failed = total - passed;
        let success_rate = if total == 0 {
            0.0
        } else {
            passed as f64 / total as f64
        };

        Self {
            total,
            passed,
            failed,
            issue_count,
            success_rate,
            overall_success: failed == 0 && issue_count == 0,
        }
    }
}

/// Results of one suite run, keyed by test name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestSuiteResult {
    pub suite_name: String,

    /// Test names in execution order.
    pub order: Vec<String>,

    pub results: BTreeMap<String, TestCaseResult>,

    pub summary: SuiteSummary,

    pub duration_ms: u64,
}

impl TestSuiteResult {
    /// Build from results in execution order. A repeated name keeps the last result.
    pub fn new(suite_name: impl Into<String>, ordered: Vec<TestCaseResult>, duration_ms: u64) -> Self {
        let mut order = Vec::with_capacity(ordered.len());
        let mut results = BTreeMap::new();
        for r in ordered {
            if !results.contains_key(&r.name) {
                order.push(r.name.clone());
            }
            results.insert(r.name.clone(), r);
        }
        let summary = SuiteSummary::from_results(results.values());

        Self {
            suite_name: suite_name.into(),
            order,
            results,
            summary,
            duration_ms,
        }
    }

    /// Results in execution order.
    pub fn ordered(&self) -> impl Iterator<Item = &TestCaseResult> {
        self.order.iter().filter_map(|name| self.results.get(name))
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestCaseResult> {
        self.ordered().filter(|r| !r.success)
    }

    pub fn issues(&self) -> impl Iterator<Item = &TestCaseResult> {
        self.ordered().filter(|r| r.has_issue())
    }
}
