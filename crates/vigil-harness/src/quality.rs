//! Quality analysis derived from a completed validation session.
//!
//! Pure function of the session: no clocks, no I/O, so analysing the same
//! session twice yields identical results.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use vigil_core::{PhaseKind, SuiteSummary, ValidationSession};

/// Suite categories tracked by the analysis.
pub const TRACKED_CATEGORIES: [PhaseKind; 4] = [
    PhaseKind::Integration,
    PhaseKind::Regression,
    PhaseKind::Performance,
    PhaseKind::Compatibility,
];

const WEIGHT_RELIABILITY: f64 = 0.3;
const WEIGHT_COVERAGE: f64 = 0.2;
const WEIGHT_PERFORMANCE: f64 = 0.2;
const WEIGHT_COMPATIBILITY: f64 = 0.2;
const PERFORMANCE_ISSUE_PENALTY: f64 = 20.0;
const COMPATIBILITY_ISSUE_PENALTY: f64 = 15.0;
/// One point per critical issue.
const CRITICAL_ISSUE_PENALTY: f64 = 10.0 * 0.1;

pub const RECOMMEND_FULL_REVIEW: &str =
    "Overall quality score is below 70: a full review is required before release.";
pub const RECOMMEND_COVERAGE: &str =
    "Component coverage is below 80%: increase coverage of the configured components.";
pub const RECOMMEND_RELIABILITY: &str =
    "Test reliability is below 90%: improve test reliability and fix failing tests.";
pub const RECOMMEND_PERFORMANCE: &str =
    "Performance score is below 75%: optimize the operations flagged by performance tests.";
pub const RECOMMEND_EXCELLENT: &str = "Quality is excellent; the target is ready for deployment.";

/// Normalised category metrics, each in [0, 100].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct QualityMetrics {
    pub coverage_pct: f64,
    pub reliability_pct: f64,
    pub performance_pct: f64,
    pub compatibility_pct: f64,
}

/// Component figures feeding the coverage metric.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ComponentCoverage {
    pub tested: usize,
    pub total: usize,
    pub average_score: f64,
}

/// Score band.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    NeedsImprovement,
    Acceptable,
    Good,
    VeryGood,
    Excellent,
}

impl QualityLevel {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 95.0 => QualityLevel::Excellent,
            s if s >= 85.0 => QualityLevel::VeryGood,
            s if s >= 75.0 => QualityLevel::Good,
            s if s >= 60.0 => QualityLevel::Acceptable,
            _ => QualityLevel::NeedsImprovement,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            QualityLevel::Excellent => "EXCELLENT",
            QualityLevel::VeryGood => "VERY GOOD",
            QualityLevel::Good => "GOOD",
            QualityLevel::Acceptable => "ACCEPTABLE",
            QualityLevel::NeedsImprovement => "NEEDS IMPROVEMENT",
        }
    }

    /// Closing verdict for reports.
    pub fn verdict(&self) -> &'static str {
        match self {
            QualityLevel::Excellent => "Ready for deployment.",
            QualityLevel::VeryGood => "Ready for deployment after minor polish.",
            QualityLevel::Good => "Deployable once the listed recommendations are addressed.",
            QualityLevel::Acceptable => "Needs targeted improvements before deployment.",
            QualityLevel::NeedsImprovement => "Significant work required before deployment.",
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Everything the reports are rendered from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityAnalysis {
    pub session_id: String,
    pub session_success: bool,
    /// Zeroed summaries for categories the session did not run.
    pub categories: BTreeMap<PhaseKind, SuiteSummary>,
    pub components: ComponentCoverage,
    pub metrics: QualityMetrics,
    pub critical_issues: Vec<String>,
    pub overall_score: f64,
    pub quality_level: QualityLevel,
    pub recommendations: Vec<String>,
}

impl QualityAnalysis {
    pub fn category(&self, kind: PhaseKind) -> SuiteSummary {
        self.categories.get(&kind).cloned().unwrap_or_default()
    }

    pub fn has_critical_issues(&self) -> bool {
        !self.critical_issues.is_empty()
    }
}

/// Analyse a completed session.
pub fn analyze_session(session: &ValidationSession) -> QualityAnalysis {
    let categories: BTreeMap<PhaseKind, SuiteSummary> = TRACKED_CATEGORIES
        .iter()
        .map(|&kind| {
            let summary = session
                .phase(kind)
                .and_then(|r| r.summary())
                .cloned()
                .unwrap_or_default();
            (kind, summary)
        })
        .collect();

    let components = component_coverage(session);
    let metrics = compute_metrics(&categories, &components);
    let critical_issues = critical_issues(session);
    let overall_score = overall_score(&metrics, critical_issues.len());
    let recommendations = recommendations(&metrics, overall_score, critical_issues.len());

    QualityAnalysis {
        session_id: session.session_id.clone(),
        session_success: session.overall_success,
        categories,
        components,
        metrics,
        critical_issues,
        overall_score,
        quality_level: QualityLevel::from_score(overall_score),
        recommendations,
    }
}

fn component_coverage(session: &ValidationSession) -> ComponentCoverage {
    let result = session
        .phase(PhaseKind::ComponentAssessment)
        .and_then(|r| r.output.as_ref())
        .and_then(|o| o.components());

    ComponentCoverage {
        tested: result.map_or(0, |r| r.valid_count),
        // The assessor may have been registered with its own component list.
        total: result.map_or(session.config.components.len(), |r| r.total),
        average_score: result.map_or(0.0, |r| r.average_score),
    }
}

fn pct(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn compute_metrics(
    categories: &BTreeMap<PhaseKind, SuiteSummary>,
    components: &ComponentCoverage,
) -> QualityMetrics {
    let summary = |kind| categories.get(&kind).cloned().unwrap_or_default();
    let reliability_base = [
        PhaseKind::Integration,
        PhaseKind::Regression,
        PhaseKind::Performance,
    ];
    let passed: usize = reliability_base.iter().map(|&k| summary(k).passed).sum();
    let total: usize = reliability_base.iter().map(|&k| summary(k).total).sum();

    let performance_issues = summary(PhaseKind::Performance).issue_count as f64;
    let regression_issues = summary(PhaseKind::Regression).issue_count as f64;

    QualityMetrics {
        coverage_pct: pct(components.tested, components.total),
        reliability_pct: pct(passed, total),
        performance_pct: (100.0 - PERFORMANCE_ISSUE_PENALTY * performance_issues).max(0.0),
        compatibility_pct: (100.0 - COMPATIBILITY_ISSUE_PENALTY * regression_issues).max(0.0),
    }
}

fn critical_issues(session: &ValidationSession) -> Vec<String> {
    let mut issues = Vec::new();

    if !session.overall_success {
        match &session.session_error {
            Some(err) => issues.push(format!("Validation session failed: {err}")),
            None => issues.push("Validation session failed".to_string()),
        }
    }

    for kind in session.config.ordered_phases() {
        let Some(record) = session.phase(kind) else {
            issues.push(format!("{} phase produced no result", kind.title()));
            continue;
        };

        if !record.success {
            let detail = match (&record.error, record.summary()) {
                (Some(err), _) => err.clone(),
                (None, Some(s)) if s.failed > 0 => format!("{} failed test(s)", s.failed),
                (None, Some(_)) => "domain issues reported".to_string(),
                (None, None) => match record.output.as_ref().and_then(|o| o.components()) {
                    Some(c) => format!(
                        "{}/{} components valid, {} not found",
                        c.valid_count,
                        c.total,
                        c.not_found.len()
                    ),
                    None => format!("phase ended {:?}", record.status).to_lowercase(),
                },
            };
            issues.push(format!("{} phase failed: {detail}", kind.title()));
        }

        let issue_count = record.issue_count();
        if issue_count > 0 {
            issues.push(format!(
                "{} phase reported {issue_count} domain issue(s)",
                kind.title()
            ));
        }
    }

    issues
}

/// Weighted score minus the critical-issue penalty, clamped to [0, 100].
pub fn overall_score(metrics: &QualityMetrics, critical_issue_count: usize) -> f64 {
    let raw = WEIGHT_RELIABILITY * metrics.reliability_pct
        + WEIGHT_COVERAGE * metrics.coverage_pct
        + WEIGHT_PERFORMANCE * metrics.performance_pct
        + WEIGHT_COMPATIBILITY * metrics.compatibility_pct;
    (raw - CRITICAL_ISSUE_PENALTY * critical_issue_count as f64).clamp(0.0, 100.0)
}

fn recommendations(metrics: &QualityMetrics, score: f64, critical_count: usize) -> Vec<String> {
    let mut out = Vec::new();
    if score < 70.0 {
        out.push(RECOMMEND_FULL_REVIEW.to_string());
    }
    if metrics.coverage_pct < 80.0 {
        out.push(RECOMMEND_COVERAGE.to_string());
    }
    if metrics.reliability_pct < 90.0 {
        out.push(RECOMMEND_RELIABILITY.to_string());
    }
    if metrics.performance_pct < 75.0 {
        out.push(RECOMMEND_PERFORMANCE.to_string());
    }
    if critical_count > 0 {
        out.push(format!(
            "Fix the {critical_count} critical issue(s) before deploying."
        ));
    }
    if out.is_empty() {
        out.push(RECOMMEND_EXCELLENT.to_string());
    }
    out
}
