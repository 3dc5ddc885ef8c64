//! Phase identity, lifecycle status and per-phase records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::component::ComponentPhaseResult;
use super::error::ConfigError;
use super::result::{SuiteSummary, TestSuiteResult};

/// Top-level validation categories, in execution order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Integration,
    Regression,
    Performance,
    ComponentAssessment,
    Compatibility,
}

impl PhaseKind {
    /// Fixed execution order.
    pub const ALL: [PhaseKind; 5] = [
        PhaseKind::Integration,
        PhaseKind::Regression,
        PhaseKind::Performance,
        PhaseKind::ComponentAssessment,
        PhaseKind::Compatibility,
    ];

    /// Get the phase name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            PhaseKind::Integration => "integration",
            PhaseKind::Regression => "regression",
            PhaseKind::Performance => "performance",
            PhaseKind::ComponentAssessment => "component_assessment",
            PhaseKind::Compatibility => "compatibility",
        }
    }

    /// Stem of the persisted result blob.
    pub fn artifact_stem(&self) -> &'static str {
        match self {
            PhaseKind::Integration => "integration_results",
            PhaseKind::Regression => "regression_results",
            PhaseKind::Performance => "performance_results",
            PhaseKind::ComponentAssessment => "component_validation",
            PhaseKind::Compatibility => "compatibility_results",
        }
    }

    /// Human-readable title.
    pub fn title(&self) -> &'static str {
        match self {
            PhaseKind::Integration => "Integration",
            PhaseKind::Regression => "Regression",
            PhaseKind::Performance => "Performance",
            PhaseKind::ComponentAssessment => "Component Assessment",
            PhaseKind::Compatibility => "Compatibility",
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PhaseKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "integration" => Ok(PhaseKind::Integration),
            "regression" => Ok(PhaseKind::Regression),
            "performance" => Ok(PhaseKind::Performance),
            "component_assessment" | "components" | "component" => {
                Ok(PhaseKind::ComponentAssessment)
            }
            "compatibility" => Ok(PhaseKind::Compatibility),
            other => Err(ConfigError::UnknownPhase {
                name: other.to_string(),
            }),
        }
    }
}

/// Phase lifecycle: `Pending -> Running -> {Completed, Failed}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl PhaseStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PhaseStatus::Completed | PhaseStatus::Failed)
    }
}

/// What a phase produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PhaseOutput {
    Suite(TestSuiteResult),
    Components(ComponentPhaseResult),
}

impl PhaseOutput {
    /// Success as reported by the phase itself.
    pub fn success(&self) -> bool {
        match self {
            PhaseOutput::Suite(s) => s.summary.overall_success,
            PhaseOutput::Components(c) => c.overall_success,
        }
    }

    pub fn suite(&self) -> Option<&TestSuiteResult> {
        match self {
            PhaseOutput::Suite(s) => Some(s),
            PhaseOutput::Components(_) => None,
        }
    }

    pub fn components(&self) -> Option<&ComponentPhaseResult> {
        match self {
            PhaseOutput::Components(c) => Some(c),
            PhaseOutput::Suite(_) => None,
        }
    }
}

/// One phase's entry in a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseRecord {
    pub phase: PhaseKind,
    pub status: PhaseStatus,
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub output: Option<PhaseOutput>,
    /// Contained setup error that demoted the phase.
    pub error: Option<String>,
}

impl PhaseRecord {
    pub fn pending(phase: PhaseKind) -> Self {
        Self {
            phase,
            status: PhaseStatus::Pending,
            success: false,
            started_at: Utc::now(),
            duration_ms: 0,
            output: None,
            error: None,
        }
    }

    pub fn completed(
        phase: PhaseKind,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        output: PhaseOutput,
    ) -> Self {
        Self {
            phase,
            status: PhaseStatus::Completed,
            success: output.success(),
            started_at,
            duration_ms,
            output: Some(output),
            error: None,
        }
    }

    pub fn failed(
        phase: PhaseKind,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            phase,
            status: PhaseStatus::Failed,
            success: false,
            started_at,
            duration_ms,
            output: None,
            error: Some(error.into()),
        }
    }

    /// Suite summary, when this phase ran a test suite.
    pub fn summary(&self) -> Option<&SuiteSummary> {
        self.output.as_ref().and_then(PhaseOutput::suite).map(|s| &s.summary)
    }

    /// Domain issues reported by the phase.
    pub fn issue_count(&self) -> usize {
        self.summary().map(|s| s.issue_count).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_names_and_artifacts() {
        assert_eq!(PhaseKind::Integration.name(), "integration");
        assert_eq!(
            PhaseKind::ComponentAssessment.artifact_stem(),
            "component_validation"
        );
        assert_eq!(
            PhaseKind::Compatibility.artifact_stem(),
            "compatibility_results"
        );
    }

    #[test]
    fn test_phase_order_is_fixed() {
        let mut shuffled = vec![
            PhaseKind::Compatibility,
            PhaseKind::Integration,
            PhaseKind::ComponentAssessment,
            PhaseKind::Performance,
            PhaseKind::Regression,
        ];
        shuffled.sort();
        assert_eq!(shuffled, PhaseKind::ALL.to_vec());
    }

    #[test]
    fn test_phase_from_str() {
        assert_eq!(
            "Component-Assessment".parse::<PhaseKind>().expect("parse"),
            PhaseKind::ComponentAssessment
        );
        assert_eq!(
            " regression ".parse::<PhaseKind>().expect("parse"),
            PhaseKind::Regression
        );
        assert!("fuzz".parse::<PhaseKind>().is_err());
    }

    #[test]
    fn test_failed_record_is_unsuccessful() {
        let record = PhaseRecord::failed(PhaseKind::Performance, Utc::now(), 4, "setup failed");
        assert_eq!(record.status, PhaseStatus::Failed);
        assert!(!record.success);
        assert!(record.status.is_terminal());
        assert_eq!(record.issue_count(), 0);
    }
}
