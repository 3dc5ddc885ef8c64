//! Component assessment results.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Weight of each structural check in the structural score.
pub const WEIGHT_EXISTS: f64 = 0.2;
pub const WEIGHT_WELL_FORMED: f64 = 0.2;
pub const WEIGHT_INSTANTIABLE: f64 = 0.3;
pub const WEIGHT_ENTRY_POINT: f64 = 0.2;
pub const WEIGHT_DOCUMENTED: f64 = 0.1;

/// Share of the capability sub-score in the blended quality score.
pub const CAPABILITY_BLEND: f64 = 0.2;

/// The five binary health checks run against a component.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StructuralChecks {
    pub exists: bool,
    pub well_formed: bool,
    pub instantiable: bool,
    pub has_entry_point: bool,
    pub documented: bool,
}

impl StructuralChecks {
    /// Weighted structural score in [0, 100].
    pub fn score(&self) -> f64 {
        let weighted = [
            (self.exists, WEIGHT_EXISTS),
            (self.well_formed, WEIGHT_WELL_FORMED),
            (self.instantiable, WEIGHT_INSTANTIABLE),
            (self.has_entry_point, WEIGHT_ENTRY_POINT),
            (self.documented, WEIGHT_DOCUMENTED),
        ]
        .iter()
        .filter(|(ok, _)| *ok)
        .map(|(_, w)| w)
        .sum::<f64>();
        weighted * 100.0
    }

    /// Documentation and capabilities never affect validity.
    pub fn is_valid(&self) -> bool {
        self.exists && self.well_formed && self.instantiable
    }
}

/// Presence of component-specific capability markers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CapabilityCheck {
    pub required: Vec<String>,
    pub found: Vec<String>,
    pub missing: Vec<String>,
}

impl CapabilityCheck {
    /// found / required in [0, 100]; an empty checklist scores 100.
    pub fn score(&self) -> f64 {
        if self.required.is_empty() {
            100.0
        } else {
            self.found.len() as f64 / self.required.len() as f64 * 100.0
        }
    }
}

/// Assessment of one named component.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComponentAssessment {
    pub name: String,
    pub source_path: PathBuf,
    pub checks: StructuralChecks,
    pub capabilities: Option<CapabilityCheck>,
    pub structural_score: f64,
    pub quality_score: f64,
    pub is_valid: bool,
    /// Non-fatal observations, e.g. a constructor probe error.
    #[serde(default)]
    pub notes: Vec<String>,
}

impl ComponentAssessment {
    /// Derive scores and validity from the raw check outcomes.
    pub fn new(
        name: impl Into<String>,
        source_path: PathBuf,
        checks: StructuralChecks,
        capabilities: Option<CapabilityCheck>,
        notes: Vec<String>,
    ) -> Self {
        let structural_score = checks.score();
        let quality_score = match &capabilities {
            Some(cap) => structural_score * (1.0 - CAPABILITY_BLEND) + cap.score() * CAPABILITY_BLEND,
            None => structural_score,
        };

        Self {
            name: name.into(),
            source_path,
            checks,
            capabilities,
            structural_score,
            quality_score: quality_score.clamp(0.0, 100.0),
            is_valid: checks.is_valid(),
            notes,
        }
    }
}

/// Phase-level summary over all configured components.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ComponentPhaseResult {
    pub assessments: BTreeMap<String, ComponentAssessment>,
    /// Components whose source could not be located.
    pub not_found: Vec<String>,
    pub total: usize,
    pub valid_count: usize,
    /// Mean quality score over assessed components; 0 when none were assessed.
    pub average_score: f64,
    pub overall_success: bool,
    pub duration_ms: u64,
}

impl ComponentPhaseResult {
    pub fn new(
        assessments: Vec<ComponentAssessment>,
        not_found: Vec<String>,
        duration_ms: u64,
    ) -> Self {
        let total = assessments.len() + not_found.len();
        let valid_count = assessments.iter().filter(|a| a.is_valid).count();
        let average_score = if assessments.is_empty() {
            0.0
        } else {
            assessments.iter().map(|a| a.quality_score).sum::<f64>() / assessments.len() as f64
        };
        let overall_success = not_found.is_empty() && valid_count == assessments.len();

        Self {
            assessments: assessments
                .into_iter()
                .map(|a| (a.name.clone(), a))
                .collect(),
            not_found,
            total,
            valid_count,
            average_score,
            overall_success,
            duration_ms,
        }
    }
}
