//! Structural and capability assessment of named components.

pub mod source;

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Instant;

use vigil_core::{
    CapabilityCheck, ComponentAssessment, ComponentPhaseResult, ComponentSpec, Logger, PhaseKind,
    PhaseOutput, ScopedLogger, StructuralChecks, ValidationConfig,
};

use crate::phase::{Phase, PhaseContext, PhaseError};
use crate::runner::panic_message;
use source::Dialect;

/// Zero-argument construction attempt for a component.
pub type ConstructorProbe = Box<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum AssessError {
    #[error("component {name} not found (tried: {tried})")]
    NotFound { name: String, tried: String },

    #[error("component {name} is not configured")]
    Unknown { name: String },
}

/// Runs the five structural checks and the capability checklist against
/// configured components.
pub struct ComponentAssessor {
    root: PathBuf,
    specs: Vec<ComponentSpec>,
    probes: HashMap<String, ConstructorProbe>,
    logger: ScopedLogger,
}

impl ComponentAssessor {
    /// Candidate paths are resolved relative to `root` unless absolute.
    pub fn new(root: impl Into<PathBuf>, specs: Vec<ComponentSpec>) -> Self {
        Self {
            root: root.into(),
            specs,
            probes: HashMap::new(),
            logger: Logger::silent().scoped(PhaseKind::ComponentAssessment.name()),
        }
    }

    pub fn from_config(config: &ValidationConfig) -> Self {
        Self::new(config.target_path.clone(), config.components.clone())
    }

    /// Register a constructor probe; it replaces the type-declaration
    /// heuristic for the instantiable check.
    pub fn with_constructor<F>(mut self, name: impl Into<String>, probe: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.probes.insert(name.into(), Box::new(probe));
        self
    }

    pub fn with_logger(mut self, logger: ScopedLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn component_names(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name.as_str()).collect()
    }

    /// First candidate path that is an existing file.
    pub fn locate(&self, spec: &ComponentSpec) -> Result<PathBuf, AssessError> {
        spec.paths
            .iter()
            .map(|p| self.resolve(p))
            .find(|p| p.is_file())
            .ok_or_else(|| AssessError::NotFound {
                name: spec.name.clone(),
                tried: spec
                    .paths
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Assess one configured component.
    pub fn assess(&self, name: &str) -> Result<ComponentAssessment, AssessError> {
        self.assess_with(name, &self.logger)
    }

    fn assess_with(
        &self,
        name: &str,
        log: &ScopedLogger,
    ) -> Result<ComponentAssessment, AssessError> {
        let spec = self
            .specs
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| AssessError::Unknown {
                name: name.to_string(),
            })?;

        let path = self.locate(spec)?;
        log.debug(format!("Assessing {name} at {}", path.display()));

        let mut notes = Vec::new();
        let dialect = Dialect::from_path(&path);
        let src = match std::fs::read_to_string(&path) {
            Ok(src) => src,
            Err(e) => {
                notes.push(format!("source unreadable: {e}"));
                let checks = StructuralChecks {
                    exists: true,
                    ..StructuralChecks::default()
                };
                return Ok(ComponentAssessment::new(name, path, checks, None, notes));
            }
        };

        let well_formed = source::is_well_formed(&src, dialect);
        if !well_formed {
            notes.push("unbalanced brackets or unterminated literal".to_string());
        }

        let instantiable = match self.probes.get(name) {
            Some(probe) => match panic::catch_unwind(AssertUnwindSafe(probe)) {
                Ok(Ok(())) => true,
                Ok(Err(e)) => {
                    notes.push(format!("constructor probe failed: {e:#}"));
                    false
                }
                Err(p) => {
                    notes.push(format!(
                        "constructor probe panicked: {}",
                        panic_message(p.as_ref())
                    ));
                    false
                }
            },
            None => {
                let type_name = source::pascal_case(name);
                let declared = well_formed && source::declares_type(&src, &type_name);
                if !declared {
                    notes.push(format!("no type named {type_name} declared"));
                }
                declared
            }
        };

        let has_entry_point = source::declares_function(&src, &spec.entry_point, dialect);
        if !has_entry_point {
            notes.push(format!("entry point `{}` not found", spec.entry_point));
        }

        let checks = StructuralChecks {
            exists: true,
            well_formed,
            instantiable,
            has_entry_point,
            documented: source::has_documentation(&src, dialect),
        };

        let capabilities = (!spec.capabilities.is_empty())
            .then(|| capability_check(&spec.capabilities, &source::function_names(&src, dialect)));

        let assessment = ComponentAssessment::new(name, path, checks, capabilities, notes);
        log.info(format!(
            "Component {name}: score {:.1}, {}",
            assessment.quality_score,
            if assessment.is_valid { "valid" } else { "invalid" }
        ));
        Ok(assessment)
    }

    /// Assess every configured component in configuration order.
    pub fn assess_all(&self) -> ComponentPhaseResult {
        self.assess_all_with(&self.logger)
    }

    fn assess_all_with(&self, log: &ScopedLogger) -> ComponentPhaseResult {
        let start = Instant::now();
        let mut assessments = Vec::new();
        let mut not_found = Vec::new();

        for spec in &self.specs {
            match self.assess_with(&spec.name, log) {
                Ok(a) => assessments.push(a),
                Err(e) => {
                    log.warning(e.to_string());
                    not_found.push(spec.name.clone());
                }
            }
        }

        let result =
            ComponentPhaseResult::new(assessments, not_found, start.elapsed().as_millis() as u64);
        log.info(format!(
            "Assessed {} components: {} valid, {} not found, average score {:.1}",
            result.total,
            result.valid_count,
            result.not_found.len(),
            result.average_score
        ));
        result
    }
}

/// Capability markers count as found when a declared function name contains them.
fn capability_check(required: &[String], functions: &[String]) -> CapabilityCheck {
    let lowered: Vec<String> = functions.iter().map(|f| f.to_lowercase()).collect();
    let (found, missing): (Vec<String>, Vec<String>) = required.iter().cloned().partition(|cap| {
        let cap = cap.to_lowercase();
        lowered.iter().any(|f| f.contains(&cap))
    });
    CapabilityCheck {
        required: required.to_vec(),
        found,
        missing,
    }
}

impl Phase for ComponentAssessor {
    fn kind(&self) -> PhaseKind {
        PhaseKind::ComponentAssessment
    }

    fn run(&self, ctx: &PhaseContext) -> Result<PhaseOutput, PhaseError> {
        Ok(PhaseOutput::Components(self.assess_all_with(ctx.logger())))
    }
}
