//! Vigil Harness
//!
//! Test suites with per-test failure isolation, component assessment, phase
//! orchestration and quality reporting on top of `vigil-core`.

pub mod assessor;
pub mod builtin;
pub mod orchestrator;
pub mod phase;
pub mod quality;
pub mod report;
pub mod runner;
pub mod suite;

pub use assessor::{AssessError, ComponentAssessor, ConstructorProbe};
pub use orchestrator::{OrchestratorError, ValidationOrchestrator};
pub use phase::{phase_fn, FnPhase, Phase, PhaseContext, PhaseError};
pub use quality::{analyze_session, QualityAnalysis, QualityLevel, QualityMetrics};
pub use report::{
    DetailedMetrics, ExecutiveSummary, FinalReport, HtmlReport, QualityReportGenerator,
    ReportContext, ReportError, ReportOutcome, ReportRenderer, TextReport,
};
pub use runner::TestCaseRunner;
pub use suite::{TestBody, TestSuite};
