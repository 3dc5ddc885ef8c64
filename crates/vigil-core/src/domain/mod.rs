//! Domain models for Vigil.
//!
//! Canonical definitions for the core entities:
//! - `TestCaseResult` / `TestSuiteResult`: isolated test outcomes and their summary
//! - `ComponentAssessment`: structural and capability checks on one component
//! - `PhaseRecord`: one phase's lifecycle and output
//! - `ValidationSession`: the aggregate of one orchestrator run

pub mod component;
pub mod digest;
pub mod error;
pub mod payload;
pub mod phase;
pub mod result;
pub mod session;

pub use component::{CapabilityCheck, ComponentAssessment, ComponentPhaseResult, StructuralChecks};
pub use error::{ConfigError, Result, VigilError};
pub use payload::{IssueFlag, TestPayload};
pub use phase::{PhaseKind, PhaseOutput, PhaseRecord, PhaseStatus};
pub use result::{SuiteSummary, TestCaseResult, TestSuiteResult};
pub use session::{session_timestamp, ValidationSession};
