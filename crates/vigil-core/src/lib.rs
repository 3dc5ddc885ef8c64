//! Vigil Core Library
//!
//! Domain model, configuration and session logging shared by the Vigil
//! harness and CLI.

pub mod config;
pub mod domain;
pub mod logger;
pub mod obs;
pub mod reporting;
pub mod telemetry;

pub use config::{ComponentSpec, Thresholds, ValidationConfig, DEFAULT_CONFIG_FILE};

pub use domain::{
    CapabilityCheck, ComponentAssessment, ComponentPhaseResult, ConfigError, IssueFlag, PhaseKind,
    PhaseOutput, PhaseRecord, PhaseStatus, Result, StructuralChecks, SuiteSummary, TestCaseResult,
    TestPayload, TestSuiteResult, ValidationSession, VigilError,
};

pub use logger::{LogCounts, LogLevel, Logger, LoggerOptions, ScopedLogger};
pub use obs::{
    emit_phase_finished, emit_phase_started, emit_quality_scored, emit_report_error,
    emit_session_fatal, emit_session_finished, emit_session_started, PhaseSpan,
};
pub use reporting::{
    phase_artifact_path, read_session, session_artifact_path, write_json_artifact,
    write_phase_record, write_session, LOG_DIR_NAME,
};
pub use telemetry::{default_directives, init_tracing, LOG_FILTER_ENV};

/// Vigil version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
