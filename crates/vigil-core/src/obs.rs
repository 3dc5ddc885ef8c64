//! Structured observability hooks for the validation lifecycle.
//!
//! This module provides:
//! - Phase-scoped tracing spans via the `PhaseSpan` RAII guard
//! - Emission functions for session start/finish, phase start/finish,
//!   quality scoring and report failures
//!
//! These are machine-oriented events; the human narrative goes through the
//! session [`Logger`](crate::logger::Logger).

use tracing::info;

use crate::domain::phase::{PhaseKind, PhaseStatus};

/// RAII guard that enters a phase-scoped span, so events emitted while a
/// phase runs stay attributable when phases run concurrently.
pub struct PhaseSpan {
    _span: tracing::span::EnteredSpan,
}

impl PhaseSpan {
    pub fn enter(session_id: &str, phase: PhaseKind) -> Self {
        let span = tracing::info_span!("vigil.phase", session_id = %session_id, phase = %phase);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: session started.
pub fn emit_session_started(session_id: &str, phases: &[PhaseKind], parallelism: usize) {
    let names: Vec<&str> = phases.iter().map(PhaseKind::name).collect();
    info!(
        event = "session.started",
        session_id = %session_id,
        phases = ?names,
        parallelism = parallelism,
    );
}

/// Emit event: phase transitioned to running.
pub fn emit_phase_started(session_id: &str, phase: PhaseKind) {
    info!(event = "phase.started", session_id = %session_id, phase = %phase);
}

/// Emit event: phase reached a terminal status.
pub fn emit_phase_finished(
    session_id: &str,
    phase: PhaseKind,
    status: PhaseStatus,
    success: bool,
    duration_ms: u64,
) {
    info!(
        event = "phase.finished",
        session_id = %session_id,
        phase = %phase,
        status = ?status,
        success = success,
        duration_ms = duration_ms,
    );
}

/// Emit event: session finished.
pub fn emit_session_finished(session_id: &str, success: bool, duration_ms: u64) {
    info!(
        event = "session.finished",
        session_id = %session_id,
        success = success,
        duration_ms = duration_ms,
    );
}

/// Emit event: session aborted by a fatal error (warning level).
pub fn emit_session_fatal(session_id: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "session.fatal", session_id = %session_id, error = %error);
}

/// Emit event: quality analysis computed.
pub fn emit_quality_scored(session_id: &str, overall_score: f64, critical_issues: usize) {
    info!(
        event = "quality.scored",
        session_id = %session_id,
        overall_score = overall_score,
        critical_issues = critical_issues,
    );
}

/// Emit event: one report format failed to render (warning level).
pub fn emit_report_error(session_id: &str, format: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(
        event = "report.error",
        session_id = %session_id,
        format = %format,
        error = %error,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_span_create() {
        let _span = PhaseSpan::enter("validation_20260101_000000", PhaseKind::Regression);
        emit_phase_started("validation_20260101_000000", PhaseKind::Regression);
    }
}
