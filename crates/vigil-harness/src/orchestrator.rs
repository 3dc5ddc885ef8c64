//! Validation session orchestration.
//!
//! Runs enabled phases in fixed order (or on a bounded worker pool), persists
//! each phase record as it lands, and aggregates overall session success.
//! Test- and phase-level failures are recoverable; anything escaping a phase
//! is session-fatal and returned as [`OrchestratorError::SessionFatal`] after
//! the partial session has been persisted.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use chrono::Utc;
use futures::future::{join, join_all};
use tokio::sync::{mpsc, Semaphore};

use vigil_core::{
    emit_phase_finished, emit_phase_started, emit_session_fatal, emit_session_finished,
    emit_session_started, write_phase_record, write_session, ConfigError, Logger, LoggerOptions,
    PhaseKind, PhaseRecord, PhaseSpan, PhaseStatus, ValidationConfig, ValidationSession,
    LOG_DIR_NAME,
};

use crate::builtin;
use crate::phase::{Phase, PhaseContext, PhaseError};
use crate::runner::panic_message;

const ORCHESTRATOR: &str = "orchestrator";

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to initialise session: {0}")]
    Init(String),

    /// The session was aborted; `session` holds what was persisted.
    #[error("validation session {session_id} aborted: {reason}")]
    SessionFatal {
        session_id: String,
        reason: String,
        session: Box<ValidationSession>,
    },
}

impl OrchestratorError {
    /// Partial session for a fatal abort.
    pub fn partial_session(&self) -> Option<&ValidationSession> {
        match self {
            OrchestratorError::SessionFatal { session, .. } => Some(session),
            _ => None,
        }
    }
}

/// Coordinates the phases of one validation run.
pub struct ValidationOrchestrator {
    config: Arc<ValidationConfig>,
    phases: BTreeMap<PhaseKind, Arc<dyn Phase>>,
}

impl ValidationOrchestrator {
    /// Orchestrator with no phases registered.
    pub fn new(config: ValidationConfig) -> Self {
        Self {
            config: Arc::new(config),
            phases: BTreeMap::new(),
        }
    }

    /// Orchestrator with the built-in phase bodies for `config.target_path`.
    pub fn with_builtin_phases(config: ValidationConfig) -> Self {
        let mut orchestrator = Self::new(config);
        for phase in builtin::builtin_phases(&orchestrator.config) {
            orchestrator.phases.insert(phase.kind(), phase);
        }
        orchestrator
    }

    /// Register a phase implementation, replacing any for the same kind.
    pub fn register<P: Phase + 'static>(self, phase: P) -> Self {
        self.register_arc(Arc::new(phase))
    }

    pub fn register_arc(mut self, phase: Arc<dyn Phase>) -> Self {
        self.phases.insert(phase.kind(), phase);
        self
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn registered_phases(&self) -> Vec<PhaseKind> {
        self.phases.keys().copied().collect()
    }

    /// Run every enabled phase and return the completed session.
    pub async fn run_complete_validation(&self) -> Result<ValidationSession, OrchestratorError> {
        self.config.validate()?;
        let clock = Instant::now();

        let mut session = ValidationSession::new((*self.config).clone(), Utc::now())
            .map_err(|e| OrchestratorError::Init(e.to_string()))?;
        reserve_session_dir(&mut session).map_err(|e| OrchestratorError::Init(format!("{e:#}")))?;

        let logger = Logger::open(
            &session.session_id,
            &session.output_dir.join(LOG_DIR_NAME),
            "validation_orchestrator",
            LoggerOptions::from_config(&self.config),
        );
        session.log_path = logger.log_path();

        let phases = self.config.ordered_phases();
        let parallelism = self.config.max_parallel_phases.max(1);
        emit_session_started(&session.session_id, &phases, parallelism);
        logger.info(
            ORCHESTRATOR,
            format!(
                "Starting validation session {} ({} phases, parallelism {}, target {})",
                session.session_id,
                phases.len(),
                parallelism,
                self.config.target_path.display()
            ),
        );

        for &kind in &phases {
            session.record_phase(PhaseRecord::pending(kind));
        }

        let fatal = if parallelism > 1 {
            self.run_parallel(&mut session, &phases, parallelism, &logger)
                .await
        } else {
            self.run_sequential(&mut session, &phases, &logger).await
        };

        let elapsed = clock.elapsed().as_millis() as u64;
        if let Some(reason) = fatal {
            return Err(abort(session, reason, elapsed, &logger));
        }

        session.finish(elapsed);
        if let Err(e) = write_session(&session) {
            let reason = format!("failed to persist session: {e:#}");
            return Err(abort(session, reason, elapsed, &logger));
        }

        let succeeded = phases.len() - session.failed_phases().len();
        logger.info(
            ORCHESTRATOR,
            format!(
                "Validation session {} finished in {}ms: {}/{} phases succeeded, overall {}",
                session.session_id,
                elapsed,
                succeeded,
                phases.len(),
                if session.overall_success { "PASSED" } else { "FAILED" }
            ),
        );
        emit_session_finished(&session.session_id, session.overall_success, elapsed);
        logger.close();
        Ok(session)
    }

    async fn run_sequential(
        &self,
        session: &mut ValidationSession,
        phases: &[PhaseKind],
        logger: &Logger,
    ) -> Option<String> {
        for &kind in phases {
            mark_running(session, kind, logger);
            let record = match run_phase(
                kind,
                self.phases.get(&kind).cloned(),
                Arc::clone(&self.config),
                logger.clone(),
                session.session_id.clone(),
            )
            .await
            {
                Ok(record) => record,
                Err(reason) => {
                    mark_aborted(session, kind, &reason);
                    return Some(reason);
                }
            };

            if let Err(reason) = persist_phase(session, record) {
                return Some(reason);
            }
        }
        None
    }

    /// Phases share nothing but the logger; aggregation waits for all of them.
    async fn run_parallel(
        &self,
        session: &mut ValidationSession,
        phases: &[PhaseKind],
        parallelism: usize,
        logger: &Logger,
    ) -> Option<String> {
        let sem = Arc::new(Semaphore::new(parallelism));
        let (started_tx, mut started_rx) = mpsc::unbounded_channel();
        let mut tasks = Vec::with_capacity(phases.len());

        for &kind in phases {
            let sem = Arc::clone(&sem);
            let started = started_tx.clone();
            let phase = self.phases.get(&kind).cloned();
            let config = Arc::clone(&self.config);
            let logger = logger.clone();
            let session_id = session.session_id.clone();

            tasks.push(tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                // Queued phases stay Pending until they hold a permit.
                let _ = started.send(kind);
                drop(started);
                run_phase(kind, phase, config, logger, session_id).await
            }));
        }
        drop(started_tx);

        let mark_started = async {
            while let Some(kind) = started_rx.recv().await {
                mark_running(session, kind, logger);
            }
        };
        let (results, ()) = join(join_all(tasks), mark_started).await;

        let mut fatal = None;
        for (&kind, joined) in phases.iter().zip(results) {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => Err(format!("{kind} phase task failed: {e}")),
            };
            match outcome {
                Ok(record) => {
                    if let Err(reason) = persist_phase(session, record) {
                        fatal.get_or_insert(reason);
                    }
                }
                Err(reason) => {
                    mark_aborted(session, kind, &reason);
                    fatal.get_or_insert(reason);
                }
            }
        }
        fatal
    }
}

fn mark_running(session: &mut ValidationSession, kind: PhaseKind, logger: &Logger) {
    if let Some(record) = session.phases.get_mut(&kind) {
        record.status = PhaseStatus::Running;
        record.started_at = Utc::now();
        logger.info(ORCHESTRATOR, format!("{} phase is now running", kind.title()));
    }
}

/// The phase that aborted the session; its blob is never written.
fn mark_aborted(session: &mut ValidationSession, kind: PhaseKind, reason: &str) {
    if let Some(record) = session.phases.get_mut(&kind) {
        record.status = PhaseStatus::Failed;
        record.success = false;
        record.error = Some(reason.to_string());
    }
}

/// Runs one phase on a blocking worker. `Err` carries a session-fatal reason.
async fn run_phase(
    kind: PhaseKind,
    phase: Option<Arc<dyn Phase>>,
    config: Arc<ValidationConfig>,
    logger: Logger,
    session_id: String,
) -> Result<PhaseRecord, String> {
    let log = logger.scoped(kind.name());
    let started_at = Utc::now();
    let start = Instant::now();
    emit_phase_started(&session_id, kind);
    log.info(format!("Phase {} started", kind.title()));

    let Some(phase) = phase else {
        let reason = format!("no implementation registered for the {kind} phase");
        log.error(&reason);
        emit_phase_finished(&session_id, kind, PhaseStatus::Failed, false, 0);
        return Ok(PhaseRecord::failed(kind, started_at, 0, reason));
    };

    let worker_logger = logger.clone();
    let worker_session = session_id.clone();
    let joined = tokio::task::spawn_blocking(move || {
        let _span = PhaseSpan::enter(&worker_session, kind);
        let ctx = PhaseContext::new(&worker_session, kind, config, &worker_logger)?;
        let output = phase.run(&ctx);
        ctx.cleanup();
        output
    })
    .await;
    let duration_ms = start.elapsed().as_millis() as u64;

    let record = match joined {
        Ok(Ok(output)) => PhaseRecord::completed(kind, started_at, duration_ms, output),
        Ok(Err(PhaseError::Setup(msg))) => {
            log.error(format!("Phase {} setup failed: {msg}", kind.title()));
            PhaseRecord::failed(kind, started_at, duration_ms, msg)
        }
        Ok(Err(PhaseError::Fatal(msg))) => {
            log.critical(format!("Phase {} raised a fatal error: {msg}", kind.title()));
            return Err(format!("{kind} phase: {msg}"));
        }
        Err(e) if e.is_panic() => {
            let msg = panic_message(e.into_panic().as_ref());
            log.critical(format!("Phase {} panicked: {msg}", kind.title()));
            return Err(format!("{kind} phase panicked: {msg}"));
        }
        Err(e) => return Err(format!("{kind} phase worker failed: {e}")),
    };

    if record.success {
        log.info(format!(
            "Phase {} completed in {duration_ms}ms",
            kind.title()
        ));
    } else {
        log.warning(format!(
            "Phase {} did not succeed ({duration_ms}ms)",
            kind.title()
        ));
    }
    emit_phase_finished(&session_id, kind, record.status, record.success, duration_ms);
    Ok(record)
}

/// Record the phase in the session and write its blob.
fn persist_phase(session: &mut ValidationSession, record: PhaseRecord) -> Result<(), String> {
    let kind = record.phase;
    let written = write_phase_record(&session.output_dir, &record);
    session.record_phase(record);
    written
        .map(|_| ())
        .map_err(|e| format!("failed to persist {kind} results: {e:#}"))
}

/// Pick a fresh `validation_<timestamp>[_n]` directory and create it.
fn reserve_session_dir(session: &mut ValidationSession) -> anyhow::Result<()> {
    let base = session.session_id.clone();
    let mut suffix = 1;
    while session.output_dir.exists() {
        session.session_id = format!("{base}_{suffix}");
        session.output_dir = session.config.output_path.join(&session.session_id);
        suffix += 1;
    }
    std::fs::create_dir_all(&session.output_dir)
        .with_context(|| format!("create session dir {:?}", session.output_dir))
}

/// Mark the session failed, persist what exists and build the fatal error.
fn abort(
    mut session: ValidationSession,
    reason: String,
    elapsed: u64,
    logger: &Logger,
) -> OrchestratorError {
    session.fail(reason.clone(), elapsed);
    logger.critical(ORCHESTRATOR, format!("Validation session aborted: {reason}"));
    if let Err(e) = write_session(&session) {
        logger.error(
            ORCHESTRATOR,
            format!("failed to persist partial session: {e:#}"),
        );
    }
    emit_session_fatal(&session.session_id, &reason);
    logger.close();

    OrchestratorError::SessionFatal {
        session_id: session.session_id.clone(),
        reason,
        session: Box::new(session),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::phase_fn;
    use crate::suite::TestSuite;
    use tempfile::tempdir;
    use vigil_core::{PhaseOutput, TestPayload};

    fn config(output: &std::path::Path, phases: &[PhaseKind]) -> ValidationConfig {
        ValidationConfig {
            output_path: output.to_path_buf(),
            console_logging: false,
            ..ValidationConfig::default()
        }
        .with_phases(phases.iter().copied())
    }

    fn ok_suite(kind: PhaseKind) -> TestSuite {
        TestSuite::new(kind).test("ok", |_| Ok(TestPayload::new()))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_queued_phases_start_running_only_with_a_worker() {
        let dir = tempdir().expect("tempdir");
        let phases = [
            PhaseKind::Integration,
            PhaseKind::Regression,
            PhaseKind::Performance,
        ];
        let mut cfg = config(dir.path(), &phases);
        cfg.max_parallel_phases = 2;

        let slow = |kind| {
            TestSuite::new(kind).test("slow", |_| {
                std::thread::sleep(std::time::Duration::from_millis(50));
                Ok(TestPayload::new())
            })
        };
        let session = ValidationOrchestrator::new(cfg)
            .register(slow(PhaseKind::Integration))
            .register(slow(PhaseKind::Regression))
            .register(slow(PhaseKind::Performance))
            .run_complete_validation()
            .await
            .expect("session");

        let log = std::fs::read_to_string(session.log_path.as_ref().expect("log path"))
            .expect("log");
        let lines: Vec<&str> = log.lines().collect();
        let first_done = lines
            .iter()
            .position(|l| l.contains(" completed in "))
            .expect("a phase completed");
        let running_before = lines[..first_done]
            .iter()
            .filter(|l| l.contains("phase is now running"))
            .count();
        let running_total = lines
            .iter()
            .filter(|l| l.contains("phase is now running"))
            .count();

        assert!(running_before <= 2, "{running_before} phases running with 2 workers");
        assert_eq!(running_total, 3);
        assert!(session
            .phases
            .values()
            .all(|r| r.status == PhaseStatus::Completed));
    }

    #[tokio::test]
    async fn test_missing_implementation_demotes_phase() {
        let dir = tempdir().expect("tempdir");
        let orchestrator = ValidationOrchestrator::new(config(
            dir.path(),
            &[PhaseKind::Integration, PhaseKind::Regression],
        ))
        .register(ok_suite(PhaseKind::Integration));

        let session = orchestrator.run_complete_validation().await.expect("session");
        assert!(!session.overall_success);
        let regression = session.phase(PhaseKind::Regression).expect("record");
        assert_eq!(regression.status, PhaseStatus::Failed);
        assert!(regression
            .error
            .as_deref()
            .unwrap_or_default()
            .contains("no implementation"));
    }

    #[tokio::test]
    async fn test_setup_error_is_contained() {
        let dir = tempdir().expect("tempdir");
        let orchestrator = ValidationOrchestrator::new(config(
            dir.path(),
            &[PhaseKind::Integration, PhaseKind::Regression],
        ))
        .register(phase_fn(PhaseKind::Integration, |_| {
            Err(PhaseError::Setup("fixtures unavailable".into()))
        }))
        .register(ok_suite(PhaseKind::Regression));

        let session = orchestrator.run_complete_validation().await.expect("session");
        assert!(!session.overall_success);
        assert!(session.session_error.is_none());
        assert!(session.phase(PhaseKind::Regression).is_some_and(|r| r.success));
    }

    #[test]
    fn test_session_dir_collision_gets_suffix() {
        let dir = tempdir().expect("tempdir");
        let cfg = config(dir.path(), &[PhaseKind::Integration]);
        let mut session = ValidationSession::new(cfg, Utc::now()).expect("session");
        std::fs::create_dir_all(&session.output_dir).expect("mkdir");
        let original = session.session_id.clone();

        reserve_session_dir(&mut session).expect("reserve");
        assert_eq!(session.session_id, format!("{original}_1"));
        assert!(session.output_dir.is_dir());
    }

    #[tokio::test]
    async fn test_components_phase_output_persisted() {
        let dir = tempdir().expect("tempdir");
        let orchestrator = ValidationOrchestrator::new(config(
            dir.path(),
            &[PhaseKind::ComponentAssessment],
        ))
        .register(phase_fn(PhaseKind::ComponentAssessment, |_| {
            Ok(PhaseOutput::Components(Default::default()))
        }));

        let session = orchestrator.run_complete_validation().await.expect("session");
        assert!(session
            .output_dir
            .join("component_validation.json")
            .is_file());
    }
}
