//! Phase abstraction and per-phase execution context.

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use vigil_core::{Logger, PhaseKind, PhaseOutput, ScopedLogger, Thresholds, ValidationConfig};

/// Errors raised by a phase outside any individual test case.
#[derive(Debug, thiserror::Error)]
pub enum PhaseError {
    /// Contained within the phase: the phase is demoted to failed and the
    /// session moves on to the next phase.
    #[error("phase setup failed: {0}")]
    Setup(String),

    /// Escapes the phase: the whole session is aborted.
    #[error("fatal phase error: {0}")]
    Fatal(String),
}

/// A top-level validation phase.
///
/// Implementations run synchronously on a blocking worker; per-test failures
/// must be folded into the returned output, never into `Err`.
pub trait Phase: Send + Sync {
    fn kind(&self) -> PhaseKind;

    fn run(&self, ctx: &PhaseContext) -> Result<PhaseOutput, PhaseError>;
}

/// Everything a phase and its test bodies may touch.
pub struct PhaseContext {
    session_id: String,
    phase: PhaseKind,
    config: Arc<ValidationConfig>,
    logger: ScopedLogger,
    scratch: TempDir,
}

impl PhaseContext {
    /// Create the context and its scratch directory.
    pub fn new(
        session_id: &str,
        phase: PhaseKind,
        config: Arc<ValidationConfig>,
        logger: &Logger,
    ) -> Result<Self, PhaseError> {
        let scratch = tempfile::Builder::new()
            .prefix(&format!("vigil-{}-", phase.name()))
            .tempdir()
            .map_err(|e| PhaseError::Setup(format!("failed to create scratch dir: {e}")))?;

        Ok(Self {
            session_id: session_id.to_string(),
            phase,
            config,
            logger: logger.scoped(phase.name()),
            scratch,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn phase(&self) -> PhaseKind {
        self.phase
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.config.thresholds
    }

    pub fn target_path(&self) -> &Path {
        &self.config.target_path
    }

    pub fn quick(&self) -> bool {
        self.config.run_quick_tests
    }

    /// Phase-tagged logger.
    pub fn logger(&self) -> &ScopedLogger {
        &self.logger
    }

    /// Per-phase scratch space, removed when the phase ends.
    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    /// Remove the scratch directory. Failures are logged, never raised.
    pub fn cleanup(self) {
        let path = self.scratch.path().to_path_buf();
        if let Err(e) = self.scratch.close() {
            self.logger.warning(format!(
                "failed to remove scratch dir {}: {e}",
                path.display()
            ));
        }
    }
}

/// Adapter turning a closure into a [`Phase`].
pub struct FnPhase<F> {
    kind: PhaseKind,
    f: F,
}

impl<F> Phase for FnPhase<F>
where
    F: Fn(&PhaseContext) -> Result<PhaseOutput, PhaseError> + Send + Sync,
{
    fn kind(&self) -> PhaseKind {
        self.kind
    }

    fn run(&self, ctx: &PhaseContext) -> Result<PhaseOutput, PhaseError> {
        (self.f)(ctx)
    }
}

/// Build a phase from a closure.
pub fn phase_fn<F>(kind: PhaseKind, f: F) -> FnPhase<F>
where
    F: Fn(&PhaseContext) -> Result<PhaseOutput, PhaseError> + Send + Sync,
{
    FnPhase { kind, f }
}
