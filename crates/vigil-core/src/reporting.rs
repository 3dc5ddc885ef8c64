//! Persistence of session artifacts.
//!
//! Layout under a session directory:
//! - `<phase>_results.json` / `component_validation.json`: one blob per phase
//! - `complete_results.json`: the whole session
//! - `logs/<session_id>.log`: written by the session logger

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::domain::error::VigilError;
use crate::domain::phase::{PhaseKind, PhaseRecord};
use crate::domain::session::ValidationSession;

/// Stem of the combined session blob.
pub const COMPLETE_RESULTS_STEM: &str = "complete_results";

/// Directory holding session logs.
pub const LOG_DIR_NAME: &str = "logs";

/// Path of a phase's persisted result blob.
pub fn phase_artifact_path(session_dir: &Path, phase: PhaseKind) -> PathBuf {
    session_dir.join(format!("{}.json", phase.artifact_stem()))
}

/// Path of the combined session blob.
pub fn session_artifact_path(session_dir: &Path) -> PathBuf {
    session_dir.join(format!("{COMPLETE_RESULTS_STEM}.json"))
}

/// Write any serializable value as pretty JSON.
pub fn write_json_artifact<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value).context("serialize artifact")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Persist one phase record.
pub fn write_phase_record(session_dir: &Path, record: &PhaseRecord) -> Result<PathBuf> {
    let path = phase_artifact_path(session_dir, record.phase);
    write_json_artifact(&path, record)?;
    Ok(path)
}

/// Persist the whole session.
pub fn write_session(session: &ValidationSession) -> Result<PathBuf> {
    let path = session_artifact_path(&session.output_dir);
    write_json_artifact(&path, session)?;
    Ok(path)
}

/// Read a persisted session back.
pub fn read_session(path: &Path) -> crate::domain::Result<ValidationSession> {
    let content = std::fs::read(path)?;
    let session: ValidationSession = serde_json::from_slice(&content)?;
    if session.session_id.is_empty() {
        return Err(VigilError::InvalidSession(format!(
            "{} has an empty session_id",
            path.display()
        )));
    }
    Ok(session)
}
