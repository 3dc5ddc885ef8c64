//! Validation session: the aggregate produced by one orchestrator run.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ValidationConfig;
use crate::domain::digest::config_digest;
use crate::domain::error::Result;
use crate::domain::phase::{PhaseKind, PhaseRecord};

/// Timestamp format used for session ids and directory names.
pub const SESSION_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Format a session timestamp (`20261018_142501`).
pub fn session_timestamp(at: DateTime<Utc>) -> String {
    at.format(SESSION_TIMESTAMP_FORMAT).to_string()
}

/// One complete validation run.
///
/// Mutated only by the orchestrator while phases run; read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationSession {
    /// `validation_<timestamp>`.
    pub session_id: String,

    pub timestamp: String,

    /// Session directory holding persisted results and reports.
    pub output_dir: PathBuf,

    pub log_path: Option<PathBuf>,

    pub config: ValidationConfig,

    /// SHA-256 of the enabled phases and configuration.
    pub config_digest: String,

    pub started_at: DateTime<Utc>,

    pub phases: BTreeMap<PhaseKind, PhaseRecord>,

    pub overall_success: bool,

    pub duration_ms: u64,

    /// Fatal error that aborted the session.
    pub session_error: Option<String>,
}

impl ValidationSession {
    /// Create a session rooted at `config.output_path/validation_<timestamp>`.
    pub fn new(config: ValidationConfig, started_at: DateTime<Utc>) -> Result<Self> {
        let timestamp = session_timestamp(started_at);
        let session_id = format!("validation_{timestamp}");
        let output_dir = config.output_path.join(&session_id);
        let config_digest = config_digest(&config)?;

        Ok(Self {
            session_id,
            timestamp,
            output_dir,
            log_path: None,
            config,
            config_digest,
            started_at,
            phases: BTreeMap::new(),
            overall_success: false,
            duration_ms: 0,
            session_error: None,
        })
    }

    /// Store a phase record, replacing any previous one for the same phase.
    pub fn record_phase(&mut self, record: PhaseRecord) {
        self.phases.insert(record.phase, record);
    }

    pub fn phase(&self, kind: PhaseKind) -> Option<&PhaseRecord> {
        self.phases.get(&kind)
    }

    /// AND over every enabled phase; disabled phases are excluded, missing
    /// enabled phases count as failures.
    pub fn compute_overall_success(&self) -> bool {
        self.session_error.is_none()
            && self
                .config
                .enabled_phases
                .iter()
                .all(|kind| self.phases.get(kind).is_some_and(|r| r.success))
    }

    /// Close the session after all phases ran.
    pub fn finish(&mut self, duration_ms: u64) {
        self.duration_ms = duration_ms;
        self.overall_success = self.compute_overall_success();
    }

    /// Record a fatal error; the session can no longer succeed.
    pub fn fail(&mut self, error: impl Into<String>, duration_ms: u64) {
        self.session_error = Some(error.into());
        self.duration_ms = duration_ms;
        self.overall_success = false;
    }

    /// Enabled phases that did not succeed.
    pub fn failed_phases(&self) -> Vec<PhaseKind> {
        self.config
            .enabled_phases
            .iter()
            .copied()
            .filter(|kind| !self.phases.get(kind).is_some_and(|r| r.success))
            .collect()
    }
}
