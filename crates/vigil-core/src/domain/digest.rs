//! Deterministic digests identifying a session's configuration.

use sha2::{Digest, Sha256};

use crate::config::ValidationConfig;
use crate::domain::error::Result;
use crate::domain::phase::PhaseKind;

/// Compute deterministic digest of ordered phase names.
pub fn phases_digest(phases: &[PhaseKind]) -> String {
    let mut hasher = Sha256::new();
    for phase in phases {
        hasher.update(phase.name().as_bytes());
        hasher.update(b"\0");
    }
    hex::encode(hasher.finalize())
}

/// SHA-256 over the enabled phases and the JSON form of the configuration.
pub fn config_digest(config: &ValidationConfig) -> Result<String> {
    let json = serde_json::to_vec(config)?;
    let mut hasher = Sha256::new();
    hasher.update(phases_digest(&config.ordered_phases()).as_bytes());
    hasher.update(b"\0");
    hasher.update(&json);
    Ok(hex::encode(hasher.finalize()))
}

/// SHA-256 hex digest of raw bytes.
pub fn bytes_digest(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
