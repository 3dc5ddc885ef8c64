//! Domain-level error taxonomy for Vigil.

/// Errors produced while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown phase: {name}")]
    UnknownPhase { name: String },

    #[error("component {component} has no candidate paths")]
    NoCandidatePaths { component: String },

    #[error("duplicate component name: {name}")]
    DuplicateComponent { name: String },

    #[error("invalid threshold {name}: {value}")]
    InvalidThreshold { name: String, value: f64 },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Vigil domain errors.
#[derive(Debug, thiserror::Error)]
pub enum VigilError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("component not found: {name}")]
    ComponentNotFound { name: String },

    #[error("invalid session artifact: {0}")]
    InvalidSession(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Vigil domain operations.
pub type Result<T> = std::result::Result<T, VigilError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vigil_error_display() {
        let err = VigilError::ComponentNotFound {
            name: "model_saver".to_string(),
        };
        assert!(err.to_string().contains("component not found"));
        assert!(err.to_string().contains("model_saver"));

        let err = VigilError::InvalidSession("missing phases".to_string());
        assert!(err.to_string().contains("invalid session artifact"));
    }

    #[test]
    fn test_config_error_wraps_into_vigil_error() {
        let err: VigilError = ConfigError::UnknownPhase {
            name: "fuzz".to_string(),
        }
        .into();
        let msg = err.to_string();
        assert!(msg.contains("invalid configuration"));
        assert!(msg.contains("fuzz"));
    }
}
