//! Validation configuration.
//!
//! Every field has a documented default so a partial TOML file (or none at
//! all) yields a runnable configuration.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;
use crate::domain::phase::PhaseKind;

/// Default configuration file looked up by [`ValidationConfig::load`].
pub const DEFAULT_CONFIG_FILE: &str = "vigil.toml";

/// Numeric limits consulted by test bodies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Thresholds {
    pub max_memory_increase_mb: f64,
    pub max_math_time_sec: f64,
    pub max_file_time_sec: f64,
    pub max_model_load_time_sec: f64,
    pub max_inference_time_per_image_sec: f64,
    pub max_concurrent_time_sec: f64,
    /// Caller-defined limits.
    pub extra: BTreeMap<String, f64>,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            max_memory_increase_mb: 500.0,
            max_math_time_sec: 1.0,
            max_file_time_sec: 2.0,
            max_model_load_time_sec: 10.0,
            max_inference_time_per_image_sec: 5.0,
            max_concurrent_time_sec: 5.0,
            extra: BTreeMap::new(),
        }
    }
}

impl Thresholds {
    /// Look up a named threshold, built-in or extra.
    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "max_memory_increase_mb" => Some(self.max_memory_increase_mb),
            "max_math_time_sec" => Some(self.max_math_time_sec),
            "max_file_time_sec" => Some(self.max_file_time_sec),
            "max_model_load_time_sec" => Some(self.max_model_load_time_sec),
            "max_inference_time_per_image_sec" => Some(self.max_inference_time_per_image_sec),
            "max_concurrent_time_sec" => Some(self.max_concurrent_time_sec),
            other => self.extra.get(other).copied(),
        }
    }

    fn named(&self) -> impl Iterator<Item = (&str, f64)> {
        [
            ("max_memory_increase_mb", self.max_memory_increase_mb),
            ("max_math_time_sec", self.max_math_time_sec),
            ("max_file_time_sec", self.max_file_time_sec),
            ("max_model_load_time_sec", self.max_model_load_time_sec),
            (
                "max_inference_time_per_image_sec",
                self.max_inference_time_per_image_sec,
            ),
            ("max_concurrent_time_sec", self.max_concurrent_time_sec),
        ]
        .into_iter()
        .chain(self.extra.iter().map(|(k, v)| (k.as_str(), *v)))
    }
}

/// A component to assess.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComponentSpec {
    /// Component name, snake_case (e.g. `model_saver`).
    pub name: String,

    /// Candidate source locations, tried in order.
    pub paths: Vec<PathBuf>,

    /// Required construction entry point.
    #[serde(default = "default_entry_point")]
    pub entry_point: String,

    /// Capability markers (e.g. `save`, `load`, `export`).
    #[serde(default)]
    pub capabilities: Vec<String>,
}

fn default_entry_point() -> String {
    "new".to_string()
}

impl ComponentSpec {
    pub fn new(name: impl Into<String>, paths: Vec<PathBuf>) -> Self {
        Self {
            name: name.into(),
            paths,
            entry_point: default_entry_point(),
            capabilities: Vec::new(),
        }
    }

    pub fn with_capabilities<I, S>(mut self, caps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = caps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_point = entry_point.into();
        self
    }
}

/// Validation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
    /// Root under which `validation_<timestamp>/` session directories are created.
    pub output_path: PathBuf,

    /// Codebase under validation.
    pub target_path: PathBuf,

    /// Phases to run; disabled phases are excluded from overall success.
    pub enabled_phases: BTreeSet<PhaseKind>,

    /// Shrink workloads for a fast pass.
    pub run_quick_tests: bool,

    /// Log at DEBUG instead of INFO.
    pub verbose_logging: bool,

    /// Console sink toggle.
    pub console_logging: bool,

    /// Session log file toggle.
    pub file_logging: bool,

    /// Maximum phases running at once; 1 runs them sequentially.
    pub max_parallel_phases: usize,

    /// Previous `detailed_metrics.json`-style baseline for regression checks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_path: Option<PathBuf>,

    pub thresholds: Thresholds,

    pub components: Vec<ComponentSpec>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("validation_results"),
            target_path: PathBuf::from("."),
            enabled_phases: PhaseKind::ALL.into_iter().collect(),
            run_quick_tests: false,
            verbose_logging: false,
            console_logging: true,
            file_logging: true,
            max_parallel_phases: 1,
            baseline_path: None,
            thresholds: Thresholds::default(),
            components: Vec::new(),
        }
    }
}

impl ValidationConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ValidationConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))
    }

    /// Load `vigil.toml` if present, then apply environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = if Path::new(DEFAULT_CONFIG_FILE).exists() {
            Self::from_file(DEFAULT_CONFIG_FILE)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `VIGIL_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(output) = std::env::var("VIGIL_OUTPUT_DIR") {
            self.output_path = PathBuf::from(output);
        }
        if let Ok(target) = std::env::var("VIGIL_TARGET") {
            self.target_path = PathBuf::from(target);
        }
        if let Ok(verbose) = std::env::var("VIGIL_VERBOSE") {
            self.verbose_logging = verbose.parse().unwrap_or(self.verbose_logging);
        }
        if let Ok(quick) = std::env::var("VIGIL_QUICK") {
            self.run_quick_tests = quick.parse().unwrap_or(self.run_quick_tests);
        }
        if let Ok(parallelism) = std::env::var("VIGIL_PARALLELISM") {
            if let Ok(n) = parallelism.parse() {
                self.max_parallel_phases = n;
            }
        }
    }

    /// Save configuration to file.
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let content = self.to_toml_string().context("Failed to serialize config")?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))?;
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in self.thresholds.named() {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidThreshold {
                    name: name.to_string(),
                    value,
                });
            }
        }

        let mut seen = HashSet::new();
        for component in &self.components {
            if component.paths.is_empty() {
                return Err(ConfigError::NoCandidatePaths {
                    component: component.name.clone(),
                });
            }
            if !seen.insert(component.name.as_str()) {
                return Err(ConfigError::DuplicateComponent {
                    name: component.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Whether a phase is enabled.
    pub fn is_enabled(&self, phase: PhaseKind) -> bool {
        self.enabled_phases.contains(&phase)
    }

    /// Restrict to the given phases.
    pub fn with_phases<I: IntoIterator<Item = PhaseKind>>(mut self, phases: I) -> Self {
        self.enabled_phases = phases.into_iter().collect();
        self
    }

    /// Enabled phases in execution order.
    pub fn ordered_phases(&self) -> Vec<PhaseKind> {
        // BTreeSet iterates in PhaseKind's declared order.
        self.enabled_phases.iter().copied().collect()
    }

    /// Parse a comma-separated phase list.
    pub fn parse_phase_list(list: &str) -> Result<BTreeSet<PhaseKind>, ConfigError> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ValidationConfig::default();
        assert_eq!(config.thresholds.max_memory_increase_mb, 500.0);
        assert_eq!(config.enabled_phases.len(), 5);
        assert_eq!(config.max_parallel_phases, 1);
        assert!(config.file_logging);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ValidationConfig::from_toml_str(
            r#"
            output_path = "out"
            enabled_phases = ["integration", "compatibility"]

            [thresholds]
            max_math_time_sec = 0.5
            "#,
        )
        .expect("parse config");

        assert_eq!(config.output_path, PathBuf::from("out"));
        assert_eq!(
            config.ordered_phases(),
            vec![PhaseKind::Integration, PhaseKind::Compatibility]
        );
        assert_eq!(config.thresholds.max_math_time_sec, 0.5);
        assert_eq!(config.thresholds.max_memory_increase_mb, 500.0);
    }

    #[test]
    fn test_component_entry_point_default() {
        let config = ValidationConfig::from_toml_str(
            r#"
            [[components]]
            name = "model_saver"
            paths = ["src/model_saver.rs"]
            capabilities = ["save", "cleanup", "metadata"]
            "#,
        )
        .expect("parse config");

        let component = &config.components[0];
        assert_eq!(component.entry_point, "new");
        assert_eq!(component.capabilities.len(), 3);
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = ValidationConfig::default();
        config.thresholds.extra.insert("max_gpu_mb".to_string(), 2048.0);
        config.components.push(
            ComponentSpec::new("exporter", vec![PathBuf::from("src/exporter.rs")])
                .with_capabilities(["export"]),
        );

        let text = config.to_toml_string().expect("serialize");
        let parsed = ValidationConfig::from_toml_str(&text).expect("parse");
        assert_eq!(config, parsed);
        assert_eq!(parsed.thresholds.get("max_gpu_mb"), Some(2048.0));
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let mut config = ValidationConfig::default();
        config.thresholds.max_file_time_sec = -1.0;
        let err = config.validate().expect_err("must reject");
        assert!(err.to_string().contains("max_file_time_sec"));
    }

    #[test]
    fn test_duplicate_component_rejected() {
        let mut config = ValidationConfig::default();
        let spec = ComponentSpec::new("a", vec![PathBuf::from("a.rs")]);
        config.components = vec![spec.clone(), spec];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateComponent { .. })
        ));
    }

    #[test]
    fn test_parse_phase_list() {
        let phases =
            ValidationConfig::parse_phase_list("performance, integration,").expect("parse");
        assert_eq!(
            phases.into_iter().collect::<Vec<_>>(),
            vec![PhaseKind::Integration, PhaseKind::Performance]
        );
        assert!(ValidationConfig::parse_phase_list("integration,nope").is_err());
    }
}
