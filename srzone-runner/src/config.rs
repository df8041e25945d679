//! Serializable run configuration.

use serde::{Deserialize, Serialize};
use srzone_core::config::{DetectorConfig, LifecycleConfig};
use srzone_core::domain::{Qualifier, Timeframe};
use std::path::Path;
use thiserror::Error;

/// Unique identifier for a run configuration (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Engine(#[from] srzone_core::config::ConfigError),

    #[error("at least one qualifier must be enabled")]
    NoQualifiers,

    #[error("detection_interval_bars must be at least 1")]
    ZeroInterval,
}

/// Everything needed to reproduce a detection run.
///
/// ```toml
/// qualifiers = ["time", "linear", "volume"]
/// timeframe = "1d"
/// warmup_bars = 250
/// detection_interval_bars = 50
///
/// [detector]
/// precision = 75
/// auto_precision = false
///
/// [lifecycle]
/// min_strength = 1.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Shared detector settings; each qualifier runs with its own copy.
    pub detector: DetectorConfig,
    pub lifecycle: LifecycleConfig,
    pub qualifiers: Vec<Qualifier>,
    /// Overrides the timeframe inferred from bar spacing.
    pub timeframe: Option<Timeframe>,
    /// Bars consumed by the first detection pass of a replay.
    pub warmup_bars: usize,
    /// Bars between detection passes during replay.
    pub detection_interval_bars: usize,
    /// Run qualifiers on the rayon pool.
    pub parallel: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            lifecycle: LifecycleConfig::default(),
            qualifiers: Qualifier::ALL.to_vec(),
            timeframe: None,
            warmup_bars: 250,
            detection_interval_bars: 50,
            parallel: true,
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.detector.validate()?;
        self.lifecycle.validate()?;
        if self.qualifiers.is_empty() {
            return Err(ConfigError::NoQualifiers);
        }
        if self.detection_interval_bars == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Enabled qualifiers in declaration order, without repeats.
    pub fn enabled_qualifiers(&self) -> Vec<Qualifier> {
        let mut out: Vec<Qualifier> = Vec::with_capacity(self.qualifiers.len());
        for q in &self.qualifiers {
            if !out.contains(q) {
                out.push(*q);
            }
        }
        out
    }

    /// Detector settings for one qualifier.
    pub fn detector_for(&self, qualifier: Qualifier) -> DetectorConfig {
        self.detector.with_qualifier(qualifier)
    }

    /// Deterministic hash of the whole configuration.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_string(self).expect("RunnerConfig serialization failed");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_every_qualifier() {
        let config = RunnerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.enabled_qualifiers(), Qualifier::ALL.to_vec());
        assert_eq!(config.timeframe, None);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = RunnerConfig::from_toml(
            r#"
            qualifiers = ["volume", "linear", "volume"]
            timeframe = "1h"
            detection_interval_bars = 20

            [detector]
            precision = 40
            auto_precision = false

            [lifecycle]
            bounce_window_bars = 4
            "#,
        )
        .unwrap();
        assert_eq!(
            config.enabled_qualifiers(),
            vec![Qualifier::Volume, Qualifier::Linear]
        );
        assert_eq!(config.timeframe, Some(Timeframe::H1));
        assert_eq!(config.detection_interval_bars, 20);
        assert_eq!(config.detector.precision, 40);
        assert_eq!(config.detector.window_lengths, vec![5, 10, 20, 50]);
        assert_eq!(config.lifecycle.bounce_window_bars, 4);
        assert_eq!(config.warmup_bars, 250);
    }

    #[test]
    fn detector_for_sets_qualifier() {
        let config = RunnerConfig::default();
        assert_eq!(config.detector_for(Qualifier::Time).qualifier, Qualifier::Time);
        assert_eq!(config.detector_for(Qualifier::Volume).precision, config.detector.precision);
    }

    #[test]
    fn rejects_empty_qualifiers_and_zero_interval() {
        assert!(matches!(
            RunnerConfig::from_toml("qualifiers = []"),
            Err(ConfigError::NoQualifiers)
        ));
        assert!(matches!(
            RunnerConfig::from_toml("detection_interval_bars = 0"),
            Err(ConfigError::ZeroInterval)
        ));
    }

    #[test]
    fn invalid_detector_section_is_reported() {
        let err = RunnerConfig::from_toml("[detector]\nthreshold_ratio = 2.0").unwrap_err();
        assert!(matches!(err, ConfigError::Engine(_)));
    }

    #[test]
    fn unknown_qualifier_fails_to_parse() {
        assert!(matches!(
            RunnerConfig::from_toml(r#"qualifiers = ["median"]"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn run_id_is_deterministic_and_sensitive() {
        let a = RunnerConfig::default();
        let mut b = a.clone();
        assert_eq!(a.run_id(), b.run_id());
        b.detector.filter_length = 5;
        assert_ne!(a.run_id(), b.run_id());
    }
}
