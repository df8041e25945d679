//! Detector and lifecycle configuration.
//!
//! Both structs deserialize from TOML with every field optional; missing
//! fields take the documented defaults. `validate()` runs at load time so a
//! bad configuration fails before any bar is processed.

use crate::domain::Qualifier;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be positive (got {value})")]
    NonPositive { field: &'static str, value: f64 },

    #[error("window_lengths must contain at least one length")]
    NoWindows,

    #[error("window length must be at least 1")]
    ZeroWindow,

    #[error("at least one of include_pivot_high / include_pivot_low must be enabled")]
    NoPivotKinds,

    #[error("threshold_ratio must be in (0, 1] (got {0})")]
    ThresholdOutOfRange(f64),

    #[error("read config file: {0}")]
    Io(String),

    #[error("parse config TOML: {0}")]
    Parse(String),
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    // also rejects NaN
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

// ── Detector ─────────────────────────────────────────────────────────

/// Parameters of one detection pass (pivots → histogram → peaks → zones).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Most recent pivots considered per pass.
    pub pivot_lookback: usize,
    pub window_lengths: Vec<usize>,
    pub include_pivot_high: bool,
    pub include_pivot_low: bool,
    pub qualifier: Qualifier,
    /// Sinc kernel length.
    pub filter_length: usize,
    /// Histogram bin count when `auto_precision` is off.
    pub precision: usize,
    pub auto_precision: bool,
    pub threshold_ratio: f64,
    pub max_zones_per_pass: usize,
    /// Band divisor: the default half-width is `range / (2 * scale)`.
    pub scale: f64,
    /// Explicit band half-width in price units; overrides `scale`.
    pub zone_tolerance: Option<f64>,
    /// Half-life of the time qualifier's decay, in bars.
    pub time_decay_half_life: f64,
    /// Bars per detection batch.
    pub lookback_bars: usize,
    /// Strength granted to the strongest peak of a pass.
    pub detection_strength_scale: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            pivot_lookback: 50,
            window_lengths: vec![5, 10, 20, 50],
            include_pivot_high: true,
            include_pivot_low: true,
            qualifier: Qualifier::Linear,
            filter_length: 3,
            precision: 75,
            auto_precision: true,
            threshold_ratio: 0.25,
            max_zones_per_pass: 3,
            scale: 30.0,
            zone_tolerance: None,
            time_decay_half_life: 30.0,
            lookback_bars: 4000,
            detection_strength_scale: 10.0,
        }
    }
}

impl DetectorConfig {
    /// Copy of this config running under another qualifier.
    pub fn with_qualifier(&self, qualifier: Qualifier) -> Self {
        Self {
            qualifier,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_lengths.is_empty() {
            return Err(ConfigError::NoWindows);
        }
        if self.window_lengths.contains(&0) {
            return Err(ConfigError::ZeroWindow);
        }
        if !self.include_pivot_high && !self.include_pivot_low {
            return Err(ConfigError::NoPivotKinds);
        }
        positive("pivot_lookback", self.pivot_lookback as f64)?;
        positive("filter_length", self.filter_length as f64)?;
        positive("precision", self.precision as f64)?;
        positive("max_zones_per_pass", self.max_zones_per_pass as f64)?;
        positive("lookback_bars", self.lookback_bars as f64)?;
        positive("scale", self.scale)?;
        positive("time_decay_half_life", self.time_decay_half_life)?;
        positive("detection_strength_scale", self.detection_strength_scale)?;
        if let Some(tol) = self.zone_tolerance {
            positive("zone_tolerance", tol)?;
        }
        if !(self.threshold_ratio > 0.0 && self.threshold_ratio <= 1.0) {
            return Err(ConfigError::ThresholdOutOfRange(self.threshold_ratio));
        }
        Ok(())
    }

    /// Band half-width for a batch whose pivots span `price_range`.
    pub fn tolerance_for_range(&self, price_range: f64) -> f64 {
        self.zone_tolerance
            .unwrap_or_else(|| price_range / (2.0 * self.scale))
    }

    /// Parse and validate from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&content)
    }
}

// ── Lifecycle ────────────────────────────────────────────────────────

/// Thresholds and deltas of the zone state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// A zone whose strength drops below this after a weakening interaction
    /// is invalidated.
    pub min_strength: f64,
    /// Consecutive closes beyond the band that invalidate a zone after a
    /// crossover.
    pub crossover_persistence_bars: usize,
    /// Supersession radius, as a multiple of the zone tolerance.
    pub supersession_distance_factor: f64,
    /// Bars after a touch or crossover during which a reversal counts as a
    /// bounce.
    pub bounce_window_bars: usize,
    pub touch_delta: f64,
    pub bounce_delta: f64,
    /// Magnitude of the (negative) crossover delta.
    pub crossover_delta: f64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            min_strength: 1.0,
            crossover_persistence_bars: 5,
            supersession_distance_factor: 2.0,
            bounce_window_bars: 3,
            touch_delta: 2.0,
            bounce_delta: 10.0,
            crossover_delta: 5.0,
        }
    }
}

impl LifecycleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_strength.is_nan() || self.min_strength < 0.0 {
            return Err(ConfigError::NonPositive {
                field: "min_strength",
                value: self.min_strength,
            });
        }
        positive(
            "crossover_persistence_bars",
            self.crossover_persistence_bars as f64,
        )?;
        positive("supersession_distance_factor", self.supersession_distance_factor)?;
        positive("bounce_window_bars", self.bounce_window_bars as f64)?;
        positive("touch_delta", self.touch_delta)?;
        positive("bounce_delta", self.bounce_delta)?;
        positive("crossover_delta", self.crossover_delta)?;
        Ok(())
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(DetectorConfig::default().validate().is_ok());
        assert!(LifecycleConfig::default().validate().is_ok());
    }

    #[test]
    fn defaults_match_documented_values() {
        let c = DetectorConfig::default();
        assert_eq!(c.window_lengths, vec![5, 10, 20, 50]);
        assert_eq!(c.filter_length, 3);
        assert_eq!(c.precision, 75);
        assert!(c.auto_precision);
        assert_eq!(c.threshold_ratio, 0.25);
        assert_eq!(c.max_zones_per_pass, 3);
        assert_eq!(c.scale, 30.0);
        assert_eq!(c.lookback_bars, 4000);
    }

    #[test]
    fn rejects_zero_filter_length() {
        let c = DetectorConfig {
            filter_length: 0,
            ..Default::default()
        };
        assert_eq!(
            c.validate(),
            Err(ConfigError::NonPositive {
                field: "filter_length",
                value: 0.0
            })
        );
    }

    #[test]
    fn rejects_zero_precision() {
        let c = DetectorConfig {
            precision: 0,
            ..Default::default()
        };
        assert!(matches!(
            c.validate(),
            Err(ConfigError::NonPositive { field: "precision", .. })
        ));
    }

    #[test]
    fn rejects_bad_threshold_and_windows() {
        let c = DetectorConfig {
            threshold_ratio: 1.5,
            ..Default::default()
        };
        assert_eq!(c.validate(), Err(ConfigError::ThresholdOutOfRange(1.5)));

        let c = DetectorConfig {
            window_lengths: vec![],
            ..Default::default()
        };
        assert_eq!(c.validate(), Err(ConfigError::NoWindows));

        let c = DetectorConfig {
            window_lengths: vec![5, 0],
            ..Default::default()
        };
        assert_eq!(c.validate(), Err(ConfigError::ZeroWindow));

        let c = DetectorConfig {
            include_pivot_high: false,
            include_pivot_low: false,
            ..Default::default()
        };
        assert_eq!(c.validate(), Err(ConfigError::NoPivotKinds));
    }

    #[test]
    fn toml_partial_override() {
        let c = DetectorConfig::from_toml(
            r#"
            qualifier = "volume"
            precision = 120
            auto_precision = false
            zone_tolerance = 15.0
            "#,
        )
        .unwrap();
        assert_eq!(c.qualifier, Qualifier::Volume);
        assert_eq!(c.precision, 120);
        assert!(!c.auto_precision);
        assert_eq!(c.tolerance_for_range(1000.0), 15.0);
        // untouched fields keep defaults
        assert_eq!(c.filter_length, 3);
    }

    #[test]
    fn toml_validation_runs_on_load() {
        let err = DetectorConfig::from_toml("filter_length = 0").unwrap_err();
        assert!(matches!(err, ConfigError::NonPositive { .. }));

        let err = DetectorConfig::from_toml("precision = \"lots\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn tolerance_defaults_to_scaled_range() {
        let c = DetectorConfig::default();
        assert_eq!(c.tolerance_for_range(600.0), 10.0);
    }

    #[test]
    fn lifecycle_toml_override() {
        let c = LifecycleConfig::from_toml("crossover_persistence_bars = 8").unwrap();
        assert_eq!(c.crossover_persistence_bars, 8);
        assert_eq!(c.touch_delta, 2.0);
        assert!(LifecycleConfig::from_toml("bounce_delta = -1.0").is_err());
    }
}
