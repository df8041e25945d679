//! Zone — a persisted support/resistance price band.

use crate::domain::{ParamsHash, Timeframe, ZoneId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pivot-weighting strategy a zone was detected under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Qualifier {
    Time,
    Linear,
    Volume,
}

impl Qualifier {
    pub const ALL: [Qualifier; 3] = [Qualifier::Time, Qualifier::Linear, Qualifier::Volume];

    pub fn as_str(&self) -> &'static str {
        match self {
            Qualifier::Time => "time",
            Qualifier::Linear => "linear",
            Qualifier::Volume => "volume",
        }
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a zone left the Active state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationReason {
    /// Strength fell below the floor after a weakening interaction.
    StrengthDecay,
    /// Price closed beyond the band for the configured number of bars.
    Breakout,
    /// A stronger zone formed within the supersession distance.
    Superseded,
}

impl InvalidationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidationReason::StrengthDecay => "strength_decay",
            InvalidationReason::Breakout => "breakout",
            InvalidationReason::Superseded => "superseded",
        }
    }
}

impl fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted zone record.
///
/// Records handed out by a repository are snapshots. State changes go through
/// the lifecycle manager, which is the only caller of the repository's
/// mutating operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub level: f64,
    /// Half-width of the price band around `level`.
    pub tolerance: f64,
    pub qualifier: Qualifier,
    pub timeframe: Timeframe,
    pub strength: f64,
    /// Timestamp of the earliest contributing pivot's bar. Immutable.
    pub first_detected: DateTime<Utc>,
    /// Timestamp of the latest reinforcing bar. Never decreases.
    pub last_confirmed: DateTime<Utc>,
    pub invalidated_at: Option<DateTime<Utc>>,
    pub invalidation_reason: Option<InvalidationReason>,
    pub is_active: bool,
    pub params_hash: ParamsHash,
    pub parameters_json: String,
}

impl Zone {
    pub fn lower(&self) -> f64 {
        self.level - self.tolerance
    }

    pub fn upper(&self) -> f64 {
        self.level + self.tolerance
    }

    /// True if `price` lies inside the closed band.
    pub fn contains(&self, price: f64) -> bool {
        price >= self.lower() && price <= self.upper()
    }

    /// True if the bar range `[low, high]` intersects the band.
    pub fn overlaps(&self, low: f64, high: f64) -> bool {
        high >= self.lower() && low <= self.upper()
    }

    pub fn distance(&self, price: f64) -> f64 {
        (self.level - price).abs()
    }
}

/// Creation request for a zone. The repository assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewZone {
    pub level: f64,
    pub tolerance: f64,
    pub qualifier: Qualifier,
    pub timeframe: Timeframe,
    pub strength: f64,
    pub first_detected: DateTime<Utc>,
    pub last_confirmed: DateTime<Utc>,
    pub params_hash: ParamsHash,
    pub parameters_json: String,
}

impl NewZone {
    pub fn into_zone(self, id: ZoneId) -> Zone {
        Zone {
            id,
            level: self.level,
            tolerance: self.tolerance,
            qualifier: self.qualifier,
            timeframe: self.timeframe,
            strength: self.strength.max(0.0),
            first_detected: self.first_detected,
            last_confirmed: self.last_confirmed,
            invalidated_at: None,
            invalidation_reason: None,
            is_active: true,
            params_hash: self.params_hash,
            parameters_json: self.parameters_json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_zone() -> Zone {
        let t = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        NewZone {
            level: 100.0,
            tolerance: 2.0,
            qualifier: Qualifier::Linear,
            timeframe: Timeframe::D1,
            strength: -3.0,
            first_detected: t,
            last_confirmed: t,
            params_hash: ParamsHash::from_bytes(b"test"),
            parameters_json: "{}".into(),
        }
        .into_zone(ZoneId(1))
    }

    #[test]
    fn new_zone_starts_active_with_non_negative_strength() {
        let zone = sample_zone();
        assert!(zone.is_active);
        assert!(zone.invalidated_at.is_none());
        assert_eq!(zone.strength, 0.0);
    }

    #[test]
    fn band_geometry() {
        let zone = sample_zone();
        assert!(zone.contains(98.0));
        assert!(zone.contains(102.0));
        assert!(!zone.contains(102.5));
        assert!(zone.overlaps(101.5, 104.0));
        assert!(!zone.overlaps(102.1, 104.0));
        assert_eq!(zone.distance(97.0), 3.0);
    }

    #[test]
    fn qualifier_serializes_lowercase() {
        let json = serde_json::to_string(&Qualifier::Volume).unwrap();
        assert_eq!(json, "\"volume\"");
        let back: Qualifier = serde_json::from_str("\"time\"").unwrap();
        assert_eq!(back, Qualifier::Time);
    }
}
