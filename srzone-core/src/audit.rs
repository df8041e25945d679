//! Consistency checks over stored zones.
//!
//! Read-only: these functions never mutate zones. They back the runner's
//! post-run report and the invariants exercised in the integration tests.

use crate::domain::{Zone, ZoneId};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    ConfirmedBeforeDetected,
    InvalidatedBeforeDetected,
    /// Inactive without `invalidated_at` or reason, or active with one.
    InconsistentState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimestampViolation {
    pub zone_id: ZoneId,
    pub kind: ViolationKind,
}

/// Every timestamp invariant broken by `zones`.
pub fn audit_timestamps(zones: &[Zone]) -> Vec<TimestampViolation> {
    let mut out = Vec::new();
    for zone in zones {
        let mut flag = |kind| {
            out.push(TimestampViolation {
                zone_id: zone.id,
                kind,
            })
        };
        if zone.last_confirmed < zone.first_detected {
            flag(ViolationKind::ConfirmedBeforeDetected);
        }
        if zone.invalidated_at.is_some_and(|at| at < zone.first_detected) {
            flag(ViolationKind::InvalidatedBeforeDetected);
        }
        let terminal = zone.invalidated_at.is_some() && zone.invalidation_reason.is_some();
        let clean = zone.invalidated_at.is_none() && zone.invalidation_reason.is_none();
        if (zone.is_active && !clean) || (!zone.is_active && !terminal) {
            flag(ViolationKind::InconsistentState);
        }
    }
    out
}

/// Pairs of active zones with the same qualifier and timeframe whose bands
/// each contain the other's level.
pub fn find_duplicates(zones: &[Zone]) -> Vec<(ZoneId, ZoneId)> {
    let active: Vec<&Zone> = zones.iter().filter(|z| z.is_active).collect();
    let mut pairs = Vec::new();
    for (i, a) in active.iter().enumerate() {
        for b in &active[i + 1..] {
            if a.qualifier == b.qualifier
                && a.timeframe == b.timeframe
                && a.contains(b.level)
                && b.contains(a.level)
            {
                pairs.push((a.id, b.id));
            }
        }
    }
    pairs
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelMatch {
    pub reference: f64,
    pub zone_id: ZoneId,
    pub level: f64,
    pub error: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LevelComparison {
    pub matched: Vec<LevelMatch>,
    pub missed: Vec<f64>,
}

impl LevelComparison {
    pub fn all_matched(&self) -> bool {
        self.missed.is_empty()
    }

    pub fn max_error(&self) -> f64 {
        self.matched.iter().map(|m| m.error).fold(0.0, f64::max)
    }
}

/// Match each reference level to the nearest active zone within
/// `tolerance`.
pub fn compare_levels(zones: &[Zone], reference: &[f64], tolerance: f64) -> LevelComparison {
    let mut comparison = LevelComparison::default();
    for &target in reference {
        let nearest = zones
            .iter()
            .filter(|z| z.is_active)
            .map(|z| (z, (z.level - target).abs()))
            .min_by(|a, b| a.1.total_cmp(&b.1));
        match nearest {
            Some((zone, error)) if error <= tolerance => comparison.matched.push(LevelMatch {
                reference: target,
                zone_id: zone.id,
                level: zone.level,
                error,
            }),
            _ => comparison.missed.push(target),
        }
    }
    comparison
}
