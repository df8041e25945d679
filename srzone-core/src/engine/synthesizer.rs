//! Maps resolved peaks onto zone create / confirm requests.

use crate::domain::{Bar, NewZone, ParamsHash, Qualifier, Timeframe, WeightedPivot, Zone, ZoneId};
use crate::engine::detector::DetectedLevels;
use chrono::{DateTime, Utc};

/// A request for the lifecycle manager.
#[derive(Debug, Clone, PartialEq)]
pub enum ZoneAction {
    Confirm {
        zone_id: ZoneId,
        strength_delta: f64,
        observed_at: DateTime<Utc>,
        contributors: Vec<WeightedPivot>,
    },
    Create {
        zone: NewZone,
        contributors: Vec<WeightedPivot>,
    },
}

pub struct ZoneSynthesizer<'a> {
    pub qualifier: Qualifier,
    pub timeframe: Timeframe,
    pub params_hash: &'a ParamsHash,
    pub parameters_json: &'a str,
    pub detection_strength_scale: f64,
}

impl ZoneSynthesizer<'_> {
    /// One action per peak, in rank order.
    ///
    /// A peak inside the band of an active zone of the same qualifier and
    /// timeframe confirms it; any other peak requests a new zone whose
    /// `first_detected` is the earliest contributing pivot (the batch's
    /// first bar when nothing contributes) and whose `last_confirmed` is
    /// the batch's last bar.
    pub fn synthesize(&self, levels: &DetectedLevels, bars: &[Bar], active: &[Zone]) -> Vec<ZoneAction> {
        let (first_bar, last_bar) = match (bars.first(), bars.last()) {
            (Some(f), Some(l)) => (f.timestamp, l.timestamp),
            _ => return Vec::new(),
        };

        levels
            .peaks
            .iter()
            .map(|peak| {
                let contributors = levels.contributors(peak);
                let strength = if levels.max_score > 0.0 {
                    self.detection_strength_scale * peak.score / levels.max_score
                } else {
                    0.0
                };

                let matched = active
                    .iter()
                    .filter(|z| {
                        z.is_active
                            && z.qualifier == self.qualifier
                            && z.timeframe == self.timeframe
                            && z.contains(peak.level)
                    })
                    .min_by(|a, b| a.distance(peak.level).total_cmp(&b.distance(peak.level)));

                match matched {
                    Some(zone) => ZoneAction::Confirm {
                        zone_id: zone.id,
                        strength_delta: strength,
                        observed_at: last_bar,
                        contributors,
                    },
                    None => {
                        let first_detected = contributors
                            .iter()
                            .map(WeightedPivot::timestamp)
                            .min()
                            .unwrap_or(first_bar);
                        ZoneAction::Create {
                            zone: NewZone {
                                level: peak.level,
                                tolerance: levels.tolerance,
                                qualifier: self.qualifier,
                                timeframe: self.timeframe,
                                strength,
                                first_detected,
                                last_confirmed: last_bar,
                                params_hash: self.params_hash.clone(),
                                parameters_json: self.parameters_json.to_string(),
                            },
                            contributors,
                        }
                    }
                }
            })
            .collect()
    }
}
