//! Per-bar classification of price action against active zones.
//!
//! For every zone the detector remembers the last side of the band a close
//! was seen on, an open probe (a touch or crossover that may still turn into
//! a bounce), and how many consecutive closes have stayed beyond the band
//! since the last crossover. At most one interaction is emitted per bar and
//! zone:
//!
//! - close on the far side of the band from the last outside close:
//!   crossover, or a bounce if it reverses a crossover still inside the
//!   bounce window
//! - close back on the origin side of an open touch probe, bar clear of the
//!   band: bounce
//! - bar range entering the band otherwise: touch

use crate::config::LifecycleConfig;
use crate::domain::{Bar, InteractionKind, Zone, ZoneId};
use crate::error::DetectionError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Above,
    Below,
}

#[derive(Debug, Clone, Copy)]
struct Probe {
    origin: Side,
    age: usize,
    from_crossover: bool,
}

#[derive(Debug, Clone, Default)]
struct ZoneTrack {
    side: Option<Side>,
    probe: Option<Probe>,
    /// Side and count of consecutive closes beyond the band after a crossover.
    breakout: Option<(Side, usize)>,
}

/// A classified interaction with its scaled strength delta.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedInteraction {
    pub kind: InteractionKind,
    pub strength_delta: f64,
}

/// Everything the lifecycle manager needs about one zone for one bar.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneSignal {
    pub zone_id: ZoneId,
    pub interaction: Option<DetectedInteraction>,
    /// Consecutive closes beyond the band since the last crossover,
    /// including the crossover bar; 0 when no crossover is in force.
    pub closes_beyond: usize,
}

pub struct InteractionDetector {
    config: LifecycleConfig,
    tracks: HashMap<ZoneId, ZoneTrack>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl InteractionDetector {
    pub fn new(config: LifecycleConfig) -> Self {
        Self {
            config,
            tracks: HashMap::new(),
            last_timestamp: None,
        }
    }

    /// Classify `bar` against every zone in `zones`.
    ///
    /// Bars must arrive in strictly increasing timestamp order. Zones no
    /// longer passed in are forgotten.
    pub fn observe(&mut self, bar: &Bar, zones: &[Zone]) -> Result<Vec<ZoneSignal>, DetectionError> {
        if let Some(previous) = self.last_timestamp {
            if bar.timestamp <= previous {
                return Err(DetectionError::InvalidTimestampOrdering {
                    previous,
                    current: bar.timestamp,
                });
            }
        }
        self.last_timestamp = Some(bar.timestamp);
        self.tracks
            .retain(|id, _| zones.iter().any(|z| z.id == *id));

        let signals = zones
            .iter()
            .filter(|z| z.is_active)
            .map(|zone| {
                let track = self.tracks.entry(zone.id).or_default();
                let kind = classify(track, bar, zone, self.config.bounce_window_bars);
                ZoneSignal {
                    zone_id: zone.id,
                    interaction: kind.map(|kind| DetectedInteraction {
                        kind,
                        strength_delta: scaled_delta(&self.config, kind, bar.close, zone),
                    }),
                    closes_beyond: track.breakout.map_or(0, |(_, n)| n),
                }
            })
            .collect();
        Ok(signals)
    }

    /// Forget all per-zone state and the ordering watermark.
    pub fn reset(&mut self) {
        self.tracks.clear();
        self.last_timestamp = None;
    }
}

fn close_side(zone: &Zone, close: f64) -> Option<Side> {
    if close > zone.upper() {
        Some(Side::Above)
    } else if close < zone.lower() {
        Some(Side::Below)
    } else {
        None
    }
}

fn bounce(origin: Side) -> InteractionKind {
    match origin {
        Side::Above => InteractionKind::BounceUp,
        Side::Below => InteractionKind::BounceDown,
    }
}

fn crossover(to: Side) -> InteractionKind {
    match to {
        Side::Above => InteractionKind::CrossoverUp,
        Side::Below => InteractionKind::CrossoverDown,
    }
}

fn classify(track: &mut ZoneTrack, bar: &Bar, zone: &Zone, window: usize) -> Option<InteractionKind> {
    if let Some(probe) = track.probe.as_mut() {
        probe.age += 1;
        if probe.age > window {
            track.probe = None;
        }
    }

    let overlaps = zone.overlaps(bar.low, bar.high);
    let side = close_side(zone, bar.close);

    let kind = match side {
        Some(side) => {
            let crossed = track.side.is_some_and(|prev| prev != side);
            let reversal = track.probe.filter(|p| p.origin == side);
            let kind = if crossed {
                match reversal {
                    Some(p) if p.from_crossover => {
                        track.probe = None;
                        track.breakout = None;
                        Some(bounce(p.origin))
                    }
                    _ => {
                        track.probe = track.side.map(|origin| Probe {
                            origin,
                            age: 0,
                            from_crossover: true,
                        });
                        track.breakout = Some((side, 0));
                        Some(crossover(side))
                    }
                }
            } else if let (Some(p), false) = (reversal, overlaps) {
                track.probe = None;
                Some(bounce(p.origin))
            } else if overlaps {
                open_touch_probe(track, side);
                Some(InteractionKind::Touch)
            } else {
                None
            };
            track.side = Some(side);
            kind
        }
        None => {
            if let Some(origin) = track.side {
                open_touch_probe(track, origin);
            }
            Some(InteractionKind::Touch)
        }
    };

    track.breakout = match (track.breakout, side) {
        (Some((b, n)), Some(s)) if b == s => Some((b, n + 1)),
        _ => None,
    };
    kind
}

fn open_touch_probe(track: &mut ZoneTrack, origin: Side) {
    if track.probe.is_none() {
        track.probe = Some(Probe {
            origin,
            age: 0,
            from_crossover: false,
        });
    }
}

/// Base delta times how decisively the close sits relative to the band:
/// `clamp(|close - level| / tolerance, 0.5, 2.0)`.
fn scaled_delta(config: &LifecycleConfig, kind: InteractionKind, close: f64, zone: &Zone) -> f64 {
    let base = match kind {
        InteractionKind::Touch => config.touch_delta,
        InteractionKind::BounceUp | InteractionKind::BounceDown => config.bounce_delta,
        InteractionKind::CrossoverUp | InteractionKind::CrossoverDown => -config.crossover_delta,
    };
    let magnitude = if zone.tolerance > 0.0 {
        ((close - zone.level).abs() / zone.tolerance).clamp(0.5, 2.0)
    } else {
        1.0
    };
    base * magnitude
}
