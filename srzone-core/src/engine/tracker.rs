//! Bar-by-bar zone maintenance between detection passes.

use crate::config::LifecycleConfig;
use crate::domain::{Bar, Interaction, InvalidationReason, Qualifier, Timeframe, Zone, ZoneId};
use crate::engine::interaction::InteractionDetector;
use crate::engine::lifecycle::ZoneLifecycleManager;
use crate::error::DetectionError;
use crate::repository::ZoneRepository;
use chrono::{DateTime, Utc};

/// What one bar did to the active zones of a timeframe.
#[derive(Debug, Clone, PartialEq)]
pub struct BarOutcome {
    pub timestamp: DateTime<Utc>,
    pub interactions: Vec<Interaction>,
    pub invalidated: Vec<(ZoneId, InvalidationReason)>,
}

/// Feeds bars through an `InteractionDetector` and applies what it finds.
pub struct ZoneTracker {
    timeframe: Timeframe,
    qualifier: Option<Qualifier>,
    detector: InteractionDetector,
}

impl ZoneTracker {
    pub fn new(timeframe: Timeframe, config: LifecycleConfig) -> Self {
        Self {
            timeframe,
            qualifier: None,
            detector: InteractionDetector::new(config),
        }
    }

    /// Track only the zones of one qualifier.
    pub fn with_qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifier = Some(qualifier);
        self
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Classify `bar` against the tracked active zones already detected at
    /// `bar.timestamp`, then apply deltas and check for invalidation.
    pub fn process_bar<R: ZoneRepository + ?Sized>(
        &mut self,
        bar: &Bar,
        manager: &mut ZoneLifecycleManager<'_, R>,
    ) -> Result<BarOutcome, DetectionError> {
        let zones: Vec<Zone> = manager
            .repository()
            .get_active_zones(self.timeframe, self.qualifier)?
            .into_iter()
            .filter(|z| z.first_detected <= bar.timestamp)
            .collect();
        let signals = self.detector.observe(bar, &zones)?;

        let mut outcome = BarOutcome {
            timestamp: bar.timestamp,
            interactions: Vec::new(),
            invalidated: Vec::new(),
        };
        for signal in signals {
            if let Some(hit) = signal.interaction {
                let applied = manager.apply_interaction(
                    signal.zone_id,
                    hit.kind,
                    hit.strength_delta,
                    bar.close,
                    bar.timestamp,
                )?;
                outcome.interactions.push(applied.interaction);
                if let Some(reason) = applied.invalidated {
                    outcome.invalidated.push((signal.zone_id, reason));
                    continue;
                }
            }
            if manager.check_breakout(signal.zone_id, signal.closes_beyond, bar.timestamp)? {
                outcome
                    .invalidated
                    .push((signal.zone_id, InvalidationReason::Breakout));
            }
        }
        Ok(outcome)
    }

    pub fn reset(&mut self) {
        self.detector.reset();
    }
}
