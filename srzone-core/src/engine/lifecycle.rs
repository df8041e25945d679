//! Zone lifecycle state machine — the single writer of zone state.
//!
//! States: Active (on creation) → Invalidated (terminal). All mutations go
//! through this manager so the timestamp invariants hold centrally:
//! - `last_confirmed >= first_detected`, clamped only at creation
//! - `last_confirmed` never decreases
//! - `first_detected` is never rewritten
//!
//! Every transition is appended to an audit trail.

use crate::config::LifecycleConfig;
use crate::domain::{
    Interaction, InteractionKind, InvalidationReason, NewZone, WeightedPivot, Zone, ZoneId,
};
use crate::error::DetectionError;
use crate::repository::{Upsert, ZoneRepository};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// What happened to a zone at one audit point.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Created,
    Confirmed,
    Interaction(InteractionKind),
    Invalidated(InvalidationReason),
}

/// One audit trail entry.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleEvent {
    pub zone_id: ZoneId,
    pub timestamp: DateTime<Utc>,
    pub transition: Transition,
    pub strength: f64,
}

/// Outcome of a creation request.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    /// A new zone was inserted; weaker neighbors were invalidated.
    Created { zone_id: ZoneId, superseded: Vec<ZoneId> },
    /// The repository already held an active zone covering the level; it was
    /// confirmed instead.
    Merged(ZoneId),
    /// A stronger active zone sits within the supersession distance.
    Dropped { by: ZoneId },
}

/// Outcome of an interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionOutcome {
    pub interaction: Interaction,
    pub invalidated: Option<InvalidationReason>,
}

pub struct ZoneLifecycleManager<'r, R: ZoneRepository + ?Sized> {
    repo: &'r R,
    config: LifecycleConfig,
    audit_trail: Vec<LifecycleEvent>,
}

impl<'r, R: ZoneRepository + ?Sized> ZoneLifecycleManager<'r, R> {
    pub fn new(repo: &'r R, config: LifecycleConfig) -> Self {
        Self {
            repo,
            config,
            audit_trail: Vec::new(),
        }
    }

    pub fn repository(&self) -> &'r R {
        self.repo
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn audit_trail(&self) -> &[LifecycleEvent] {
        &self.audit_trail
    }

    /// Drain the audit trail.
    pub fn take_audit_trail(&mut self) -> Vec<LifecycleEvent> {
        std::mem::take(&mut self.audit_trail)
    }

    // ── Transitions ────────────────────────────────────────────────────

    /// Create a zone, or resolve the request against existing zones.
    ///
    /// `last_confirmed` is raised to `first_detected` if it is earlier; this
    /// is the only place a timestamp is ever clamped. `at` is the timestamp
    /// of the bar that triggered the creation and becomes the
    /// `invalidated_at` of any superseded neighbor.
    pub fn create(
        &mut self,
        mut request: NewZone,
        contributors: &[WeightedPivot],
        at: DateTime<Utc>,
    ) -> Result<CreateOutcome, DetectionError> {
        if request.last_confirmed < request.first_detected {
            request.last_confirmed = request.first_detected;
        }

        let radius = self.config.supersession_distance_factor * request.tolerance;
        let neighbors = self.repo.find_zones_near(
            request.level,
            request.timeframe,
            radius,
            Some(request.qualifier),
        )?;
        // a zone covering the level absorbs the request through the upsert
        let covered = neighbors.iter().any(|z| z.contains(request.level));
        let stronger = if covered {
            None
        } else {
            neighbors.iter().find(|z| z.strength >= request.strength)
        };
        if let Some(stronger) = stronger {
            debug!(
                level = request.level,
                by = %stronger.id,
                "candidate dropped next to stronger zone"
            );
            return Ok(CreateOutcome::Dropped { by: stronger.id });
        }

        let strength = request.strength;
        let last_confirmed = request.last_confirmed;
        let level = request.level;
        match self.repo.create_zone(request)? {
            Upsert::Existing(zone_id) => {
                self.confirm(zone_id, strength, last_confirmed, contributors)?;
                Ok(CreateOutcome::Merged(zone_id))
            }
            Upsert::Created(zone_id) => {
                let zone = self.repo.get_zone(zone_id)?;
                for pivot in contributors {
                    self.repo.record_pivot(zone_id, pivot)?;
                }
                info!(
                    zone_id = %zone_id,
                    level,
                    qualifier = %zone.qualifier,
                    timeframe = %zone.timeframe,
                    first_detected = %zone.first_detected,
                    "zone created"
                );
                self.record(&zone, zone.last_confirmed, Transition::Created);

                let mut superseded = Vec::new();
                for neighbor in neighbors.iter().filter(|z| z.id != zone_id) {
                    self.invalidate(neighbor.id, at, InvalidationReason::Superseded)?;
                    superseded.push(neighbor.id);
                }
                Ok(CreateOutcome::Created { zone_id, superseded })
            }
        }
    }

    /// Reinforce an active zone.
    ///
    /// `last_confirmed` moves to `max(current, event)`. An event earlier
    /// than the zone's `first_detected` is rejected, never clamped.
    pub fn confirm(
        &mut self,
        zone_id: ZoneId,
        strength_delta: f64,
        event: DateTime<Utc>,
        contributors: &[WeightedPivot],
    ) -> Result<Zone, DetectionError> {
        let zone = self.repo.get_zone(zone_id)?;
        if event < zone.first_detected {
            return Err(DetectionError::InvalidTimestampOrdering {
                previous: zone.first_detected,
                current: event,
            });
        }
        let last_confirmed = zone.last_confirmed.max(event);
        let updated =
            self.repo
                .update_zone_strength(zone_id, strength_delta.max(0.0), Some(last_confirmed))?;
        for pivot in contributors {
            self.repo.record_pivot(zone_id, pivot)?;
        }
        debug!(zone_id = %zone_id, strength = updated.strength, "zone confirmed");
        self.record(&updated, event, Transition::Confirmed);
        Ok(updated)
    }

    /// Apply one interaction's delta and evaluate invalidation.
    ///
    /// Only reinforcing interactions advance `last_confirmed`. A weakening
    /// interaction that leaves the strength below `min_strength`
    /// invalidates the zone; so does a crossover that has persisted for
    /// `crossover_persistence_bars` closes (`closes_beyond`).
    pub fn apply_interaction(
        &mut self,
        zone_id: ZoneId,
        kind: InteractionKind,
        strength_delta: f64,
        close: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<InteractionOutcome, DetectionError> {
        let zone = self.repo.get_zone(zone_id)?;
        if timestamp < zone.first_detected {
            return Err(DetectionError::InvalidTimestampOrdering {
                previous: zone.first_detected,
                current: timestamp,
            });
        }
        let last_confirmed = if strength_delta > 0.0 {
            Some(zone.last_confirmed.max(timestamp))
        } else {
            None
        };
        let updated = self
            .repo
            .update_zone_strength(zone_id, strength_delta, last_confirmed)?;

        let interaction = Interaction {
            zone_id,
            timestamp,
            level: zone.level,
            price: close,
            kind,
            strength_delta,
            resulting_strength: updated.strength,
        };
        self.repo.record_interaction(zone_id, &interaction)?;
        debug!(
            zone_id = %zone_id,
            kind = %kind,
            delta = strength_delta,
            strength = updated.strength,
            "interaction"
        );
        self.record(&updated, timestamp, Transition::Interaction(kind));

        let mut invalidated = None;
        if strength_delta < 0.0 && updated.strength < self.config.min_strength {
            self.invalidate(zone_id, timestamp, InvalidationReason::StrengthDecay)?;
            invalidated = Some(InvalidationReason::StrengthDecay);
        }
        Ok(InteractionOutcome {
            interaction,
            invalidated,
        })
    }

    /// Invalidate when a crossover has held for the configured number of
    /// consecutive closes. Returns true if the zone was invalidated.
    pub fn check_breakout(
        &mut self,
        zone_id: ZoneId,
        closes_beyond: usize,
        timestamp: DateTime<Utc>,
    ) -> Result<bool, DetectionError> {
        if closes_beyond < self.config.crossover_persistence_bars {
            return Ok(false);
        }
        self.invalidate(zone_id, timestamp, InvalidationReason::Breakout)?;
        Ok(true)
    }

    /// Terminal transition. Invalidating twice is an error.
    pub fn invalidate(
        &mut self,
        zone_id: ZoneId,
        at: DateTime<Utc>,
        reason: InvalidationReason,
    ) -> Result<Zone, DetectionError> {
        let zone = self.repo.invalidate_zone(zone_id, at, reason)?;
        info!(zone_id = %zone_id, level = zone.level, reason = %reason, at = %at, "zone invalidated");
        self.record(&zone, at, Transition::Invalidated(reason));
        Ok(zone)
    }

    fn record(&mut self, zone: &Zone, timestamp: DateTime<Utc>, transition: Transition) {
        self.audit_trail.push(LifecycleEvent {
            zone_id: zone.id,
            timestamp,
            transition,
            strength: zone.strength,
        });
    }
}
