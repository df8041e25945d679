//! Zone repository contract.
//!
//! The repository is the only shared mutable resource of the engine. Every
//! method is a single atomic operation; implementations take `&self` and
//! handle their own synchronization so one repository can be shared across
//! qualifier passes running in parallel.
//!
//! Duplicate creation is resolved by upsert: `create_zone` returns
//! `Upsert::Existing` when an active zone of the same qualifier and timeframe
//! already covers the requested level, and the caller confirms that zone.

pub mod memory;

pub use memory::InMemoryZoneRepository;

use crate::domain::{
    Interaction, InvalidationReason, NewZone, Qualifier, Timeframe, WeightedPivot, Zone, ZoneId,
};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors from repository operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RepositoryError {
    #[error("{0} not found")]
    ZoneNotFound(ZoneId),

    #[error("{0} is not active")]
    ZoneNotActive(ZoneId),

    #[error("{zone}: last_confirmed {last_confirmed} precedes first_detected {first_detected}")]
    ConfirmedBeforeDetected {
        zone: ZoneId,
        first_detected: DateTime<Utc>,
        last_confirmed: DateTime<Utc>,
    },

    #[error("{zone}: last_confirmed would regress from {current} to {requested}")]
    ConfirmationRegressed {
        zone: ZoneId,
        current: DateTime<Utc>,
        requested: DateTime<Utc>,
    },

    #[error("{zone}: invalidated_at {invalidated_at} precedes first_detected {first_detected}")]
    InvalidatedBeforeDetected {
        zone: ZoneId,
        first_detected: DateTime<Utc>,
        invalidated_at: DateTime<Utc>,
    },

    #[error("storage backend: {0}")]
    Backend(String),
}

/// Result of an idempotent zone creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Created(ZoneId),
    /// An active zone already covered the level; nothing was inserted.
    Existing(ZoneId),
}

impl Upsert {
    pub fn zone_id(&self) -> ZoneId {
        match self {
            Upsert::Created(id) | Upsert::Existing(id) => *id,
        }
    }

    pub fn created(&self) -> bool {
        matches!(self, Upsert::Created(_))
    }
}

/// Durable storage for zones, their pivot provenance and interactions.
pub trait ZoneRepository: Send + Sync {
    /// Insert a zone, or return the active zone of the same qualifier and
    /// timeframe whose band already contains `zone.level`.
    ///
    /// Must reject `last_confirmed < first_detected`.
    fn create_zone(&self, zone: NewZone) -> Result<Upsert, RepositoryError>;

    /// Active zones of a timeframe ordered by level, optionally filtered by
    /// qualifier.
    fn get_active_zones(
        &self,
        timeframe: Timeframe,
        qualifier: Option<Qualifier>,
    ) -> Result<Vec<Zone>, RepositoryError>;

    fn get_zone(&self, id: ZoneId) -> Result<Zone, RepositoryError>;

    /// Add `strength_delta` (strength is floored at zero) and, when given,
    /// move `last_confirmed`.
    ///
    /// Must reject a `last_confirmed` earlier than the zone's
    /// `first_detected` or earlier than its current `last_confirmed`, and
    /// any update to an inactive zone.
    fn update_zone_strength(
        &self,
        id: ZoneId,
        strength_delta: f64,
        last_confirmed: Option<DateTime<Utc>>,
    ) -> Result<Zone, RepositoryError>;

    /// Terminal transition. Invalidating an inactive zone is an error.
    fn invalidate_zone(
        &self,
        id: ZoneId,
        invalidated_at: DateTime<Utc>,
        reason: InvalidationReason,
    ) -> Result<Zone, RepositoryError>;

    /// Add a pivot to the zone's provenance set. Re-recording the same pivot
    /// is a no-op.
    fn record_pivot(&self, id: ZoneId, pivot: &WeightedPivot) -> Result<(), RepositoryError>;

    fn record_interaction(
        &self,
        id: ZoneId,
        interaction: &Interaction,
    ) -> Result<(), RepositoryError>;

    fn get_pivots(&self, id: ZoneId) -> Result<Vec<WeightedPivot>, RepositoryError>;

    fn get_interactions(&self, id: ZoneId) -> Result<Vec<Interaction>, RepositoryError>;

    /// Every zone ever stored, active or not, ordered by id.
    fn all_zones(&self) -> Result<Vec<Zone>, RepositoryError>;

    /// Active zones whose level is within `distance` of `price`, nearest
    /// first.
    fn find_zones_near(
        &self,
        price: f64,
        timeframe: Timeframe,
        distance: f64,
        qualifier: Option<Qualifier>,
    ) -> Result<Vec<Zone>, RepositoryError> {
        let mut zones: Vec<Zone> = self
            .get_active_zones(timeframe, qualifier)?
            .into_iter()
            .filter(|z| z.distance(price) <= distance)
            .collect();
        zones.sort_by(|a, b| a.distance(price).total_cmp(&b.distance(price)));
        Ok(zones)
    }
}
