//! In-memory zone repository.
//!
//! A table of zones keyed by `ZoneId` plus per-zone provenance and
//! interaction logs, all behind one `RwLock`. Each trait method takes the
//! lock once, so every mutation is atomic with respect to concurrent passes.

use super::{RepositoryError, Upsert, ZoneRepository};
use crate::domain::{
    Interaction, InvalidationReason, NewZone, Qualifier, Timeframe, WeightedPivot, Zone, ZoneId,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[derive(Default)]
struct Tables {
    next_id: u64,
    zones: BTreeMap<ZoneId, Zone>,
    pivots: HashMap<ZoneId, Vec<WeightedPivot>>,
    interactions: HashMap<ZoneId, Vec<Interaction>>,
}

impl Tables {
    fn zone_mut(&mut self, id: ZoneId) -> Result<&mut Zone, RepositoryError> {
        self.zones
            .get_mut(&id)
            .ok_or(RepositoryError::ZoneNotFound(id))
    }

    fn ensure_exists(&self, id: ZoneId) -> Result<(), RepositoryError> {
        if self.zones.contains_key(&id) {
            Ok(())
        } else {
            Err(RepositoryError::ZoneNotFound(id))
        }
    }
}

/// Thread-safe in-memory implementation of [`ZoneRepository`].
#[derive(Default)]
pub struct InMemoryZoneRepository {
    tables: RwLock<Tables>,
}

impl InMemoryZoneRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of zones ever created.
    pub fn len(&self) -> usize {
        self.tables.read().zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ZoneRepository for InMemoryZoneRepository {
    fn create_zone(&self, zone: NewZone) -> Result<Upsert, RepositoryError> {
        let mut tables = self.tables.write();

        let existing = tables.zones.values().find(|z| {
            z.is_active
                && z.qualifier == zone.qualifier
                && z.timeframe == zone.timeframe
                && z.contains(zone.level)
        });
        if let Some(existing) = existing {
            debug!(zone_id = %existing.id, level = zone.level, "upsert resolved to existing zone");
            return Ok(Upsert::Existing(existing.id));
        }

        let id = ZoneId(tables.next_id + 1);
        if zone.last_confirmed < zone.first_detected {
            return Err(RepositoryError::ConfirmedBeforeDetected {
                zone: id,
                first_detected: zone.first_detected,
                last_confirmed: zone.last_confirmed,
            });
        }
        tables.next_id = id.0;
        tables.zones.insert(id, zone.into_zone(id));
        Ok(Upsert::Created(id))
    }

    fn get_active_zones(
        &self,
        timeframe: Timeframe,
        qualifier: Option<Qualifier>,
    ) -> Result<Vec<Zone>, RepositoryError> {
        let tables = self.tables.read();
        let mut zones: Vec<Zone> = tables
            .zones
            .values()
            .filter(|z| z.is_active && z.timeframe == timeframe)
            .filter(|z| qualifier.map_or(true, |q| z.qualifier == q))
            .cloned()
            .collect();
        zones.sort_by(|a, b| a.level.total_cmp(&b.level));
        Ok(zones)
    }

    fn get_zone(&self, id: ZoneId) -> Result<Zone, RepositoryError> {
        self.tables
            .read()
            .zones
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::ZoneNotFound(id))
    }

    fn update_zone_strength(
        &self,
        id: ZoneId,
        strength_delta: f64,
        last_confirmed: Option<DateTime<Utc>>,
    ) -> Result<Zone, RepositoryError> {
        let mut tables = self.tables.write();
        let zone = tables.zone_mut(id)?;

        if !zone.is_active {
            return Err(RepositoryError::ZoneNotActive(id));
        }
        if let Some(ts) = last_confirmed {
            if ts < zone.first_detected {
                return Err(RepositoryError::ConfirmedBeforeDetected {
                    zone: id,
                    first_detected: zone.first_detected,
                    last_confirmed: ts,
                });
            }
            if ts < zone.last_confirmed {
                return Err(RepositoryError::ConfirmationRegressed {
                    zone: id,
                    current: zone.last_confirmed,
                    requested: ts,
                });
            }
            zone.last_confirmed = ts;
        }
        zone.strength = (zone.strength + strength_delta).max(0.0);
        Ok(zone.clone())
    }

    fn invalidate_zone(
        &self,
        id: ZoneId,
        invalidated_at: DateTime<Utc>,
        reason: InvalidationReason,
    ) -> Result<Zone, RepositoryError> {
        let mut tables = self.tables.write();
        let zone = tables.zone_mut(id)?;

        if !zone.is_active {
            return Err(RepositoryError::ZoneNotActive(id));
        }
        if invalidated_at < zone.first_detected {
            return Err(RepositoryError::InvalidatedBeforeDetected {
                zone: id,
                first_detected: zone.first_detected,
                invalidated_at,
            });
        }
        zone.is_active = false;
        zone.invalidated_at = Some(invalidated_at);
        zone.invalidation_reason = Some(reason);
        Ok(zone.clone())
    }

    fn record_pivot(&self, id: ZoneId, pivot: &WeightedPivot) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write();
        tables.ensure_exists(id)?;
        let provenance = tables.pivots.entry(id).or_default();
        let duplicate = provenance.iter().any(|p| {
            p.pivot.timestamp == pivot.pivot.timestamp
                && p.pivot.kind == pivot.pivot.kind
                && p.pivot.window == pivot.pivot.window
        });
        if !duplicate {
            provenance.push(pivot.clone());
        }
        Ok(())
    }

    fn record_interaction(
        &self,
        id: ZoneId,
        interaction: &Interaction,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write();
        tables.ensure_exists(id)?;
        tables
            .interactions
            .entry(id)
            .or_default()
            .push(interaction.clone());
        Ok(())
    }

    fn get_pivots(&self, id: ZoneId) -> Result<Vec<WeightedPivot>, RepositoryError> {
        let tables = self.tables.read();
        tables.ensure_exists(id)?;
        Ok(tables.pivots.get(&id).cloned().unwrap_or_default())
    }

    fn get_interactions(&self, id: ZoneId) -> Result<Vec<Interaction>, RepositoryError> {
        let tables = self.tables.read();
        tables.ensure_exists(id)?;
        Ok(tables.interactions.get(&id).cloned().unwrap_or_default())
    }

    fn all_zones(&self) -> Result<Vec<Zone>, RepositoryError> {
        Ok(self.tables.read().zones.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{InteractionKind, ParamsHash, Pivot, PivotKind};
    use chrono::{Duration, TimeZone};

    fn t(day: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(day)
    }

    fn new_zone(level: f64, first: i64, last: i64) -> NewZone {
        NewZone {
            level,
            tolerance: 5.0,
            qualifier: Qualifier::Linear,
            timeframe: Timeframe::D1,
            strength: 10.0,
            first_detected: t(first),
            last_confirmed: t(last),
            params_hash: ParamsHash::from_bytes(b"p"),
            parameters_json: "{}".into(),
        }
    }

    fn pivot(day: i64, window: usize) -> WeightedPivot {
        WeightedPivot {
            pivot: Pivot {
                timestamp: t(day),
                bar_index: day as usize,
                price: 100.0,
                kind: PivotKind::High,
                window,
                raw_weight: 1.0,
            },
            weight: 1.0,
        }
    }

    #[test]
    fn create_assigns_fresh_ids() {
        let repo = InMemoryZoneRepository::new();
        let a = repo.create_zone(new_zone(100.0, 0, 5)).unwrap();
        let b = repo.create_zone(new_zone(200.0, 0, 5)).unwrap();
        assert!(a.created() && b.created());
        assert_ne!(a.zone_id(), b.zone_id());
        assert_eq!(repo.len(), 2);
    }

    #[test]
    fn create_within_band_is_upsert() {
        let repo = InMemoryZoneRepository::new();
        let a = repo.create_zone(new_zone(100.0, 0, 5)).unwrap();
        let b = repo.create_zone(new_zone(103.0, 1, 6)).unwrap();
        assert_eq!(b, Upsert::Existing(a.zone_id()));
        assert_eq!(repo.len(), 1);

        // different qualifier is a different bucket
        let mut other = new_zone(100.0, 0, 5);
        other.qualifier = Qualifier::Volume;
        assert!(repo.create_zone(other).unwrap().created());
    }

    #[test]
    fn create_rejects_confirmed_before_detected() {
        let repo = InMemoryZoneRepository::new();
        let err = repo.create_zone(new_zone(100.0, 5, 2)).unwrap_err();
        assert!(matches!(err, RepositoryError::ConfirmedBeforeDetected { .. }));
        assert!(repo.is_empty());
    }

    #[test]
    fn strength_update_floors_at_zero_and_advances_timestamp() {
        let repo = InMemoryZoneRepository::new();
        let id = repo.create_zone(new_zone(100.0, 0, 5)).unwrap().zone_id();

        let z = repo.update_zone_strength(id, -25.0, None).unwrap();
        assert_eq!(z.strength, 0.0);
        assert_eq!(z.last_confirmed, t(5));

        let z = repo.update_zone_strength(id, 3.0, Some(t(9))).unwrap();
        assert_eq!(z.strength, 3.0);
        assert_eq!(z.last_confirmed, t(9));
    }

    #[test]
    fn strength_update_rejects_bad_timestamps() {
        let repo = InMemoryZoneRepository::new();
        let id = repo.create_zone(new_zone(100.0, 3, 5)).unwrap().zone_id();

        let err = repo.update_zone_strength(id, 1.0, Some(t(1))).unwrap_err();
        assert!(matches!(err, RepositoryError::ConfirmedBeforeDetected { .. }));

        let err = repo.update_zone_strength(id, 1.0, Some(t(4))).unwrap_err();
        assert!(matches!(err, RepositoryError::ConfirmationRegressed { .. }));

        // rejected updates leave the zone untouched
        let z = repo.get_zone(id).unwrap();
        assert_eq!(z.strength, 10.0);
        assert_eq!(z.last_confirmed, t(5));
    }

    #[test]
    fn invalidation_is_terminal() {
        let repo = InMemoryZoneRepository::new();
        let id = repo.create_zone(new_zone(100.0, 0, 5)).unwrap().zone_id();

        let z = repo
            .invalidate_zone(id, t(7), InvalidationReason::Breakout)
            .unwrap();
        assert!(!z.is_active);
        assert_eq!(z.invalidated_at, Some(t(7)));

        assert_eq!(
            repo.invalidate_zone(id, t(8), InvalidationReason::Superseded),
            Err(RepositoryError::ZoneNotActive(id))
        );
        assert_eq!(
            repo.update_zone_strength(id, 5.0, Some(t(9))),
            Err(RepositoryError::ZoneNotActive(id))
        );
        let z = repo.get_zone(id).unwrap();
        assert_eq!(z.invalidated_at, Some(t(7)));
        assert_eq!(z.invalidation_reason, Some(InvalidationReason::Breakout));

        // a new zone at the same level is a new identity
        let again = repo.create_zone(new_zone(100.0, 6, 8)).unwrap();
        assert!(again.created());
        assert_ne!(again.zone_id(), id);
    }

    #[test]
    fn active_zones_are_filtered_and_sorted() {
        let repo = InMemoryZoneRepository::new();
        repo.create_zone(new_zone(300.0, 0, 1)).unwrap();
        let low = repo.create_zone(new_zone(100.0, 0, 1)).unwrap().zone_id();
        let mut hourly = new_zone(200.0, 0, 1);
        hourly.timeframe = Timeframe::H1;
        repo.create_zone(hourly).unwrap();
        repo.invalidate_zone(low, t(2), InvalidationReason::Breakout)
            .unwrap();

        let daily = repo.get_active_zones(Timeframe::D1, None).unwrap();
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].level, 300.0);

        let none = repo
            .get_active_zones(Timeframe::D1, Some(Qualifier::Time))
            .unwrap();
        assert!(none.is_empty());
        assert_eq!(repo.all_zones().unwrap().len(), 3);
    }

    #[test]
    fn find_near_orders_by_distance() {
        let repo = InMemoryZoneRepository::new();
        repo.create_zone(new_zone(100.0, 0, 1)).unwrap();
        repo.create_zone(new_zone(120.0, 0, 1)).unwrap();
        repo.create_zone(new_zone(160.0, 0, 1)).unwrap();

        let near = repo.find_zones_near(115.0, Timeframe::D1, 20.0, None).unwrap();
        let levels: Vec<f64> = near.iter().map(|z| z.level).collect();
        assert_eq!(levels, vec![120.0, 100.0]);
    }

    #[test]
    fn concurrent_creates_in_one_band_yield_one_zone() {
        let repo = InMemoryZoneRepository::new();
        let outcomes: Vec<Upsert> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let repo = &repo;
                    s.spawn(move || repo.create_zone(new_zone(100.0 + i as f64 * 0.1, 0, 5)))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap().unwrap())
                .collect()
        });

        let created: Vec<ZoneId> = outcomes
            .iter()
            .filter(|u| u.created())
            .map(Upsert::zone_id)
            .collect();
        assert_eq!(created.len(), 1);
        assert!(outcomes.iter().all(|u| u.zone_id() == created[0]));
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn provenance_is_a_set() {
        let repo = InMemoryZoneRepository::new();
        let id = repo.create_zone(new_zone(100.0, 0, 5)).unwrap().zone_id();
        repo.record_pivot(id, &pivot(1, 5)).unwrap();
        repo.record_pivot(id, &pivot(1, 5)).unwrap();
        repo.record_pivot(id, &pivot(1, 10)).unwrap();
        assert_eq!(repo.get_pivots(id).unwrap().len(), 2);

        assert_eq!(
            repo.record_pivot(ZoneId(99), &pivot(1, 5)),
            Err(RepositoryError::ZoneNotFound(ZoneId(99)))
        );
    }

    #[test]
    fn interactions_append() {
        let repo = InMemoryZoneRepository::new();
        let id = repo.create_zone(new_zone(100.0, 0, 5)).unwrap().zone_id();
        let interaction = Interaction {
            zone_id: id,
            timestamp: t(6),
            level: 100.0,
            price: 101.0,
            kind: InteractionKind::Touch,
            strength_delta: 2.0,
            resulting_strength: 12.0,
        };
        repo.record_interaction(id, &interaction).unwrap();
        repo.record_interaction(id, &interaction).unwrap();
        assert_eq!(repo.get_interactions(id).unwrap().len(), 2);
    }
}
