//! SR-Zone Core — support/resistance zone detection and lifecycle.
//!
//! This crate contains the whole detection engine:
//! - Domain types (bars, pivots, zones, interactions, timeframes)
//! - Pivot extraction and qualifier weighting (time, linear, volume)
//! - Price histogram, sinc smoothing and peak resolution
//! - Zone synthesis against the repository's active zones
//! - Lifecycle state machine with audit trail
//! - Per-bar interaction detection (touch, bounce, crossover)
//! - Repository contract plus a thread-safe in-memory implementation

pub mod audit;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod pivots;
pub mod repository;
pub mod signal;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types shared across detection threads are
    /// Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::Zone>();
        require_sync::<domain::Zone>();
        require_send::<domain::WeightedPivot>();
        require_sync::<domain::WeightedPivot>();
        require_send::<domain::Interaction>();
        require_sync::<domain::Interaction>();

        // Config
        require_send::<config::DetectorConfig>();
        require_sync::<config::DetectorConfig>();
        require_send::<config::LifecycleConfig>();
        require_sync::<config::LifecycleConfig>();

        // Engine types
        require_send::<engine::ZoneDetector>();
        require_sync::<engine::ZoneDetector>();
        require_send::<engine::DetectedLevels>();
        require_sync::<engine::DetectedLevels>();
        require_send::<engine::ZoneTracker>();
        require_send::<engine::PassReport>();
        require_sync::<engine::PassReport>();

        // Repository
        require_send::<repository::InMemoryZoneRepository>();
        require_sync::<repository::InMemoryZoneRepository>();
        require_send::<error::DetectionError>();
        require_sync::<error::DetectionError>();
    }

    /// Architecture contract: the repository trait is object safe, so
    /// detection can run against any backend behind `&dyn ZoneRepository`.
    #[test]
    fn repository_trait_is_object_safe() {
        let repo = repository::InMemoryZoneRepository::new();
        let dyn_repo: &dyn repository::ZoneRepository = &repo;
        let manager = engine::ZoneLifecycleManager::new(dyn_repo, config::LifecycleConfig::default());
        assert!(manager.audit_trail().is_empty());
        assert!(dyn_repo
            .get_active_zones(domain::Timeframe::D1, None)
            .unwrap()
            .is_empty());
    }
}
