//! Parameter fingerprinting — deterministic identification of detector
//! configurations.
//!
//! Every zone carries the hash and the canonical JSON of the parameters that
//! produced it, so zones from differently configured passes can be told
//! apart after the fact.

use crate::config::DetectorConfig;
use crate::domain::{ParamsHash, Qualifier};

impl DetectorConfig {
    /// Canonical JSON of the parameters. Field order is the struct order, so
    /// the output is stable across runs.
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).expect("DetectorConfig must serialize")
    }

    /// BLAKE3 over the canonical JSON.
    pub fn params_hash(&self) -> ParamsHash {
        ParamsHash::from_bytes(self.canonical_json().as_bytes())
    }

    /// Structural hash ignoring the qualifier, shared by the passes of one
    /// multi-qualifier run.
    pub fn family_hash(&self) -> ParamsHash {
        self.with_qualifier(Qualifier::Linear).params_hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashing_is_deterministic() {
        let config = DetectorConfig::default();
        assert_eq!(config.params_hash(), config.params_hash());
        assert_eq!(config.params_hash(), DetectorConfig::default().params_hash());
    }

    #[test]
    fn hash_differs_for_different_params() {
        let a = DetectorConfig::default();
        let b = DetectorConfig {
            precision: 80,
            ..Default::default()
        };
        assert_ne!(a.params_hash(), b.params_hash());
    }

    #[test]
    fn family_hash_ignores_qualifier() {
        let linear = DetectorConfig::default();
        let volume = linear.with_qualifier(Qualifier::Volume);
        assert_ne!(linear.params_hash(), volume.params_hash());
        assert_eq!(linear.family_hash(), volume.family_hash());
    }

    #[test]
    fn canonical_json_roundtrips() {
        let config = DetectorConfig {
            zone_tolerance: Some(15.0),
            ..Default::default()
        };
        let back: DetectorConfig = serde_json::from_str(&config.canonical_json()).unwrap();
        assert_eq!(back, config);
        assert_eq!(back.params_hash(), config.params_hash());
    }
}
