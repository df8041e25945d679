//! Zone engine — detection passes, lifecycle state machine, interaction
//! tracking.
//!
//! Detection runs once per batch: `ZoneDetector` resolves candidate levels
//! and `ZoneSynthesizer` turns them into create/confirm requests. Between
//! passes every new bar goes through `InteractionDetector`. Both paths
//! mutate zones only through `ZoneLifecycleManager`.

pub mod detector;
pub mod interaction;
pub mod lifecycle;
pub mod synthesizer;
pub mod tracker;

pub use detector::{DetectedLevels, PassOutcome, PassReport, ZoneDetector};
pub use interaction::{DetectedInteraction, InteractionDetector, ZoneSignal};
pub use lifecycle::{
    CreateOutcome, InteractionOutcome, LifecycleEvent, Transition, ZoneLifecycleManager,
};
pub use synthesizer::{ZoneAction, ZoneSynthesizer};
pub use tracker::{BarOutcome, ZoneTracker};
