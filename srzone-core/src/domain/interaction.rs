//! Interaction — how one bar's price action related to a zone.

use crate::domain::ZoneId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Touch,
    CrossoverUp,
    CrossoverDown,
    BounceUp,
    BounceDown,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Touch => "touch",
            InteractionKind::CrossoverUp => "crossover_up",
            InteractionKind::CrossoverDown => "crossover_down",
            InteractionKind::BounceUp => "bounce_up",
            InteractionKind::BounceDown => "bounce_down",
        }
    }

    pub fn is_crossover(&self) -> bool {
        matches!(self, InteractionKind::CrossoverUp | InteractionKind::CrossoverDown)
    }

    pub fn is_bounce(&self) -> bool {
        matches!(self, InteractionKind::BounceUp | InteractionKind::BounceDown)
    }

    /// Touches and bounces reinforce a zone; crossovers weaken it.
    pub fn is_reinforcing(&self) -> bool {
        !self.is_crossover()
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only interaction record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub zone_id: ZoneId,
    pub timestamp: DateTime<Utc>,
    /// Zone level at the time of the interaction.
    pub level: f64,
    /// Close of the interacting bar.
    pub price: f64,
    pub kind: InteractionKind,
    pub strength_delta: f64,
    /// Zone strength after the delta was applied.
    pub resulting_strength: f64,
}
