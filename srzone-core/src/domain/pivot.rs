//! Pivot — a local price extremum over a symmetric bar window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PivotKind {
    High,
    Low,
}

impl PivotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PivotKind::High => "high",
            PivotKind::Low => "low",
        }
    }
}

/// A pivot as found by the extractor. Never mutated after extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pivot {
    pub timestamp: DateTime<Utc>,
    /// Position of the source bar inside the detection batch.
    pub bar_index: usize,
    pub price: f64,
    pub kind: PivotKind,
    /// Window length that flagged this pivot.
    pub window: usize,
    /// Weight before any qualifier is applied (always 1.0 from extraction).
    pub raw_weight: f64,
}

/// A pivot together with the weight assigned by the active qualifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedPivot {
    pub pivot: Pivot,
    pub weight: f64,
}

impl WeightedPivot {
    pub fn price(&self) -> f64 {
        self.pivot.price
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.pivot.timestamp
    }
}
