//! Bar timeframe tags.

use crate::domain::Bar;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timeframe of a homogeneous bar series. Zones are scoped per timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "3m")]
    M3,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 5] = [
        Timeframe::M1,
        Timeframe::M3,
        Timeframe::M15,
        Timeframe::H1,
        Timeframe::D1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M3 => "3m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::D1 => "1d",
        }
    }

    /// Parse the short tag ("1m", "3m", "15m", "1h", "1d").
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tf| tf.as_str() == s)
    }

    /// Infer the timeframe from the spacing of the first two bars.
    ///
    /// Fewer than two bars default to daily.
    pub fn infer(bars: &[Bar]) -> Self {
        let (a, b) = match bars {
            [a, b, ..] => (a, b),
            _ => return Timeframe::D1,
        };
        let minutes = (b.timestamp - a.timestamp).num_seconds() as f64 / 60.0;
        if minutes < 2.0 {
            Timeframe::M1
        } else if minutes < 5.0 {
            Timeframe::M3
        } else if minutes < 30.0 {
            Timeframe::M15
        } else if minutes < 120.0 {
            Timeframe::H1
        } else {
            Timeframe::D1
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
