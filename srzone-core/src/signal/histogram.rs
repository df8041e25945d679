//! Weighted pivot histogram over the batch's pivot price range.
//!
//! Bins are half-open `[lo, hi)` except the last, which also holds the
//! maximum pivot price. Each bin remembers which pivots landed in it so peak
//! ranking and zone provenance can look them up.

use crate::config::DetectorConfig;
use crate::domain::{Bar, WeightedPivot};
use crate::error::InsufficientData;

pub const AUTO_PRECISION_MIN: usize = 10;
pub const AUTO_PRECISION_MAX: usize = 100;

/// Bin count derived from volatility: the pivot range measured in mean bar
/// ranges, clamped to `[10, 100]`.
pub fn auto_precision(bars: &[Bar], price_range: f64) -> usize {
    let ranges: Vec<f64> = bars
        .iter()
        .map(Bar::range)
        .filter(|r| r.is_finite())
        .collect();
    if ranges.is_empty() {
        return AUTO_PRECISION_MAX;
    }
    let mean = ranges.iter().sum::<f64>() / ranges.len() as f64;
    if mean <= 0.0 {
        return AUTO_PRECISION_MAX;
    }
    let bins = (price_range / mean).floor();
    (bins.max(0.0) as usize).clamp(AUTO_PRECISION_MIN, AUTO_PRECISION_MAX)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    lo: f64,
    hi: f64,
    bin_width: f64,
    weights: Vec<f64>,
    members: Vec<Vec<usize>>,
}

impl Histogram {
    /// Bin `pivots` into `bins` equal-width bins spanning their price range.
    pub fn build(pivots: &[WeightedPivot], bins: usize) -> Result<Self, InsufficientData> {
        if pivots.len() < 2 {
            return Err(InsufficientData::Pivots(pivots.len()));
        }
        let bins = bins.max(1);
        let (lo, hi) = pivots.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.price()), hi.max(p.price()))
        });
        if hi <= lo {
            return Err(InsufficientData::FlatRange(lo));
        }

        let bin_width = (hi - lo) / bins as f64;
        let mut histogram = Self {
            lo,
            hi,
            bin_width,
            weights: vec![0.0; bins],
            members: vec![Vec::new(); bins],
        };
        for (idx, pivot) in pivots.iter().enumerate() {
            let bin = histogram.bin_of(pivot.price());
            histogram.weights[bin] += pivot.weight;
            histogram.members[bin].push(idx);
        }
        Ok(histogram)
    }

    /// Bin index of `price`, clamped into the axis.
    pub fn bin_of(&self, price: f64) -> usize {
        let raw = ((price - self.lo) / self.bin_width).floor();
        if raw <= 0.0 {
            0
        } else {
            (raw as usize).min(self.weights.len() - 1)
        }
    }

    /// Price at a fractional bin index, measured from bin centers.
    pub fn level_at(&self, index: f64) -> f64 {
        self.lo + (index + 0.5) * self.bin_width
    }

    /// `[lo, hi)` bounds of bin `i`.
    pub fn bin_bounds(&self, i: usize) -> (f64, f64) {
        let lo = self.lo + i as f64 * self.bin_width;
        (lo, lo + self.bin_width)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Indices (into the pivot slice given to `build`) of pivots in bin `i`.
    pub fn members(&self, i: usize) -> &[usize] {
        self.members.get(i).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn lo(&self) -> f64 {
        self.lo
    }

    pub fn hi(&self) -> f64 {
        self.hi
    }

    pub fn range(&self) -> f64 {
        self.hi - self.lo
    }

    pub fn bin_width(&self) -> f64 {
        self.bin_width
    }
}

/// Resolves the bin count for a batch and builds its histogram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramBuilder {
    pub precision: usize,
    pub auto_precision: bool,
}

impl HistogramBuilder {
    pub fn from_config(config: &DetectorConfig) -> Self {
        Self {
            precision: config.precision,
            auto_precision: config.auto_precision,
        }
    }

    pub fn bin_count(&self, bars: &[Bar], price_range: f64) -> usize {
        if self.auto_precision {
            auto_precision(bars, price_range)
        } else {
            self.precision
        }
    }

    pub fn build(&self, pivots: &[WeightedPivot], bars: &[Bar]) -> Result<Histogram, InsufficientData> {
        let (lo, hi) = pivots.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.price()), hi.max(p.price()))
        });
        let bins = if pivots.len() >= 2 && hi > lo {
            self.bin_count(bars, hi - lo)
        } else {
            self.precision
        };
        Histogram::build(pivots, bins)
    }
}
