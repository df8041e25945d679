//! Peak resolution on the smoothed curve.
//!
//! A peak is a run of equal bins (a plateau, possibly one bin wide) strictly
//! above both neighbors, with a positive score above
//! `threshold_ratio * max(curve)`. Bins outside the curve count as -∞, so
//! edge bins can be peaks. Single-bin interior peaks are refined with a
//! three-point quadratic fit; plateaus and edge bins use their centroid.

use crate::config::DetectorConfig;
use crate::domain::WeightedPivot;
use crate::signal::Histogram;

/// Relative tolerance under which neighboring bins count as one plateau.
const PLATEAU_EPSILON: f64 = 1e-12;

/// Vertex offset of the parabola through `(-1, left)`, `(0, center)`,
/// `(1, right)`, clamped to half a bin.
pub fn quadratic_offset(left: f64, center: f64, right: f64) -> f64 {
    let denom = left - 2.0 * center + right;
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }
    (0.5 * (left - right) / denom).clamp(-0.5, 0.5)
}

/// A resolved peak. Ephemeral: consumed by zone synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct Peak {
    /// Fractional bin index.
    pub index: f64,
    pub score: f64,
    pub level: f64,
    /// 0 for the strongest peak.
    pub rank: usize,
    /// First and last bin of the plateau.
    pub bins: (usize, usize),
    /// Latest bar index among pivots binned into the plateau.
    pub recency: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakResolver {
    pub threshold_ratio: f64,
    pub max_peaks: usize,
}

impl PeakResolver {
    pub fn from_config(config: &DetectorConfig) -> Self {
        Self {
            threshold_ratio: config.threshold_ratio,
            max_peaks: config.max_zones_per_pass,
        }
    }

    /// Local maxima of `curve` above the threshold as
    /// `(fractional index, score, first bin, last bin)`, in curve order.
    pub fn local_maxima(&self, curve: &[f64]) -> Vec<(f64, f64, usize, usize)> {
        let n = curve.len();
        let max = curve.iter().copied().fold(0.0_f64, f64::max);
        if n == 0 || max <= 0.0 {
            return Vec::new();
        }
        let threshold = self.threshold_ratio * max;
        let eps = PLATEAU_EPSILON * max;

        let mut found = Vec::new();
        let mut i = 0;
        while i < n {
            let mut j = i;
            while j + 1 < n && (curve[j + 1] - curve[i]).abs() <= eps {
                j += 1;
            }
            let score = curve[i];
            let left = if i > 0 { curve[i - 1] } else { f64::NEG_INFINITY };
            let right = if j + 1 < n { curve[j + 1] } else { f64::NEG_INFINITY };

            if score > left && score > right && score > threshold {
                let index = if i == j && i > 0 && j + 1 < n {
                    i as f64 + quadratic_offset(left, score, right)
                } else {
                    (i + j) as f64 / 2.0
                };
                found.push((index, score, i, j));
            }
            i = j + 1;
        }
        found
    }

    /// Resolve, rank and truncate the peaks of `curve`.
    ///
    /// Ranking is by score, ties broken by the most recent pivot binned into
    /// the plateau.
    pub fn resolve(
        &self,
        curve: &[f64],
        histogram: &Histogram,
        pivots: &[WeightedPivot],
    ) -> Vec<Peak> {
        let mut peaks: Vec<Peak> = self
            .local_maxima(curve)
            .into_iter()
            .map(|(index, score, first, last)| {
                let recency = (first..=last)
                    .flat_map(|b| histogram.members(b))
                    .filter_map(|&idx| pivots.get(idx))
                    .map(|p| p.pivot.bar_index)
                    .max();
                Peak {
                    index,
                    score,
                    level: histogram.level_at(index),
                    rank: 0,
                    bins: (first, last),
                    recency,
                }
            })
            .collect();

        peaks.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.recency.cmp(&a.recency))
        });
        peaks.truncate(self.max_peaks);
        for (rank, peak) in peaks.iter_mut().enumerate() {
            peak.rank = rank;
        }
        peaks
    }
}
