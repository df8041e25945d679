//! Pivot extraction over several symmetric windows.
//!
//! Bar `i` is a pivot high for window `L` when its high is strictly greater
//! than the high of every bar in `i-L..i` and in `i+1..=i+L`. Pivot lows are
//! symmetric on lows. Bars without `L` neighbors on both sides are never
//! flagged, and NaN prices never qualify.

use crate::config::DetectorConfig;
use crate::domain::{Bar, Pivot, PivotKind};

/// Strict local-extremum test for bar `i` over a window of `window` bars on
/// each side.
pub fn is_pivot(bars: &[Bar], i: usize, window: usize, kind: PivotKind) -> bool {
    if window == 0 || i < window || i + window >= bars.len() {
        return false;
    }
    let mut neighbors = bars[i - window..i].iter().chain(&bars[i + 1..=i + window]);
    match kind {
        PivotKind::High => {
            let v = bars[i].high;
            neighbors.all(|b| v > b.high)
        }
        PivotKind::Low => {
            let v = bars[i].low;
            neighbors.all(|b| v < b.low)
        }
    }
}

/// Configured pivot search over one bar batch.
#[derive(Debug, Clone)]
pub struct PivotExtractor {
    windows: Vec<usize>,
    kinds: Vec<PivotKind>,
}

impl PivotExtractor {
    pub fn new(windows: Vec<usize>, kinds: Vec<PivotKind>) -> Self {
        Self { windows, kinds }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        let mut kinds = Vec::with_capacity(2);
        if config.include_pivot_high {
            kinds.push(PivotKind::High);
        }
        if config.include_pivot_low {
            kinds.push(PivotKind::Low);
        }
        Self::new(config.window_lengths.clone(), kinds)
    }

    /// Shortest configured window; a batch needs `2 * w + 1` bars to yield
    /// anything.
    pub fn min_window(&self) -> Option<usize> {
        self.windows.iter().copied().min()
    }

    /// Lazily walk the batch, window by window and kind by kind.
    pub fn extract<'a>(&'a self, bars: &'a [Bar]) -> PivotIter<'a> {
        PivotIter {
            bars,
            windows: &self.windows,
            kinds: &self.kinds,
            w: 0,
            k: 0,
            i: 0,
        }
    }
}

/// Iterator over pivots of a batch, ordered by window, then kind, then bar.
///
/// The same bar flagged under several windows yields one pivot per window.
pub struct PivotIter<'a> {
    bars: &'a [Bar],
    windows: &'a [usize],
    kinds: &'a [PivotKind],
    w: usize,
    k: usize,
    i: usize,
}

impl PivotIter<'_> {
    fn advance_scan(&mut self) {
        self.i = 0;
        self.k += 1;
        if self.k >= self.kinds.len() {
            self.k = 0;
            self.w += 1;
        }
    }
}

impl Iterator for PivotIter<'_> {
    type Item = Pivot;

    fn next(&mut self) -> Option<Pivot> {
        if self.kinds.is_empty() {
            return None;
        }
        while self.w < self.windows.len() {
            let window = self.windows[self.w];
            let kind = self.kinds[self.k];
            if self.i < window {
                self.i = window;
            }
            while self.i + window < self.bars.len() {
                let i = self.i;
                self.i += 1;
                if is_pivot(self.bars, i, window, kind) {
                    let bar = &self.bars[i];
                    return Some(Pivot {
                        timestamp: bar.timestamp,
                        bar_index: i,
                        price: match kind {
                            PivotKind::High => bar.high,
                            PivotKind::Low => bar.low,
                        },
                        kind,
                        window,
                        raw_weight: 1.0,
                    });
                }
            }
            self.advance_scan();
        }
        None
    }
}

/// Keep only the `limit` most recent pivots (by bar position), preserving
/// extraction order among the survivors.
pub fn keep_most_recent(mut pivots: Vec<Pivot>, limit: usize) -> Vec<Pivot> {
    if pivots.len() <= limit {
        return pivots;
    }
    let mut order: Vec<usize> = (0..pivots.len()).collect();
    order.sort_by(|&a, &b| pivots[b].bar_index.cmp(&pivots[a].bar_index));
    let mut keep = vec![false; pivots.len()];
    for &idx in order.iter().take(limit) {
        keep[idx] = true;
    }
    let mut flags = keep.into_iter();
    pivots.retain(|_| flags.next().unwrap_or(false));
    pivots
}
