//! Qualifier weighting strategies.

use crate::config::DetectorConfig;
use crate::domain::{Bar, Pivot, Qualifier, WeightedPivot};

/// Pivot weighting strategy, one variant per qualifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Weighting {
    /// Every pivot weighs 1.
    Linear,
    /// `0.5^(age / half_life_bars)`, where age is measured in bars from the
    /// last bar of the batch.
    TimeDecay { half_life_bars: f64 },
    /// Pivot bar volume over the batch's maximum volume. Batches without
    /// volume fall back to uniform weights.
    Volume,
}

impl Weighting {
    pub fn for_qualifier(qualifier: Qualifier, config: &DetectorConfig) -> Self {
        match qualifier {
            Qualifier::Linear => Weighting::Linear,
            Qualifier::Time => Weighting::TimeDecay {
                half_life_bars: config.time_decay_half_life,
            },
            Qualifier::Volume => Weighting::Volume,
        }
    }

    pub fn qualifier(&self) -> Qualifier {
        match self {
            Weighting::Linear => Qualifier::Linear,
            Weighting::TimeDecay { .. } => Qualifier::Time,
            Weighting::Volume => Qualifier::Volume,
        }
    }

    /// Weigh pivots extracted from `bars`.
    pub fn apply<I>(&self, pivots: I, bars: &[Bar]) -> Vec<WeightedPivot>
    where
        I: IntoIterator<Item = Pivot>,
    {
        let last_index = bars.len().saturating_sub(1);
        let max_volume = bars
            .iter()
            .map(|b| b.volume)
            .filter(|v| v.is_finite())
            .fold(0.0_f64, f64::max);

        pivots
            .into_iter()
            .map(|pivot| {
                let factor = match *self {
                    Weighting::Linear => 1.0,
                    Weighting::TimeDecay { half_life_bars } => {
                        let age = last_index.saturating_sub(pivot.bar_index) as f64;
                        0.5_f64.powf(age / half_life_bars)
                    }
                    Weighting::Volume => {
                        if max_volume > 0.0 {
                            let v = bars.get(pivot.bar_index).map_or(0.0, |b| b.volume);
                            (v / max_volume).max(0.0)
                        } else {
                            1.0
                        }
                    }
                };
                WeightedPivot {
                    weight: pivot.raw_weight * factor,
                    pivot,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PivotKind;
    use chrono::{Duration, TimeZone, Utc};

    fn assert_approx(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-12, "{a} != {b}");
    }

    fn make_bars(volumes: &[f64]) -> Vec<Bar> {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        volumes
            .iter()
            .enumerate()
            .map(|(i, &v)| Bar::new(t0 + Duration::days(i as i64), 10.0, 11.0, 9.0, 10.0, v))
            .collect()
    }

    fn pivot_at(bars: &[Bar], i: usize) -> Pivot {
        Pivot {
            timestamp: bars[i].timestamp,
            bar_index: i,
            price: bars[i].high,
            kind: PivotKind::High,
            window: 5,
            raw_weight: 1.0,
        }
    }

    #[test]
    fn linear_is_uniform() {
        let bars = make_bars(&[1.0, 2.0, 3.0, 4.0]);
        let w = Weighting::Linear.apply(vec![pivot_at(&bars, 0), pivot_at(&bars, 3)], &bars);
        assert!(w.iter().all(|p| p.weight == 1.0));
    }

    #[test]
    fn time_decay_halves_every_half_life() {
        let bars = make_bars(&[1.0; 61]);
        let weighting = Weighting::TimeDecay {
            half_life_bars: 30.0,
        };
        let w = weighting.apply(
            vec![pivot_at(&bars, 60), pivot_at(&bars, 30), pivot_at(&bars, 0)],
            &bars,
        );
        assert_approx(w[0].weight, 1.0);
        assert_approx(w[1].weight, 0.5);
        assert_approx(w[2].weight, 0.25);
    }

    #[test]
    fn recent_pivots_weigh_more_under_time() {
        let bars = make_bars(&[1.0; 50]);
        let weighting = Weighting::for_qualifier(Qualifier::Time, &DetectorConfig::default());
        let w = weighting.apply(vec![pivot_at(&bars, 10), pivot_at(&bars, 40)], &bars);
        assert!(w[1].weight > w[0].weight);
    }

    #[test]
    fn volume_normalizes_by_batch_max() {
        let bars = make_bars(&[100.0, 400.0, 200.0]);
        let w = Weighting::Volume.apply(vec![pivot_at(&bars, 0), pivot_at(&bars, 1)], &bars);
        assert_approx(w[0].weight, 0.25);
        assert_approx(w[1].weight, 1.0);
    }

    #[test]
    fn volume_without_data_falls_back_to_uniform() {
        let bars = make_bars(&[0.0, 0.0, 0.0]);
        let w = Weighting::Volume.apply(vec![pivot_at(&bars, 1)], &bars);
        assert_eq!(w[0].weight, 1.0);
    }

    #[test]
    fn qualifier_roundtrip() {
        let config = DetectorConfig::default();
        for q in Qualifier::ALL {
            assert_eq!(Weighting::for_qualifier(q, &config).qualifier(), q);
        }
    }
}
