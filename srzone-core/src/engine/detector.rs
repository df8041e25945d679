//! Detection pass: bars → pivots → histogram → smoothed curve → peaks →
//! zone actions.
//!
//! `detect_levels` is pure and re-entrant. `run_pass` applies its result
//! through a lifecycle manager; running it twice over the same bars confirms
//! the zones of the first run instead of duplicating them.

use crate::config::{ConfigError, DetectorConfig};
use crate::domain::{first_unordered, Bar, ParamsHash, Qualifier, Timeframe, WeightedPivot, ZoneId};
use crate::engine::lifecycle::{CreateOutcome, ZoneLifecycleManager};
use crate::engine::synthesizer::{ZoneAction, ZoneSynthesizer};
use crate::error::{DetectionError, InsufficientData};
use crate::pivots::{keep_most_recent, PivotExtractor, Weighting};
use crate::repository::{RepositoryError, ZoneRepository};
use crate::signal::{Histogram, HistogramBuilder, Peak, PeakResolver, SignalSmoother};
use tracing::{info, warn};

/// Candidate levels of one batch under one qualifier.
#[derive(Debug, Clone)]
pub struct DetectedLevels {
    pub qualifier: Qualifier,
    pub pivots: Vec<WeightedPivot>,
    pub histogram: Histogram,
    pub curve: Vec<f64>,
    pub peaks: Vec<Peak>,
    pub max_score: f64,
    /// Band half-width for zones created from this batch.
    pub tolerance: f64,
}

impl DetectedLevels {
    /// Pivots within the band around `peak.level`; falls back to the pivots
    /// binned into the peak's plateau.
    pub fn contributors(&self, peak: &Peak) -> Vec<WeightedPivot> {
        let near: Vec<WeightedPivot> = self
            .pivots
            .iter()
            .filter(|p| (p.price() - peak.level).abs() <= self.tolerance)
            .cloned()
            .collect();
        if !near.is_empty() {
            return near;
        }
        let (first, last) = peak.bins;
        (first..=last)
            .flat_map(|b| self.histogram.members(b))
            .filter_map(|&idx| self.pivots.get(idx))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    Completed,
    Skipped(InsufficientData),
}

/// Summary of one `run_pass`.
#[derive(Debug, Clone, PartialEq)]
pub struct PassReport {
    pub qualifier: Qualifier,
    pub timeframe: Timeframe,
    pub outcome: PassOutcome,
    pub levels: Vec<f64>,
    pub created: Vec<ZoneId>,
    pub confirmed: Vec<ZoneId>,
    pub superseded: Vec<ZoneId>,
    pub dropped: usize,
}

impl PassReport {
    fn new(qualifier: Qualifier, timeframe: Timeframe, outcome: PassOutcome) -> Self {
        Self {
            qualifier,
            timeframe,
            outcome,
            levels: Vec::new(),
            created: Vec::new(),
            confirmed: Vec::new(),
            superseded: Vec::new(),
            dropped: 0,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, PassOutcome::Skipped(_))
    }
}

/// A validated detector for one qualifier.
#[derive(Debug, Clone)]
pub struct ZoneDetector {
    config: DetectorConfig,
    params_hash: ParamsHash,
    parameters_json: String,
}

impl ZoneDetector {
    pub fn new(config: DetectorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            params_hash: config.params_hash(),
            parameters_json: config.canonical_json(),
            config,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn qualifier(&self) -> Qualifier {
        self.config.qualifier
    }

    pub fn params_hash(&self) -> &ParamsHash {
        &self.params_hash
    }

    /// The trailing `lookback_bars` of `bars`.
    pub fn batch<'b>(&self, bars: &'b [Bar]) -> &'b [Bar] {
        &bars[bars.len().saturating_sub(self.config.lookback_bars)..]
    }

    /// Run pivots through peak resolution on the trailing batch of `bars`.
    pub fn detect_levels(&self, bars: &[Bar]) -> Result<DetectedLevels, DetectionError> {
        check_ordering(bars)?;
        let bars = self.batch(bars);

        let extractor = PivotExtractor::from_config(&self.config);
        let need = extractor.min_window().map_or(1, |w| 2 * w + 1);
        if bars.len() < need {
            return Err(InsufficientData::Bars {
                have: bars.len(),
                need,
            }
            .into());
        }

        let pivots = keep_most_recent(extractor.extract(bars).collect(), self.config.pivot_lookback);
        let weighting = Weighting::for_qualifier(self.config.qualifier, &self.config);
        let pivots = weighting.apply(pivots, bars);

        let histogram = HistogramBuilder::from_config(&self.config).build(&pivots, bars)?;
        let curve = SignalSmoother::new(self.config.filter_length).smooth(histogram.weights());
        let peaks = PeakResolver::from_config(&self.config).resolve(&curve, &histogram, &pivots);
        let max_score = curve.iter().copied().fold(0.0_f64, f64::max);
        let tolerance = self.config.tolerance_for_range(histogram.range());

        Ok(DetectedLevels {
            qualifier: self.config.qualifier,
            pivots,
            histogram,
            curve,
            peaks,
            max_score,
            tolerance,
        })
    }

    /// Detect levels on the trailing batch and apply them as zone
    /// creations and confirmations.
    ///
    /// A batch with too little data is skipped and reported, not an error.
    pub fn run_pass<R: ZoneRepository + ?Sized>(
        &self,
        bars: &[Bar],
        timeframe: Timeframe,
        manager: &mut ZoneLifecycleManager<'_, R>,
    ) -> Result<PassReport, DetectionError> {
        let qualifier = self.config.qualifier;
        let levels = match self.detect_levels(bars) {
            Ok(levels) => levels,
            Err(DetectionError::InsufficientData(reason)) => {
                warn!(%qualifier, %timeframe, %reason, "skipping detection pass");
                return Ok(PassReport::new(qualifier, timeframe, PassOutcome::Skipped(reason)));
            }
            Err(e) => return Err(e),
        };
        let batch = self.batch(bars);
        let at = match batch.last() {
            Some(bar) => bar.timestamp,
            None => {
                let reason = InsufficientData::Bars { have: 0, need: 1 };
                return Ok(PassReport::new(qualifier, timeframe, PassOutcome::Skipped(reason)));
            }
        };

        let active = manager.repository().get_active_zones(timeframe, Some(qualifier))?;
        let synthesizer = ZoneSynthesizer {
            qualifier,
            timeframe,
            params_hash: &self.params_hash,
            parameters_json: &self.parameters_json,
            detection_strength_scale: self.config.detection_strength_scale,
        };

        let mut report = PassReport::new(qualifier, timeframe, PassOutcome::Completed);
        report.levels = levels.peaks.iter().map(|p| p.level).collect();

        for action in synthesizer.synthesize(&levels, batch, &active) {
            match action {
                ZoneAction::Confirm {
                    zone_id,
                    strength_delta,
                    observed_at,
                    contributors,
                } => match manager.confirm(zone_id, strength_delta, observed_at, &contributors) {
                    Ok(_) => report.confirmed.push(zone_id),
                    // superseded earlier in this pass
                    Err(DetectionError::Repository(RepositoryError::ZoneNotActive(_))) => {
                        report.dropped += 1
                    }
                    Err(e) => return Err(e),
                },
                ZoneAction::Create { zone, contributors } => {
                    match manager.create(zone, &contributors, at)? {
                        CreateOutcome::Created {
                            zone_id,
                            superseded,
                        } => {
                            report.created.push(zone_id);
                            report.superseded.extend(superseded);
                        }
                        CreateOutcome::Merged(zone_id) => report.confirmed.push(zone_id),
                        CreateOutcome::Dropped { .. } => report.dropped += 1,
                    }
                }
            }
        }

        info!(
            %qualifier,
            %timeframe,
            params = self.params_hash.short(),
            levels = report.levels.len(),
            created = report.created.len(),
            confirmed = report.confirmed.len(),
            superseded = report.superseded.len(),
            dropped = report.dropped,
            "detection pass complete"
        );
        Ok(report)
    }
}

fn check_ordering(bars: &[Bar]) -> Result<(), DetectionError> {
    match first_unordered(bars) {
        Some(i) => Err(DetectionError::InvalidTimestampOrdering {
            previous: bars[i - 1].timestamp,
            current: bars[i].timestamp,
        }),
        None => Ok(()),
    }
}
