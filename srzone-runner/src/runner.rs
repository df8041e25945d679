//! Detection runner — wires bars, detectors, lifecycle and the repository.
//!
//! Entry points:
//! - `detect()`: one detection pass per qualifier over the whole series.
//! - `replay()`: a warm-up pass, then bar-by-bar interaction tracking with a
//!   fresh detection pass every `detection_interval_bars`.
//! - `run()`: replay plus a post-run audit, summarized for reporting.
//! - `run_from_files()`: loads config and CSV bars, then runs. Used by tooling.
//!
//! Qualifiers are independent: each works on its own zones, so they run in
//! parallel against one shared repository.

use std::path::Path;

use anyhow::Context;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use srzone_core::audit::{audit_timestamps, find_duplicates, TimestampViolation};
use srzone_core::domain::{
    Bar, DatasetHash, Interaction, InvalidationReason, ParamsHash, Qualifier, Timeframe, Zone,
    ZoneId,
};
use srzone_core::engine::{
    LifecycleEvent, PassReport, ZoneDetector, ZoneLifecycleManager, ZoneTracker,
};
use srzone_core::error::DetectionError;
use srzone_core::repository::{InMemoryZoneRepository, RepositoryError, ZoneRepository};

use crate::config::{ConfigError, RunId, RunnerConfig};
use crate::data_loader::{load_csv, LoadError, LoadedBars};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("{qualifier} detection failed: {source}")]
    Detection {
        qualifier: Qualifier,
        #[source]
        source: DetectionError,
    },
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Everything one qualifier did during a run.
#[derive(Debug, Clone)]
pub struct QualifierRun {
    pub qualifier: Qualifier,
    pub params_hash: ParamsHash,
    pub passes: Vec<PassReport>,
    pub interactions: Vec<Interaction>,
    pub invalidated: Vec<(ZoneId, InvalidationReason)>,
    pub audit_trail: Vec<LifecycleEvent>,
}

impl QualifierRun {
    fn new(qualifier: Qualifier, params_hash: ParamsHash) -> Self {
        Self {
            qualifier,
            params_hash,
            passes: Vec::new(),
            interactions: Vec::new(),
            invalidated: Vec::new(),
            audit_trail: Vec::new(),
        }
    }
}

/// Per-qualifier counts for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualifierSummary {
    pub qualifier: Qualifier,
    pub params_hash: ParamsHash,
    pub passes: usize,
    pub skipped_passes: usize,
    pub created: usize,
    pub confirmed: usize,
    pub superseded: usize,
    pub dropped: usize,
    pub interactions: usize,
    pub invalidated: usize,
}

impl From<&QualifierRun> for QualifierSummary {
    fn from(run: &QualifierRun) -> Self {
        let sum = |f: fn(&PassReport) -> usize| -> usize { run.passes.iter().map(f).sum() };
        Self {
            qualifier: run.qualifier,
            params_hash: run.params_hash.clone(),
            passes: run.passes.len(),
            skipped_passes: run.passes.iter().filter(|p| p.is_skipped()).count(),
            created: sum(|p| p.created.len()),
            confirmed: sum(|p| p.confirmed.len()),
            superseded: sum(|p| p.superseded.len()),
            dropped: sum(|p| p.dropped),
            interactions: run.interactions.len(),
            invalidated: run.invalidated.len(),
        }
    }
}

/// Complete result of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: RunId,
    /// Detector parameters shared by every qualifier of the run.
    pub params_family: ParamsHash,
    pub dataset_hash: DatasetHash,
    pub synthetic: bool,
    pub timeframe: Timeframe,
    pub bar_count: usize,
    pub qualifiers: Vec<QualifierSummary>,
    /// Active zones at the end of the run, ordered by level.
    pub active_zones: Vec<Zone>,
    pub violations: Vec<TimestampViolation>,
    pub duplicates: Vec<(ZoneId, ZoneId)>,
}

impl RunSummary {
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).expect("RunSummary serialization failed")
    }
}

/// One detection pass per enabled qualifier over the trailing batch of
/// `bars`.
pub fn detect<R: ZoneRepository + ?Sized>(
    bars: &[Bar],
    timeframe: Timeframe,
    config: &RunnerConfig,
    repo: &R,
) -> Result<Vec<QualifierRun>, RunError> {
    across_qualifiers(config, |qualifier| {
        let detector = detector_for(config, qualifier)?;
        let mut manager = ZoneLifecycleManager::new(repo, config.lifecycle.clone());
        let mut run = QualifierRun::new(qualifier, detector.params_hash().clone());
        let report = detector
            .run_pass(bars, timeframe, &mut manager)
            .map_err(|source| RunError::Detection { qualifier, source })?;
        run.passes.push(report);
        run.audit_trail = manager.take_audit_trail();
        Ok(run)
    })
}

/// Replay `bars` in timestamp order.
///
/// The first `warmup_bars` feed one detection pass. Every later bar is
/// classified against the active zones first, then every
/// `detection_interval_bars` a new pass runs over the history so far.
pub fn replay<R: ZoneRepository + ?Sized>(
    bars: &[Bar],
    timeframe: Timeframe,
    config: &RunnerConfig,
    repo: &R,
) -> Result<Vec<QualifierRun>, RunError> {
    if bars.is_empty() {
        return Err(LoadError::Empty.into());
    }
    across_qualifiers(config, |qualifier| {
        replay_qualifier(bars, timeframe, config, qualifier, repo)
    })
}

fn replay_qualifier<R: ZoneRepository + ?Sized>(
    bars: &[Bar],
    timeframe: Timeframe,
    config: &RunnerConfig,
    qualifier: Qualifier,
    repo: &R,
) -> Result<QualifierRun, RunError> {
    let detector = detector_for(config, qualifier)?;
    let mut manager = ZoneLifecycleManager::new(repo, config.lifecycle.clone());
    let mut tracker =
        ZoneTracker::new(timeframe, config.lifecycle.clone()).with_qualifier(qualifier);
    let fail = |source| RunError::Detection { qualifier, source };

    let warmup = config.warmup_bars.clamp(1, bars.len());
    let mut run = QualifierRun::new(qualifier, detector.params_hash().clone());
    run.passes.push(
        detector
            .run_pass(&bars[..warmup], timeframe, &mut manager)
            .map_err(fail)?,
    );

    for (i, bar) in bars.iter().enumerate().skip(warmup) {
        let outcome = tracker.process_bar(bar, &mut manager).map_err(fail)?;
        run.interactions.extend(outcome.interactions);
        run.invalidated.extend(outcome.invalidated);

        if (i + 1 - warmup) % config.detection_interval_bars == 0 {
            run.passes.push(
                detector
                    .run_pass(&bars[..=i], timeframe, &mut manager)
                    .map_err(fail)?,
            );
        }
    }

    run.audit_trail = manager.take_audit_trail();
    info!(
        %qualifier,
        %timeframe,
        passes = run.passes.len(),
        interactions = run.interactions.len(),
        invalidated = run.invalidated.len(),
        "replay complete"
    );
    Ok(run)
}

/// Replay loaded bars and audit the repository afterwards.
pub fn run<R: ZoneRepository + ?Sized>(
    loaded: &LoadedBars,
    config: &RunnerConfig,
    repo: &R,
) -> Result<RunSummary, RunError> {
    config.validate()?;
    let timeframe = config.timeframe.unwrap_or(loaded.timeframe);
    let runs = replay(&loaded.bars, timeframe, config, repo)?;

    let all = repo.all_zones()?;
    let summary = RunSummary {
        run_id: config.run_id(),
        params_family: config.detector.family_hash(),
        dataset_hash: loaded.dataset_hash.clone(),
        synthetic: loaded.synthetic,
        timeframe,
        bar_count: loaded.bars.len(),
        qualifiers: runs.iter().map(QualifierSummary::from).collect(),
        active_zones: repo.get_active_zones(timeframe, None)?,
        violations: audit_timestamps(&all),
        duplicates: find_duplicates(&all),
    };
    info!(
        run_id = %summary.run_id,
        dataset = %summary.dataset_hash,
        active = summary.active_zones.len(),
        violations = summary.violations.len(),
        "run complete"
    );
    Ok(summary)
}

/// Load a TOML run config and a CSV bar file, then run against a fresh
/// in-memory repository.
pub fn run_from_files(config_path: &Path, bars_path: &Path) -> anyhow::Result<RunSummary> {
    let config = RunnerConfig::from_file(config_path)
        .with_context(|| format!("loading run config {}", config_path.display()))?;
    let loaded = load_csv(bars_path)
        .with_context(|| format!("loading bars {}", bars_path.display()))?
        .with_timeframe(config.timeframe);
    let repo = InMemoryZoneRepository::new();
    let summary = run(&loaded, &config, &repo)?;
    Ok(summary)
}

fn detector_for(config: &RunnerConfig, qualifier: Qualifier) -> Result<ZoneDetector, RunError> {
    ZoneDetector::new(config.detector_for(qualifier))
        .map_err(|e| RunError::Config(ConfigError::from(e)))
}

fn across_qualifiers<T, F>(config: &RunnerConfig, f: F) -> Result<Vec<T>, RunError>
where
    T: Send,
    F: Fn(Qualifier) -> Result<T, RunError> + Send + Sync,
{
    let qualifiers = config.enabled_qualifiers();
    if config.parallel {
        qualifiers.par_iter().map(|q| f(*q)).collect()
    } else {
        qualifiers.iter().map(|q| f(*q)).collect()
    }
}
