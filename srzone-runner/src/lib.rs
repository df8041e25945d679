//! SR-Zone Runner — detection orchestration over bar files.
//!
//! This crate builds on `srzone-core` to provide:
//! - TOML run configuration with per-qualifier detector settings
//! - CSV bar loading with ordering checks, timeframe inference and dataset
//!   hashing, plus a seeded synthetic fallback for development
//! - Parallel per-qualifier detection passes over a shared repository
//! - Replay: per-bar interaction tracking with periodic re-detection
//! - Run summaries with a post-run timestamp and duplicate audit

pub mod config;
pub mod data_loader;
pub mod runner;

pub use config::{ConfigError, RunId, RunnerConfig};
pub use data_loader::{
    compute_dataset_hash, generate_synthetic_bars, load_csv, read_csv, LoadError, LoadedBars,
};
pub use runner::{
    detect, replay, run, run_from_files, QualifierRun, QualifierSummary, RunError, RunSummary,
};
