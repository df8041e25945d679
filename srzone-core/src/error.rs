//! Error taxonomy of a detection pass.
//!
//! `InsufficientData` is recoverable: the pass is skipped and reported as
//! such. Ordering violations are fatal for the affected batch or event.
//! Configuration errors surface at load time through `ConfigError`.

use crate::config::ConfigError;
use crate::repository::RepositoryError;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Why a batch could not produce candidate levels.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InsufficientData {
    #[error("{have} bars, need at least {need}")]
    Bars { have: usize, need: usize },

    #[error("{0} pivots, need at least 2")]
    Pivots(usize),

    #[error("all pivots at {0}, price range has zero width")]
    FlatRange(f64),
}

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("insufficient data: {0}")]
    InsufficientData(#[from] InsufficientData),

    #[error("timestamp {current} does not follow {previous}")]
    InvalidTimestampOrdering {
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl DetectionError {
    /// True for errors scoped to the current batch that the caller may skip.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DetectionError::InsufficientData(_))
    }
}
