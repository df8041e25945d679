//! Bar loading for the runner.
//!
//! Bars come from a CSV file (`timestamp,open,high,low,close[,volume]`) or,
//! for development, from a seeded random walk. Either way the loader
//! validates ordering, infers the timeframe from bar spacing and hashes the
//! series for run fingerprints.
//!
//! Synthetic data is a developer-only debug mode and is tagged as such.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use srzone_core::domain::{first_unordered, Bar, DatasetHash, Timeframe};
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("open bar file '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: unrecognized timestamp '{value}'")]
    Timestamp { row: usize, value: String },

    #[error("row {row}: OHLC values are inconsistent")]
    InvalidBar { row: usize },

    #[error("row {row}: timestamp {current} does not follow {previous}")]
    Unordered {
        row: usize,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },

    #[error("no bars loaded")]
    Empty,
}

/// Loaded bars with provenance.
#[derive(Debug, Clone)]
pub struct LoadedBars {
    pub bars: Vec<Bar>,
    /// Inferred from the first two bars unless overridden.
    pub timeframe: Timeframe,
    /// BLAKE3 over every bar, for fingerprinting.
    pub dataset_hash: DatasetHash,
    pub synthetic: bool,
}

impl LoadedBars {
    fn new(bars: Vec<Bar>, synthetic: bool) -> Result<Self, LoadError> {
        if bars.is_empty() {
            return Err(LoadError::Empty);
        }
        if let Some(i) = first_unordered(&bars) {
            return Err(LoadError::Unordered {
                row: i + 1,
                previous: bars[i - 1].timestamp,
                current: bars[i].timestamp,
            });
        }
        Ok(Self {
            timeframe: Timeframe::infer(&bars),
            dataset_hash: compute_dataset_hash(&bars),
            bars,
            synthetic,
        })
    }

    /// Replace the inferred timeframe.
    pub fn with_timeframe(mut self, timeframe: Option<Timeframe>) -> Self {
        if let Some(tf) = timeframe {
            self.timeframe = tf;
        }
        self
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "date", alias = "time")]
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<f64>,
}

/// Load bars from a CSV file with a header row.
pub fn load_csv(path: &Path) -> Result<LoadedBars, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let loaded = read_csv(file)?;
    info!(
        path = %path.display(),
        bars = loaded.bars.len(),
        timeframe = %loaded.timeframe,
        "loaded bars"
    );
    Ok(loaded)
}

/// Parse CSV bars from any reader.
///
/// Rows with a NaN price are skipped with a warning; any other inconsistent
/// row fails the load. Rows must already be in strictly increasing timestamp
/// order.
pub fn read_csv<R: Read>(reader: R) -> Result<LoadedBars, LoadError> {
    let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut bars = Vec::new();
    let mut skipped = 0usize;

    for (idx, record) in csv.deserialize::<CsvRow>().enumerate() {
        let row = idx + 1;
        let record = record?;
        let timestamp = parse_timestamp(&record.timestamp).ok_or_else(|| LoadError::Timestamp {
            row,
            value: record.timestamp.clone(),
        })?;
        let bar = Bar::new(
            timestamp,
            record.open,
            record.high,
            record.low,
            record.close,
            record.volume.unwrap_or(0.0),
        );
        if bar.is_void() {
            skipped += 1;
            continue;
        }
        if !bar.is_sane() {
            return Err(LoadError::InvalidBar { row });
        }
        bars.push(bar);
    }

    if skipped > 0 {
        warn!(skipped, "skipped void bars");
    }
    LoadedBars::new(bars, false)
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM[:SS]` (UTC) and `YYYY-MM-DD`.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Deterministic BLAKE3 hash over timestamps and OHLCV values.
pub fn compute_dataset_hash(bars: &[Bar]) -> DatasetHash {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(&bar.timestamp.timestamp().to_le_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
    }
    DatasetHash::from_hash(&hasher.finalize().to_hex())
}

/// Generate `count` synthetic bars for testing/development.
///
/// A random walk from 100.0 seeded from `seed`, spaced one `timeframe`
/// apart from `start`. Clearly fake and tagged as synthetic.
pub fn generate_synthetic_bars(
    seed: &str,
    start: DateTime<Utc>,
    count: usize,
    timeframe: Timeframe,
) -> Result<LoadedBars, LoadError> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let seed_bytes = blake3::hash(seed.as_bytes());
    let mut rng = StdRng::from_seed(*seed_bytes.as_bytes());
    let step = spacing(timeframe);

    let mut bars = Vec::with_capacity(count);
    let mut price = 100.0_f64;
    for i in 0..count {
        let ret: f64 = rng.gen_range(-0.02..0.02);
        let open = price;
        let close = price * (1.0 + ret);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.005));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.005));
        let volume = rng.gen_range(500_000.0..5_000_000.0);
        bars.push(Bar::new(start + step * i as i32, open, high, low, close, volume));
        price = close;
    }
    warn!(seed, count, "generated synthetic bars; results are tagged as synthetic");
    LoadedBars::new(bars, true)
}

fn spacing(timeframe: Timeframe) -> Duration {
    match timeframe {
        Timeframe::M1 => Duration::minutes(1),
        Timeframe::M3 => Duration::minutes(3),
        Timeframe::M15 => Duration::minutes(15),
        Timeframe::H1 => Duration::hours(1),
        Timeframe::D1 => Duration::days(1),
    }
}
