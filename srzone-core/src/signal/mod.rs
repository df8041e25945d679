//! Price-axis signal processing: histogram, sinc smoothing, peak resolution.

pub mod histogram;
pub mod peaks;
pub mod smoother;

pub use histogram::{auto_precision, Histogram, HistogramBuilder};
pub use peaks::{quadratic_offset, Peak, PeakResolver};
pub use smoother::{sinc, SignalSmoother};
