//! Pivot extraction and qualifier weighting.

pub mod extractor;
pub mod weighter;

pub use extractor::{is_pivot, keep_most_recent, PivotExtractor, PivotIter};
pub use weighter::Weighting;
