//! Domain types for the SR-zone engine

pub mod bar;
pub mod ids;
pub mod interaction;
pub mod pivot;
pub mod timeframe;
pub mod zone;

pub use bar::{first_unordered, Bar};
pub use ids::{DatasetHash, ParamsHash, ZoneId};
pub use interaction::{Interaction, InteractionKind};
pub use pivot::{Pivot, PivotKind, WeightedPivot};
pub use timeframe::Timeframe;
pub use zone::{InvalidationReason, NewZone, Qualifier, Zone};
