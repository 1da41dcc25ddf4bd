//! Time points, time extents and calendar arithmetic.

pub mod datetime_math;
pub mod extent;
pub mod point;

pub use extent::{RelationKind, TimeExtent};
pub use point::{RelativeUnit, TemporalType, TimePoint};
