//! Granularity: the finest common time step describing a series.
//!
//! - [`unit`]: the [`Granularity`] value type and its string form.
//! - [`compute`]: inference from a series of extents.
//! - [`common`]: common granularity of several series, unit conversion.

pub mod common;
pub mod compute;
pub mod unit;

pub use common::{
    compute_common_granularity, compute_common_granularity_aligned,
    compute_common_relative_granularity, convert_granularity,
};
pub use compute::{
    compute_absolute_granularity, compute_datetime_delta, compute_granularity,
    compute_relative_granularity,
};
pub use unit::{Granularity, GranularityUnit};
