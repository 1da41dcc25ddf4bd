//! Algorithms over registered map series.

pub mod resample;
pub mod sampling;

pub use resample::{RESAMPLE_ORDER, granules, resample_by_granularity};
pub use sampling::{Sample, SampleMethod, SampleOptions, sample_by_predicates, sample_by_topology};
