#![cfg_attr(docsrs, feature(doc_cfg))]
//! # stds-catalog
//!
//! stds-catalog is the catalog and temporal topology layer for collections of
//! time-stamped geospatial layers ("maps") grouped into space time datasets.
//! It tracks which map belongs to which time extent and dataset, and keeps
//! the invariants that make sampling, aggregation and gap detection
//! well-defined. It never reads map content.
//!
//! ## Features
//! - [`TimeExtent`](time::TimeExtent) with Allen's 13 interval relations,
//!   evaluated in a fixed precedence order
//! - Granularity inference over absolute (calendar) and relative series
//! - A sorted-sweep [`TopologyBuilder`](topology::TopologyBuilder) computing
//!   the pairwise relation graph of one or two series
//! - A [`Catalog`](catalog::Catalog) over any
//!   [`RelationalStore`](catalog::RelationalStore): register, unregister,
//!   reconcile, shift, snap, rename, delete and batch registration
//! - Dataset sampling and granularity-based resampling with gap placeholders
//!
//! ## Batch, then reconcile
//!
//! Membership changes leave the derived dataset fields stale until
//! [`Catalog::update_from_registered_maps`](catalog::Catalog::update_from_registered_maps)
//! runs once for the batch. Bulk operations (shift, snap, batch
//! registration) do this themselves.
//!
//! ## Logging
//!
//! The crate emits records through the `log` facade and installs no logger.
//! Benign conditions (registering a member twice, unregistering a
//! non-member) are `log::warn!` records plus a `false` return value.
//!
//! ## Usage
//!
//! ```
//! use stds_catalog::prelude::*;
//!
//! # fn main() -> Result<(), CatalogError> {
//! let mut cat = Catalog::new(InMemoryStore::new(), CatalogConfig::default())?;
//! let ds = DatasetId::parse("precip@PERMANENT")?;
//! cat.create_dataset(ds.clone(), DatasetKind::Strds, TemporalType::Relative, "mean", "", "")?;
//! for (i, name) in ["a", "b"].into_iter().enumerate() {
//!     let id = MapId::parse(&format!("{name}@PERMANENT"))?;
//!     let start = 2 * i as i64;
//!     let ext = TimeExtent::relative(start, Some(start + 1), RelativeUnit::Days)?;
//!     cat.insert_map(MapRecord::new(id.clone(), MapKind::Raster, ext))?;
//!     cat.register(DatasetKind::Strds, &ds, &id)?;
//! }
//! let ds = cat.update_from_registered_maps(DatasetKind::Strds, &ds)?;
//! assert_eq!(ds.granularity, Some(Granularity::relative(1)));
//! # Ok(())
//! # }
//! ```

pub mod algs;
pub mod catalog;
pub mod catalog_error;
pub mod debug_invariants;
pub mod granularity;
pub mod time;
pub mod topology;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::sampling::{Sample, SampleMethod, SampleOptions};
    pub use crate::catalog::{
        Batch, Catalog, CatalogConfig, DatasetId, DatasetKind, InMemoryStore, MapId, MapKind,
        MapRecord, MapSlot, MapTimeKind, RegisterRequest, RelationalStore, SharedStore,
        SpaceTimeDataset, Statement, TemporalFilter,
    };
    pub use crate::catalog_error::{CatalogError, StoreError};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::granularity::{Granularity, GranularityUnit, compute_granularity};
    pub use crate::time::{RelationKind, RelativeUnit, TemporalType, TimeExtent, TimePoint};
    pub use crate::topology::{
        RelationGraph, SpatialExtent, SpatialMode, Temporal, TopologyBuilder, TopologyOptions,
    };
}
