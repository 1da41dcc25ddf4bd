//! The space time dataset catalog and its storage boundary.
//!
//! - [`store`]: the [`RelationalStore`] trait and parameterized statements.
//! - [`memory_store`]: an in-memory store and a shareable handle.
//! - [`catalog`](self::catalog): dataset lifecycle and queries.
//! - [`maintenance`]: shift, snap, rename and delete.
//! - [`register`]: batch registration with valid-time assignment.

#[allow(clippy::module_inception)]
pub mod catalog;
pub mod config;
pub mod dataset;
pub mod filter;
pub mod ident;
pub mod maintenance;
pub mod map_record;
pub mod memory_store;
pub mod register;
pub mod store;

pub use catalog::{Catalog, TemporalTypeCounts, count_gaps, count_temporal_types, topology_is_valid, with_gaps};
pub use config::CatalogConfig;
pub use dataset::{DatasetKind, MapTimeKind, SpaceTimeDataset};
pub use filter::TemporalFilter;
pub use ident::{DatasetId, MapId};
pub use map_record::{MapKind, MapRecord, MapSlot};
pub use memory_store::{InMemoryStore, SharedStore};
pub use register::{RegisterEntry, RegisterReport, RegisterRequest, assign_valid_time};
pub use store::{Batch, ColumnDef, ColumnType, ParamStyle, RelationalStore, Row, RowReader, Statement, Value};
