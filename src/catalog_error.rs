//! CatalogError: Unified error type for stds-catalog public APIs
//!
//! Every condition in here is fatal for the enclosing operation. Benign
//! conditions (registering a map twice, unregistering a non-member) are
//! reported as `bool` results plus a `log::warn!` record instead.

use thiserror::Error;

use crate::time::point::{RelativeUnit, TemporalType};

/// Unified error type for catalog, granularity and sampling operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CatalogError {
    /// A map with a different temporal type was registered into a dataset.
    #[error(
        "Temporal type of map <{map}> ({found}) differs from space time dataset <{dataset}> ({expected})"
    )]
    TemporalTypeMismatch {
        dataset: String,
        map: String,
        expected: TemporalType,
        found: TemporalType,
    },
    /// A relative map's unit differs from the dataset's fixed unit.
    #[error(
        "Relative time unit of map <{map}> ({found}) differs from space time dataset <{dataset}> ({expected})"
    )]
    RelativeUnitMismatch {
        dataset: String,
        map: String,
        expected: RelativeUnit,
        found: RelativeUnit,
    },
    /// Absolute and relative time points were combined in one operation.
    #[error("Absolute and relative time points cannot be combined: {0}")]
    MixedTemporalTypes(String),
    /// A granularity string could not be parsed for the given temporal type.
    #[error("Invalid granularity \"{0}\"")]
    InvalidGranularity(String),
    /// A mutating operation targeted an object owned by another scope.
    #[error("Object <{id}> belongs to scope <{found}> and cannot be modified from <{current}>")]
    ScopeMismatch {
        id: String,
        current: String,
        found: String,
    },
    /// The dataset has no register table yet.
    #[error("Space time dataset <{0}> has no register table")]
    MissingRegisterTable(String),
    /// The map must be inserted into the catalog before it can be registered.
    #[error("Map <{0}> is not present in the temporal catalog")]
    MapNotInCatalog(String),
    /// No dataset with this identifier exists.
    #[error("Space time dataset <{0}> not found")]
    DatasetNotFound(String),
    /// A dataset with this identifier already exists.
    #[error("Space time dataset <{0}> already exists")]
    DatasetExists(String),
    /// A map with this identifier already exists.
    #[error("Map <{0}> is already present in the temporal catalog")]
    MapExists(String),
    /// A map of the wrong kind was registered (e.g. a vector into a raster dataset).
    #[error("Map <{map}> is a {found} map, space time dataset <{dataset}> expects {expected} maps")]
    MapKindMismatch {
        dataset: String,
        map: String,
        expected: String,
        found: String,
    },
    /// The map's valid time is not a proper interval or instant.
    #[error("Map <{map}> has an invalid time: {reason}")]
    InvalidMapTime { map: String, reason: String },
    /// Identifier is not of the form `name[:layer]@scope`.
    #[error("Invalid identifier \"{0}\": expected name[:layer]@scope")]
    InvalidIdentifier(String),
    /// A datetime string could not be parsed.
    #[error("Unable to convert \"{0}\" into a datetime")]
    InvalidDatetime(String),
    /// Calendar arithmetic produced a date that does not exist.
    #[error("Invalid date arithmetic: {0}")]
    InvalidDateArithmetic(String),
    /// An extent was constructed with `end < start` or a stray unit.
    #[error("Invalid time extent: {0}")]
    InvalidExtent(String),
    /// The sampler dataset contains instants; sampling requires intervals.
    #[error("Sampler dataset <{0}> must consist of time intervals only")]
    SamplerNotInterval(String),
    /// A granularity could not be converted between units.
    #[error("Cannot convert granularity from {from} to {to}")]
    GranularityConversion { from: String, to: String },
    /// Conflicting or incomplete options for a batch registration.
    #[error("Invalid register request: {0}")]
    InvalidRegisterRequest(String),
    /// A new map has no start time to register it with.
    #[error("Unable to register map <{0}>: the start time is not set")]
    MissingStartTime(String),
    /// A relation graph lost its mirror symmetry.
    #[error("Inconsistent temporal topology: {0}")]
    TopologyInconsistent(String),
    /// Error reported by the relational store.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors reported by a [`RelationalStore`](crate::catalog::store::RelationalStore).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Statement referenced a table that does not exist.
    #[error("Table <{0}> does not exist")]
    NoSuchTable(String),
    /// Table creation or rename collided with an existing table.
    #[error("Table <{0}> already exists")]
    TableExists(String),
    /// Insert with a key already present.
    #[error("Duplicate key <{key}> in table <{table}>")]
    DuplicateKey { table: String, key: String },
    /// Update or delete of a row that does not exist.
    #[error("No row <{key}> in table <{table}>")]
    NoSuchRow { table: String, key: String },
    /// A column held a value of the wrong type.
    #[error("Column <{column}> of table <{table}>: {reason}")]
    ColumnType {
        table: String,
        column: String,
        reason: String,
    },
}
