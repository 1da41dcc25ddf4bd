//! Space time datasets: named, ordered collections of maps of one kind.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::catalog::ident::DatasetId;
use crate::catalog::map_record::{
    MapKind, SPATIAL_COLUMNS, extent_from_row, extent_to_row, spatial_from_row, spatial_to_row,
};
use crate::catalog::store::{ColumnDef, ColumnType, KEY_COLUMN, Row, RowReader, table_name};
use crate::catalog_error::CatalogError;
use crate::debug_invariants::DebugInvariants;
use crate::granularity::unit::Granularity;
use crate::time::extent::TimeExtent;
use crate::time::point::{RelativeUnit, TemporalType};
use crate::topology::spatial::SpatialExtent;

/// Dataset kind; each holds maps of exactly one [`MapKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Strds,
    Str3ds,
    Stvds,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 3] = [DatasetKind::Strds, DatasetKind::Str3ds, DatasetKind::Stvds];

    pub fn map_kind(self) -> MapKind {
        match self {
            DatasetKind::Strds => MapKind::Raster,
            DatasetKind::Str3ds => MapKind::Raster3D,
            DatasetKind::Stvds => MapKind::Vector,
        }
    }

    pub fn for_map_kind(kind: MapKind) -> Self {
        match kind {
            MapKind::Raster => DatasetKind::Strds,
            MapKind::Raster3D => DatasetKind::Str3ds,
            MapKind::Vector => DatasetKind::Stvds,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DatasetKind::Strds => "strds",
            DatasetKind::Str3ds => "str3ds",
            DatasetKind::Stvds => "stvds",
        }
    }

    /// Table holding the datasets of this kind.
    pub fn table(self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strds" => Ok(DatasetKind::Strds),
            "str3ds" => Ok(DatasetKind::Str3ds),
            "stvds" => Ok(DatasetKind::Stvds),
            other => Err(CatalogError::InvalidIdentifier(format!("unknown dataset type {other}"))),
        }
    }
}

/// How the registered maps are time-stamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapTimeKind {
    /// Every map has an end time.
    Interval,
    /// No map has an end time.
    Point,
    /// Both occur.
    Mixed,
    /// A map with `end <= start`.
    Invalid,
}

impl MapTimeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MapTimeKind::Interval => "interval",
            MapTimeKind::Point => "point",
            MapTimeKind::Mixed => "mixed",
            MapTimeKind::Invalid => "invalid",
        }
    }

    /// Classify from the counts of [`TemporalTypeCounts`](crate::catalog::catalog::TemporalTypeCounts).
    pub fn classify(intervals: usize, points: usize, invalid: usize) -> Self {
        match (intervals > 0, points > 0, invalid > 0) {
            (true, false, false) => MapTimeKind::Interval,
            (false, true, false) => MapTimeKind::Point,
            (true, true, false) => MapTimeKind::Mixed,
            _ => MapTimeKind::Invalid,
        }
    }
}

impl fmt::Display for MapTimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MapTimeKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interval" => Ok(MapTimeKind::Interval),
            "point" => Ok(MapTimeKind::Point),
            "mixed" => Ok(MapTimeKind::Mixed),
            "invalid" => Ok(MapTimeKind::Invalid),
            other => Err(CatalogError::InvalidExtent(format!("unknown map time {other}"))),
        }
    }
}

pub(crate) static DATASET_COLUMNS: Lazy<Vec<ColumnDef>> = Lazy::new(|| {
    let mut cols = vec![
        ColumnDef::new("name", ColumnType::Text),
        ColumnDef::new("scope", ColumnType::Text),
        ColumnDef::new("temporal_type", ColumnType::Text),
        ColumnDef::new("relative_unit", ColumnType::Text),
        ColumnDef::new("start_time", ColumnType::DateTime),
        ColumnDef::new("end_time", ColumnType::DateTime),
        ColumnDef::new("start_rel", ColumnType::Integer),
        ColumnDef::new("end_rel", ColumnType::Integer),
        ColumnDef::new("unit", ColumnType::Text),
        ColumnDef::new("granularity", ColumnType::Text),
        ColumnDef::new("map_time", ColumnType::Text),
        ColumnDef::new("number_of_maps", ColumnType::Integer),
        ColumnDef::new("pending_maps", ColumnType::Integer),
        ColumnDef::new("register_table", ColumnType::Text),
        ColumnDef::new("revision", ColumnType::Integer),
        ColumnDef::new("semantic_type", ColumnType::Text),
        ColumnDef::new("title", ColumnType::Text),
        ColumnDef::new("description", ColumnType::Text),
    ];
    cols.extend(SPATIAL_COLUMNS.iter().map(|&name| ColumnDef::new(name, ColumnType::Real)));
    cols
});

/// Name of the register table of dataset `id` holding maps of `kind`.
pub fn register_table_name(id: &DatasetId, kind: MapKind) -> String {
    table_name(&[id.name(), id.scope(), kind.as_str(), "register"])
}

/// A space time dataset as stored in the catalog.
///
/// `extent`, `granularity`, `map_time` and the spatial box are derived from
/// the registered maps and only refreshed by
/// [`Catalog::update_from_registered_maps`](crate::catalog::catalog::Catalog::update_from_registered_maps).
/// `pending_maps` counts registrations since the last refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceTimeDataset {
    pub id: DatasetId,
    pub kind: DatasetKind,
    pub temporal_type: TemporalType,
    /// Fixed by the first map registered into an empty relative dataset.
    pub relative_unit: Option<RelativeUnit>,
    pub extent: Option<TimeExtent>,
    pub spatial: Option<SpatialExtent>,
    pub granularity: Option<Granularity>,
    pub map_time: Option<MapTimeKind>,
    pub number_of_maps: usize,
    pub pending_maps: usize,
    pub register_table: Option<String>,
    /// Monotonic counter bumped by every refresh.
    pub revision: u64,
    pub semantic_type: String,
    pub title: String,
    pub description: String,
}

impl SpaceTimeDataset {
    pub fn new(id: DatasetId, kind: DatasetKind, temporal_type: TemporalType) -> Self {
        Self {
            id,
            kind,
            temporal_type,
            relative_unit: None,
            extent: None,
            spatial: None,
            granularity: None,
            map_time: None,
            number_of_maps: 0,
            pending_maps: 0,
            register_table: None,
            revision: 0,
            semantic_type: "mean".into(),
            title: String::new(),
            description: String::new(),
        }
    }

    pub fn map_kind(&self) -> MapKind {
        self.kind.map_kind()
    }

    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert(KEY_COLUMN.into(), self.id.to_string().into());
        row.insert("name".into(), self.id.name().into());
        row.insert("scope".into(), self.id.scope().into());
        row.insert("temporal_type".into(), self.temporal_type.as_str().into());
        row.insert("relative_unit".into(), self.relative_unit.map(RelativeUnit::as_str).into());
        extent_to_row(self.extent.as_ref(), &mut row);
        spatial_to_row(self.spatial.as_ref(), &mut row);
        row.insert("granularity".into(), self.granularity.as_ref().map(ToString::to_string).into());
        row.insert("map_time".into(), self.map_time.map(MapTimeKind::as_str).into());
        row.insert("number_of_maps".into(), (self.number_of_maps as i64).into());
        row.insert("pending_maps".into(), (self.pending_maps as i64).into());
        row.insert("register_table".into(), self.register_table.clone().into());
        row.insert("revision".into(), (self.revision as i64).into());
        row.insert("semantic_type".into(), self.semantic_type.as_str().into());
        row.insert("title".into(), self.title.as_str().into());
        row.insert("description".into(), self.description.as_str().into());
        row
    }

    pub fn from_row(kind: DatasetKind, row: &Row) -> Result<Self, CatalogError> {
        let r = RowReader::new(kind.table(), row);
        let id = DatasetId::parse(r.required_text(KEY_COLUMN)?)?;
        let temporal_type: TemporalType = r.required_text("temporal_type")?.parse()?;
        let count = |col: &str| -> Result<usize, CatalogError> {
            Ok(r.int(col)?.map_or(0, |v| v.max(0) as usize))
        };
        Ok(Self {
            temporal_type,
            relative_unit: r.text("relative_unit")?.map(str::parse::<RelativeUnit>).transpose()?,
            extent: extent_from_row(&r)?,
            spatial: spatial_from_row(&r)?,
            granularity: r
                .text("granularity")?
                .map(|g| Granularity::parse(g, temporal_type))
                .transpose()?,
            map_time: r.text("map_time")?.map(str::parse::<MapTimeKind>).transpose()?,
            number_of_maps: count("number_of_maps")?,
            pending_maps: count("pending_maps")?,
            register_table: r.text("register_table")?.map(str::to_string),
            revision: r.int("revision")?.map_or(0, |v| v.max(0) as u64),
            semantic_type: r.text("semantic_type")?.unwrap_or("mean").to_string(),
            title: r.text("title")?.unwrap_or_default().to_string(),
            description: r.text("description")?.unwrap_or_default().to_string(),
            id,
            kind,
        })
    }
}

impl DebugInvariants for SpaceTimeDataset {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "SpaceTimeDataset");
    }

    fn validate_invariants(&self) -> Result<(), CatalogError> {
        let fail = |reason: &str| Err(CatalogError::InvalidExtent(format!("dataset <{}>: {reason}", self.id)));
        if self.temporal_type == TemporalType::Absolute && self.relative_unit.is_some() {
            return fail("absolute dataset with a relative unit");
        }
        if let Some(ext) = &self.extent {
            if ext.temporal_type() != self.temporal_type {
                return fail("extent of the wrong temporal type");
            }
            if self.temporal_type == TemporalType::Relative && ext.unit() != self.relative_unit {
                return fail("extent unit differs from the dataset unit");
            }
            ext.validate_invariants()?;
        }
        if self.number_of_maps == 0 && (self.extent.is_some() || self.granularity.is_some()) {
            return fail("empty dataset with an extent or granularity");
        }
        if let Some(g) = &self.granularity {
            if g.temporal_type() != self.temporal_type {
                return fail("granularity of the wrong temporal type");
            }
        }
        Ok(())
    }
}
