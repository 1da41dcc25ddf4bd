//! Time-stamped maps known to the catalog.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::catalog::ident::MapId;
use crate::catalog::store::{ColumnDef, ColumnType, KEY_COLUMN, Row, RowReader, Value};
use crate::catalog_error::CatalogError;
use crate::time::extent::TimeExtent;
use crate::time::point::{RelativeUnit, TemporalType, TimePoint};
use crate::topology::relation_graph::Temporal;
use crate::topology::spatial::SpatialExtent;

/// The kind of layer a map refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapKind {
    Raster,
    Raster3D,
    Vector,
}

impl MapKind {
    pub const ALL: [MapKind; 3] = [MapKind::Raster, MapKind::Raster3D, MapKind::Vector];

    pub fn as_str(self) -> &'static str {
        match self {
            MapKind::Raster => "raster",
            MapKind::Raster3D => "raster_3d",
            MapKind::Vector => "vector",
        }
    }

    /// Table holding the records of this kind.
    pub fn table(self) -> &'static str {
        match self {
            MapKind::Raster => "raster_base",
            MapKind::Raster3D => "raster3d_base",
            MapKind::Vector => "vector_base",
        }
    }
}

impl fmt::Display for MapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MapKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raster" | "rast" => Ok(MapKind::Raster),
            "raster_3d" | "raster3d" | "rast3d" | "3draster" => Ok(MapKind::Raster3D),
            "vector" | "vect" => Ok(MapKind::Vector),
            other => Err(CatalogError::InvalidIdentifier(format!("unknown map type {other}"))),
        }
    }
}

pub(crate) static MAP_COLUMNS: Lazy<Vec<ColumnDef>> = Lazy::new(|| {
    let mut cols = vec![
        ColumnDef::new("name", ColumnType::Text),
        ColumnDef::new("layer", ColumnType::Text),
        ColumnDef::new("scope", ColumnType::Text),
        ColumnDef::new("temporal_type", ColumnType::Text),
        ColumnDef::new("start_time", ColumnType::DateTime),
        ColumnDef::new("end_time", ColumnType::DateTime),
        ColumnDef::new("start_rel", ColumnType::Integer),
        ColumnDef::new("end_rel", ColumnType::Integer),
        ColumnDef::new("unit", ColumnType::Text),
        ColumnDef::new("semantic_label", ColumnType::Text),
        ColumnDef::new("registered_stds", ColumnType::Text),
    ];
    cols.extend(SPATIAL_COLUMNS.iter().map(|&name| ColumnDef::new(name, ColumnType::Real)));
    cols
});

pub(crate) const SPATIAL_COLUMNS: [&str; 6] = ["north", "south", "east", "west", "top", "bottom"];

/// Write the time extent columns of a map or dataset row.
pub(crate) fn extent_to_row(extent: Option<&TimeExtent>, row: &mut Row) {
    let (mut st, mut et, mut sr, mut er, mut unit) =
        (Value::Null, Value::Null, Value::Null, Value::Null, Value::Null);
    if let Some(ext) = extent {
        match ext.start() {
            TimePoint::Absolute(s) => {
                st = s.into();
                et = ext.end().and_then(|e| e.as_absolute()).into();
            }
            TimePoint::Relative(s) => {
                sr = s.into();
                er = ext.end().and_then(|e| e.as_relative()).into();
            }
        }
        unit = ext.unit().map(RelativeUnit::as_str).into();
    }
    row.insert("start_time".into(), st);
    row.insert("end_time".into(), et);
    row.insert("start_rel".into(), sr);
    row.insert("end_rel".into(), er);
    row.insert("unit".into(), unit);
}

/// Read the time extent columns; `None` when no start is stored.
pub(crate) fn extent_from_row(r: &RowReader<'_>) -> Result<Option<TimeExtent>, CatalogError> {
    let unit = r.text("unit")?.map(str::parse::<RelativeUnit>).transpose()?;
    if let Some(start) = r.datetime("start_time")? {
        return TimeExtent::absolute(start, r.datetime("end_time")?).map(Some);
    }
    match (r.int("start_rel")?, unit) {
        (Some(start), Some(unit)) => TimeExtent::relative(start, r.int("end_rel")?, unit).map(Some),
        (Some(_), None) => Err(CatalogError::InvalidExtent("relative time without a unit".into())),
        (None, _) => Ok(None),
    }
}

pub(crate) fn spatial_to_row(spatial: Option<&SpatialExtent>, row: &mut Row) {
    let vals = spatial.map(|s| [s.north, s.south, s.east, s.west, s.top, s.bottom]);
    for (i, name) in SPATIAL_COLUMNS.iter().enumerate() {
        row.insert((*name).into(), vals.map(|v| v[i]).into());
    }
}

pub(crate) fn spatial_from_row(r: &RowReader<'_>) -> Result<Option<SpatialExtent>, CatalogError> {
    let mut vals = [0.0; 6];
    for (i, name) in SPATIAL_COLUMNS.iter().enumerate() {
        match r.real(name)? {
            Some(v) => vals[i] = v,
            None => return Ok(None),
        }
    }
    Ok(Some(SpatialExtent::new(vals[0], vals[1], vals[2], vals[3], vals[4], vals[5])))
}

/// A time-stamped map registered in the catalog.
///
/// `datasets` lists the identifiers of every space time dataset the map is
/// registered in; the catalog keeps it in sync with the register tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapRecord {
    pub id: MapId,
    pub kind: MapKind,
    pub extent: TimeExtent,
    pub spatial: Option<SpatialExtent>,
    pub semantic_label: Option<String>,
    pub datasets: BTreeSet<String>,
}

impl MapRecord {
    pub fn new(id: MapId, kind: MapKind, extent: TimeExtent) -> Self {
        Self {
            id,
            kind,
            extent,
            spatial: None,
            semantic_label: None,
            datasets: BTreeSet::new(),
        }
    }

    pub fn with_spatial(mut self, spatial: SpatialExtent) -> Self {
        self.spatial = Some(spatial);
        self
    }

    pub fn with_semantic_label(mut self, label: impl Into<String>) -> Self {
        self.semantic_label = Some(label.into());
        self
    }

    pub fn temporal_type(&self) -> TemporalType {
        self.extent.temporal_type()
    }

    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert(KEY_COLUMN.into(), self.id.to_string().into());
        row.insert("name".into(), self.id.name().into());
        row.insert("layer".into(), self.id.layer().into());
        row.insert("scope".into(), self.id.scope().into());
        row.insert("temporal_type".into(), self.temporal_type().as_str().into());
        extent_to_row(Some(&self.extent), &mut row);
        spatial_to_row(self.spatial.as_ref(), &mut row);
        row.insert("semantic_label".into(), self.semantic_label.clone().into());
        row.insert("registered_stds".into(), datasets_value(&self.datasets));
        row
    }

    pub fn from_row(kind: MapKind, row: &Row) -> Result<Self, CatalogError> {
        let r = RowReader::new(kind.table(), row);
        let id = MapId::parse(r.required_text(KEY_COLUMN)?)?;
        let extent = extent_from_row(&r)?.ok_or_else(|| CatalogError::InvalidMapTime {
            map: id.to_string(),
            reason: "no start time stored".into(),
        })?;
        let datasets = r
            .text("registered_stds")?
            .map(|s| s.split(',').filter(|p| !p.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();
        Ok(Self {
            id,
            kind,
            extent,
            spatial: spatial_from_row(&r)?,
            semantic_label: r.text("semantic_label")?.map(str::to_string),
            datasets,
        })
    }
}

/// The comma separated `registered_stds` column value.
pub(crate) fn datasets_value(datasets: &BTreeSet<String>) -> Value {
    if datasets.is_empty() { Value::Null } else { Value::Text(datasets.iter().join(",")) }
}

impl Temporal for MapRecord {
    fn temporal_extent(&self) -> TimeExtent {
        self.extent
    }

    fn spatial_extent(&self) -> Option<SpatialExtent> {
        self.spatial
    }
}

/// One entry of a map sequence: a registered map, or a gap (`map == None`)
/// covering time in which no map is registered.
///
/// `extent` is the slot's own extent. For plain listings it equals the
/// map's extent; resampling replaces it with the granule's extent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSlot {
    pub map: Option<MapRecord>,
    pub extent: TimeExtent,
}

impl MapSlot {
    pub fn map(map: MapRecord) -> Self {
        let extent = map.extent;
        Self { map: Some(map), extent }
    }

    pub fn gap(extent: TimeExtent) -> Self {
        Self { map: None, extent }
    }

    pub fn is_gap(&self) -> bool {
        self.map.is_none()
    }

    pub fn id(&self) -> Option<&MapId> {
        self.map.as_ref().map(|m| &m.id)
    }
}

impl Temporal for MapSlot {
    fn temporal_extent(&self) -> TimeExtent {
        self.extent
    }

    fn spatial_extent(&self) -> Option<SpatialExtent> {
        self.map.as_ref().and_then(|m| m.spatial)
    }
}
