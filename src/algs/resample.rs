//! Granularity-based resampling with gap placeholders.
//!
//! The span `[start, end)` is cut into consecutive granules of one
//! granularity step. Each granule takes the maps standing in the first
//! non-empty relation of [`RESAMPLE_ORDER`], read from the granule's side:
//! maps equal to the granule, then maps the granule lies during (maps
//! containing it), then overlapping maps, then maps inside the granule.
//! Matched maps are returned with the granule's extent; a granule without
//! matches is a single gap slot.

use crate::catalog::catalog::Catalog;
use crate::catalog::dataset::{DatasetKind, MapTimeKind};
use crate::catalog::ident::DatasetId;
use crate::catalog::map_record::{MapRecord, MapSlot};
use crate::catalog::store::RelationalStore;
use crate::catalog_error::CatalogError;
use crate::granularity::unit::Granularity;
use crate::time::extent::{RelationKind, TimeExtent};
use crate::time::point::{RelativeUnit, TimePoint};
use crate::topology::relation_graph::TopologyBuilder;

/// Relation precedence used to pick the maps of a granule.
pub const RESAMPLE_ORDER: [RelationKind; 5] = [
    RelationKind::Equal,
    RelationKind::During,
    RelationKind::Overlaps,
    RelationKind::Overlapped,
    RelationKind::Contains,
];

/// Consecutive granules of width `gran` starting at `start`, the last one
/// being the first to reach or pass `end`.
///
/// # Errors
/// `InvalidGranularity` for a zero step or a step of the other temporal
/// type, `MixedTemporalTypes` if `start` and `end` differ in kind.
pub fn granules(
    start: TimePoint,
    end: TimePoint,
    gran: &Granularity,
    unit: Option<RelativeUnit>,
) -> Result<Vec<TimeExtent>, CatalogError> {
    if gran.is_zero() {
        return Err(CatalogError::InvalidGranularity(gran.to_string()));
    }
    if !start.same_kind(&end) {
        return Err(CatalogError::MixedTemporalTypes(format!("granules from {start} to {end}")));
    }
    let mut out = Vec::new();
    let mut cur = start;
    while cur < end {
        let next = TimeExtent::instant(cur, unit).shifted(gran)?.start();
        out.push(TimeExtent::new(cur, Some(next), unit)?);
        cur = next;
    }
    Ok(out)
}

/// Resample start-ordered `maps` onto the granules of `[start, end)`.
///
/// Returns one entry per granule; an empty map list yields no granules.
pub fn resample_by_granularity(
    maps: &[MapRecord],
    start: TimePoint,
    end: TimePoint,
    gran: &Granularity,
) -> Result<Vec<Vec<MapSlot>>, CatalogError> {
    let Some(first) = maps.first() else {
        return Ok(Vec::new());
    };
    let grid = granules(start, end, gran, first.extent.unit())?;
    let graph = TopologyBuilder::default().build(&grid, Some(maps))?;
    let out = grid
        .iter()
        .zip(graph.primary())
        .map(|(granule, node)| {
            let picked = RESAMPLE_ORDER
                .iter()
                .map(|&k| node.relations.get(k))
                .find(|l| !l.is_empty())
                .unwrap_or(&[]);
            if picked.is_empty() {
                return vec![MapSlot::gap(*granule)];
            }
            let mut idx = picked.to_vec();
            idx.sort_unstable();
            idx.into_iter()
                .map(|j| MapSlot { map: Some(maps[j].clone()), extent: *granule })
                .collect()
        })
        .collect();
    Ok(out)
}

impl<S: RelationalStore> Catalog<S> {
    /// Registered maps resampled by `gran`, or by the dataset's own
    /// granularity when `gran` is `None`.
    ///
    /// Datasets without an extent yield an empty list. For point and mixed
    /// datasets the span is extended by one step so the last instant gets a
    /// granule.
    pub fn registered_maps_by_granularity(
        &self,
        kind: DatasetKind,
        dataset: &DatasetId,
        gran: Option<&str>,
    ) -> Result<Vec<Vec<MapSlot>>, CatalogError> {
        let ds = self.require_dataset(kind, dataset)?;
        let gran = match gran {
            Some(s) => Some(Granularity::parse(s, ds.temporal_type)?),
            None => ds.granularity,
        };
        let Some(extent) = ds.extent else {
            return Ok(Vec::new());
        };
        let gran = gran.ok_or_else(|| CatalogError::InvalidGranularity(format!("<{}> has no granularity", ds.id)))?;
        let mut end = extent.upper();
        if ds.map_time != Some(MapTimeKind::Interval) {
            end = TimeExtent::instant(end, extent.unit()).shifted(&gran)?.start();
        }
        let maps = self.registered_maps(kind, dataset, None)?;
        log::debug!("resampling <{}> from {} to {end} by {gran}", ds.id, extent.start());
        resample_by_granularity(&maps, extent.start(), end, &gran)
    }
}
