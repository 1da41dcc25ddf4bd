#![allow(dead_code)]
use chrono::{NaiveDate, NaiveDateTime};
use stds_catalog::prelude::*;

pub const SCOPE: &str = "PERMANENT";

/// Relative extent in days.
pub fn rel(start: i64, end: Option<i64>) -> TimeExtent {
    TimeExtent::relative(start, end, RelativeUnit::Days).unwrap()
}

pub fn dt(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
}

pub fn abs(start: NaiveDateTime, end: Option<NaiveDateTime>) -> TimeExtent {
    TimeExtent::absolute(start, end).unwrap()
}

pub fn map_id(name: &str) -> MapId {
    MapId::new(name, None, SCOPE).unwrap()
}

pub fn ds_id(name: &str) -> DatasetId {
    DatasetId::new(name, SCOPE).unwrap()
}

pub fn catalog() -> Catalog<InMemoryStore> {
    Catalog::new(InMemoryStore::new(), CatalogConfig::default()).unwrap()
}

/// Create a raster dataset and register one map per extent, named
/// `{prefix}{i}`, then reconcile.
pub fn raster_series(
    cat: &mut Catalog<InMemoryStore>,
    name: &str,
    prefix: &str,
    ttype: TemporalType,
    extents: &[TimeExtent],
) -> DatasetId {
    let ds = ds_id(name);
    cat.create_dataset(ds.clone(), DatasetKind::Strds, ttype, "mean", "", "")
        .unwrap();
    for (i, ext) in extents.iter().enumerate() {
        let id = map_id(&format!("{prefix}{i}"));
        cat.insert_map(MapRecord::new(id.clone(), MapKind::Raster, *ext))
            .unwrap();
        assert!(cat.register(DatasetKind::Strds, &ds, &id).unwrap());
    }
    cat.update_from_registered_maps(DatasetKind::Strds, &ds)
        .unwrap();
    ds
}

/// Map names of one granule, `-` for gaps.
pub fn slot_names(slots: &[MapSlot]) -> Vec<String> {
    slots
        .iter()
        .map(|s| s.id().map_or_else(|| "-".to_string(), |id| id.name().to_string()))
        .collect()
}
