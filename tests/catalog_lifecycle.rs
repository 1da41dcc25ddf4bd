use std::cell::Cell;

use stds_catalog::catalog::store::{ParamStyle, RowIter};
use stds_catalog::prelude::*;

mod util;
use util::*;

#[test]
fn update_is_idempotent() {
    let mut cat = catalog();
    let ds = raster_series(
        &mut cat,
        "temp",
        "t",
        TemporalType::Relative,
        &[rel(0, Some(2)), rel(2, Some(4)), rel(6, Some(8))],
    );
    let first = cat.require_dataset(DatasetKind::Strds, &ds).unwrap();
    let second = cat.update_from_registered_maps(DatasetKind::Strds, &ds).unwrap();
    assert_eq!(first.extent, second.extent);
    assert_eq!(first.granularity, second.granularity);
    assert_eq!(first.map_time, second.map_time);
    assert_eq!(second.revision, first.revision + 1);
    assert_eq!(second.extent, Some(rel(0, Some(8))));
    assert_eq!(second.granularity, Some(Granularity::relative(2)));
}

#[test]
fn mismatched_unit_is_fatal() {
    let mut cat = catalog();
    let ds = raster_series(&mut cat, "temp", "t", TemporalType::Relative, &[rel(0, Some(1))]);
    let years = map_id("yearly");
    cat.insert_map(MapRecord::new(
        years.clone(),
        MapKind::Raster,
        TimeExtent::relative(1, Some(2), RelativeUnit::Years).unwrap(),
    ))
    .unwrap();
    let err = cat.register(DatasetKind::Strds, &ds, &years).unwrap_err();
    assert_eq!(
        err,
        CatalogError::RelativeUnitMismatch {
            dataset: "temp@PERMANENT".into(),
            map: "yearly@PERMANENT".into(),
            expected: RelativeUnit::Days,
            found: RelativeUnit::Years,
        }
    );
    let msg = err.to_string();
    assert!(msg.contains("days") && msg.contains("years"), "{msg}");
    assert!(!cat.is_map_registered(DatasetKind::Strds, &ds, &years).unwrap());
}

#[test]
fn unregistering_a_non_member_warns() {
    let mut cat = catalog();
    let ds = raster_series(&mut cat, "temp", "t", TemporalType::Relative, &[rel(0, Some(1))]);
    let before = cat.registered_maps(DatasetKind::Strds, &ds, None).unwrap();
    assert!(!cat.unregister(DatasetKind::Strds, &ds, &map_id("other")).unwrap());
    assert_eq!(cat.registered_maps(DatasetKind::Strds, &ds, None).unwrap(), before);
    assert!(!cat.register(DatasetKind::Strds, &ds, &map_id("t0")).unwrap());
}

#[test]
fn empty_dataset_resets_derived_fields() {
    let mut cat = catalog();
    let ds = raster_series(&mut cat, "temp", "t", TemporalType::Relative, &[rel(0, Some(1)), rel(1, Some(2))]);
    for name in ["t0", "t1"] {
        assert!(cat.unregister(DatasetKind::Strds, &ds, &map_id(name)).unwrap());
    }
    let upd = cat.update_from_registered_maps(DatasetKind::Strds, &ds).unwrap();
    assert_eq!(upd.number_of_maps, 0);
    assert_eq!(upd.extent, None);
    assert_eq!(upd.granularity, None);
    assert_eq!(upd.map_time, None);
    assert!(!cat.check_temporal_topology(DatasetKind::Strds, &ds).unwrap());
    let t0 = cat.map(MapKind::Raster, &map_id("t0")).unwrap().unwrap();
    assert!(t0.datasets.is_empty());
}

#[test]
fn absolute_type_mismatch_is_fatal() {
    let mut cat = catalog();
    let ds = raster_series(
        &mut cat,
        "monthly",
        "m",
        TemporalType::Absolute,
        &[abs(dt(2001, 1, 1), Some(dt(2001, 2, 1)))],
    );
    let r = map_id("relative");
    cat.insert_map(MapRecord::new(r.clone(), MapKind::Raster, rel(0, Some(1)))).unwrap();
    assert!(matches!(
        cat.register(DatasetKind::Strds, &ds, &r),
        Err(CatalogError::TemporalTypeMismatch { .. })
    ));
}

#[test]
fn foreign_scope_is_rejected() {
    let mut cat = Catalog::new(InMemoryStore::new(), CatalogConfig::with_scope("user1")).unwrap();
    let foreign = DatasetId::parse("precip@PERMANENT").unwrap();
    let err = cat
        .create_dataset(foreign, DatasetKind::Strds, TemporalType::Absolute, "mean", "", "")
        .unwrap_err();
    assert!(matches!(err, CatalogError::ScopeMismatch { .. }));
}

#[test]
fn overlapping_maps_fail_topology_check() {
    let mut cat = catalog();
    let ds = raster_series(&mut cat, "temp", "t", TemporalType::Relative, &[rel(0, Some(5)), rel(3, Some(8))]);
    assert!(!cat.check_temporal_topology(DatasetKind::Strds, &ds).unwrap());
    let counts = cat.count_temporal_relations(DatasetKind::Strds, &ds).unwrap();
    assert_eq!(counts.get(&RelationKind::Overlaps), Some(&1));
    assert_eq!(counts.get(&RelationKind::Overlapped), Some(&1));
}

#[test]
fn filtered_listing_and_gaps() {
    let mut cat = catalog();
    let ds = raster_series(
        &mut cat,
        "temp",
        "t",
        TemporalType::Relative,
        &[rel(0, Some(1)), rel(3, Some(4)), rel(4, Some(6))],
    );
    let filter = TemporalFilter::new(rel(2, Some(5)));
    let names: Vec<String> = cat
        .registered_maps(DatasetKind::Strds, &ds, Some(&filter))
        .unwrap()
        .iter()
        .map(|m| m.id.name().to_string())
        .collect();
    assert_eq!(names, vec!["t1", "t2"]);
    let slots = cat.maps_with_gaps(DatasetKind::Strds, &ds).unwrap();
    assert_eq!(slot_names(&slots), vec!["t0", "-", "t1", "t2"]);
    assert_eq!(slots[1].extent, rel(1, Some(3)));
    let (sql, params) = filter.to_sql(ParamStyle::Qmark);
    assert_eq!(sql, "(start_rel >= ? AND start_rel < ?)");
    assert_eq!(params.len(), 2);
}

#[test]
fn map_time_update_reconciles_datasets() {
    let mut cat = catalog();
    let ds = raster_series(&mut cat, "temp", "t", TemporalType::Relative, &[rel(0, Some(1)), rel(1, Some(2))]);
    cat.update_map_time(MapKind::Raster, &map_id("t1"), rel(1, Some(5))).unwrap();
    let upd = cat.require_dataset(DatasetKind::Strds, &ds).unwrap();
    assert_eq!(upd.extent, Some(rel(0, Some(5))));
    assert_eq!(upd.granularity, Some(Granularity::relative(1)));

    cat.remove_map(MapKind::Raster, &map_id("t1")).unwrap();
    let upd = cat.require_dataset(DatasetKind::Strds, &ds).unwrap();
    assert_eq!(upd.number_of_maps, 1);
    assert!(!cat.has_map(MapKind::Raster, &map_id("t1")).unwrap());
}

#[test]
fn snap_shift_rename_delete() {
    let mut cat = catalog();
    let ds = raster_series(&mut cat, "pts", "p", TemporalType::Relative, &[rel(0, None), rel(3, None), rel(6, None)]);
    assert_eq!(
        cat.require_dataset(DatasetKind::Strds, &ds).unwrap().map_time,
        Some(MapTimeKind::Point)
    );
    let snapped = cat.snap(DatasetKind::Strds, &ds).unwrap();
    assert_eq!(snapped.map_time, Some(MapTimeKind::Interval));
    assert_eq!(snapped.extent, Some(rel(0, Some(9))));

    let shifted = cat.shift(DatasetKind::Strds, &ds, &Granularity::relative(-1)).unwrap();
    assert_eq!(shifted.extent, Some(rel(-1, Some(8))));

    let new_id = ds_id("renamed");
    cat.rename(DatasetKind::Strds, &ds, new_id.clone()).unwrap();
    assert!(matches!(
        cat.require_dataset(DatasetKind::Strds, &ds),
        Err(CatalogError::DatasetNotFound(_))
    ));
    assert_eq!(cat.registered_maps(DatasetKind::Strds, &new_id, None).unwrap().len(), 3);

    cat.delete(DatasetKind::Strds, &new_id).unwrap();
    assert_eq!(cat.datasets(DatasetKind::Strds).unwrap().count(), 0);
    assert!(cat.has_map(MapKind::Raster, &map_id("p0")).unwrap());
}

#[test]
fn config_round_trips_through_json() {
    let cfg = CatalogConfig { current_scope: "user1".into(), scope_check: false };
    let json = serde_json::to_string(&cfg).unwrap();
    assert_eq!(serde_json::from_str::<CatalogConfig>(&json).unwrap(), cfg);
}

#[test]
fn shared_store_serves_two_handles() {
    let store = SharedStore::new(InMemoryStore::new());
    let mut writer = Catalog::new(store.clone(), CatalogConfig::default()).unwrap();
    let reader = Catalog::new(store, CatalogConfig::default()).unwrap();
    writer
        .create_dataset(ds_id("shared"), DatasetKind::Str3ds, TemporalType::Absolute, "mean", "", "")
        .unwrap();
    assert!(reader.dataset(DatasetKind::Str3ds, &ds_id("shared")).unwrap().is_some());
}

/// In-memory store that counts filtered selections.
#[derive(Default)]
struct CountingStore {
    inner: InMemoryStore,
    filtered: Cell<usize>,
}

impl RelationalStore for CountingStore {
    fn execute_batch(&mut self, batch: &Batch) -> Result<(), StoreError> {
        self.inner.execute_batch(batch)
    }

    fn select_rows<'a>(&'a self, table: &str, ids: Option<&'a [String]>) -> Result<RowIter<'a>, StoreError> {
        self.inner.select_rows(table, ids)
    }

    fn has_table(&self, table: &str) -> bool {
        self.inner.has_table(table)
    }

    fn select_where<'a>(
        &'a self,
        table: &str,
        ids: Option<&'a [String]>,
        filter: &TemporalFilter,
    ) -> Result<RowIter<'a>, StoreError> {
        self.filtered.set(self.filtered.get() + 1);
        self.inner.select_where(table, ids, filter)
    }
}

#[test]
fn filtered_listing_is_selected_by_the_store() {
    let mut cat = Catalog::new(CountingStore::default(), CatalogConfig::default()).unwrap();
    let ds = ds_id("temp");
    cat.create_dataset(ds.clone(), DatasetKind::Strds, TemporalType::Relative, "mean", "", "")
        .unwrap();
    for (i, ext) in [rel(0, Some(1)), rel(3, Some(4)), rel(4, Some(6))].iter().enumerate() {
        let id = map_id(&format!("t{i}"));
        cat.insert_map(MapRecord::new(id.clone(), MapKind::Raster, *ext)).unwrap();
        cat.register(DatasetKind::Strds, &ds, &id).unwrap();
    }
    // An unregistered map inside the window stays out of the listing.
    cat.insert_map(MapRecord::new(map_id("loose"), MapKind::Raster, rel(3, Some(5)))).unwrap();

    let filter = TemporalFilter { use_overlap: true, ..TemporalFilter::new(rel(2, Some(5))) };
    let names: Vec<String> = cat
        .registered_maps(DatasetKind::Strds, &ds, Some(&filter))
        .unwrap()
        .iter()
        .map(|m| m.id.name().to_string())
        .collect();
    assert_eq!(names, vec!["t1", "t2"]);
    assert_eq!(cat.store().filtered.get(), 1);
    cat.registered_maps(DatasetKind::Strds, &ds, None).unwrap();
    assert_eq!(cat.store().filtered.get(), 1);
}

#[test]
fn emptied_dataset_adopts_the_next_unit() {
    let mut cat = catalog();
    let ds = raster_series(&mut cat, "temp", "t", TemporalType::Relative, &[rel(0, Some(1))]);
    assert!(cat.unregister(DatasetKind::Strds, &ds, &map_id("t0")).unwrap());
    let stale = cat.require_dataset(DatasetKind::Strds, &ds).unwrap();
    assert_eq!(stale.number_of_maps, 1);

    let years = map_id("yearly");
    cat.insert_map(MapRecord::new(
        years.clone(),
        MapKind::Raster,
        TimeExtent::relative(1, Some(2), RelativeUnit::Years).unwrap(),
    ))
    .unwrap();
    assert!(cat.register(DatasetKind::Strds, &ds, &years).unwrap());
    let upd = cat.update_from_registered_maps(DatasetKind::Strds, &ds).unwrap();
    assert_eq!(upd.relative_unit, Some(RelativeUnit::Years));
    assert_eq!(upd.number_of_maps, 1);
    assert_eq!(upd.extent, Some(TimeExtent::relative(1, Some(2), RelativeUnit::Years).unwrap()));
}

#[test]
fn similar_names_get_their_own_register_tables() {
    let admin = CatalogConfig { current_scope: SCOPE.into(), scope_check: false };
    let mut cat = Catalog::new(InMemoryStore::new(), admin).unwrap();
    let left = DatasetId::parse("a_b@c").unwrap();
    let right = DatasetId::parse("a@b_c").unwrap();
    let mut tables = Vec::new();
    for (ds, map) in [(&left, "l"), (&right, "r")] {
        let created = cat
            .create_dataset(ds.clone(), DatasetKind::Strds, TemporalType::Relative, "mean", "", "")
            .unwrap();
        tables.push(created.register_table);
        cat.insert_map(MapRecord::new(map_id(map), MapKind::Raster, rel(0, Some(1)))).unwrap();
        assert!(cat.register(DatasetKind::Strds, ds, &map_id(map)).unwrap());
    }
    assert_ne!(tables[0], tables[1]);
    let names = |ds: &DatasetId| -> Vec<String> {
        cat.registered_maps(DatasetKind::Strds, ds, None)
            .unwrap()
            .iter()
            .map(|m| m.id.name().to_string())
            .collect()
    };
    assert_eq!(names(&left), vec!["l"]);
    assert_eq!(names(&right), vec!["r"]);
}
