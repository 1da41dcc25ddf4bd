use std::io::Cursor;

use stds_catalog::catalog::RegisterReport;
use stds_catalog::prelude::*;

mod util;
use util::*;

fn empty_dataset(cat: &mut Catalog<InMemoryStore>, ttype: TemporalType) -> DatasetId {
    let ds = ds_id("series");
    cat.create_dataset(ds.clone(), DatasetKind::Strds, ttype, "mean", "", "")
        .unwrap();
    ds
}

#[test]
fn increment_assigns_consecutive_intervals() {
    let mut cat = catalog();
    let ds = empty_dataset(&mut cat, TemporalType::Absolute);
    let req = RegisterRequest::new(MapKind::Raster, Some(ds.clone()))
        .with_maps(["a", "b", "c"])
        .with_start("2001-01-01")
        .with_increment("1 month", true);
    let report = cat.register_maps(req).unwrap();
    assert_eq!(
        report,
        RegisterReport {
            inserted: 3,
            updated: 0,
            skipped: 0,
            registered: 3,
            reconciled: vec!["series@PERMANENT".into()],
        }
    );
    let upd = cat.require_dataset(DatasetKind::Strds, &ds).unwrap();
    assert_eq!(upd.extent, Some(abs(dt(2001, 1, 1), Some(dt(2001, 4, 1)))));
    assert_eq!(upd.granularity.map(|g| g.to_string()), Some("1 month".into()));
    assert_eq!(upd.map_time, Some(MapTimeKind::Interval));
    let c = cat.map(MapKind::Raster, &map_id("c")).unwrap().unwrap();
    assert_eq!(c.extent, abs(dt(2001, 3, 1), Some(dt(2001, 4, 1))));
}

#[test]
fn lines_carry_their_own_times() {
    let mut cat = catalog();
    let ds = empty_dataset(&mut cat, TemporalType::Absolute);
    let input = "a|2001-01-01|2001-01-03\nb|2001-01-03|2001-01-05|S2_B4\nc|2001-01-07\n\nignored|2001-02-01\n";
    let req = RegisterRequest::new(MapKind::Raster, Some(ds.clone())).with_reader(Cursor::new(input));
    let report = cat.register_maps(req).unwrap();
    assert_eq!(report.inserted, 3);
    let b = cat.map(MapKind::Raster, &map_id("b")).unwrap().unwrap();
    assert_eq!(b.semantic_label.as_deref(), Some("S2_B4"));
    assert!(!cat.has_map(MapKind::Raster, &map_id("ignored")).unwrap());
    let upd = cat.require_dataset(DatasetKind::Strds, &ds).unwrap();
    assert_eq!(upd.map_time, Some(MapTimeKind::Mixed));
    assert_eq!(upd.extent, Some(abs(dt(2001, 1, 1), Some(dt(2001, 1, 7)))));
}

#[test]
fn relative_maps_need_a_unit() {
    let mut cat = catalog();
    let ds = empty_dataset(&mut cat, TemporalType::Relative);
    let req = RegisterRequest::new(MapKind::Raster, Some(ds.clone()))
        .with_maps(["a"])
        .with_start("0");
    assert!(matches!(cat.register_maps(req), Err(CatalogError::InvalidRegisterRequest(_))));

    let req = RegisterRequest::new(MapKind::Raster, Some(ds.clone()))
        .with_maps(["a", "b"])
        .with_start("0")
        .with_unit(RelativeUnit::Days)
        .with_increment("5", false);
    cat.register_maps(req).unwrap();
    let upd = cat.require_dataset(DatasetKind::Strds, &ds).unwrap();
    assert_eq!(upd.relative_unit, Some(RelativeUnit::Days));
    assert_eq!(upd.map_time, Some(MapTimeKind::Point));
    assert_eq!(upd.extent, Some(rel(0, Some(5))));
}

#[test]
fn existing_maps_are_kept_unless_overwritten() {
    let mut cat = catalog();
    let ds = empty_dataset(&mut cat, TemporalType::Relative);
    cat.insert_map(MapRecord::new(map_id("a"), MapKind::Raster, rel(10, Some(11)))).unwrap();

    let req = RegisterRequest::new(MapKind::Raster, Some(ds.clone()))
        .with_maps(["a", "a"])
        .with_start("0")
        .with_unit(RelativeUnit::Days);
    let report = cat.register_maps(req).unwrap();
    assert_eq!((report.skipped, report.inserted, report.registered), (1, 0, 1));
    assert_eq!(cat.map(MapKind::Raster, &map_id("a")).unwrap().unwrap().extent, rel(10, Some(11)));

    let req = RegisterRequest::new(MapKind::Raster, Some(ds.clone()))
        .with_maps(["a"])
        .with_start("0")
        .with_end("4")
        .with_unit(RelativeUnit::Days)
        .overwrite(true);
    let report = cat.register_maps(req).unwrap();
    assert_eq!((report.updated, report.registered), (1, 0));
    let upd = cat.require_dataset(DatasetKind::Strds, &ds).unwrap();
    assert_eq!(upd.extent, Some(rel(0, Some(4))));
}

#[test]
fn missing_start_writes_nothing() {
    let mut cat = catalog();
    let ds = empty_dataset(&mut cat, TemporalType::Absolute);
    let input = "a|2001-01-01\nb\n";
    let req = RegisterRequest::new(MapKind::Raster, Some(ds)).with_reader(Cursor::new(input));
    assert_eq!(
        cat.register_maps(req).unwrap_err(),
        CatalogError::MissingStartTime("b@PERMANENT".into())
    );
    assert!(!cat.has_map(MapKind::Raster, &map_id("a")).unwrap());
}

#[test]
fn wrong_temporal_type_writes_nothing() {
    let mut cat = catalog();
    let ds = empty_dataset(&mut cat, TemporalType::Absolute);
    let req = RegisterRequest::new(MapKind::Raster, Some(ds))
        .with_maps(["a"])
        .with_start("3")
        .with_unit(RelativeUnit::Days);
    assert!(matches!(cat.register_maps(req), Err(CatalogError::TemporalTypeMismatch { .. })));
    assert!(!cat.has_map(MapKind::Raster, &map_id("a")).unwrap());
}

#[test]
fn maps_without_dataset_are_only_committed() {
    let mut cat = catalog();
    let req = RegisterRequest::new(MapKind::Vector, None)
        .with_maps(["roads:1"])
        .with_start("2001-01-01");
    let report = cat.register_maps(req).unwrap();
    assert_eq!((report.inserted, report.registered), (1, 0));
    assert!(report.reconciled.is_empty());
    let id = MapId::parse("roads:1@PERMANENT").unwrap();
    assert!(cat.has_map(MapKind::Vector, &id).unwrap());
}

#[test]
fn existing_map_of_wrong_type_writes_nothing() {
    let mut cat = catalog();
    let ds = empty_dataset(&mut cat, TemporalType::Relative);
    cat.insert_map(MapRecord::new(map_id("old"), MapKind::Raster, abs(dt(2001, 1, 1), None))).unwrap();
    let req = RegisterRequest::new(MapKind::Raster, Some(ds.clone()))
        .with_maps(["new", "old"])
        .with_start("0")
        .with_unit(RelativeUnit::Days)
        .with_increment("1", false);
    let err = cat.register_maps(req).unwrap_err();
    assert!(
        matches!(&err, CatalogError::TemporalTypeMismatch { map, .. } if map == "old@PERMANENT"),
        "{err}"
    );
    assert!(!cat.has_map(MapKind::Raster, &map_id("new")).unwrap());
    assert!(!cat.is_map_registered(DatasetKind::Strds, &ds, &map_id("old")).unwrap());
    assert!(cat.registered_maps(DatasetKind::Strds, &ds, None).unwrap().is_empty());
    let stored = cat.require_dataset(DatasetKind::Strds, &ds).unwrap();
    assert_eq!((stored.number_of_maps, stored.pending_maps), (0, 0));
}

#[test]
fn existing_map_of_another_unit_writes_nothing() {
    let mut cat = catalog();
    let ds = raster_series(&mut cat, "series", "d", TemporalType::Relative, &[rel(0, Some(1))]);
    let yearly = TimeExtent::relative(3, Some(4), RelativeUnit::Years).unwrap();
    cat.insert_map(MapRecord::new(map_id("yearly"), MapKind::Raster, yearly)).unwrap();
    let req = RegisterRequest::new(MapKind::Raster, Some(ds.clone())).with_maps(["yearly"]);
    assert!(matches!(
        cat.register_maps(req),
        Err(CatalogError::RelativeUnitMismatch { expected: RelativeUnit::Days, found: RelativeUnit::Years, .. })
    ));
    assert!(!cat.is_map_registered(DatasetKind::Strds, &ds, &map_id("yearly")).unwrap());
    let yearly = cat.map(MapKind::Raster, &map_id("yearly")).unwrap().unwrap();
    assert!(yearly.datasets.is_empty());
}

#[test]
fn emptied_dataset_takes_the_unit_of_the_batch() {
    let mut cat = catalog();
    let ds = raster_series(&mut cat, "series", "d", TemporalType::Relative, &[rel(0, Some(1))]);
    assert!(cat.unregister(DatasetKind::Strds, &ds, &map_id("d0")).unwrap());
    let req = RegisterRequest::new(MapKind::Raster, Some(ds.clone()))
        .with_maps(["y0", "y1"])
        .with_start("2")
        .with_unit(RelativeUnit::Years)
        .with_increment("1", true);
    let report = cat.register_maps(req).unwrap();
    assert_eq!((report.inserted, report.registered), (2, 2));
    let upd = cat.require_dataset(DatasetKind::Strds, &ds).unwrap();
    assert_eq!(upd.relative_unit, Some(RelativeUnit::Years));
    assert_eq!(upd.number_of_maps, 2);
    assert_eq!(upd.extent, Some(TimeExtent::relative(2, Some(4), RelativeUnit::Years).unwrap()));
}
