use stds_catalog::prelude::*;

mod util;
use util::*;

fn names(samples: &[Sample]) -> Vec<Vec<String>> {
    samples.iter().map(|s| slot_names(&s.samples)).collect()
}

fn grid_and_obs(cat: &mut Catalog<InMemoryStore>, obs: &[TimeExtent]) -> (DatasetId, DatasetId) {
    let grid = raster_series(cat, "grid", "g", TemporalType::Relative, &[rel(0, Some(10)), rel(20, Some(30))]);
    let target = raster_series(cat, "obs", "o", TemporalType::Relative, obs);
    (target, grid)
}

#[test]
fn gaps_between_granules_are_sampled_too() {
    let mut cat = catalog();
    let (target, grid) = grid_and_obs(&mut cat, &[rel(2, Some(4)), rel(12, Some(14))]);
    for use_predicates in [false, true] {
        let opts = SampleOptions { use_predicates, ..SampleOptions::default() };
        let out = cat
            .sample_by_dataset(DatasetKind::Strds, &target, DatasetKind::Strds, &grid, &opts)
            .unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(names(&out), vec![vec!["o0"], vec!["o1"], vec!["-"]]);
        assert!(out[1].granule.is_gap());
        assert_eq!(out[1].granule.extent, rel(10, Some(20)));
        assert!(out[2].is_empty());
        assert_eq!(out[2].samples[0].extent, rel(20, Some(30)));
    }
}

#[test]
fn start_method_differs_between_strategies() {
    let mut cat = catalog();
    let (target, grid) = grid_and_obs(&mut cat, &[rel(-5, Some(5)), rel(3, Some(6)), rel(8, Some(25))]);
    let opts = SampleOptions::with_methods(&[SampleMethod::Start]);
    let out = cat
        .sample_by_dataset(DatasetKind::Strds, &target, DatasetKind::Strds, &grid, &opts)
        .unwrap();
    // The granule is overlapped by o0 and contains o1.
    assert_eq!(slot_names(&out[0].samples), vec!["o0", "o1"]);

    let opts = SampleOptions { use_predicates: true, ..opts };
    let out = cat
        .sample_by_dataset(DatasetKind::Strds, &target, DatasetKind::Strds, &grid, &opts)
        .unwrap();
    // Maps starting inside [0, 10).
    assert_eq!(slot_names(&out[0].samples), vec!["o1", "o2"]);
}

#[test]
fn instants_are_sampled_by_start() {
    let mut cat = catalog();
    let (target, grid) = grid_and_obs(&mut cat, &[rel(5, None), rel(25, None)]);
    let opts = SampleOptions { use_predicates: true, ..SampleOptions::with_methods(&[SampleMethod::Equal]) };
    let out = cat
        .sample_by_dataset(DatasetKind::Strds, &target, DatasetKind::Strds, &grid, &opts)
        .unwrap();
    assert_eq!(names(&out), vec![vec!["o0"], vec!["-"], vec!["o1"]]);
}

#[test]
fn spatial_sampling_requires_overlapping_boxes() {
    let mut cat = catalog();
    let near = SpatialExtent::new_2d(10.0, 0.0, 10.0, 0.0);
    let far = SpatialExtent::new_2d(110.0, 100.0, 110.0, 100.0);
    let grid = ds_id("grid");
    cat.create_dataset(grid.clone(), DatasetKind::Strds, TemporalType::Relative, "mean", "", "")
        .unwrap();
    cat.insert_map(MapRecord::new(map_id("g0"), MapKind::Raster, rel(0, Some(10))).with_spatial(near))
        .unwrap();
    cat.register(DatasetKind::Strds, &grid, &map_id("g0")).unwrap();
    let obs = ds_id("obs");
    cat.create_dataset(obs.clone(), DatasetKind::Strds, TemporalType::Relative, "mean", "", "")
        .unwrap();
    for (name, bbox) in [("near", near), ("far", far)] {
        cat.insert_map(MapRecord::new(map_id(name), MapKind::Raster, rel(2, Some(4))).with_spatial(bbox))
            .unwrap();
        cat.register(DatasetKind::Strds, &obs, &map_id(name)).unwrap();
    }
    cat.update_from_registered_maps(DatasetKind::Strds, &grid).unwrap();
    cat.update_from_registered_maps(DatasetKind::Strds, &obs).unwrap();

    for use_predicates in [false, true] {
        let opts = SampleOptions { spatial: true, use_predicates, ..SampleOptions::default() };
        let out = cat
            .sample_by_dataset(DatasetKind::Strds, &obs, DatasetKind::Strds, &grid, &opts)
            .unwrap();
        assert_eq!(names(&out), vec![vec!["near"]]);
    }
}

#[test]
fn sampler_must_hold_intervals() {
    let mut cat = catalog();
    let grid = raster_series(&mut cat, "grid", "g", TemporalType::Relative, &[rel(0, None), rel(5, Some(10))]);
    let target = raster_series(&mut cat, "obs", "o", TemporalType::Relative, &[rel(2, Some(3))]);
    let err = cat
        .sample_by_dataset(DatasetKind::Strds, &target, DatasetKind::Strds, &grid, &SampleOptions::default())
        .unwrap_err();
    assert_eq!(err, CatalogError::SamplerNotInterval("grid@PERMANENT".into()));
}

#[test]
fn sampler_and_target_share_a_temporal_type() {
    let mut cat = catalog();
    let grid = raster_series(&mut cat, "grid", "g", TemporalType::Relative, &[rel(0, Some(10))]);
    let target = raster_series(
        &mut cat,
        "obs",
        "o",
        TemporalType::Absolute,
        &[abs(dt(2001, 1, 1), Some(dt(2001, 1, 2)))],
    );
    assert!(matches!(
        cat.sample_by_dataset(DatasetKind::Strds, &target, DatasetKind::Strds, &grid, &SampleOptions::default()),
        Err(CatalogError::MixedTemporalTypes(_))
    ));
}

#[test]
fn empty_sampler_yields_nothing() {
    let mut cat = catalog();
    let grid = raster_series(&mut cat, "grid", "g", TemporalType::Relative, &[]);
    let target = raster_series(&mut cat, "obs", "o", TemporalType::Relative, &[rel(2, Some(3))]);
    let out = cat
        .sample_by_dataset(DatasetKind::Strds, &target, DatasetKind::Strds, &grid, &SampleOptions::default())
        .unwrap();
    assert!(out.is_empty());
}

#[test]
fn options_deserialize_with_defaults() {
    let opts: SampleOptions = serde_json::from_str(r#"{"methods": ["start"], "spatial": true}"#).unwrap();
    assert_eq!(opts.methods, vec![SampleMethod::Start]);
    assert!(opts.spatial);
    assert!(!opts.use_predicates);
}
