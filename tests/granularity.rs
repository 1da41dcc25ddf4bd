use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use stds_catalog::granularity::{
    compute_common_granularity, compute_common_granularity_aligned, convert_granularity,
};
use stds_catalog::prelude::*;

mod util;
use util::*;

/// Non-overlapping relative series from (length, gap) pairs.
fn series(parts: &[(i64, i64)]) -> Vec<TimeExtent> {
    let mut start = 0;
    parts
        .iter()
        .map(|&(len, gap)| {
            let ext = rel(start, Some(start + len));
            start += len + gap;
            ext
        })
        .collect()
}

#[test]
fn equal_lengths_without_gaps() {
    let maps = series(&[(3, 0), (3, 0), (3, 0)]);
    assert_eq!(compute_granularity(&maps).unwrap(), Some(Granularity::relative(3)));
}

#[test]
fn whole_months_report_months() {
    let maps = [
        abs(dt(2001, 1, 1), Some(dt(2001, 2, 1))),
        abs(dt(2001, 2, 1), Some(dt(2001, 3, 1))),
        abs(dt(2001, 4, 1), Some(dt(2001, 6, 1))),
    ];
    let g = compute_granularity(&maps).unwrap().unwrap();
    assert_eq!(g, Granularity::absolute(1, GranularityUnit::Month));
    assert_eq!(g.to_string(), "1 month");
}

#[test]
fn shuffled_absolute_series_keeps_granularity() {
    let mut maps: Vec<TimeExtent> = (0..12)
        .map(|i| {
            let s = dt(2001, 1, 1) + chrono::Duration::hours(6 * i);
            abs(s, Some(s + chrono::Duration::hours(6)))
        })
        .collect();
    let expected = compute_granularity(&maps).unwrap();
    assert_eq!(expected.map(|g| g.to_string()), Some("6 hours".to_string()));
    let mut rng = SmallRng::seed_from_u64(7);
    for _ in 0..5 {
        maps.shuffle(&mut rng);
        assert_eq!(compute_granularity(&maps).unwrap(), expected);
    }
}

#[test]
fn common_granularity_of_several_series() {
    let grans = [
        Granularity::absolute(1, GranularityUnit::Month),
        Granularity::absolute(2, GranularityUnit::Week),
    ];
    let common = compute_common_granularity(&grans).unwrap().unwrap();
    assert_eq!(common, Granularity::absolute(1, GranularityUnit::Day));

    let starts = [dt(2001, 1, 1), dt(2001, 1, 1)];
    let months = [Granularity::absolute(3, GranularityUnit::Month)];
    assert_eq!(
        compute_common_granularity_aligned(&months, &starts).unwrap(),
        Some(Granularity::absolute(3, GranularityUnit::Month))
    );
}

#[test]
fn week_conversion_is_rejected() {
    assert!(matches!(
        convert_granularity(1.0, GranularityUnit::Week, GranularityUnit::Day),
        Err(CatalogError::GranularityConversion { .. })
    ));
    assert_eq!(convert_granularity(2.0, GranularityUnit::Hour, GranularityUnit::Minute).unwrap(), 120.0);
}

#[test]
fn granularity_strings() {
    assert!(Granularity::is_valid_str("2 months", TemporalType::Absolute));
    assert!(Granularity::is_valid_str("5", TemporalType::Relative));
    assert!(!Granularity::is_valid_str("5", TemporalType::Absolute));
    assert!(!Granularity::is_valid_str("0 days", TemporalType::Absolute));
    let err = Granularity::parse("a fortnight", TemporalType::Absolute).unwrap_err();
    assert_eq!(err, CatalogError::InvalidGranularity("a fortnight".into()));
}

proptest! {
    #[test]
    fn relative_granularity_ignores_order(
        parts in prop::collection::vec((1i64..6, 0i64..4), 1..12),
        seed in any::<u64>(),
    ) {
        let sorted = series(&parts.iter().map(|&(l, g)| (l * 2, g * 2)).collect::<Vec<_>>());
        let mut shuffled = sorted.clone();
        shuffled.shuffle(&mut SmallRng::seed_from_u64(seed));
        let g = compute_granularity(&shuffled).unwrap();
        prop_assert_eq!(g, compute_granularity(&sorted).unwrap());
        prop_assert_eq!(g.map(|g| g.count() % 2), Some(0));
    }
}
