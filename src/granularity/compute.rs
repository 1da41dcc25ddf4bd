//! Granularity inference for a series of extents.
//!
//! The granularity of a series is the largest step that evenly divides the
//! length of every interval and every gap between temporally adjacent
//! elements. A gap is only counted when an element starts strictly after the
//! previous element's end (or start, for an instant). Inputs are sorted by
//! start internally, so the result does not depend on input order.
//!
//! Relative series reduce to an integer GCD. Absolute series are first
//! decomposed into calendar deltas by [`compute_datetime_delta`]; the finest
//! unit seen anywhere wins, and coarser deltas are folded down into it before
//! the GCD is taken.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDateTime, Timelike};
use num_traits::{PrimInt, Signed};

use crate::catalog_error::CatalogError;
use crate::granularity::unit::{Granularity, GranularityUnit};
use crate::time::extent::TimeExtent;
use crate::time::point::{TemporalType, TimePoint};

/// Euclid's algorithm on absolute values.
pub fn gcd<T: PrimInt + Signed>(a: T, b: T) -> T {
    let (mut a, mut b) = (a.abs(), b.abs());
    while a != T::zero() {
        let r = b % a;
        b = a;
        a = r;
    }
    b
}

/// GCD of all values; `None` for an empty input.
pub fn gcd_list<T, I>(values: I) -> Option<T>
where
    T: PrimInt + Signed,
    I: IntoIterator<Item = T>,
{
    values.into_iter().reduce(gcd)
}

/// Calendar decomposition of the span between two datetimes.
///
/// Each field expresses the whole span in one unit, but only when the
/// endpoints line up on that unit's boundaries: `month` is only present
/// when both endpoints fall on the first of a month, and `day` is zero in
/// that case. `max_days` always carries the whole-day count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DatetimeDelta {
    pub second: i64,
    pub minute: i64,
    pub hour: i64,
    pub max_days: i64,
    pub day: i64,
    pub month: Option<i64>,
    pub year: i64,
}

impl DatetimeDelta {
    /// Components in finest-to-coarsest walk order.
    fn slots(&self) -> [Option<i64>; SLOTS] {
        [
            Some(self.second),
            Some(self.minute),
            Some(self.hour),
            Some(self.max_days),
            Some(self.day),
            self.month,
            Some(self.year),
        ]
    }
}

const SLOTS: usize = 7;
const MAX_DAYS: usize = 3;
const SLOT_UNITS: [Option<GranularityUnit>; SLOTS] = [
    Some(GranularityUnit::Second),
    Some(GranularityUnit::Minute),
    Some(GranularityUnit::Hour),
    None,
    Some(GranularityUnit::Day),
    Some(GranularityUnit::Month),
    Some(GranularityUnit::Year),
];

/// Factors folding a coarser slot into the assigned unit's scale.
fn fold_factors(unit: GranularityUnit) -> &'static [(usize, i64)] {
    match unit {
        GranularityUnit::Second => &[(1, 60), (2, 3_600), (4, 86_400), (MAX_DAYS, 86_400)],
        GranularityUnit::Minute => &[(2, 60), (4, 1_440), (MAX_DAYS, 1_440)],
        GranularityUnit::Hour => &[(4, 24), (MAX_DAYS, 24)],
        GranularityUnit::Day => &[(MAX_DAYS, 1)],
        GranularityUnit::Month => &[(6, 12)],
        GranularityUnit::Week | GranularityUnit::Year => &[],
    }
}

/// Decompose `end - start` into calendar units.
pub fn compute_datetime_delta(start: NaiveDateTime, end: NaiveDateTime) -> DatetimeDelta {
    let day_diff = (end - start).num_days();
    let year = i64::from(end.year() - start.year());

    let month = if start.month() == 1 && end.month() == 1 {
        Some(0)
    } else if start.day() == 1 && end.day() == 1 {
        let d = i64::from(end.month()) - i64::from(start.month());
        Some(match d.cmp(&0) {
            std::cmp::Ordering::Less => d + 12 * year,
            std::cmp::Ordering::Equal => 12 * year,
            std::cmp::Ordering::Greater => d,
        })
    } else {
        None
    };

    let day = if start.day() == 1 && end.day() == 1 { 0 } else { day_diff };

    let hour = if start.hour() == 0 && end.hour() == 0 {
        0
    } else {
        let d = i64::from(end.hour()) - i64::from(start.hour());
        if d < 0 { d + 24 + 24 * day_diff } else { d + 24 * day_diff }
    };

    let minute = if start.minute() == 0 && end.minute() == 0 {
        0
    } else {
        let d = i64::from(end.minute()) - i64::from(start.minute());
        if hour != 0 { d + 60 * hour } else { d + 24 * 60 * day_diff }
    };

    let second = if start.second() == 0 && end.second() == 0 {
        0
    } else {
        let d = i64::from(end.second()) - i64::from(start.second());
        if minute != 0 {
            d + 60 * minute
        } else if hour != 0 {
            d + 3_600 * hour
        } else {
            d + 86_400 * day_diff
        }
    };

    DatetimeDelta { second, minute, hour, max_days: day_diff, day, month, year }
}

fn sorted(extents: &[TimeExtent]) -> Vec<TimeExtent> {
    let mut v = extents.to_vec();
    v.sort_by(|a, b| a.cmp_chronological(b));
    v
}

/// Visit every interval span and every gap of a start-sorted series.
fn for_each_span<F>(extents: &[TimeExtent], mut f: F)
where
    F: FnMut(TimePoint, TimePoint),
{
    let Some(first) = extents.first() else {
        return;
    };
    let mut prev = *first;
    for ext in extents {
        if let Some(end) = ext.end() {
            f(ext.start(), end);
        }
        if ext.start() > prev.upper() {
            f(prev.upper(), ext.start());
        }
        prev = *ext;
    }
}

/// Granularity of a relative series: GCD of interval lengths and gaps, `0`
/// when there is nothing to measure.
pub fn compute_relative_granularity(extents: &[TimeExtent]) -> i64 {
    let mut deltas = BTreeSet::new();
    for_each_span(&sorted(extents), |a, b| {
        if let (Some(a), Some(b)) = (a.as_relative(), b.as_relative()) {
            deltas.insert((b - a).abs());
        }
    });
    gcd_list(deltas).unwrap_or(0)
}

/// Granularity of an absolute series, or `None` when the series has no
/// intervals and no gaps.
pub fn compute_absolute_granularity(extents: &[TimeExtent]) -> Option<Granularity> {
    let mut sets: [BTreeSet<i64>; SLOTS] = Default::default();
    for_each_span(&sorted(extents), |a, b| {
        let (Some(a), Some(b)) = (a.as_absolute(), b.as_absolute()) else {
            return;
        };
        for (idx, value) in compute_datetime_delta(a, b).slots().into_iter().enumerate() {
            match value {
                Some(v) if v > 0 => {
                    sets[idx].insert(v);
                    if idx != MAX_DAYS {
                        break;
                    }
                }
                _ => {}
            }
        }
    });

    let (slot, unit) = SLOT_UNITS
        .iter()
        .enumerate()
        .find_map(|(idx, unit)| unit.filter(|_| !sets[idx].is_empty()).map(|u| (idx, u)))?;

    let mut values: BTreeSet<i64> = sets[slot].clone();
    for &(coarser, factor) in fold_factors(unit) {
        values.extend(sets[coarser].iter().map(|v| v * factor));
    }
    let count = gcd_list(values)?;
    Some(Granularity::absolute(count, unit))
}

/// Granularity of a series of either temporal type.
///
/// Returns `Ok(None)` for an empty input or an absolute series without any
/// measurable span.
///
/// # Errors
/// `MixedTemporalTypes` when absolute and relative extents are mixed.
pub fn compute_granularity(extents: &[TimeExtent]) -> Result<Option<Granularity>, CatalogError> {
    let Some(first) = extents.first() else {
        return Ok(None);
    };
    let ttype = first.temporal_type();
    if let Some(odd) = extents.iter().find(|e| e.temporal_type() != ttype) {
        return Err(CatalogError::MixedTemporalTypes(format!(
            "granularity of a series containing {first} and {odd}"
        )));
    }
    Ok(match ttype {
        TemporalType::Relative => Some(Granularity::relative(compute_relative_granularity(extents))),
        TemporalType::Absolute => compute_absolute_granularity(extents),
    })
}
