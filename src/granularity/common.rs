//! Common granularity of several series and unit conversion.

use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::catalog_error::CatalogError;
use crate::granularity::compute::gcd_list;
use crate::granularity::unit::{Granularity, GranularityUnit};

/// GCD of relative granularities; `None` for an empty list.
pub fn compute_common_relative_granularity(grans: &[i64]) -> Option<i64> {
    gcd_list(grans.iter().copied())
}

/// Common absolute granularity of several granularities.
///
/// The finest unit present wins. For every coarser unit only its smallest
/// value is folded down, with months counted as 28, 29, 30 and 31 days and
/// years as 365 and 366 days, so the result divides every calendar length.
/// Weeks count as seven days.
///
/// # Errors
/// `InvalidGranularity` if any entry is relative.
pub fn compute_common_granularity(grans: &[Granularity]) -> Result<Option<Granularity>, CatalogError> {
    // Values per unit, weeks already folded into days.
    let mut by_unit: [Vec<i64>; 7] = Default::default();
    for g in grans {
        match *g {
            Granularity::Absolute { count, unit: GranularityUnit::Week } => {
                by_unit[GranularityUnit::Day as usize].push(count * 7)
            }
            Granularity::Absolute { count, unit } => by_unit[unit as usize].push(count),
            Granularity::Relative(_) => return Err(CatalogError::InvalidGranularity(g.to_string())),
        }
    }
    let smallest = |u: GranularityUnit| by_unit[u as usize].iter().copied().min();

    let Some(finest) = GranularityUnit::ALL
        .into_iter()
        .find(|&u| !by_unit[u as usize].is_empty())
    else {
        return Ok(None);
    };

    // Length of one coarser unit in `finest` units, as alternatives.
    let scale = |coarser: GranularityUnit| -> Vec<i64> {
        let per_day: i64 = match finest {
            GranularityUnit::Second => 86_400,
            GranularityUnit::Minute => 1_440,
            GranularityUnit::Hour => 24,
            _ => 1,
        };
        match (finest, coarser) {
            (GranularityUnit::Second, GranularityUnit::Minute) => vec![60],
            (GranularityUnit::Second, GranularityUnit::Hour) => vec![3_600],
            (GranularityUnit::Minute, GranularityUnit::Hour) => vec![60],
            (GranularityUnit::Month, GranularityUnit::Year) => vec![12],
            (_, GranularityUnit::Day) => vec![per_day],
            (_, GranularityUnit::Month) => [28, 29, 30, 31].iter().map(|d| d * per_day).collect(),
            (_, GranularityUnit::Year) => [365, 366].iter().map(|d| d * per_day).collect(),
            _ => Vec::new(),
        }
    };

    let mut values = by_unit[finest as usize].clone();
    for coarser in GranularityUnit::ALL.into_iter().filter(|&u| u > finest) {
        if let Some(min) = smallest(coarser) {
            values.extend(scale(coarser).into_iter().map(|f| f * min));
        }
    }
    Ok(gcd_list(values).map(|count| Granularity::absolute(count, finest)))
}

/// Common granularity that also respects the start phase of each series.
///
/// Starting from [`compute_common_granularity`] with unit `U`, every start
/// date is compared on the calendar components finer than or equal to `U`,
/// finest first. The first component on which the start dates disagree
/// degrades the result to one of that unit. A count that exceeds the next
/// unit in the hierarchy (60 seconds, 60 minutes, 24 hours, 365 days,
/// 12 months) is clamped to that ceiling when it divides evenly, else to 1.
pub fn compute_common_granularity_aligned(
    grans: &[Granularity],
    start_dates: &[NaiveDateTime],
) -> Result<Option<Granularity>, CatalogError> {
    let Some(common) = compute_common_granularity(grans)? else {
        return Ok(None);
    };
    let Granularity::Absolute { count, unit } = common else {
        return Ok(Some(common));
    };
    let Some(first) = start_dates.first() else {
        return Ok(Some(common));
    };

    let phases: [(GranularityUnit, fn(&NaiveDateTime) -> u32); 5] = [
        (GranularityUnit::Second, |d| d.second()),
        (GranularityUnit::Minute, |d| d.minute()),
        (GranularityUnit::Hour, |d| d.hour()),
        (GranularityUnit::Day, |d| d.day()),
        (GranularityUnit::Month, |d| d.month()),
    ];
    for (phase_unit, component) in phases {
        if phase_unit > unit {
            break;
        }
        if start_dates.iter().any(|d| component(d) != component(first)) {
            return Ok(Some(Granularity::absolute(1, phase_unit)));
        }
    }

    let ceiling = match unit {
        GranularityUnit::Second | GranularityUnit::Minute => Some(60),
        GranularityUnit::Hour => Some(24),
        GranularityUnit::Day => Some(365),
        GranularityUnit::Month => Some(12),
        _ => None,
    };
    let count = match ceiling {
        Some(c) if count > c => {
            if count % c == 0 { c } else { 1 }
        }
        _ => count,
    };
    Ok(Some(Granularity::absolute(count, unit)))
}

/// Convert `value` of `from` into `to` using the fixed calendar hierarchy
/// year = 12 months, month = 30.436875 days, day = 24 hours, hour = 60
/// minutes, minute = 60 seconds.
///
/// # Errors
/// `GranularityConversion` when `to` is coarser than `from` or either unit
/// is a week.
pub fn convert_granularity(
    value: f64,
    from: GranularityUnit,
    to: GranularityUnit,
) -> Result<f64, CatalogError> {
    let err = || CatalogError::GranularityConversion {
        from: from.plural().to_string(),
        to: to.plural().to_string(),
    };
    if from == GranularityUnit::Week || to == GranularityUnit::Week || to > from {
        return Err(err());
    }
    let step = |u: GranularityUnit| -> Option<(f64, GranularityUnit)> {
        match u {
            GranularityUnit::Year => Some((12.0, GranularityUnit::Month)),
            GranularityUnit::Month => Some((30.436875, GranularityUnit::Day)),
            GranularityUnit::Day => Some((24.0, GranularityUnit::Hour)),
            GranularityUnit::Hour => Some((60.0, GranularityUnit::Minute)),
            GranularityUnit::Minute => Some((60.0, GranularityUnit::Second)),
            GranularityUnit::Second | GranularityUnit::Week => None,
        }
    };
    let mut out = value;
    let mut unit = from;
    while unit != to {
        let (factor, next) = step(unit).ok_or_else(err)?;
        out *= factor;
        unit = next;
    }
    Ok(out)
}
