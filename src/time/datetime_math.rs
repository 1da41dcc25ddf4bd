//! Calendar arithmetic on absolute time points.
//!
//! Increments are written as comma separated `"<n> <unit>"` parts, for
//! example `"1 month, 2 days"`. Fixed-length units (seconds to weeks) are
//! added as durations. Months and years keep the day of month and time of
//! day; a target day that does not exist in the target month (Jan 31 plus
//! one month) is an error rather than being clamped.

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta, Timelike};

use crate::catalog_error::CatalogError;
use crate::granularity::unit::{Granularity, GranularityUnit};
use crate::time::point::TimePoint;

/// A calendar delta split by unit, as parsed from an increment string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalendarDelta {
    pub years: i64,
    pub months: i64,
    pub weeks: i64,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl CalendarDelta {
    /// Parse `"60 seconds, 4 minutes, 1 year"`. Repeated units accumulate.
    ///
    /// # Errors
    /// `InvalidGranularity` echoing the whole string on any malformed part.
    pub fn parse(s: &str) -> Result<Self, CatalogError> {
        let invalid = || CatalogError::InvalidGranularity(s.to_string());
        let mut delta = CalendarDelta::default();
        for part in s.split(',') {
            let mut tokens = part.split_whitespace();
            let (Some(num), Some(unit), None) = (tokens.next(), tokens.next(), tokens.next())
            else {
                return Err(invalid());
            };
            let n: i64 = num.parse().map_err(|_| invalid())?;
            let unit: GranularityUnit = unit.parse().map_err(|_| invalid())?;
            let slot = delta.slot_mut(unit);
            *slot = slot.checked_add(n).ok_or_else(invalid)?;
        }
        Ok(delta)
    }

    /// A delta of `count` units.
    pub fn from_unit(unit: GranularityUnit, count: i64) -> Self {
        let mut delta = CalendarDelta::default();
        *delta.slot_mut(unit) = count;
        delta
    }

    /// The delta described by an absolute granularity.
    ///
    /// # Errors
    /// `InvalidGranularity` for a relative granularity.
    pub fn from_granularity(gran: &Granularity) -> Result<Self, CatalogError> {
        match *gran {
            Granularity::Absolute { count, unit } => Ok(Self::from_unit(unit, count)),
            Granularity::Relative(_) => Err(CatalogError::InvalidGranularity(gran.to_string())),
        }
    }

    fn slot_mut(&mut self, unit: GranularityUnit) -> &mut i64 {
        match unit {
            GranularityUnit::Second => &mut self.seconds,
            GranularityUnit::Minute => &mut self.minutes,
            GranularityUnit::Hour => &mut self.hours,
            GranularityUnit::Day => &mut self.days,
            GranularityUnit::Week => &mut self.weeks,
            GranularityUnit::Month => &mut self.months,
            GranularityUnit::Year => &mut self.years,
        }
    }

    fn slot(&self, unit: GranularityUnit) -> i64 {
        match unit {
            GranularityUnit::Second => self.seconds,
            GranularityUnit::Minute => self.minutes,
            GranularityUnit::Hour => self.hours,
            GranularityUnit::Day => self.days,
            GranularityUnit::Week => self.weeks,
            GranularityUnit::Month => self.months,
            GranularityUnit::Year => self.years,
        }
    }

    /// Multiply every component by `factor`.
    pub fn scaled(self, factor: i64) -> Result<Self, CatalogError> {
        let mut out = CalendarDelta::default();
        for unit in GranularityUnit::ALL {
            *out.slot_mut(unit) = self.slot(unit).checked_mul(factor).ok_or_else(|| {
                CatalogError::InvalidDateArithmetic(format!("{} x {factor} overflows", unit.plural()))
            })?;
        }
        Ok(out)
    }

    /// The finest unit with a non-zero component.
    pub fn finest_unit(&self) -> Option<GranularityUnit> {
        GranularityUnit::ALL.into_iter().find(|&u| self.slot(u) != 0)
    }

    /// Apply the delta to `dt`.
    ///
    /// Month and year shifts are each computed against `dt` and then summed
    /// with the fixed-length part.
    ///
    /// # Errors
    /// `InvalidDateArithmetic` when a shifted date does not exist or the
    /// result is out of range.
    pub fn apply(&self, dt: NaiveDateTime) -> Result<NaiveDateTime, CatalogError> {
        let overflow = || CatalogError::InvalidDateArithmetic(format!("{dt} + {self:?} is out of range"));
        let fixed = [
            TimeDelta::try_seconds(self.seconds),
            TimeDelta::try_minutes(self.minutes),
            TimeDelta::try_hours(self.hours),
            TimeDelta::try_days(self.days),
            TimeDelta::try_weeks(self.weeks),
        ];
        let mut total = TimeDelta::zero();
        for part in fixed {
            total = total.checked_add(&part.ok_or_else(overflow)?).ok_or_else(overflow)?;
        }
        total = total
            .checked_add(&month_shift(dt, self.months)?)
            .ok_or_else(overflow)?;
        total = total
            .checked_add(&year_shift(dt, self.years)?)
            .ok_or_else(overflow)?;
        dt.checked_add_signed(total).ok_or_else(overflow)
    }
}

fn shifted_date(dt: NaiveDateTime, year: i64, month: u32) -> Result<NaiveDateTime, CatalogError> {
    let year = i32::try_from(year)
        .map_err(|_| CatalogError::InvalidDateArithmetic(format!("year {year} is out of range")))?;
    NaiveDate::from_ymd_opt(year, month, dt.day())
        .map(|d| d.and_time(dt.time()))
        .ok_or_else(|| {
            CatalogError::InvalidDateArithmetic(format!(
                "day {} does not exist in {year:04}-{month:02}",
                dt.day()
            ))
        })
}

fn month_shift(dt: NaiveDateTime, months: i64) -> Result<TimeDelta, CatalogError> {
    if months == 0 {
        return Ok(TimeDelta::zero());
    }
    let total = i64::from(dt.year()) * 12 + i64::from(dt.month0()) + months;
    let month = u32::try_from(total.rem_euclid(12) + 1).unwrap_or(1);
    let target = shifted_date(dt, total.div_euclid(12), month)?;
    Ok(target - dt)
}

fn year_shift(dt: NaiveDateTime, years: i64) -> Result<TimeDelta, CatalogError> {
    if years == 0 {
        return Ok(TimeDelta::zero());
    }
    let target = shifted_date(dt, i64::from(dt.year()) + years, dt.month())?;
    Ok(target - dt)
}

/// `dt + mult * increment`, where `increment` is an increment string.
pub fn increment_datetime_by_string(
    dt: NaiveDateTime,
    increment: &str,
    mult: i64,
) -> Result<NaiveDateTime, CatalogError> {
    CalendarDelta::parse(increment)?.scaled(mult)?.apply(dt)
}

/// `dt - mult * increment`, where `increment` is an increment string.
pub fn decrement_datetime_by_string(
    dt: NaiveDateTime,
    increment: &str,
    mult: i64,
) -> Result<NaiveDateTime, CatalogError> {
    let neg = mult
        .checked_neg()
        .ok_or_else(|| CatalogError::InvalidDateArithmetic(format!("multiplier {mult} overflows")))?;
    CalendarDelta::parse(increment)?.scaled(neg)?.apply(dt)
}

/// `dt + mult * gran` for an absolute granularity.
pub fn increment_datetime_by_granularity(
    dt: NaiveDateTime,
    gran: &Granularity,
    mult: i64,
) -> Result<NaiveDateTime, CatalogError> {
    CalendarDelta::from_granularity(gran)?.scaled(mult)?.apply(dt)
}

/// Truncate `dt` to the start of the enclosing `unit`.
///
/// Weeks start on Monday 00:00:00; months on the first day; years on
/// January 1st.
pub fn truncate_to_unit(dt: NaiveDateTime, unit: GranularityUnit) -> NaiveDateTime {
    let date = dt.date();
    let midnight = |d: NaiveDate| d.and_hms_opt(0, 0, 0).unwrap_or(dt);
    match unit {
        GranularityUnit::Second => dt.with_nanosecond(0).unwrap_or(dt),
        GranularityUnit::Minute => date.and_hms_opt(dt.hour(), dt.minute(), 0).unwrap_or(dt),
        GranularityUnit::Hour => date.and_hms_opt(dt.hour(), 0, 0).unwrap_or(dt),
        GranularityUnit::Day => midnight(date),
        GranularityUnit::Week => {
            let back = i64::from(date.weekday().num_days_from_monday());
            let monday = date
                .checked_sub_signed(TimeDelta::days(back))
                .unwrap_or(date);
            midnight(monday)
        }
        GranularityUnit::Month => midnight(date.with_day(1).unwrap_or(date)),
        GranularityUnit::Year => {
            midnight(NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date))
        }
    }
}

/// Move `dt` back to the start of the granule described by `granularity`,
/// using the finest unit that appears in the string.
///
/// # Errors
/// `InvalidGranularity` when the string cannot be parsed.
pub fn adjust_datetime_to_granularity(
    dt: NaiveDateTime,
    granularity: &str,
) -> Result<NaiveDateTime, CatalogError> {
    let delta = CalendarDelta::parse(granularity)?;
    Ok(match delta.finest_unit() {
        Some(unit) => truncate_to_unit(dt, unit),
        None => dt,
    })
}

/// Parse an ISO-like datetime string.
///
/// Accepted forms: `YYYY-mm-dd`, `YYYY-mm-dd HH:MM[:SS[.f]]` and the same
/// with a `T` separator. Dates before Christ and time zones are rejected.
pub fn parse_datetime(s: &str) -> Result<NaiveDateTime, CatalogError> {
    let s = s.trim();
    let invalid = || CatalogError::InvalidDatetime(s.to_string());
    if s.is_empty() || s.to_ascii_lowercase().contains("bc") || s.contains('+') || s.ends_with('Z') {
        return Err(invalid());
    }
    if s.parse::<i64>().is_ok() {
        return Err(invalid());
    }
    if !s.contains(':') && !s.contains('T') {
        return NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or_else(invalid);
    }
    const FORMATS: [&str; 6] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .ok_or_else(invalid)
}

/// Parse a time point: a bare integer is relative, anything else must be a
/// datetime.
pub fn parse_time_point(s: &str) -> Result<TimePoint, CatalogError> {
    let s = s.trim();
    match s.parse::<i64>() {
        Ok(v) => Ok(TimePoint::Relative(v)),
        Err(_) => parse_datetime(s).map(TimePoint::Absolute),
    }
}
