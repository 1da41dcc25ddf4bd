//! Time points: the start and end values of a [`TimeExtent`](super::extent::TimeExtent).
//!
//! A point is either an absolute calendar timestamp or a relative integer
//! counted in some [`RelativeUnit`]. The two kinds never compare: `partial_cmp`
//! between an absolute and a relative point returns `None`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::catalog_error::CatalogError;

/// Whether a dataset or map uses calendar time or unit-scaled integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalType {
    Absolute,
    Relative,
}

impl TemporalType {
    pub fn as_str(self) -> &'static str {
        match self {
            TemporalType::Absolute => "absolute",
            TemporalType::Relative => "relative",
        }
    }
}

impl fmt::Display for TemporalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemporalType {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "absolute" => Ok(TemporalType::Absolute),
            "relative" => Ok(TemporalType::Relative),
            other => Err(CatalogError::InvalidExtent(format!(
                "unknown temporal type \"{other}\""
            ))),
        }
    }
}

/// Unit of a relative time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelativeUnit {
    Years,
    Months,
    Days,
    Hours,
    Minutes,
    Seconds,
}

impl RelativeUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            RelativeUnit::Years => "years",
            RelativeUnit::Months => "months",
            RelativeUnit::Days => "days",
            RelativeUnit::Hours => "hours",
            RelativeUnit::Minutes => "minutes",
            RelativeUnit::Seconds => "seconds",
        }
    }
}

impl fmt::Display for RelativeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelativeUnit {
    type Err = CatalogError;

    /// Accepts singular and plural spellings (`"day"`, `"days"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unit = match s.trim() {
            "year" | "years" => RelativeUnit::Years,
            "month" | "months" => RelativeUnit::Months,
            "day" | "days" => RelativeUnit::Days,
            "hour" | "hours" => RelativeUnit::Hours,
            "minute" | "minutes" => RelativeUnit::Minutes,
            "second" | "seconds" => RelativeUnit::Seconds,
            other => {
                return Err(CatalogError::InvalidExtent(format!(
                    "unknown relative time unit \"{other}\""
                )));
            }
        };
        Ok(unit)
    }
}

/// A single position on an absolute or relative time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimePoint {
    Absolute(NaiveDateTime),
    Relative(i64),
}

impl TimePoint {
    #[inline]
    pub fn temporal_type(&self) -> TemporalType {
        match self {
            TimePoint::Absolute(_) => TemporalType::Absolute,
            TimePoint::Relative(_) => TemporalType::Relative,
        }
    }

    #[inline]
    pub fn as_absolute(&self) -> Option<NaiveDateTime> {
        match *self {
            TimePoint::Absolute(dt) => Some(dt),
            TimePoint::Relative(_) => None,
        }
    }

    #[inline]
    pub fn as_relative(&self) -> Option<i64> {
        match *self {
            TimePoint::Relative(v) => Some(v),
            TimePoint::Absolute(_) => None,
        }
    }

    /// Whether both points live on the same kind of time axis.
    #[inline]
    pub fn same_kind(&self, other: &TimePoint) -> bool {
        self.temporal_type() == other.temporal_type()
    }
}

impl PartialOrd for TimePoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (TimePoint::Absolute(a), TimePoint::Absolute(b)) => Some(a.cmp(b)),
            (TimePoint::Relative(a), TimePoint::Relative(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<NaiveDateTime> for TimePoint {
    fn from(dt: NaiveDateTime) -> Self {
        TimePoint::Absolute(dt)
    }
}

impl From<i64> for TimePoint {
    fn from(v: i64) -> Self {
        TimePoint::Relative(v)
    }
}

impl fmt::Display for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimePoint::Absolute(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            TimePoint::Relative(v) => write!(f, "{v}"),
        }
    }
}
