//! Granularity values and their string form.
//!
//! Absolute granularities are written `"<positive integer> <unit>"` with the
//! unit singular or plural (`"1 month"`, `"6 hours"`). Relative
//! granularities are a bare non-negative integer counted in the dataset's
//! relative unit.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::catalog_error::CatalogError;
use crate::time::point::TemporalType;

/// Calendar unit of an absolute granularity, ordered finest to coarsest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GranularityUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl GranularityUnit {
    pub const ALL: [GranularityUnit; 7] = [
        GranularityUnit::Second,
        GranularityUnit::Minute,
        GranularityUnit::Hour,
        GranularityUnit::Day,
        GranularityUnit::Week,
        GranularityUnit::Month,
        GranularityUnit::Year,
    ];

    pub fn singular(self) -> &'static str {
        match self {
            GranularityUnit::Second => "second",
            GranularityUnit::Minute => "minute",
            GranularityUnit::Hour => "hour",
            GranularityUnit::Day => "day",
            GranularityUnit::Week => "week",
            GranularityUnit::Month => "month",
            GranularityUnit::Year => "year",
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            GranularityUnit::Second => "seconds",
            GranularityUnit::Minute => "minutes",
            GranularityUnit::Hour => "hours",
            GranularityUnit::Day => "days",
            GranularityUnit::Week => "weeks",
            GranularityUnit::Month => "months",
            GranularityUnit::Year => "years",
        }
    }

    /// `"1 day"`, `"3 days"`.
    pub fn format_count(self, count: i64) -> String {
        if count == 1 {
            format!("{count} {}", self.singular())
        } else {
            format!("{count} {}", self.plural())
        }
    }
}

impl fmt::Display for GranularityUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.singular())
    }
}

impl FromStr for GranularityUnit {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        GranularityUnit::ALL
            .into_iter()
            .find(|u| u.singular() == s || u.plural() == s)
            .ok_or_else(|| CatalogError::InvalidGranularity(s.to_string()))
    }
}

/// A granularity: the step that evenly divides every interval and gap of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Granularity {
    Absolute { count: i64, unit: GranularityUnit },
    Relative(i64),
}

impl Granularity {
    pub fn absolute(count: i64, unit: GranularityUnit) -> Self {
        Granularity::Absolute { count, unit }
    }

    pub fn relative(count: i64) -> Self {
        Granularity::Relative(count)
    }

    /// Parse a granularity string for a series of the given temporal type.
    ///
    /// # Errors
    /// `InvalidGranularity` echoing `s` when it does not follow the format
    /// for `ttype`.
    pub fn parse(s: &str, ttype: TemporalType) -> Result<Self, CatalogError> {
        let invalid = || CatalogError::InvalidGranularity(s.to_string());
        match ttype {
            TemporalType::Relative => {
                let n: i64 = s.trim().parse().map_err(|_| invalid())?;
                if n < 0 {
                    return Err(invalid());
                }
                Ok(Granularity::Relative(n))
            }
            TemporalType::Absolute => {
                let mut parts = s.split_whitespace();
                let (Some(num), Some(unit), None) = (parts.next(), parts.next(), parts.next())
                else {
                    return Err(invalid());
                };
                let count: i64 = num.parse().map_err(|_| invalid())?;
                if count <= 0 {
                    return Err(invalid());
                }
                let unit = unit.parse::<GranularityUnit>().map_err(|_| invalid())?;
                Ok(Granularity::Absolute { count, unit })
            }
        }
    }

    /// Whether `s` is a valid granularity for `ttype`.
    pub fn is_valid_str(s: &str, ttype: TemporalType) -> bool {
        Self::parse(s, ttype).is_ok()
    }

    pub fn temporal_type(&self) -> TemporalType {
        match self {
            Granularity::Absolute { .. } => TemporalType::Absolute,
            Granularity::Relative(_) => TemporalType::Relative,
        }
    }

    pub fn count(&self) -> i64 {
        match *self {
            Granularity::Absolute { count, .. } => count,
            Granularity::Relative(n) => n,
        }
    }

    /// A zero step cannot partition an extent.
    pub fn is_zero(&self) -> bool {
        self.count() == 0
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Granularity::Absolute { count, unit } => f.write_str(&unit.format_count(count)),
            Granularity::Relative(n) => write!(f, "{n}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_absolute() {
        let g = Granularity::parse("3 months", TemporalType::Absolute).unwrap();
        assert_eq!(g, Granularity::absolute(3, GranularityUnit::Month));
        assert_eq!(g.to_string(), "3 months");
        let g = Granularity::parse("1 day", TemporalType::Absolute).unwrap();
        assert_eq!(g.to_string(), "1 day");
    }

    #[test]
    fn parse_rejects_malformed() {
        for bad in ["", "month", "0 days", "-1 days", "1.5 days", "2 fortnights", "1 day 2"] {
            assert_eq!(
                Granularity::parse(bad, TemporalType::Absolute),
                Err(CatalogError::InvalidGranularity(bad.to_string())),
                "{bad:?}"
            );
        }
        assert!(Granularity::parse("1 day", TemporalType::Relative).is_err());
        assert!(Granularity::parse("-2", TemporalType::Relative).is_err());
        assert_eq!(
            Granularity::parse("0", TemporalType::Relative).unwrap(),
            Granularity::Relative(0)
        );
    }
}
