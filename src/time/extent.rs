//! TimeExtent: a time interval or instant, plus Allen's interval relations.
//!
//! An extent has a start [`TimePoint`], an optional end, and (for relative
//! time) a [`RelativeUnit`]. An extent without an end is a time *instant*;
//! every relation predicate below carries special cases for instants.
//!
//! # Relation precedence
//!
//! Several predicates are not mutually exclusive when boundaries touch, so
//! [`TimeExtent::relation`] tests them in the fixed order of
//! [`RelationKind::PRECEDENCE`] and reports the first match. Reordering that
//! list changes observable results at interval boundaries.
//!
//! # Compatibility
//!
//! Two extents are comparable only when they share a temporal type and, for
//! relative time, the same unit. Incompatible pairs have no relation
//! (`None`); that is a legitimate query outcome, not an error.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::catalog_error::CatalogError;
use crate::debug_invariants::DebugInvariants;
use crate::granularity::unit::Granularity;
use crate::time::datetime_math::increment_datetime_by_granularity;
use crate::time::point::{RelativeUnit, TemporalType, TimePoint};

/// The thirteen temporal relations between two extents.
///
/// Each variant reads as "`self` *relation* `other`": `Before` means self
/// lies entirely before other, `Follows` means self starts where other ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Equal,
    During,
    Contains,
    Overlaps,
    Overlapped,
    After,
    Before,
    Starts,
    Finishes,
    Started,
    Finished,
    Follows,
    Precedes,
}

impl RelationKind {
    /// All relations in the order [`TimeExtent::relation`] tests them.
    pub const PRECEDENCE: [RelationKind; 13] = [
        RelationKind::Equal,
        RelationKind::During,
        RelationKind::Contains,
        RelationKind::Overlaps,
        RelationKind::Overlapped,
        RelationKind::After,
        RelationKind::Before,
        RelationKind::Starts,
        RelationKind::Finishes,
        RelationKind::Started,
        RelationKind::Finished,
        RelationKind::Follows,
        RelationKind::Precedes,
    ];

    /// The relation seen from the other operand: `a R b  <=>  b R.mirror() a`.
    pub fn mirror(self) -> RelationKind {
        match self {
            RelationKind::Equal => RelationKind::Equal,
            RelationKind::During => RelationKind::Contains,
            RelationKind::Contains => RelationKind::During,
            RelationKind::Overlaps => RelationKind::Overlapped,
            RelationKind::Overlapped => RelationKind::Overlaps,
            RelationKind::After => RelationKind::Before,
            RelationKind::Before => RelationKind::After,
            RelationKind::Starts => RelationKind::Started,
            RelationKind::Started => RelationKind::Starts,
            RelationKind::Finishes => RelationKind::Finished,
            RelationKind::Finished => RelationKind::Finishes,
            RelationKind::Follows => RelationKind::Precedes,
            RelationKind::Precedes => RelationKind::Follows,
        }
    }

    /// Dense index in [`PRECEDENCE`](Self::PRECEDENCE) order.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// `After` and `Before` are the only relations without a shared boundary.
    #[inline]
    pub fn is_disjoint(self) -> bool {
        matches!(self, RelationKind::After | RelationKind::Before)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RelationKind::Equal => "equal",
            RelationKind::During => "during",
            RelationKind::Contains => "contains",
            RelationKind::Overlaps => "overlaps",
            RelationKind::Overlapped => "overlapped",
            RelationKind::After => "after",
            RelationKind::Before => "before",
            RelationKind::Starts => "starts",
            RelationKind::Finishes => "finishes",
            RelationKind::Started => "started",
            RelationKind::Finished => "finished",
            RelationKind::Follows => "follows",
            RelationKind::Precedes => "precedes",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        RelationKind::PRECEDENCE
            .into_iter()
            .find(|k| k.as_str() == needle)
            .ok_or_else(|| CatalogError::InvalidExtent(format!("unknown temporal relation \"{s}\"")))
    }
}

static_assertions::const_assert_eq!(RelationKind::PRECEDENCE.len(), 13);

/// A time interval `[start, end)` or a time instant (`end == None`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeExtent {
    start: TimePoint,
    end: Option<TimePoint>,
    unit: Option<RelativeUnit>,
}

impl TimeExtent {
    /// Build an extent, rejecting mixed point kinds, `end < start`, and a
    /// unit on absolute time.
    ///
    /// `end == start` is accepted; such an extent is a transient state that
    /// [`is_valid_for_registration`](Self::is_valid_for_registration) rejects.
    pub fn new(
        start: TimePoint,
        end: Option<TimePoint>,
        unit: Option<RelativeUnit>,
    ) -> Result<Self, CatalogError> {
        if let Some(e) = end {
            if !start.same_kind(&e) {
                return Err(CatalogError::MixedTemporalTypes(format!(
                    "start {start} and end {e}"
                )));
            }
            if e < start {
                return Err(CatalogError::InvalidExtent(format!(
                    "end {e} lies before start {start}"
                )));
            }
        }
        if unit.is_some() && start.temporal_type() == TemporalType::Absolute {
            return Err(CatalogError::InvalidExtent(
                "absolute time extents carry no relative unit".into(),
            ));
        }
        Ok(Self { start, end, unit })
    }

    /// Absolute interval or instant.
    pub fn absolute(
        start: chrono::NaiveDateTime,
        end: Option<chrono::NaiveDateTime>,
    ) -> Result<Self, CatalogError> {
        Self::new(start.into(), end.map(Into::into), None)
    }

    /// Relative interval or instant counted in `unit`.
    pub fn relative(start: i64, end: Option<i64>, unit: RelativeUnit) -> Result<Self, CatalogError> {
        Self::new(start.into(), end.map(Into::into), Some(unit))
    }

    /// A time instant; always well-formed.
    pub fn instant(start: TimePoint, unit: Option<RelativeUnit>) -> Self {
        let unit = match start {
            TimePoint::Relative(_) => unit,
            TimePoint::Absolute(_) => None,
        };
        Self { start, end: None, unit }
    }

    #[inline]
    pub fn start(&self) -> TimePoint {
        self.start
    }

    #[inline]
    pub fn end(&self) -> Option<TimePoint> {
        self.end
    }

    #[inline]
    pub fn unit(&self) -> Option<RelativeUnit> {
        self.unit
    }

    #[inline]
    pub fn temporal_type(&self) -> TemporalType {
        self.start.temporal_type()
    }

    #[inline]
    pub fn is_instant(&self) -> bool {
        self.end.is_none()
    }

    #[inline]
    pub fn is_interval(&self) -> bool {
        self.end.is_some()
    }

    /// Latest point covered by the extent: its end, or its start for an instant.
    #[inline]
    pub fn upper(&self) -> TimePoint {
        self.end.unwrap_or(self.start)
    }

    /// A registrable extent is an instant or a strictly positive interval.
    pub fn is_valid_for_registration(&self) -> bool {
        match self.end {
            None => true,
            Some(e) => e > self.start,
        }
    }

    /// Same extent with a different relative unit (ignored for absolute time).
    pub fn with_unit(mut self, unit: Option<RelativeUnit>) -> Self {
        if self.temporal_type() == TemporalType::Relative {
            self.unit = unit;
        }
        self
    }

    /// Same start, no end.
    pub fn to_instant(&self) -> Self {
        Self { start: self.start, end: None, unit: self.unit }
    }

    /// Order by start, then by end with instants first. Incomparable points
    /// compare as equal.
    pub fn cmp_chronological(&self, other: &TimeExtent) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        let by_start = self.start.partial_cmp(&other.start).unwrap_or(Ordering::Equal);
        by_start.then_with(|| match (self.end, other.end) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        })
    }

    /// Whether relations between `self` and `other` are defined.
    pub fn is_compatible(&self, other: &TimeExtent) -> bool {
        self.temporal_type() == other.temporal_type() && self.unit == other.unit
    }

    // ------------------------------------------------------------------
    // Relation predicates
    // ------------------------------------------------------------------

    /// Same start, self ends first. Intervals only.
    pub fn starts(&self, other: &TimeExtent) -> bool {
        match (self.end, other.end) {
            (Some(e1), Some(e2)) => self.start == other.start && e1 < e2,
            _ => false,
        }
    }

    /// Same start, self ends later. Intervals only.
    pub fn started(&self, other: &TimeExtent) -> bool {
        match (self.end, other.end) {
            (Some(e1), Some(e2)) => self.start == other.start && e1 > e2,
            _ => false,
        }
    }

    /// Same end, self starts later. Intervals only.
    pub fn finishes(&self, other: &TimeExtent) -> bool {
        match (self.end, other.end) {
            (Some(e1), Some(e2)) => e1 == e2 && self.start > other.start,
            _ => false,
        }
    }

    /// Same end, self starts first. Intervals only.
    pub fn finished(&self, other: &TimeExtent) -> bool {
        match (self.end, other.end) {
            (Some(e1), Some(e2)) => e1 == e2 && self.start < other.start,
            _ => false,
        }
    }

    /// Self starts strictly after other has ended (or after an instant).
    pub fn after(&self, other: &TimeExtent) -> bool {
        match other.end {
            None => self.start > other.start,
            Some(e2) => self.start > e2,
        }
    }

    /// Self ends (or, as an instant, lies) strictly before other starts.
    pub fn before(&self, other: &TimeExtent) -> bool {
        match self.end {
            None => self.start < other.start,
            Some(e1) => e1 < other.start,
        }
    }

    /// Self starts exactly where other ends.
    pub fn follows(&self, other: &TimeExtent) -> bool {
        other.end.is_some_and(|e2| self.start == e2)
    }

    /// Self ends exactly where other starts.
    pub fn precedes(&self, other: &TimeExtent) -> bool {
        self.end.is_some_and(|e1| e1 == other.start)
    }

    /// Self and other share a boundary (one ends where the other starts).
    pub fn adjacent(&self, other: &TimeExtent) -> bool {
        if self.end.is_none() && other.end.is_none() {
            return false;
        }
        other.end.is_some_and(|e2| self.start == e2) || self.end.is_some_and(|e1| e1 == other.start)
    }

    /// Self lies inside other. An instant at other's start is inside;
    /// an interval must be strictly inside.
    pub fn during(&self, other: &TimeExtent) -> bool {
        let Some(e2) = other.end else {
            return false;
        };
        match self.end {
            None => self.start >= other.start && self.start < e2,
            Some(e1) => self.start > other.start && e1 < e2,
        }
    }

    /// Mirror of [`during`](Self::during); never true for an instant container.
    pub fn contains(&self, other: &TimeExtent) -> bool {
        let Some(e1) = self.end else {
            return false;
        };
        match other.end {
            None => self.start <= other.start && e1 > other.start,
            Some(e2) => self.start < other.start && e1 > e2,
        }
    }

    /// Two instants at the same time, or two intervals with equal bounds.
    pub fn equal(&self, other: &TimeExtent) -> bool {
        match (self.end, other.end) {
            (None, None) => self.start == other.start,
            (Some(e1), Some(e2)) => self.start == other.start && e1 == e2,
            _ => false,
        }
    }

    /// Self starts first and ends inside other.
    pub fn overlaps(&self, other: &TimeExtent) -> bool {
        match (self.end, other.end) {
            (Some(e1), Some(e2)) => self.start < other.start && e1 < e2 && e1 > other.start,
            _ => false,
        }
    }

    /// Self starts inside other and ends after it.
    pub fn overlapped(&self, other: &TimeExtent) -> bool {
        match (self.end, other.end) {
            (Some(e1), Some(e2)) => self.start > other.start && e1 > e2 && self.start < e2,
            _ => false,
        }
    }

    /// Whether `self kind other` holds, ignoring precedence.
    pub fn satisfies(&self, kind: RelationKind, other: &TimeExtent) -> bool {
        match kind {
            RelationKind::Equal => self.equal(other),
            RelationKind::During => self.during(other),
            RelationKind::Contains => self.contains(other),
            RelationKind::Overlaps => self.overlaps(other),
            RelationKind::Overlapped => self.overlapped(other),
            RelationKind::After => self.after(other),
            RelationKind::Before => self.before(other),
            RelationKind::Starts => self.starts(other),
            RelationKind::Finishes => self.finishes(other),
            RelationKind::Started => self.started(other),
            RelationKind::Finished => self.finished(other),
            RelationKind::Follows => self.follows(other),
            RelationKind::Precedes => self.precedes(other),
        }
    }

    /// The first relation in [`RelationKind::PRECEDENCE`] that holds, or
    /// `None` when the extents are incompatible.
    pub fn relation(&self, other: &TimeExtent) -> Option<RelationKind> {
        if !self.is_compatible(other) {
            return None;
        }
        RelationKind::PRECEDENCE
            .into_iter()
            .find(|&kind| self.satisfies(kind, other))
    }

    // ------------------------------------------------------------------
    // Set operations
    // ------------------------------------------------------------------

    /// Common part of two extents.
    ///
    /// `None` when the extents are disjoint (`after`/`before`) or
    /// incompatible. An instant operand yields that instant.
    pub fn intersect(&self, other: &TimeExtent) -> Option<TimeExtent> {
        match self.relation(other) {
            None | Some(RelationKind::After) | Some(RelationKind::Before) => return None,
            Some(_) => {}
        }
        if self.is_instant() {
            return Some(self.to_instant());
        }
        if other.is_instant() {
            return Some(Self::instant(other.start, self.unit));
        }
        let start = if self.start > other.start { self.start } else { other.start };
        let end = match (self.end, other.end) {
            (Some(e1), Some(e2)) => Some(if e1 > e2 { e2 } else { e1 }),
            (e, None) | (None, e) => e,
        };
        Some(Self { start, end, unit: self.unit })
    }

    /// Spanning extent of two extents, whether or not they touch.
    ///
    /// # Errors
    /// `MixedTemporalTypes` when the extents are incompatible.
    pub fn disjoint_union(&self, other: &TimeExtent) -> Result<TimeExtent, CatalogError> {
        if !self.is_compatible(other) {
            return Err(CatalogError::MixedTemporalTypes(format!(
                "cannot unite {self} with {other}"
            )));
        }
        let start = if self.start < other.start { self.start } else { other.start };
        let end = match (self.end, other.end) {
            (None, None) => {
                if self.start > other.start { self.start } else { other.start }
            }
            (None, Some(e2)) => {
                if self.start > e2 { self.start } else { e2 }
            }
            (Some(e1), None) => {
                if e1 > other.start { e1 } else { other.start }
            }
            (Some(e1), Some(e2)) => {
                if e1 < e2 { e2 } else { e1 }
            }
        };
        let end = (end != start).then_some(end);
        Ok(Self { start, end, unit: self.unit })
    }

    /// Like [`disjoint_union`](Self::disjoint_union), but `None` for
    /// disjoint or incompatible extents.
    pub fn union(&self, other: &TimeExtent) -> Option<TimeExtent> {
        match self.relation(other) {
            None | Some(RelationKind::After) | Some(RelationKind::Before) => None,
            Some(_) => self.disjoint_union(other).ok(),
        }
    }

    /// Move both bounds by `by`.
    ///
    /// Absolute extents use calendar arithmetic; relative extents add the
    /// integer granularity.
    ///
    /// # Errors
    /// `InvalidGranularity` when `by` does not match the temporal type, or
    /// `InvalidDateArithmetic` when the shifted date does not exist.
    pub fn shifted(&self, by: &Granularity) -> Result<TimeExtent, CatalogError> {
        let shift = |p: TimePoint| -> Result<TimePoint, CatalogError> {
            match (p, by) {
                (TimePoint::Absolute(dt), Granularity::Absolute { .. }) => {
                    Ok(TimePoint::Absolute(increment_datetime_by_granularity(dt, by, 1)?))
                }
                (TimePoint::Relative(v), Granularity::Relative(n)) => v
                    .checked_add(*n)
                    .map(TimePoint::Relative)
                    .ok_or_else(|| CatalogError::InvalidDateArithmetic(format!("{v} + {n} overflows"))),
                _ => Err(CatalogError::InvalidGranularity(by.to_string())),
            }
        };
        let start = shift(self.start)?;
        let end = self.end.map(shift).transpose()?;
        Self::new(start, end, self.unit)
    }
}

impl fmt::Display for TimeExtent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(e) => write!(f, "[{}, {})", self.start, e)?,
            None => write!(f, "[{}]", self.start)?,
        }
        if let Some(u) = self.unit {
            write!(f, " {u}")?;
        }
        Ok(())
    }
}

impl DebugInvariants for TimeExtent {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "TimeExtent");
    }

    fn validate_invariants(&self) -> Result<(), CatalogError> {
        if let Some(e) = self.end {
            if !e.same_kind(&self.start) {
                return Err(CatalogError::MixedTemporalTypes(self.to_string()));
            }
            if e < self.start {
                return Err(CatalogError::InvalidExtent(self.to_string()));
            }
        }
        if self.unit.is_some() && self.temporal_type() == TemporalType::Absolute {
            return Err(CatalogError::InvalidExtent(self.to_string()));
        }
        Ok(())
    }
}
