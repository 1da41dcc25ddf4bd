//! Temporal where-clauses selecting maps relative to a time window.
//!
//! A [`TemporalFilter`] is a disjunction of relation clauses over the map
//! columns `start`/`end` and the window bounds `S`/`E`. The same clause
//! table drives [`TemporalFilter::matches`] on extents,
//! [`TemporalFilter::matches_row`] on stored map rows and
//! [`TemporalFilter::to_sql`] (rendered with bound parameters), so the
//! three never disagree.
//!
//! | flag | clause |
//! |---|---|
//! | `use_start` | `start >= S and start < E` |
//! | `use_during` | `(start > S and end < E) or (start >= S and end < E) or (start > S and end <= E)` |
//! | `use_overlap` | `(start < S and end > S and end < E) or (start < E and start > S and end > E)` |
//! | `use_contain` | `(start < S and end > E) or (start <= S and end > E) or (start < S and end >= E)` |
//! | `use_equal` | `start = S and end = E` |
//! | `use_follows` | `start = E` |
//! | `use_precedes` | `end = S` |
//!
//! A map without an end time never satisfies a clause on `end`.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::catalog::store::{ParamStyle, Row, Value};
use crate::time::extent::TimeExtent;
use crate::time::point::{TemporalType, TimePoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Col {
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    S,
    E,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
}

impl Op {
    fn sql(self) -> &'static str {
        match self {
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Eq => "=",
            Op::Ge => ">=",
            Op::Gt => ">",
        }
    }

    fn holds(self, ord: Ordering) -> bool {
        match self {
            Op::Lt => ord == Ordering::Less,
            Op::Le => ord != Ordering::Greater,
            Op::Eq => ord == Ordering::Equal,
            Op::Ge => ord != Ordering::Less,
            Op::Gt => ord == Ordering::Greater,
        }
    }
}

type Cmp = (Col, Op, Bound);

use Bound::{E, S};
use Col::{End, Start};

const START: &[&[Cmp]] = &[&[(Start, Op::Ge, S), (Start, Op::Lt, E)]];
const DURING: &[&[Cmp]] = &[
    &[(Start, Op::Gt, S), (End, Op::Lt, E)],
    &[(Start, Op::Ge, S), (End, Op::Lt, E)],
    &[(Start, Op::Gt, S), (End, Op::Le, E)],
];
const OVERLAP: &[&[Cmp]] = &[
    &[(Start, Op::Lt, S), (End, Op::Gt, S), (End, Op::Lt, E)],
    &[(Start, Op::Lt, E), (Start, Op::Gt, S), (End, Op::Gt, E)],
];
const CONTAIN: &[&[Cmp]] = &[
    &[(Start, Op::Lt, S), (End, Op::Gt, E)],
    &[(Start, Op::Le, S), (End, Op::Gt, E)],
    &[(Start, Op::Lt, S), (End, Op::Ge, E)],
];
const EQUAL: &[&[Cmp]] = &[&[(Start, Op::Eq, S), (End, Op::Eq, E)]];
const FOLLOWS: &[&[Cmp]] = &[&[(Start, Op::Eq, E)]];
const PRECEDES: &[&[Cmp]] = &[&[(End, Op::Eq, S)]];

/// Selects maps by their temporal relation to `window`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemporalFilter {
    pub window: TimeExtent,
    pub use_start: bool,
    pub use_during: bool,
    pub use_overlap: bool,
    pub use_contain: bool,
    pub use_equal: bool,
    pub use_follows: bool,
    pub use_precedes: bool,
}

impl TemporalFilter {
    /// Filter on `window` selecting maps that start inside it.
    pub fn new(window: TimeExtent) -> Self {
        Self {
            window,
            use_start: true,
            use_during: false,
            use_overlap: false,
            use_contain: false,
            use_equal: false,
            use_follows: false,
            use_precedes: false,
        }
    }

    /// Filter with every flag cleared; with no flag set `use_start` applies.
    pub fn none(window: TimeExtent) -> Self {
        Self { use_start: false, ..Self::new(window) }
    }

    fn clauses(&self) -> impl Iterator<Item = &'static [Cmp]> {
        let any = self.use_start
            || self.use_during
            || self.use_overlap
            || self.use_contain
            || self.use_equal
            || self.use_follows
            || self.use_precedes;
        [
            (self.use_start || !any, START),
            (self.use_during, DURING),
            (self.use_overlap, OVERLAP),
            (self.use_contain, CONTAIN),
            (self.use_equal, EQUAL),
            (self.use_follows, FOLLOWS),
            (self.use_precedes, PRECEDES),
        ]
        .into_iter()
        .filter(|(on, _)| *on)
        .flat_map(|(_, c)| c.iter().copied())
    }

    fn bound(&self, b: Bound) -> TimePoint {
        match b {
            Bound::S => self.window.start(),
            Bound::E => self.window.upper(),
        }
    }

    fn eval(&self, start: Option<TimePoint>, end: Option<TimePoint>) -> bool {
        self.clauses().any(|conj| {
            conj.iter().all(|&(col, op, b)| {
                let lhs = match col {
                    Col::Start => start,
                    Col::End => end,
                };
                lhs.and_then(|v| v.partial_cmp(&self.bound(b)))
                    .is_some_and(|ord| op.holds(ord))
            })
        })
    }

    /// Map columns holding start and end for the window's temporal type.
    fn columns(&self) -> (&'static str, &'static str) {
        match self.window.temporal_type() {
            TemporalType::Absolute => ("start_time", "end_time"),
            TemporalType::Relative => ("start_rel", "end_rel"),
        }
    }

    /// Whether a map with extent `ext` is selected.
    pub fn matches(&self, ext: &TimeExtent) -> bool {
        self.eval(Some(ext.start()), ext.end())
    }

    /// Whether a stored map row is selected, reading the columns
    /// [`to_sql`](Self::to_sql) names. A null column fails its clauses.
    pub fn matches_row(&self, row: &Row) -> bool {
        let (start_col, end_col) = self.columns();
        let point = |col: &str| match row.get(col) {
            Some(Value::DateTime(dt)) => Some(TimePoint::Absolute(*dt)),
            Some(Value::Int(v)) => Some(TimePoint::Relative(*v)),
            _ => None,
        };
        self.eval(point(start_col), point(end_col))
    }

    /// The where-clause body and its parameters, with columns named after
    /// the window's temporal type.
    pub fn to_sql(&self, style: ParamStyle) -> (String, Vec<Value>) {
        let (start_col, end_col) = self.columns();
        let mut params = Vec::new();
        let mut disj = Vec::new();
        for conj in self.clauses() {
            let parts: Vec<String> = conj
                .iter()
                .map(|&(col, op, b)| {
                    params.push(point_value(self.bound(b)));
                    let name = if col == Col::Start { start_col } else { end_col };
                    format!("{name} {} {}", op.sql(), style.placeholder(params.len()))
                })
                .collect();
            disj.push(format!("({})", parts.join(" AND ")));
        }
        (disj.join(" OR "), params)
    }
}

fn point_value(p: TimePoint) -> Value {
    match p {
        TimePoint::Absolute(dt) => Value::DateTime(dt),
        TimePoint::Relative(v) => Value::Int(v),
    }
}
