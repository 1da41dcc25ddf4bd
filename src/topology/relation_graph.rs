//! Temporal topology: the pairwise relation graph of one or two series.
//!
//! [`TopologyBuilder::build`] takes a primary sequence `A` and an optional
//! secondary sequence `B`. For every element it records, per
//! [`RelationKind`], the indices of the elements of the *other* sequence
//! standing in that relation, plus `next`/`prev` links in chronological
//! order within its own sequence. Without `B` the sequence is related to
//! itself and an element is never related to itself.
//!
//! A list entry reads "node *kind* other": if `j` is in
//! `secondary[k].relations.get(During)` then `B[k]` lies during `A[j]`.
//!
//! # Recording rules
//!
//! Every recorded relation is mirrored on the other side. A pair that
//! `starts` or `finishes` is additionally recorded as `during` (and the
//! mirror as `contains`); a pair that is `started` or `finished` is
//! additionally recorded as `contains`. `after`/`before` pairs are only
//! visited when [`TopologyOptions::include_disjoint`] is set.
//!
//! # Complexity
//!
//! Candidates are found with a sorted sweep over `A`: `A` is ordered by
//! start with a running maximum of upper bounds, so the elements whose
//! closed span touches a `B` element form a contiguous index range found by
//! two binary searches. The cost is **O((n + m) log n + k)** for `k`
//! touching pairs instead of **O(n·m)**.
//!
//! # Determinism
//!
//! Relation lists are filled in `B` order, then `A` index order. The
//! optional `rayon` feature computes relations per `B` element in parallel
//! and merges them in the same order, so the graph is identical.

use std::collections::BTreeMap;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::catalog_error::CatalogError;
use crate::debug_invariants::DebugInvariants;
use crate::time::extent::{RelationKind, TimeExtent};
use crate::time::point::TimePoint;
use crate::topology::spatial::SpatialExtent;

/// Anything that occupies a time extent and optionally a spatial box.
pub trait Temporal {
    fn temporal_extent(&self) -> TimeExtent;

    fn spatial_extent(&self) -> Option<SpatialExtent> {
        None
    }
}

impl Temporal for TimeExtent {
    fn temporal_extent(&self) -> TimeExtent {
        *self
    }
}

impl<T: Temporal> Temporal for &T {
    fn temporal_extent(&self) -> TimeExtent {
        T::temporal_extent(*self)
    }

    fn spatial_extent(&self) -> Option<SpatialExtent> {
        T::spatial_extent(*self)
    }
}

/// Spatial pre-filter applied before temporal relations are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum SpatialMode {
    /// Relate every temporally touching pair.
    #[default]
    Disabled,
    /// Only pairs whose 2-D boxes intersect.
    TwoD,
    /// Only pairs whose 3-D boxes intersect.
    ThreeD,
}

impl SpatialMode {
    /// Whether two optional boxes pass the filter. A missing box never does.
    pub fn admits(self, a: Option<&SpatialExtent>, b: Option<&SpatialExtent>) -> bool {
        match self {
            SpatialMode::Disabled => true,
            SpatialMode::TwoD => matches!((a, b), (Some(a), Some(b)) if a.intersects_2d(b)),
            SpatialMode::ThreeD => matches!((a, b), (Some(a), Some(b)) if a.intersects_3d(b)),
        }
    }
}

/// Options for [`TopologyBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct TopologyOptions {
    /// Spatial pre-filter.
    pub spatial: SpatialMode,
    /// Also record `after`/`before` pairs (visits all pairs).
    pub include_disjoint: bool,
}

impl TopologyOptions {
    /// Record every relation, without spatial filtering.
    pub fn all() -> Self {
        Self { spatial: SpatialMode::Disabled, include_disjoint: true }
    }
}

/// Per-relation index lists of one node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationLists {
    lists: [Vec<usize>; 13],
}

impl RelationLists {
    pub fn get(&self, kind: RelationKind) -> &[usize] {
        &self.lists[kind.index()]
    }

    fn push(&mut self, kind: RelationKind, idx: usize) {
        let list = &mut self.lists[kind.index()];
        if !list.contains(&idx) {
            list.push(idx);
        }
    }

    /// Non-empty lists in precedence order.
    pub fn iter(&self) -> impl Iterator<Item = (RelationKind, &[usize])> + '_ {
        RelationKind::PRECEDENCE
            .into_iter()
            .map(|k| (k, self.get(k)))
            .filter(|(_, l)| !l.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.lists.iter().all(Vec::is_empty)
    }
}

/// One element's view of the topology.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologyNode {
    pub relations: RelationLists,
    /// Next element of the same sequence in chronological order.
    pub next: Option<usize>,
    /// Previous element of the same sequence in chronological order.
    pub prev: Option<usize>,
}

/// The relation graph produced by [`TopologyBuilder::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationGraph {
    primary: Vec<TopologyNode>,
    secondary: Option<Vec<TopologyNode>>,
    primary_order: Vec<usize>,
}

impl RelationGraph {
    /// Built from a single sequence.
    pub fn is_identical(&self) -> bool {
        self.secondary.is_none()
    }

    /// Nodes of `A`; their lists index into `B` (or `A` when identical).
    pub fn primary(&self) -> &[TopologyNode] {
        &self.primary
    }

    /// Nodes of `B`; their lists index into `A`. Same as
    /// [`primary`](Self::primary) when identical.
    pub fn secondary(&self) -> &[TopologyNode] {
        self.secondary.as_deref().unwrap_or(&self.primary)
    }

    /// Indices of `A` in chronological order, following `next` links.
    pub fn chronological(&self) -> impl Iterator<Item = usize> + '_ {
        self.primary_order.iter().copied()
    }

    /// Earliest element of `A`.
    pub fn first(&self) -> Option<usize> {
        self.primary_order.first().copied()
    }

    /// Number of list entries per relation over all nodes of `A`.
    pub fn count_relations(&self) -> BTreeMap<RelationKind, usize> {
        let mut counts = BTreeMap::new();
        for node in &self.primary {
            for (kind, list) in node.relations.iter() {
                *counts.entry(kind).or_insert(0) += list.len();
            }
        }
        counts
    }
}

impl DebugInvariants for RelationGraph {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "RelationGraph");
    }

    /// Every entry is mirrored on the other side, and `next`/`prev` agree.
    fn validate_invariants(&self) -> Result<(), CatalogError> {
        let other = self.secondary();
        for (i, node) in self.primary.iter().enumerate() {
            for (kind, list) in node.relations.iter() {
                for &j in list {
                    let back = other.get(j).ok_or_else(|| {
                        CatalogError::TopologyInconsistent(format!("A[{i}] {kind} B[{j}]: no such node"))
                    })?;
                    if !back.relations.get(kind.mirror()).contains(&i) {
                        return Err(CatalogError::TopologyInconsistent(format!(
                            "A[{i}] {kind} B[{j}] without mirror {}",
                            kind.mirror()
                        )));
                    }
                }
            }
            if let Some(n) = node.next {
                if self.primary.get(n).and_then(|x| x.prev) != Some(i) {
                    return Err(CatalogError::TopologyInconsistent(format!(
                        "A[{i}].next = {n} but prev does not point back"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Sorted sweep index over the primary sequence.
struct SweepIndex {
    /// Primary indices ordered by start.
    order: Vec<usize>,
    starts: Vec<TimePoint>,
    /// Running maximum of upper bounds along `order`.
    reach: Vec<TimePoint>,
}

impl SweepIndex {
    fn new(extents: &[TimeExtent], order: Vec<usize>) -> Self {
        let starts: Vec<TimePoint> = order.iter().map(|&i| extents[i].start()).collect();
        let mut reach: Vec<TimePoint> = Vec::with_capacity(order.len());
        for &i in &order {
            let upper = extents[i].upper();
            let next = match reach.last() {
                Some(&prev) if prev > upper => prev,
                _ => upper,
            };
            reach.push(next);
        }
        Self { order, starts, reach }
    }

    /// Primary indices whose closed span may touch `[lo, hi]`.
    fn candidates(&self, lo: TimePoint, hi: TimePoint) -> &[usize] {
        let first = self.reach.partition_point(|r| *r < lo);
        let last = self.starts.partition_point(|s| *s <= hi);
        if first >= last { &[] } else { &self.order[first..last] }
    }
}

/// Computes a [`RelationGraph`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TopologyBuilder {
    options: TopologyOptions,
}

impl TopologyBuilder {
    pub fn new(options: TopologyOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> TopologyOptions {
        self.options
    }

    /// Build the relation graph of `a` against `b`, or of `a` against itself.
    ///
    /// # Errors
    /// `MixedTemporalTypes` if the inputs mix absolute and relative time.
    pub fn build<A, B>(&self, a: &[A], b: Option<&[B]>) -> Result<RelationGraph, CatalogError>
    where
        A: Temporal,
        B: Temporal,
    {
        let ext_a: Vec<TimeExtent> = a.iter().map(Temporal::temporal_extent).collect();
        let sp_a: Vec<Option<SpatialExtent>> = a.iter().map(Temporal::spatial_extent).collect();
        let (ext_b, sp_b) = match b {
            Some(b) => (
                b.iter().map(Temporal::temporal_extent).collect::<Vec<_>>(),
                b.iter().map(Temporal::spatial_extent).collect::<Vec<_>>(),
            ),
            None => (ext_a.clone(), sp_a.clone()),
        };
        let identical = b.is_none();

        check_uniform(&ext_a, &ext_b)?;

        let order_a = chronological_order(&ext_a);
        let sweep = SweepIndex::new(&ext_a, order_a.clone());

        let pairs_for = |j: usize| -> Vec<(usize, RelationKind)> {
            let eb = &ext_b[j];
            let all: Vec<usize>;
            let cands: &[usize] = if self.options.include_disjoint {
                all = (0..ext_a.len()).collect();
                &all
            } else {
                sweep.candidates(eb.start(), eb.upper())
            };
            let mut found: Vec<(usize, RelationKind)> = cands
                .iter()
                .copied()
                .filter(|&i| !identical || i < j)
                .filter(|&i| self.options.spatial.admits(sp_a[i].as_ref(), sp_b[j].as_ref()))
                .filter_map(|i| eb.relation(&ext_a[i]).map(|rel| (i, rel)))
                .filter(|(_, rel)| self.options.include_disjoint || !rel.is_disjoint())
                .collect();
            found.sort_by_key(|(i, _)| *i);
            found
        };

        #[cfg(feature = "rayon")]
        let per_b: Vec<Vec<(usize, RelationKind)>> = (0..ext_b.len()).into_par_iter().map(pairs_for).collect();
        #[cfg(not(feature = "rayon"))]
        let per_b: Vec<Vec<(usize, RelationKind)>> = (0..ext_b.len()).map(pairs_for).collect();

        let mut primary = vec![TopologyNode::default(); ext_a.len()];
        let mut secondary = if identical {
            None
        } else {
            Some(vec![TopologyNode::default(); ext_b.len()])
        };

        for (j, pairs) in per_b.into_iter().enumerate() {
            for (i, rel) in pairs {
                match secondary.as_mut() {
                    Some(sec) => record(&mut sec[j], &mut primary[i], i, j, rel),
                    None => {
                        // i < j, so the two nodes are distinct.
                        let (lo, hi) = primary.split_at_mut(j);
                        record(&mut hi[0], &mut lo[i], i, j, rel);
                    }
                }
            }
        }

        link(&mut primary, &order_a);
        if let Some(sec) = secondary.as_mut() {
            link(sec, &chronological_order(&ext_b));
        }

        let graph = RelationGraph { primary, secondary, primary_order: order_a };
        graph.debug_assert_invariants();
        log::debug!(
            "built temporal topology: {} x {} elements, identical = {identical}",
            ext_a.len(),
            ext_b.len()
        );
        Ok(graph)
    }
}

/// Record `B[j] rel A[i]` on both nodes.
fn record(b: &mut TopologyNode, a: &mut TopologyNode, i: usize, j: usize, rel: RelationKind) {
    b.relations.push(rel, i);
    a.relations.push(rel.mirror(), j);
    let implied = match rel {
        RelationKind::Starts | RelationKind::Finishes => Some(RelationKind::During),
        RelationKind::Started | RelationKind::Finished => Some(RelationKind::Contains),
        _ => None,
    };
    if let Some(extra) = implied {
        b.relations.push(extra, i);
        a.relations.push(extra.mirror(), j);
    }
}

fn chronological_order(extents: &[TimeExtent]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..extents.len()).collect();
    order.sort_by(|&x, &y| extents[x].cmp_chronological(&extents[y]));
    order
}

fn link(nodes: &mut [TopologyNode], order: &[usize]) {
    for w in order.windows(2) {
        nodes[w[0]].next = Some(w[1]);
        nodes[w[1]].prev = Some(w[0]);
    }
}

fn check_uniform(a: &[TimeExtent], b: &[TimeExtent]) -> Result<(), CatalogError> {
    let mut all = a.iter().chain(b.iter());
    let Some(first) = all.next() else {
        return Ok(());
    };
    match all.find(|e| e.temporal_type() != first.temporal_type()) {
        Some(odd) => Err(CatalogError::MixedTemporalTypes(format!(
            "topology over {first} and {odd}"
        ))),
        None => Ok(()),
    }
}
