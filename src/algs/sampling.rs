//! Sample one dataset with the granules of another.
//!
//! Every map of the sampler dataset (plus a gap slot between temporally
//! separated sampler maps) is a granule. For each granule the maps of the
//! target dataset standing in one of the requested relations are collected;
//! a granule without matches gets a single gap slot carrying its extent.
//!
//! Two strategies are available:
//!
//! - **topology** (default): one [`TopologyBuilder`] pass between granules
//!   and targets. Relations are read from the granule's side, so
//!   [`SampleMethod::During`] selects maps the granule lies during, i.e.
//!   maps containing the granule.
//! - **predicates**: one [`TemporalFilter`] per granule, evaluated on the
//!   target's start/end columns. Here `during` selects maps lying inside
//!   the granule. If the target consists of instants only, every method
//!   collapses to `start`.
//!
//! Both strategies agree on the default method set, which contains both
//! `during` and `contains`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::catalog::catalog::{Catalog, with_gaps};
use crate::catalog::dataset::{DatasetKind, MapTimeKind};
use crate::catalog::filter::TemporalFilter;
use crate::catalog::ident::DatasetId;
use crate::catalog::map_record::{MapRecord, MapSlot};
use crate::catalog::store::RelationalStore;
use crate::catalog_error::CatalogError;
use crate::time::extent::RelationKind;
use crate::topology::relation_graph::{SpatialMode, TopologyBuilder, TopologyOptions};

/// A caller-facing sampling relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleMethod {
    Start,
    During,
    Overlap,
    Contains,
    Equal,
    Follows,
    Precedes,
}

impl SampleMethod {
    pub const DEFAULT: [SampleMethod; 4] = [
        SampleMethod::During,
        SampleMethod::Overlap,
        SampleMethod::Contains,
        SampleMethod::Equal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SampleMethod::Start => "start",
            SampleMethod::During => "during",
            SampleMethod::Overlap => "overlap",
            SampleMethod::Contains => "contains",
            SampleMethod::Equal => "equal",
            SampleMethod::Follows => "follows",
            SampleMethod::Precedes => "precedes",
        }
    }

    /// Granule-to-map relations selected by this method in the topology
    /// strategy. `start` approximates "the map begins within the granule".
    pub fn relations(self) -> &'static [RelationKind] {
        use RelationKind::*;
        match self {
            SampleMethod::Start => &[Overlapped, Starts, Started, Finishes, Contains, Equal],
            SampleMethod::During => &[During],
            SampleMethod::Overlap => &[Overlaps, Overlapped],
            SampleMethod::Contains => &[Contains],
            SampleMethod::Equal => &[Equal],
            SampleMethod::Follows => &[Follows],
            SampleMethod::Precedes => &[Precedes],
        }
    }
}

impl fmt::Display for SampleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SampleMethod {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "start" => Ok(SampleMethod::Start),
            "during" => Ok(SampleMethod::During),
            "overlap" | "over" => Ok(SampleMethod::Overlap),
            "contain" | "contains" => Ok(SampleMethod::Contains),
            "equal" | "equals" => Ok(SampleMethod::Equal),
            "follows" => Ok(SampleMethod::Follows),
            "precedes" => Ok(SampleMethod::Precedes),
            other => Err(CatalogError::InvalidRegisterRequest(format!("unknown sampling method {other}"))),
        }
    }
}

/// Options for [`Catalog::sample_by_dataset`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleOptions {
    /// Relations to select; empty means [`SampleMethod::DEFAULT`].
    pub methods: Vec<SampleMethod>,
    /// Additionally require 2-D spatial overlap.
    pub spatial: bool,
    /// Use per-granule temporal filters instead of one topology pass.
    pub use_predicates: bool,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            methods: SampleMethod::DEFAULT.to_vec(),
            spatial: false,
            use_predicates: false,
        }
    }
}

impl SampleOptions {
    pub fn with_methods(methods: &[SampleMethod]) -> Self {
        Self { methods: methods.to_vec(), ..Self::default() }
    }

    fn effective_methods(&self) -> &[SampleMethod] {
        if self.methods.is_empty() { &SampleMethod::DEFAULT } else { &self.methods }
    }
}

/// One granule with the maps sampled for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub granule: MapSlot,
    /// Matched maps in start order, or one gap slot with the granule's extent.
    pub samples: Vec<MapSlot>,
}

impl Sample {
    fn new(granule: MapSlot, matched: Vec<MapSlot>) -> Self {
        let samples = if matched.is_empty() {
            vec![MapSlot::gap(granule.extent)]
        } else {
            matched
        };
        Self { granule, samples }
    }

    /// Whether nothing was sampled for this granule.
    pub fn is_empty(&self) -> bool {
        self.samples.iter().all(MapSlot::is_gap)
    }
}

/// Topology strategy over start-ordered `targets`.
pub fn sample_by_topology(
    granules: Vec<MapSlot>,
    targets: &[MapRecord],
    methods: &[SampleMethod],
    spatial: bool,
) -> Result<Vec<Sample>, CatalogError> {
    let options = TopologyOptions {
        spatial: if spatial { SpatialMode::TwoD } else { SpatialMode::Disabled },
        include_disjoint: false,
    };
    let graph = TopologyBuilder::new(options).build(&granules, Some(targets))?;
    let mut out = Vec::with_capacity(granules.len());
    for (granule, node) in granules.into_iter().zip(graph.primary()) {
        let mut picked: Vec<usize> = Vec::new();
        for kind in methods.iter().flat_map(|m| m.relations()) {
            for &j in node.relations.get(*kind) {
                if !picked.contains(&j) {
                    picked.push(j);
                }
            }
        }
        picked.sort_unstable();
        let matched = picked.into_iter().map(|j| MapSlot::map(targets[j].clone())).collect();
        out.push(Sample::new(granule, matched));
    }
    Ok(out)
}

/// Predicate strategy over start-ordered `targets`. `point_only` restricts
/// the filter to `start`.
pub fn sample_by_predicates(
    granules: Vec<MapSlot>,
    targets: &[MapRecord],
    methods: &[SampleMethod],
    spatial: bool,
    point_only: bool,
) -> Vec<Sample> {
    granules
        .into_iter()
        .map(|granule| {
            let filter = granule_filter(&granule, methods, point_only);
            let granule_box = granule.map.as_ref().and_then(|m| m.spatial);
            let matched = targets
                .iter()
                .filter(|t| filter.matches(&t.extent))
                .filter(|t| {
                    !spatial
                        || matches!((granule_box.as_ref(), t.spatial.as_ref()), (Some(g), Some(s)) if g.overlaps_2d(s))
                })
                .cloned()
                .map(MapSlot::map)
                .collect();
            Sample::new(granule, matched)
        })
        .collect()
}

fn granule_filter(granule: &MapSlot, methods: &[SampleMethod], point_only: bool) -> TemporalFilter {
    let mut filter = TemporalFilter::none(granule.extent);
    if point_only {
        filter.use_start = true;
        return filter;
    }
    for method in methods {
        match method {
            SampleMethod::Start => filter.use_start = true,
            SampleMethod::During => filter.use_during = true,
            SampleMethod::Overlap => filter.use_overlap = true,
            SampleMethod::Contains => filter.use_contain = true,
            SampleMethod::Equal => filter.use_equal = true,
            SampleMethod::Follows => filter.use_follows = true,
            SampleMethod::Precedes => filter.use_precedes = true,
        }
    }
    filter
}

impl<S: RelationalStore> Catalog<S> {
    /// Sample the maps of `dataset` with the granules of `sampler`.
    ///
    /// An empty sampler yields an empty list.
    ///
    /// # Errors
    /// `MixedTemporalTypes` if the two datasets differ in temporal type,
    /// `SamplerNotInterval` if the sampler holds anything but intervals.
    pub fn sample_by_dataset(
        &self,
        kind: DatasetKind,
        dataset: &DatasetId,
        sampler_kind: DatasetKind,
        sampler: &DatasetId,
        options: &SampleOptions,
    ) -> Result<Vec<Sample>, CatalogError> {
        let target = self.require_dataset(kind, dataset)?;
        let source = self.require_dataset(sampler_kind, sampler)?;
        if target.temporal_type != source.temporal_type {
            return Err(CatalogError::MixedTemporalTypes(format!(
                "cannot sample <{}> ({}) with <{}> ({})",
                target.id, target.temporal_type, source.id, source.temporal_type
            )));
        }
        let sampler_maps = self.registered_maps(sampler_kind, sampler, None)?;
        if sampler_maps.is_empty() {
            return Ok(Vec::new());
        }
        if sampler_maps.iter().any(|m| !m.extent.is_interval()) {
            return Err(CatalogError::SamplerNotInterval(source.id.to_string()));
        }
        let granules = with_gaps(sampler_maps)?;
        let targets = self.registered_maps(kind, dataset, None)?;
        let methods = options.effective_methods();
        log::debug!(
            "sampling <{}> with {} granules of <{}>, methods [{}]",
            target.id,
            granules.len(),
            source.id,
            methods.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ")
        );
        if options.use_predicates {
            let point_only = target.map_time == Some(MapTimeKind::Point);
            Ok(sample_by_predicates(granules, &targets, methods, options.spatial, point_only))
        } else {
            sample_by_topology(granules, &targets, methods, options.spatial)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ident::MapId;
    use crate::catalog::map_record::MapKind;
    use crate::time::extent::TimeExtent;
    use crate::time::point::RelativeUnit;

    fn r(s: i64, e: Option<i64>) -> TimeExtent {
        TimeExtent::relative(s, e, RelativeUnit::Days).unwrap()
    }

    fn rec(name: &str, ext: TimeExtent) -> MapRecord {
        MapRecord::new(MapId::new(name, None, "PERMANENT").unwrap(), MapKind::Raster, ext)
    }

    fn ids(sample: &Sample) -> Vec<String> {
        sample
            .samples
            .iter()
            .map(|s| s.id().map_or_else(|| "-".to_string(), |id| id.name().to_string()))
            .collect()
    }

    #[test]
    fn empty_granule_gets_gap() {
        let granules = vec![MapSlot::map(rec("g", r(0, Some(5))))];
        let out = sample_by_topology(granules, &[rec("a", r(10, Some(12)))], &SampleMethod::DEFAULT, false).unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].is_empty());
        assert_eq!(out[0].samples[0].extent, r(0, Some(5)));
    }

    #[test]
    fn during_is_read_from_opposite_sides() {
        let granules = || vec![MapSlot::map(rec("g", r(0, Some(10))))];
        let targets = [rec("outer", r(-5, Some(20))), rec("inner", r(2, Some(4)))];
        let during = [SampleMethod::During];
        let topo = sample_by_topology(granules(), &targets, &during, false).unwrap();
        assert_eq!(ids(&topo[0]), vec!["outer"]);
        let pred = sample_by_predicates(granules(), &targets, &during, false, false);
        assert_eq!(ids(&pred[0]), vec!["inner"]);

        let topo = sample_by_topology(granules(), &targets, &SampleMethod::DEFAULT, false).unwrap();
        let pred = sample_by_predicates(granules(), &targets, &SampleMethod::DEFAULT, false, false);
        assert_eq!(ids(&topo[0]), vec!["outer", "inner"]);
        assert_eq!(ids(&pred[0]), vec!["outer", "inner"]);
    }

    #[test]
    fn method_names() {
        assert_eq!("equals".parse::<SampleMethod>().unwrap(), SampleMethod::Equal);
        assert_eq!("contain".parse::<SampleMethod>().unwrap(), SampleMethod::Contains);
        assert!("near".parse::<SampleMethod>().is_err());
        assert!(SampleMethod::Start.relations().contains(&RelationKind::Started));
    }
}
