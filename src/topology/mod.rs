//! Temporal (and optional spatial) topology between series of maps.

pub mod relation_graph;
pub mod spatial;

pub use relation_graph::{
    RelationGraph, RelationLists, SpatialMode, Temporal, TopologyBuilder, TopologyNode,
    TopologyOptions,
};
pub use spatial::SpatialExtent;
