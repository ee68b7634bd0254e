//! Multi-layer code graph.
//!
//! Nodes are functions (real or virtual). Edges come in two layers: directed
//! `call` edges and undirected `similarity` edges. Parallel edges are collapsed
//! on insertion, so there is at most one logical edge per pair and layer.

mod backend;
mod builder;
mod export;
pub mod merge;
mod model;

pub use backend::{AdjacencyBackend, GraphBackend, Layer, PetgraphBackend};
pub use builder::{
    BuildStats, BuilderConfig, CallEdgeBuildStats, GraphBuilder, NodeBuildStats,
    SimilarityBuildStats,
};
pub use export::{ExportEdge, GraphExport};
pub use model::{CodeGraph, EdgeInsert, NodeMetrics, COMPUTED_METRICS};
