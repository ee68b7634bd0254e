//! callscope - confidence-ranked call graphs and code graph analytics
//!
//! Takes a static function inventory (plus raw calls, imports and pre-built
//! edges) and produces a two-layer graph with structural metrics.
//!
//! # Architecture
//!
//! ```text
//! Payload → Validation → Symbol Tables → Call Resolution → Graph Building → Analytics
//!    ↓           ↓             ↓                ↓                 ↓              ↓
//! normalize   issues     per-file FQNs   ranked candidates   call + similarity  degree, betweenness,
//!  + merge                                + confidence       layers, virtual    PageRank, Louvain,
//!                                                             nodes              k-core, cliques
//! ```
//!
//! # Performance Strategies
//!
//! - Calls resolve in parallel via rayon, output order preserved
//! - Parallel edges collapse on insertion, one logical edge per pair and layer
//! - Analyzers run concurrently and write disjoint metric records
//! - Brandes betweenness parallelizes over sources, PageRank over nodes

pub mod analysis;
pub mod callgraph;
pub mod config;
pub mod error;
pub mod graph;
pub mod payload;
pub mod pipeline;
pub mod symbols;
pub mod types;

// Re-export core types
pub use types::{
    CallEdge, CallSite, Confidence, FunctionNode, MatchType, RawCall, Resolution,
    ResolutionCandidate, ResolutionStatus, SimilarityEdge, SourceSpan,
};

// Re-export call graph types
pub use callgraph::{
    CallResolution, CallResolver, Candidate, ResolutionContext, ResolutionStats,
    ResolutionStrategy, ResolverBuilder, ResolverConfig,
};

pub use analysis::{AnalysisConfig, AnalysisReport};
pub use config::Config;
pub use error::{ConfigError, PayloadError, Severity, ValidationIssue};
pub use graph::{BuildStats, CodeGraph, GraphBackend, GraphBuilder, PetgraphBackend};
pub use payload::{Envelope, LoadedPayload, Validator};
pub use pipeline::{AnalysisSummary, Pipeline, PipelineConfig, PipelineOutput};
pub use symbols::SymbolTableManager;
