//! Graph analytics over a finished [`CodeGraph`].
//!
//! The three analyzers are independent: each reads the frozen topology and
//! returns its own report plus a disjoint per-node metric record. They run
//! concurrently; the caller merges the metrics back into the graph.

pub mod centrality;
pub mod community;
pub mod cores;
mod projection;

pub use centrality::{CentralityAnalyzer, CentralityConfig, CentralityReport};
pub use community::{CommunityConfig, CommunityDetector, CommunityReport};
pub use cores::{CliqueConfig, CoreCliqueAnalyzer, CoreCliqueReport};
pub use projection::{Projection, WeightedProjection};

use crate::graph::CodeGraph;

/// Settings for all analyzers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisConfig {
    pub centrality: CentralityConfig,
    pub community: CommunityConfig,
    pub cliques: CliqueConfig,
}

#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub centrality: CentralityReport,
    pub communities: CommunityReport,
    pub cores: CoreCliqueReport,
}

/// Run centrality, community detection and core/clique analysis in parallel.
pub fn analyze(graph: &CodeGraph, config: &AnalysisConfig) -> AnalysisReport {
    let projection = Projection::from_graph(graph);

    let (centrality, (communities, cores)) = rayon::join(
        || CentralityAnalyzer::new(config.centrality.clone()).analyze(graph, &projection),
        || {
            rayon::join(
                || CommunityDetector::new(config.community.clone()).analyze(graph),
                || CoreCliqueAnalyzer::new(config.cliques.clone()).analyze(graph, &projection),
            )
        },
    );

    AnalysisReport {
        centrality,
        communities,
        cores,
    }
}

impl AnalysisReport {
    /// Write every analyzer's node metrics into the graph (insert-if-absent).
    /// Returns the number of colliding keys.
    pub fn apply_metrics(&self, graph: &mut CodeGraph) -> usize {
        [
            self.centrality.node_metrics(),
            self.communities.node_metrics(),
            self.cores.node_metrics(),
        ]
        .into_iter()
        .map(|batch| graph.merge_metric_batch(batch))
        .sum()
    }
}
