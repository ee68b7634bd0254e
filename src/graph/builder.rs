//! Graph construction from functions, call resolutions and pre-built edges.

use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use super::backend::GraphBackend;
use super::model::{CodeGraph, EdgeInsert, NodeMetrics, COMPUTED_METRICS};
use crate::callgraph::{CallOutcome, CallResolution};
use crate::types::{
    CallEdge, FunctionNode, Resolution, ResolutionStatus, SimilarityEdge, EXTERNAL_PREFIX,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeBuildStats {
    /// Nodes in the finished graph, virtual ones included.
    pub total: usize,
    /// Input functions that became nodes.
    pub added: usize,
    /// Input functions with an empty id.
    pub skipped: usize,
    pub duplicates: usize,
    /// Virtual nodes in the finished graph.
    #[serde(rename = "virtual")]
    pub virtual_nodes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEdgeBuildStats {
    /// Edges offered: one per resolved call, one per ambiguous candidate, plus
    /// every payload edge.
    pub input: usize,
    pub added: usize,
    pub merged: usize,
    pub self_loops: usize,
    pub dangling: usize,
    /// Edges whose target became a virtual node.
    pub virtual_targets: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityBuildStats {
    pub input: usize,
    pub added: usize,
    pub merged: usize,
    pub self_loops: usize,
    pub dangling: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStats {
    pub nodes: NodeBuildStats,
    pub call_edges: CallEdgeBuildStats,
    pub similarity_edges: SimilarityBuildStats,
}

impl BuildStats {
    /// Count duplicates that were folded before the builder saw them, as if
    /// they had reached the graph and merged there.
    pub fn absorb_premerged(
        &mut self,
        functions: usize,
        call_edges: usize,
        similarity_edges: usize,
    ) {
        self.nodes.duplicates += functions;
        self.call_edges.input += call_edges;
        self.call_edges.merged += call_edges;
        self.similarity_edges.input += similarity_edges;
        self.similarity_edges.merged += similarity_edges;
    }
}

/// Builder settings.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Call sites kept per collapsed edge.
    pub call_site_cap: usize,
    /// Keep payload edges with unknown endpoints as virtual placeholders
    /// instead of dropping them.
    pub keep_dangling: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            call_site_cap: 100,
            keep_dangling: false,
        }
    }
}

/// Assembles a [`CodeGraph`]. Nodes first, then resolved calls, then payload
/// call edges, then similarity edges.
pub struct GraphBuilder {
    config: BuilderConfig,
    backend: Option<Box<dyn GraphBackend>>,
}

impl GraphBuilder {
    pub fn new(config: BuilderConfig) -> Self {
        Self {
            config,
            backend: None,
        }
    }

    pub fn with_backend(mut self, backend: Box<dyn GraphBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn build(
        mut self,
        functions: &[FunctionNode],
        resolutions: &[CallResolution],
        call_edges: &[CallEdge],
        similarity_edges: &[SimilarityEdge],
    ) -> (CodeGraph, BuildStats) {
        let mut graph = match self.backend.take() {
            Some(backend) => CodeGraph::with_backend(backend),
            None => CodeGraph::new(),
        };
        let mut stats = BuildStats::default();
        let cap = self.config.call_site_cap;

        for func in functions {
            if func.id.trim().is_empty() {
                stats.nodes.skipped += 1;
                continue;
            }
            let mut node = func.clone();
            // Values carried in from an earlier run describe the old topology.
            node.metrics.retain(|key, _| !COMPUTED_METRICS.contains(&key.as_str()));
            match graph.add_node(node) {
                Some(_) => stats.nodes.added += 1,
                None => {
                    debug!(id = %func.id, "duplicate function id");
                    stats.nodes.duplicates += 1;
                }
            }
        }

        for resolution in resolutions {
            add_resolved_call(&mut graph, resolution, cap, &mut stats.call_edges);
        }

        for edge in call_edges {
            stats.call_edges.input += 1;
            self.add_payload_call_edge(&mut graph, edge.clone(), &mut stats.call_edges);
        }

        for edge in similarity_edges {
            let s = &mut stats.similarity_edges;
            s.input += 1;
            if edge.source == edge.target {
                s.self_loops += 1;
                continue;
            }
            let (Some(a), Some(b)) = (graph.index_of(&edge.source), graph.index_of(&edge.target))
            else {
                s.dangling += 1;
                continue;
            };
            match graph.insert_similarity_edge(a, b, edge.clone()) {
                EdgeInsert::Added => s.added += 1,
                EdgeInsert::Merged => s.merged += 1,
            }
        }

        let batch = structural_metrics(&graph);
        graph.merge_metric_batch(batch);

        stats.nodes.total = graph.node_count();
        stats.nodes.virtual_nodes = graph.nodes().iter().filter(|n| n.is_virtual).count();
        info!(
            nodes = stats.nodes.total,
            call_edges = graph.call_edge_count(),
            similarity_edges = graph.similarity_edge_count(),
            "built graph"
        );
        (graph, stats)
    }

    fn add_payload_call_edge(
        &self,
        graph: &mut CodeGraph,
        edge: CallEdge,
        stats: &mut CallEdgeBuildStats,
    ) {
        let cap = self.config.call_site_cap;
        if edge.source == edge.target {
            stats.self_loops += 1;
            return;
        }

        let source = match graph.index_of(&edge.source) {
            Some(idx) => idx,
            None if self.config.keep_dangling => {
                let lang = edge.language.clone().unwrap_or_default();
                graph
                    .ensure_node(FunctionNode::virtual_placeholder(&edge.source, &lang))
                    .0
            }
            None => {
                debug!(source = %edge.source, "dropping call edge with unknown source");
                stats.dangling += 1;
                return;
            }
        };

        let target = match graph.index_of(&edge.target) {
            Some(idx) => idx,
            None => {
                let escape = edge.target.starts_with(EXTERNAL_PREFIX)
                    || edge.status() != ResolutionStatus::Resolved;
                if !escape && !self.config.keep_dangling {
                    debug!(target = %edge.target, "dropping call edge with unknown target");
                    stats.dangling += 1;
                    return;
                }
                let lang = edge
                    .language
                    .clone()
                    .or_else(|| graph.node(source).map(|n| n.language.clone()))
                    .unwrap_or_default();
                stats.virtual_targets += 1;
                graph
                    .ensure_node(FunctionNode::virtual_placeholder(&edge.target, &lang))
                    .0
            }
        };

        match graph.insert_call_edge(source, target, edge, cap) {
            EdgeInsert::Added => stats.added += 1,
            EdgeInsert::Merged => stats.merged += 1,
        }
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new(BuilderConfig::default())
    }
}

/// Turn one ranked call into edges.
///
/// Resolved: one edge to the best candidate. Ambiguous: one edge per
/// candidate, each carrying its own metadata. Unresolved: one edge to the
/// `(caller file, callee)` virtual node, created on first use.
fn add_resolved_call(
    graph: &mut CodeGraph,
    resolution: &CallResolution,
    cap: usize,
    stats: &mut CallEdgeBuildStats,
) {
    let CallOutcome::Ranked {
        status, candidates, ..
    } = &resolution.outcome
    else {
        return;
    };
    let Some(caller_id) = resolution.caller.as_deref() else {
        return;
    };
    let call = &resolution.call;

    let Some(source) = graph.index_of(caller_id) else {
        stats.input += 1;
        stats.dangling += 1;
        return;
    };
    let language = call
        .language
        .clone()
        .or_else(|| graph.node(source).map(|n| n.language.clone()));

    let edge_to = |target: &str, meta: Resolution| {
        let mut edge = CallEdge::new(caller_id, target).with_resolution(meta);
        edge.is_dynamic = call.is_dynamic;
        edge.language = language.clone().filter(|l| !l.is_empty());
        edge.call_sites = vec![call.call_site()];
        edge
    };

    let requests: Vec<(Option<usize>, CallEdge)> = match status {
        ResolutionStatus::Resolved => {
            let (Some(best), Some(meta)) = (candidates.first(), resolution.resolution()) else {
                return;
            };
            vec![(graph.index_of(&best.id), edge_to(&best.id, meta))]
        }
        ResolutionStatus::Ambiguous => candidates
            .iter()
            .map(|c| (graph.index_of(&c.id), edge_to(&c.id, resolution.resolution_for(c))))
            .collect(),
        ResolutionStatus::Unresolved => {
            let placeholder = FunctionNode::virtual_call_target(
                &call.file_path,
                &call.callee_name,
                language.as_deref().unwrap_or_default(),
            );
            let meta = resolution
                .resolution()
                .unwrap_or_else(|| Resolution::new(ResolutionStatus::Unresolved));
            let edge = edge_to(&placeholder.id, meta);
            stats.virtual_targets += 1;
            let (idx, _) = graph.ensure_node(placeholder);
            vec![(Some(idx), edge)]
        }
    };

    for (target, edge) in requests {
        stats.input += 1;
        let Some(target) = target else {
            stats.dangling += 1;
            continue;
        };
        if target == source {
            stats.self_loops += 1;
            continue;
        }
        match graph.insert_call_edge(source, target, edge, cap) {
            EdgeInsert::Added => stats.added += 1,
            EdgeInsert::Merged => stats.merged += 1,
        }
    }
}

/// Degree and weight per layer, written onto every node after construction.
fn structural_metrics(graph: &CodeGraph) -> Vec<NodeMetrics> {
    let n = graph.node_count();
    let mut in_deg = vec![0usize; n];
    let mut out_deg = vec![0usize; n];
    let mut in_w = vec![0.0f64; n];
    let mut out_w = vec![0.0f64; n];
    let mut sim_deg = vec![0usize; n];
    let mut sim_w = vec![0.0f64; n];

    for (s, t, edge) in graph.call_edges_indexed() {
        out_deg[s] += 1;
        in_deg[t] += 1;
        out_w[s] += edge.weight;
        in_w[t] += edge.weight;
    }
    for (a, b, edge) in graph.similarity_edges_indexed() {
        for idx in [a, b] {
            sim_deg[idx] += 1;
            sim_w[idx] += edge.similarity;
        }
    }

    (0..n)
        .map(|i| {
            let mut m = NodeMetrics::new();
            m.insert("callInDegree".into(), json!(in_deg[i]));
            m.insert("callOutDegree".into(), json!(out_deg[i]));
            m.insert("callInWeight".into(), json!(in_w[i]));
            m.insert("callOutWeight".into(), json!(out_w[i]));
            m.insert("similarityDegree".into(), json!(sim_deg[i]));
            m.insert("similarityWeight".into(), json!(sim_w[i]));
            m
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callgraph::ResolverBuilder;
    use crate::graph::backend::AdjacencyBackend;
    use crate::symbols::SymbolTableManager;
    use crate::types::{RawCall, SourceSpan};

    fn def(id: &str, name: &str, file: &str, start: u32, end: u32) -> FunctionNode {
        FunctionNode::new(id, name, file, "javascript", SourceSpan::lines(start, end))
    }

    fn build_from_calls(functions: &[FunctionNode], calls: &[RawCall]) -> (CodeGraph, BuildStats) {
        let symbols = SymbolTableManager::from_inventory(functions, &[], &[], &[]);
        let (resolutions, _) = ResolverBuilder::new().build().resolve_all(calls, functions, &symbols);
        GraphBuilder::default().build(functions, &resolutions, &[], &[])
    }

    #[test]
    fn test_unresolved_calls_share_virtual_node() {
        let functions = vec![
            def("a", "a", "src/app.js", 1, 10),
            def("b", "b", "src/app.js", 11, 20),
        ];
        let calls = vec![
            RawCall::new("src/app.js", "doStuff", 2, 0),
            RawCall::new("./src/app.js", "doStuff", 12, 0),
        ];
        let (graph, stats) = build_from_calls(&functions, &calls);

        assert_eq!(graph.node_count(), 3);
        assert_eq!(stats.nodes.virtual_nodes, 1);
        let v = graph.node_by_id("virtual::src/app.js::doStuff").unwrap();
        assert!(v.is_virtual);
        assert_eq!(graph.call_edge_count(), 2);

        let mut more = calls.clone();
        more.push(RawCall::new("src/app.js", "doStuff", 15, 0));
        let (graph, stats) = build_from_calls(&functions, &more);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(stats.call_edges.merged, 1);
        let b = graph.index_of("b").unwrap();
        let v = graph.index_of("virtual::src/app.js::doStuff").unwrap();
        assert_eq!(graph.call_edge(b, v).unwrap().weight, 2.0);
    }

    #[test]
    fn test_ambiguous_call_fans_out() {
        let functions = vec![
            def("main", "main", "src/app.js", 1, 10),
            def("h1", "helper", "alpha/one.js", 1, 5),
            def("h2", "helper", "beta/two.js", 1, 5),
            def("h3", "helper", "gamma/three.js", 1, 5),
        ];
        let (graph, stats) =
            build_from_calls(&functions, &[RawCall::new("src/app.js", "helper", 3, 0)]);

        assert_eq!(stats.call_edges.input, 3);
        assert_eq!(graph.call_edge_count(), 3);
        for edge in graph.call_edges() {
            let res = edge.resolution.as_ref().unwrap();
            assert_eq!(res.status, ResolutionStatus::Ambiguous);
            assert_eq!(res.candidates.len(), 1);
            assert_eq!(res.candidates[0].id, edge.target);
            assert_eq!(res.extra.get("candidateCount"), Some(&json!(3)));
        }
    }

    #[test]
    fn test_payload_edges() {
        let functions = vec![def("a", "a", "x.js", 1, 5), def("b", "b", "x.js", 6, 9)];
        let mut unresolved = CallEdge::new("a", "mystery");
        unresolved.resolution = Some(Resolution::new(ResolutionStatus::Unresolved));
        let edges = vec![
            CallEdge::new("a", "b"),
            CallEdge::new("a", "b"),
            CallEdge::new("a", "a"),
            CallEdge::new("a", "external::lodash.map"),
            unresolved,
            CallEdge::new("a", "ghost"),
            CallEdge::new("nobody", "b"),
        ];
        let (graph, stats) = GraphBuilder::default().build(&functions, &[], &edges, &[]);

        let s = &stats.call_edges;
        assert_eq!(s.input, 7);
        assert_eq!(s.added, 3);
        assert_eq!(s.merged, 1);
        assert_eq!(s.self_loops, 1);
        assert_eq!(s.dangling, 2);
        assert_eq!(s.virtual_targets, 2);
        assert!(graph.node_by_id("external::lodash.map").unwrap().is_virtual);
        assert!(graph.node_by_id("ghost").is_none());
        assert_eq!(graph.metric("a", "callOutWeight"), Some(&json!(4.0)));
        assert_eq!(graph.metric("b", "callInDegree"), Some(&json!(1)));
    }

    #[test]
    fn test_keep_dangling() {
        let functions = vec![def("a", "a", "x.js", 1, 5)];
        let builder = GraphBuilder::new(BuilderConfig {
            keep_dangling: true,
            ..Default::default()
        });
        let (graph, stats) = builder.build(&functions, &[], &[CallEdge::new("a", "ghost")], &[]);
        assert_eq!(stats.call_edges.dangling, 0);
        assert!(graph.node_by_id("ghost").unwrap().is_virtual);
    }

    #[test]
    fn test_similarity_edges_and_nodes() {
        let functions = vec![
            def("a", "a", "x.js", 1, 5),
            def("b", "b", "x.js", 6, 9),
            def("a", "dup", "y.js", 1, 2),
            def("", "anon", "y.js", 3, 4),
        ];
        let sims = vec![
            SimilarityEdge::new("a", "b", 0.5),
            SimilarityEdge::new("b", "a", 0.7),
            SimilarityEdge::new("a", "a", 1.0),
            SimilarityEdge::new("a", "zzz", 0.2),
        ];
        let (graph, stats) = GraphBuilder::default()
            .with_backend(Box::new(AdjacencyBackend::new()))
            .build(&functions, &[], &[], &sims);

        assert_eq!(stats.nodes.added, 2);
        assert_eq!(stats.nodes.duplicates, 1);
        assert_eq!(stats.nodes.skipped, 1);
        let s = &stats.similarity_edges;
        assert_eq!((s.input, s.added, s.merged, s.self_loops, s.dangling), (4, 1, 1, 1, 1));
        assert_eq!(graph.similarity_edges()[0].similarity, 0.7);
        assert_eq!(graph.metric("b", "similarityDegree"), Some(&json!(1)));
    }

    #[test]
    fn test_input_metrics_are_recomputed() {
        let mut a = def("a", "a", "x.js", 1, 5);
        a.metrics.insert("callOutDegree".into(), json!(7));
        a.metrics.insert("pageRank".into(), json!(0.9));
        a.metrics.insert("loc".into(), json!(5));
        let functions = vec![a, def("b", "b", "x.js", 6, 9)];

        let edges = [CallEdge::new("a", "b")];
        let (graph, _) = GraphBuilder::default().build(&functions, &[], &edges, &[]);
        assert_eq!(graph.metric("a", "callOutDegree"), Some(&json!(1)));
        assert_eq!(graph.metric("a", "pageRank"), None);
        assert_eq!(graph.metric("a", "loc"), Some(&json!(5)));
    }

    #[test]
    fn test_absorb_premerged_keeps_totals_consistent() {
        let mut stats = BuildStats::default();
        stats.call_edges.input = 2;
        stats.call_edges.added = 2;
        stats.absorb_premerged(1, 3, 2);
        assert_eq!(stats.nodes.duplicates, 1);
        assert_eq!((stats.call_edges.input, stats.call_edges.merged), (5, 3));
        assert_eq!((stats.similarity_edges.input, stats.similarity_edges.merged), (2, 2));
    }
}
