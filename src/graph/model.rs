//! The multi-layer code graph: function nodes plus call and similarity edges.
//!
//! Attributes live here; structure is mirrored into the injected
//! [`GraphBackend`]. Once the builder returns, topology is frozen and only
//! node metrics may be added.

use std::collections::{BTreeSet, HashMap};

use petgraph::Direction;
use serde_json::Value;
use tracing::warn;

use super::backend::{GraphBackend, Layer, PetgraphBackend};
use super::merge::{merge_call_edge, merge_similarity_edge};
use crate::types::{Attributes, CallEdge, FunctionNode, SimilarityEdge};

/// Per-node metric record produced by one analyzer. Keys are disjoint across
/// analyzers.
pub type NodeMetrics = Attributes;

/// Metric keys written by the builder and the analyzers on every run.
pub const COMPUTED_METRICS: &[&str] = &[
    "callInDegree",
    "callOutDegree",
    "callInWeight",
    "callOutWeight",
    "similarityDegree",
    "similarityWeight",
    "degree",
    "degreeCentrality",
    "betweenness",
    "pageRank",
    "community",
    "coreNumber",
    "cliqueCount",
];

/// What happened to an edge offered to the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeInsert {
    Added,
    Merged,
}

pub struct CodeGraph {
    backend: Box<dyn GraphBackend>,
    nodes: Vec<FunctionNode>,
    index: HashMap<String, usize>,
    call_edges: Vec<CallEdge>,
    call_pairs: Vec<(usize, usize)>,
    call_index: HashMap<(usize, usize), usize>,
    similarity_edges: Vec<SimilarityEdge>,
    similarity_pairs: Vec<(usize, usize)>,
    similarity_index: HashMap<(usize, usize), usize>,
}

impl std::fmt::Debug for CodeGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeGraph")
            .field("nodes", &self.nodes.len())
            .field("call_edges", &self.call_edges.len())
            .field("similarity_edges", &self.similarity_edges.len())
            .finish()
    }
}

impl CodeGraph {
    pub fn new() -> Self {
        Self::with_backend(Box::new(PetgraphBackend::new()))
    }

    pub fn with_backend(backend: Box<dyn GraphBackend>) -> Self {
        Self {
            backend,
            nodes: Vec::new(),
            index: HashMap::new(),
            call_edges: Vec::new(),
            call_pairs: Vec::new(),
            call_index: HashMap::new(),
            similarity_edges: Vec::new(),
            similarity_pairs: Vec::new(),
            similarity_index: HashMap::new(),
        }
    }

    /// Add a node. Returns `None` when the id is already taken.
    pub(crate) fn add_node(&mut self, node: FunctionNode) -> Option<usize> {
        if self.index.contains_key(&node.id) {
            return None;
        }
        Some(self.push_node(node))
    }

    /// Index of `node.id`, adding the node first if needed. The flag is true
    /// when the node was created.
    pub(crate) fn ensure_node(&mut self, node: FunctionNode) -> (usize, bool) {
        match self.index.get(&node.id) {
            Some(&idx) => (idx, false),
            None => (self.push_node(node), true),
        }
    }

    fn push_node(&mut self, node: FunctionNode) -> usize {
        let idx = self.backend.add_node();
        debug_assert_eq!(idx, self.nodes.len());
        self.index.insert(node.id.clone(), idx);
        self.nodes.push(node);
        idx
    }

    pub(crate) fn insert_call_edge(
        &mut self,
        source: usize,
        target: usize,
        mut edge: CallEdge,
        site_cap: usize,
    ) -> EdgeInsert {
        if let Some(&pos) = self.call_index.get(&(source, target)) {
            merge_call_edge(&mut self.call_edges[pos], edge, site_cap);
            return EdgeInsert::Merged;
        }
        edge.source = self.nodes[source].id.clone();
        edge.target = self.nodes[target].id.clone();
        edge.call_sites.truncate(site_cap);
        self.backend.add_edge(source, target, Layer::Call);
        self.call_index.insert((source, target), self.call_edges.len());
        self.call_pairs.push((source, target));
        self.call_edges.push(edge);
        EdgeInsert::Added
    }

    pub(crate) fn insert_similarity_edge(
        &mut self,
        a: usize,
        b: usize,
        mut edge: SimilarityEdge,
    ) -> EdgeInsert {
        let key = (a.min(b), a.max(b));
        if let Some(&pos) = self.similarity_index.get(&key) {
            merge_similarity_edge(&mut self.similarity_edges[pos], edge);
            return EdgeInsert::Merged;
        }
        edge.source = self.nodes[key.0].id.clone();
        edge.target = self.nodes[key.1].id.clone();
        self.backend.add_edge(key.0, key.1, Layer::Similarity);
        self.similarity_index.insert(key, self.similarity_edges.len());
        self.similarity_pairs.push(key);
        self.similarity_edges.push(edge);
        EdgeInsert::Added
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn call_edge_count(&self) -> usize {
        self.backend.edge_count(Layer::Call)
    }

    pub fn similarity_edge_count(&self) -> usize {
        self.backend.edge_count(Layer::Similarity)
    }

    pub fn nodes(&self) -> &[FunctionNode] {
        &self.nodes
    }

    pub fn node(&self, idx: usize) -> Option<&FunctionNode> {
        self.nodes.get(idx)
    }

    pub fn node_by_id(&self, id: &str) -> Option<&FunctionNode> {
        self.index_of(id).map(|idx| &self.nodes[idx])
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn call_edges(&self) -> &[CallEdge] {
        &self.call_edges
    }

    pub fn similarity_edges(&self) -> &[SimilarityEdge] {
        &self.similarity_edges
    }

    /// Call edges as `(source index, target index, edge)`.
    pub fn call_edges_indexed(&self) -> impl Iterator<Item = (usize, usize, &CallEdge)> + '_ {
        self.call_pairs
            .iter()
            .zip(&self.call_edges)
            .map(|(&(s, t), e)| (s, t, e))
    }

    /// Similarity edges as `(lower index, higher index, edge)`.
    pub fn similarity_edges_indexed(
        &self,
    ) -> impl Iterator<Item = (usize, usize, &SimilarityEdge)> + '_ {
        self.similarity_pairs
            .iter()
            .zip(&self.similarity_edges)
            .map(|(&(a, b), e)| (a, b, e))
    }

    pub fn call_edge(&self, source: usize, target: usize) -> Option<&CallEdge> {
        self.call_index
            .get(&(source, target))
            .map(|&pos| &self.call_edges[pos])
    }

    pub fn callees(&self, idx: usize) -> Vec<usize> {
        self.backend.neighbors(idx, Layer::Call, Direction::Outgoing)
    }

    pub fn callers(&self, idx: usize) -> Vec<usize> {
        self.backend.neighbors(idx, Layer::Call, Direction::Incoming)
    }

    pub fn similar(&self, idx: usize) -> Vec<usize> {
        self.backend
            .neighbors(idx, Layer::Similarity, Direction::Outgoing)
    }

    /// Union of neighbors across both layers, ignoring direction. Sorted, no
    /// self entry.
    pub fn undirected_neighbors(&self, idx: usize) -> Vec<usize> {
        let set: BTreeSet<usize> = self
            .callees(idx)
            .into_iter()
            .chain(self.callers(idx))
            .chain(self.similar(idx))
            .filter(|&n| n != idx)
            .collect();
        set.into_iter().collect()
    }

    /// Outgoing call targets with their collapsed weight.
    pub fn weighted_callees(&self, idx: usize) -> Vec<(usize, f64)> {
        self.callees(idx)
            .into_iter()
            .filter_map(|t| self.call_edge(idx, t).map(|e| (t, e.weight)))
            .collect()
    }

    /// Merge one analyzer's metrics into node `metrics`, insert-if-absent.
    /// Returns how many keys were already present and left untouched.
    pub fn merge_metrics(&mut self, idx: usize, metrics: NodeMetrics) -> usize {
        let Some(node) = self.nodes.get_mut(idx) else {
            return 0;
        };
        let mut collisions = 0;
        for (key, value) in metrics {
            if let Some(existing) = node.metrics.get(&key) {
                if existing != &value {
                    warn!(node = %node.id, metric = %key, "metric already set, keeping existing value");
                }
                collisions += 1;
                continue;
            }
            node.metrics.insert(key, value);
        }
        collisions
    }

    /// Merge a per-node batch (indexed like [`CodeGraph::nodes`]).
    pub fn merge_metric_batch(&mut self, batch: Vec<NodeMetrics>) -> usize {
        batch
            .into_iter()
            .enumerate()
            .map(|(idx, metrics)| self.merge_metrics(idx, metrics))
            .sum()
    }

    pub fn metric(&self, id: &str, key: &str) -> Option<&Value> {
        self.node_by_id(id)?.metrics.get(key)
    }
}

impl Default for CodeGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::backend::AdjacencyBackend;
    use crate::types::SourceSpan;
    use serde_json::json;

    fn node(id: &str) -> FunctionNode {
        FunctionNode::new(id, id, "a.py", "python", SourceSpan::lines(1, 2))
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let mut graph = CodeGraph::new();
        assert_eq!(graph.add_node(node("a")), Some(0));
        assert_eq!(graph.add_node(node("a")), None);
        assert_eq!(graph.ensure_node(node("a")), (0, false));
        assert_eq!(graph.ensure_node(node("b")), (1, true));
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn test_parallel_call_edges_collapse() {
        let mut graph = CodeGraph::with_backend(Box::new(AdjacencyBackend::new()));
        let a = graph.add_node(node("a")).unwrap();
        let b = graph.add_node(node("b")).unwrap();

        assert_eq!(graph.insert_call_edge(a, b, CallEdge::new("a", "b"), 10), EdgeInsert::Added);
        assert_eq!(graph.insert_call_edge(a, b, CallEdge::new("a", "b"), 10), EdgeInsert::Merged);
        assert_eq!(graph.call_edge_count(), 1);
        assert_eq!(graph.call_edge(a, b).unwrap().weight, 2.0);
        assert_eq!(graph.weighted_callees(a), vec![(b, 2.0)]);
        assert_eq!(graph.callers(b), vec![a]);
    }

    #[test]
    fn test_similarity_pairs_are_unordered() {
        let mut graph = CodeGraph::new();
        let a = graph.add_node(node("a")).unwrap();
        let b = graph.add_node(node("b")).unwrap();
        graph.insert_similarity_edge(b, a, SimilarityEdge::new("b", "a", 0.3));
        graph.insert_similarity_edge(a, b, SimilarityEdge::new("a", "b", 0.9));

        assert_eq!(graph.similarity_edge_count(), 1);
        let edge = &graph.similarity_edges()[0];
        assert_eq!((edge.source.as_str(), edge.target.as_str()), ("a", "b"));
        assert_eq!(edge.similarity, 0.9);
        assert_eq!(graph.undirected_neighbors(a), vec![b]);
    }

    #[test]
    fn test_metrics_insert_if_absent() {
        let mut graph = CodeGraph::new();
        let a = graph.add_node(node("a")).unwrap();
        let mut first = NodeMetrics::new();
        first.insert("pageRank".into(), json!(0.5));
        let mut second = NodeMetrics::new();
        second.insert("pageRank".into(), json!(0.1));
        second.insert("coreNumber".into(), json!(1));

        assert_eq!(graph.merge_metrics(a, first), 0);
        assert_eq!(graph.merge_metrics(a, second), 1);
        assert_eq!(graph.metric("a", "pageRank"), Some(&json!(0.5)));
        assert_eq!(graph.metric("a", "coreNumber"), Some(&json!(1)));
    }
}
