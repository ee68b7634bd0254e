//! Topology storage behind the code graph.
//!
//! The builder writes nodes and edges through [`GraphBackend`]; analyzers read
//! neighbors back through it. Attributes never live here, only structure.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

/// Edge layer of the multi-layer graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    /// Directed caller -> callee edges.
    Call,
    /// Undirected semantic-similarity edges.
    Similarity,
}

impl Layer {
    pub fn is_directed(self) -> bool {
        matches!(self, Layer::Call)
    }
}

/// Structural graph storage. Node handles are dense indices in insertion order.
///
/// Callers add each `(source, target, layer)` at most once; parallel edges
/// are folded before they reach the backend. For the similarity layer the
/// direction argument of [`GraphBackend::neighbors`] is ignored.
pub trait GraphBackend: Send + Sync {
    fn add_node(&mut self) -> usize;
    fn add_edge(&mut self, source: usize, target: usize, layer: Layer);
    fn node_count(&self) -> usize;
    fn edge_count(&self, layer: Layer) -> usize;
    fn neighbors(&self, node: usize, layer: Layer, direction: Direction) -> Vec<usize>;
}

/// Default backend: one petgraph `DiGraph` holding both layers, with the
/// layer as edge weight.
#[derive(Debug, Default)]
pub struct PetgraphBackend {
    graph: DiGraph<(), Layer>,
    call_edges: usize,
    similarity_edges: usize,
}

impl PetgraphBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Access underlying petgraph for algorithms
    pub fn inner(&self) -> &DiGraph<(), Layer> {
        &self.graph
    }

    fn endpoints(&self, node: usize, layer: Layer, direction: Direction) -> impl Iterator<Item = usize> + '_ {
        self.graph
            .edges_directed(NodeIndex::new(node), direction)
            .filter(move |e| *e.weight() == layer)
            .map(move |e| match direction {
                Direction::Outgoing => e.target().index(),
                Direction::Incoming => e.source().index(),
            })
    }
}

impl GraphBackend for PetgraphBackend {
    fn add_node(&mut self) -> usize {
        self.graph.add_node(()).index()
    }

    fn add_edge(&mut self, source: usize, target: usize, layer: Layer) {
        self.graph
            .add_edge(NodeIndex::new(source), NodeIndex::new(target), layer);
        match layer {
            Layer::Call => self.call_edges += 1,
            Layer::Similarity => self.similarity_edges += 1,
        }
    }

    fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    fn edge_count(&self, layer: Layer) -> usize {
        match layer {
            Layer::Call => self.call_edges,
            Layer::Similarity => self.similarity_edges,
        }
    }

    fn neighbors(&self, node: usize, layer: Layer, direction: Direction) -> Vec<usize> {
        if node >= self.graph.node_count() {
            return Vec::new();
        }
        if layer.is_directed() {
            return self.endpoints(node, layer, direction).collect();
        }
        let mut out: Vec<usize> = self
            .endpoints(node, layer, Direction::Outgoing)
            .chain(self.endpoints(node, layer, Direction::Incoming))
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}

/// Plain adjacency lists. Small and predictable; handy when the petgraph
/// machinery is not wanted.
#[derive(Debug, Default)]
pub struct AdjacencyBackend {
    out_calls: Vec<Vec<usize>>,
    in_calls: Vec<Vec<usize>>,
    similar: Vec<Vec<usize>>,
    call_edges: usize,
    similarity_edges: usize,
}

impl AdjacencyBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GraphBackend for AdjacencyBackend {
    fn add_node(&mut self) -> usize {
        self.out_calls.push(Vec::new());
        self.in_calls.push(Vec::new());
        self.similar.push(Vec::new());
        self.out_calls.len() - 1
    }

    fn add_edge(&mut self, source: usize, target: usize, layer: Layer) {
        match layer {
            Layer::Call => {
                self.out_calls[source].push(target);
                self.in_calls[target].push(source);
                self.call_edges += 1;
            }
            Layer::Similarity => {
                self.similar[source].push(target);
                self.similar[target].push(source);
                self.similarity_edges += 1;
            }
        }
    }

    fn node_count(&self) -> usize {
        self.out_calls.len()
    }

    fn edge_count(&self, layer: Layer) -> usize {
        match layer {
            Layer::Call => self.call_edges,
            Layer::Similarity => self.similarity_edges,
        }
    }

    fn neighbors(&self, node: usize, layer: Layer, direction: Direction) -> Vec<usize> {
        let lists = match (layer, direction) {
            (Layer::Call, Direction::Outgoing) => &self.out_calls,
            (Layer::Call, Direction::Incoming) => &self.in_calls,
            (Layer::Similarity, _) => &self.similar,
        };
        lists.get(node).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(backend: &mut dyn GraphBackend) {
        let a = backend.add_node();
        let b = backend.add_node();
        let c = backend.add_node();
        backend.add_edge(a, b, Layer::Call);
        backend.add_edge(c, a, Layer::Similarity);

        assert_eq!(backend.node_count(), 3);
        assert_eq!(backend.edge_count(Layer::Call), 1);
        assert_eq!(backend.edge_count(Layer::Similarity), 1);
        assert_eq!(backend.neighbors(a, Layer::Call, Direction::Outgoing), vec![b]);
        assert!(backend.neighbors(a, Layer::Call, Direction::Incoming).is_empty());
        assert_eq!(backend.neighbors(b, Layer::Call, Direction::Incoming), vec![a]);
        assert_eq!(backend.neighbors(a, Layer::Similarity, Direction::Outgoing), vec![c]);
        assert_eq!(backend.neighbors(c, Layer::Similarity, Direction::Incoming), vec![a]);
    }

    #[test]
    fn test_petgraph_backend() {
        exercise(&mut PetgraphBackend::new());
    }

    #[test]
    fn test_adjacency_backend() {
        exercise(&mut AdjacencyBackend::new());
    }
}
