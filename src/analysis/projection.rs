//! Undirected views of the code graph used by the analyzers.

use std::collections::BTreeMap;

use crate::graph::CodeGraph;

/// Neighbor-union projection: `u ~ v` when any call (either direction) or
/// similarity edge joins them. Self-loops never appear.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    /// Sorted, deduplicated neighbor lists.
    pub neighbors: Vec<Vec<usize>>,
}

impl Projection {
    pub fn from_graph(graph: &CodeGraph) -> Self {
        let neighbors = (0..graph.node_count())
            .map(|idx| graph.undirected_neighbors(idx))
            .collect();
        Self { neighbors }
    }

    /// Build from an edge list; out-of-range endpoints and self-loops are ignored.
    pub fn from_edges(n: usize, edges: &[(usize, usize)]) -> Self {
        let mut neighbors = vec![Vec::new(); n];
        for &(a, b) in edges {
            if a == b || a >= n || b >= n {
                continue;
            }
            neighbors[a].push(b);
            neighbors[b].push(a);
        }
        for list in &mut neighbors {
            list.sort_unstable();
            list.dedup();
        }
        Self { neighbors }
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    pub fn degree(&self, idx: usize) -> usize {
        self.neighbors[idx].len()
    }

    pub fn is_adjacent(&self, a: usize, b: usize) -> bool {
        self.neighbors[a].binary_search(&b).is_ok()
    }
}

/// Weighted undirected projection for community detection.
///
/// Pair weight is the call weight in both directions plus the similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedProjection {
    /// `adj[i]` lists `(j, w_ij)` once per neighbor, ordered by `j`.
    pub adj: Vec<Vec<(usize, f64)>>,
}

impl WeightedProjection {
    pub fn from_graph(graph: &CodeGraph) -> Self {
        let mut pairs: Vec<(usize, usize, f64)> = graph
            .call_edges_indexed()
            .map(|(s, t, e)| (s, t, e.weight))
            .collect();
        pairs.extend(
            graph
                .similarity_edges_indexed()
                .map(|(a, b, e)| (a, b, e.similarity)),
        );
        Self::from_edges(graph.node_count(), &pairs)
    }

    /// Parallel and reversed pairs are summed; self-loops, non-positive
    /// weights and out-of-range endpoints are ignored.
    pub fn from_edges(n: usize, edges: &[(usize, usize, f64)]) -> Self {
        let mut summed: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for &(a, b, w) in edges {
            if a == b || a >= n || b >= n || !(w > 0.0) {
                continue;
            }
            *summed.entry((a.min(b), a.max(b))).or_insert(0.0) += w;
        }

        let mut adj = vec![Vec::new(); n];
        for ((a, b), w) in summed {
            adj[a].push((b, w));
            adj[b].push((a, w));
        }
        for list in &mut adj {
            list.sort_by_key(|&(j, _)| j);
        }
        Self { adj }
    }

    pub fn len(&self) -> usize {
        self.adj.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adj.is_empty()
    }

    /// Weighted degree of every node.
    pub fn strengths(&self) -> Vec<f64> {
        self.adj
            .iter()
            .map(|list| list.iter().map(|&(_, w)| w).sum())
            .collect()
    }

    /// Sum of edge weights counted from both ends (`2m`).
    pub fn total_strength(&self) -> f64 {
        self.strengths().iter().sum()
    }
}
