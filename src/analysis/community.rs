//! Community detection with the Louvain method.
//!
//! Two phases per level:
//! 1. Local moving: greedily move nodes to the neighboring community with the
//!    largest modularity gain until no move helps
//! 2. Aggregation: collapse communities into super-nodes and repeat
//!
//! Stops when a level makes no move or the level cap is reached. Modularity of
//! the final partition is measured on the original projection.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::json;
use tracing::debug;

use super::projection::WeightedProjection;
use crate::graph::{CodeGraph, NodeMetrics};

const GAIN_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct CommunityConfig {
    /// Aggregation levels before giving up on further coarsening.
    pub max_levels: usize,
    /// Local-moving sweeps per level.
    pub max_passes: usize,
}

impl Default for CommunityConfig {
    fn default() -> Self {
        Self {
            max_levels: 32,
            max_passes: 100,
        }
    }
}

/// Result of community detection, by node index.
#[derive(Debug, Clone, PartialEq)]
pub struct CommunityResult {
    /// node index -> community id; ids are contiguous in first-appearance order
    pub assignments: Vec<usize>,
    /// community id -> member node indices, ascending
    pub groups: Vec<Vec<usize>>,
    pub modularity: f64,
    /// Levels that moved at least one node.
    pub levels: usize,
}

/// One level of the Louvain hierarchy.
///
/// `adj` may contain self-loops after aggregation; `adj[i]` holds `(i, w)` with
/// `w` the internal weight of super-node `i` counted from both ends.
struct Louvain {
    n: usize,
    adj: Vec<Vec<(usize, f64)>>,
    /// Sum of all weights counted from both ends (2m)
    total_weight: f64,
    community: Vec<usize>,
    /// Sum of strengths of the nodes in each community
    sigma_tot: Vec<f64>,
    k_i: Vec<f64>,
}

impl Louvain {
    fn new(adj: Vec<Vec<(usize, f64)>>) -> Self {
        let n = adj.len();
        let k_i: Vec<f64> = adj
            .iter()
            .map(|list| list.iter().map(|&(_, w)| w).sum())
            .collect();
        let total_weight = k_i.iter().sum();
        Self {
            n,
            adj,
            total_weight,
            community: (0..n).collect(),
            sigma_tot: k_i.clone(),
            k_i,
        }
    }

    /// Phase 1. Returns true if any node changed community.
    fn local_moving_phase(&mut self, max_passes: usize) -> bool {
        let mut improved = false;
        let mut weights_to: HashMap<usize, f64> = HashMap::new();
        let mut order: Vec<usize> = Vec::new();

        for _ in 0..max_passes {
            let mut moved = false;

            for node in 0..self.n {
                let current = self.community[node];
                let k_i = self.k_i[node];

                weights_to.clear();
                order.clear();
                for &(nb, w) in &self.adj[node] {
                    if nb == node {
                        continue;
                    }
                    let c = self.community[nb];
                    let entry = weights_to.entry(c).or_insert_with(|| {
                        order.push(c);
                        0.0
                    });
                    *entry += w;
                }

                self.sigma_tot[current] -= k_i;

                let gain = |c: usize, w_in: f64, sigma: &[f64]| {
                    w_in - sigma[c] * k_i / self.total_weight
                };
                let mut best = current;
                let mut best_gain = gain(
                    current,
                    weights_to.get(&current).copied().unwrap_or(0.0),
                    &self.sigma_tot,
                );
                for &c in &order {
                    if c == current {
                        continue;
                    }
                    let g = gain(c, weights_to[&c], &self.sigma_tot);
                    if g > best_gain + GAIN_EPSILON {
                        best_gain = g;
                        best = c;
                    }
                }

                self.community[node] = best;
                self.sigma_tot[best] += k_i;
                if best != current {
                    moved = true;
                    improved = true;
                }
            }

            if !moved {
                break;
            }
        }

        improved
    }

    /// Renumber communities `0..k` in node order. Returns the mapping
    /// node -> new id and the count.
    fn renumbered(&self) -> (Vec<usize>, usize) {
        let mut remap: HashMap<usize, usize> = HashMap::new();
        let ids = self
            .community
            .iter()
            .map(|&c| {
                let next = remap.len();
                *remap.entry(c).or_insert(next)
            })
            .collect();
        (ids, remap.len())
    }

    /// Phase 2: collapse each community into one super-node.
    fn aggregate(&self, ids: &[usize], count: usize) -> Vec<Vec<(usize, f64)>> {
        let mut summed: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for (i, list) in self.adj.iter().enumerate() {
            for &(j, w) in list {
                *summed.entry((ids[i], ids[j])).or_insert(0.0) += w;
            }
        }
        let mut adj = vec![Vec::new(); count];
        for ((a, b), w) in summed {
            adj[a].push((b, w));
        }
        adj
    }
}

/// Run Louvain over a weighted projection.
pub fn detect_communities(projection: &WeightedProjection, config: &CommunityConfig) -> CommunityResult {
    let n = projection.len();
    let mut membership: Vec<usize> = (0..n).collect();
    let mut levels = 0;

    if projection.total_strength() > 0.0 {
        let mut level = Louvain::new(projection.adj.clone());
        while levels < config.max_levels {
            if !level.local_moving_phase(config.max_passes) {
                break;
            }
            levels += 1;
            let (ids, count) = level.renumbered();
            for m in membership.iter_mut() {
                *m = ids[*m];
            }
            let next = level.aggregate(&ids, count);
            level = Louvain::new(next);
        }
    }

    let mut remap: HashMap<usize, usize> = HashMap::new();
    let assignments: Vec<usize> = membership
        .iter()
        .map(|&c| {
            let next = remap.len();
            *remap.entry(c).or_insert(next)
        })
        .collect();
    let mut groups = vec![Vec::new(); remap.len()];
    for (node, &c) in assignments.iter().enumerate() {
        groups[c].push(node);
    }

    let modularity = modularity(projection, &assignments);
    debug!(levels, communities = groups.len(), modularity, "louvain finished");

    CommunityResult {
        assignments,
        groups,
        modularity,
        levels,
    }
}

/// Newman modularity of a partition: sum over communities of
/// `in_c / 2m - (tot_c / 2m)^2`.
pub fn modularity(projection: &WeightedProjection, assignments: &[usize]) -> f64 {
    let two_m = projection.total_strength();
    if two_m <= 0.0 {
        return 0.0;
    }
    let k = projection.strengths();
    let count = assignments.iter().copied().max().map_or(0, |c| c + 1);
    let mut internal = vec![0.0f64; count];
    let mut total = vec![0.0f64; count];

    for (i, list) in projection.adj.iter().enumerate() {
        let c = assignments[i];
        total[c] += k[i];
        for &(j, w) in list {
            if assignments[j] == c {
                internal[c] += w;
            }
        }
    }

    internal
        .iter()
        .zip(&total)
        .map(|(&inside, &tot)| inside / two_m - (tot / two_m).powi(2))
        .sum()
}

/// Partition keyed by node id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityReport {
    /// node id -> community id
    pub communities: BTreeMap<String, usize>,
    pub modularity: f64,
    /// Member ids per community id.
    pub groups: Vec<Vec<String>>,
    #[serde(skip)]
    assignments: Vec<usize>,
}

impl CommunityReport {
    pub fn from_result(graph: &CodeGraph, result: &CommunityResult) -> Self {
        let id = |idx: usize| graph.node(idx).map(|n| n.id.clone()).unwrap_or_default();
        Self {
            communities: result
                .assignments
                .iter()
                .enumerate()
                .map(|(idx, &c)| (id(idx), c))
                .collect(),
            modularity: result.modularity,
            groups: result
                .groups
                .iter()
                .map(|members| members.iter().map(|&idx| id(idx)).collect())
                .collect(),
            assignments: result.assignments.clone(),
        }
    }

    pub fn count(&self) -> usize {
        self.groups.len()
    }

    /// Per-node metric: `community`.
    pub fn node_metrics(&self) -> Vec<NodeMetrics> {
        self.assignments
            .iter()
            .map(|&c| {
                let mut m = NodeMetrics::new();
                m.insert("community".into(), json!(c));
                m
            })
            .collect()
    }
}

pub struct CommunityDetector {
    config: CommunityConfig,
}

impl CommunityDetector {
    pub fn new(config: CommunityConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, graph: &CodeGraph) -> CommunityReport {
        let projection = WeightedProjection::from_graph(graph);
        let result = detect_communities(&projection, &self.config);
        CommunityReport::from_result(graph, &result)
    }
}

impl Default for CommunityDetector {
    fn default() -> Self {
        Self::new(CommunityConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clique_edges(nodes: &[usize], w: f64) -> Vec<(usize, usize, f64)> {
        let mut out = Vec::new();
        for (i, &a) in nodes.iter().enumerate() {
            for &b in &nodes[i + 1..] {
                out.push((a, b, w));
            }
        }
        out
    }

    #[test]
    fn test_two_cliques_split() {
        let mut edges = clique_edges(&[0, 1, 2, 3], 1.0);
        edges.extend(clique_edges(&[4, 5, 6, 7], 1.0));
        edges.push((3, 4, 1.0));
        let projection = WeightedProjection::from_edges(8, &edges);
        let result = detect_communities(&projection, &CommunityConfig::default());

        assert_eq!(result.groups.len(), 2);
        assert_eq!(result.assignments, vec![0, 0, 0, 0, 1, 1, 1, 1]);
        // 2 * (12/26 - (13/26)^2)
        assert!((result.modularity - 0.4230769).abs() < 1e-6);
    }

    #[test]
    fn test_edgeless_graph_is_singletons() {
        let projection = WeightedProjection::from_edges(3, &[]);
        let result = detect_communities(&projection, &CommunityConfig::default());
        assert_eq!(result.assignments, vec![0, 1, 2]);
        assert_eq!(result.groups, vec![vec![0], vec![1], vec![2]]);
        assert_eq!(result.modularity, 0.0);
        assert_eq!(result.levels, 0);
    }

    #[test]
    fn test_chain_of_triangles_aggregates() {
        // Four triangles in a ring; coarsening keeps each triangle intact.
        let mut edges = Vec::new();
        for t in 0..4 {
            let base = t * 3;
            edges.extend(clique_edges(&[base, base + 1, base + 2], 1.0));
            edges.push((base + 2, (base + 3) % 12, 1.0));
        }
        let projection = WeightedProjection::from_edges(12, &edges);
        let result = detect_communities(&projection, &CommunityConfig::default());

        for t in 0..4 {
            let base = t * 3;
            assert_eq!(result.assignments[base], result.assignments[base + 1]);
            assert_eq!(result.assignments[base], result.assignments[base + 2]);
        }
        assert!(result.modularity > 0.3);
        let recomputed = modularity(&projection, &result.assignments);
        assert!((recomputed - result.modularity).abs() < 1e-12);
    }

    #[test]
    fn test_isolated_node_stays_alone() {
        let projection = WeightedProjection::from_edges(3, &[(0, 1, 1.0)]);
        let result = detect_communities(&projection, &CommunityConfig::default());
        assert_eq!(result.assignments, vec![0, 0, 1]);
    }
}
