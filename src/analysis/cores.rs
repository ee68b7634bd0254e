//! K-core decomposition and maximal clique enumeration over the undirected
//! neighbor-union projection.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use super::projection::Projection;
use crate::graph::{CodeGraph, NodeMetrics};

#[derive(Debug, Clone, PartialEq)]
pub struct CliqueConfig {
    /// Enumeration stops once this many cliques are reported.
    pub max_cliques: usize,
    /// Smaller maximal cliques are not reported.
    pub min_size: usize,
}

impl Default for CliqueConfig {
    fn default() -> Self {
        Self {
            max_cliques: 1000,
            min_size: 2,
        }
    }
}

/// Core number per node by min-degree peeling.
///
/// Nodes are removed lowest current degree first (ties by index). A node's
/// core number is the running maximum of the degrees seen at removal time.
pub fn core_numbers(projection: &Projection) -> Vec<usize> {
    let n = projection.len();
    let mut degree: Vec<usize> = (0..n).map(|i| projection.degree(i)).collect();
    let mut removed = vec![false; n];
    let mut core = vec![0usize; n];
    let mut heap: BinaryHeap<Reverse<(usize, usize)>> =
        (0..n).map(|i| Reverse((degree[i], i))).collect();
    let mut k = 0;

    while let Some(Reverse((d, v))) = heap.pop() {
        if removed[v] || d != degree[v] {
            continue;
        }
        removed[v] = true;
        k = k.max(d);
        core[v] = k;
        for &u in &projection.neighbors[v] {
            if !removed[u] {
                degree[u] -= 1;
                heap.push(Reverse((degree[u], u)));
            }
        }
    }

    core
}

#[derive(Debug, Clone, PartialEq)]
pub struct CliqueResult {
    /// Each clique's members, ascending.
    pub cliques: Vec<Vec<usize>>,
    pub truncated: bool,
}

/// Bron–Kerbosch with pivoting. The pivot is the node of `P ∪ X` with the
/// most neighbors in `P`.
pub fn maximal_cliques(projection: &Projection, config: &CliqueConfig) -> CliqueResult {
    let mut search = CliqueSearch {
        projection,
        config,
        cliques: Vec::new(),
        truncated: false,
    };
    let all: Vec<usize> = (0..projection.len()).collect();
    search.expand(&mut Vec::new(), all, Vec::new());
    CliqueResult {
        cliques: search.cliques,
        truncated: search.truncated,
    }
}

struct CliqueSearch<'a> {
    projection: &'a Projection,
    config: &'a CliqueConfig,
    cliques: Vec<Vec<usize>>,
    truncated: bool,
}

impl CliqueSearch<'_> {
    fn expand(&mut self, r: &mut Vec<usize>, mut p: Vec<usize>, mut x: Vec<usize>) {
        if self.truncated {
            return;
        }
        if p.is_empty() {
            if x.is_empty() && !r.is_empty() && r.len() >= self.config.min_size {
                if self.cliques.len() >= self.config.max_cliques {
                    self.truncated = true;
                    return;
                }
                let mut clique = r.clone();
                clique.sort_unstable();
                self.cliques.push(clique);
            }
            return;
        }

        let Some(pivot) = self.pivot(&p, &x) else {
            return;
        };
        let candidates: Vec<usize> = p
            .iter()
            .copied()
            .filter(|&v| !self.projection.is_adjacent(pivot, v))
            .collect();

        for v in candidates {
            let neighbors = &self.projection.neighbors[v];
            let next_p = intersect(&p, neighbors);
            let next_x = intersect(&x, neighbors);
            r.push(v);
            self.expand(r, next_p, next_x);
            r.pop();
            if self.truncated {
                return;
            }
            p.retain(|&u| u != v);
            let at = x.binary_search(&v).unwrap_or_else(|e| e);
            x.insert(at, v);
        }
    }

    fn pivot(&self, p: &[usize], x: &[usize]) -> Option<usize> {
        p.iter()
            .chain(x)
            .copied()
            .max_by_key(|&u| (intersect(p, &self.projection.neighbors[u]).len(), Reverse(u)))
    }
}

/// Intersection of two ascending lists.
fn intersect(a: &[usize], b: &[usize]) -> Vec<usize> {
    let (mut i, mut j) = (0, 0);
    let mut out = Vec::new();
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

/// Core numbers and cliques keyed by node id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreCliqueReport {
    pub core_numbers: BTreeMap<String, usize>,
    pub degeneracy: usize,
    pub cliques: Vec<Vec<String>>,
    pub truncated: bool,
    #[serde(skip)]
    metrics: Vec<NodeMetrics>,
}

impl CoreCliqueReport {
    /// Per-node metrics: `coreNumber`, `cliqueCount`.
    pub fn node_metrics(&self) -> Vec<NodeMetrics> {
        self.metrics.clone()
    }
}

pub struct CoreCliqueAnalyzer {
    config: CliqueConfig,
}

impl CoreCliqueAnalyzer {
    pub fn new(config: CliqueConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, graph: &CodeGraph, projection: &Projection) -> CoreCliqueReport {
        let (cores, cliques) = rayon::join(
            || core_numbers(projection),
            || maximal_cliques(projection, &self.config),
        );
        let degeneracy = cores.iter().copied().max().unwrap_or(0);
        if cliques.truncated {
            warn!(
                max_cliques = self.config.max_cliques,
                "clique enumeration hit its cap, result is partial"
            );
        }
        debug!(degeneracy, cliques = cliques.cliques.len(), "cores and cliques done");

        let mut clique_count = vec![0usize; projection.len()];
        for clique in &cliques.cliques {
            for &v in clique {
                clique_count[v] += 1;
            }
        }

        let id = |idx: usize| graph.node(idx).map(|n| n.id.clone()).unwrap_or_default();
        let metrics = (0..projection.len())
            .map(|i| {
                let mut m = NodeMetrics::new();
                m.insert("coreNumber".into(), json!(cores[i]));
                m.insert("cliqueCount".into(), json!(clique_count[i]));
                m
            })
            .collect();

        CoreCliqueReport {
            core_numbers: cores.iter().enumerate().map(|(i, &c)| (id(i), c)).collect(),
            degeneracy,
            cliques: cliques
                .cliques
                .iter()
                .map(|members| members.iter().map(|&v| id(v)).collect())
                .collect(),
            truncated: cliques.truncated,
            metrics,
        }
    }
}

impl Default for CoreCliqueAnalyzer {
    fn default() -> Self {
        Self::new(CliqueConfig::default())
    }
}
