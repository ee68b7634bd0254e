//! Degree, betweenness and PageRank centrality.
//!
//! Betweenness runs one Brandes BFS per source on the rayon pool and sums the
//! partial dependency vectors. PageRank iterates a pull-style update where each
//! node's new score is computed independently, so every iteration is a
//! parallel map over nodes.

use std::collections::{BTreeMap, VecDeque};

use rayon::prelude::*;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use super::projection::Projection;
use crate::graph::{CodeGraph, NodeMetrics};

/// PageRank parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CentralityConfig {
    pub damping: f64,
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for CentralityConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            tolerance: 1e-6,
            max_iterations: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DegreeScores {
    pub call_in: usize,
    pub call_out: usize,
    /// Distinct neighbors across both layers.
    pub undirected: usize,
    /// `undirected / max(n - 1, 1)`.
    pub normalized: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageRankResult {
    pub scores: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
}

pub fn degree_centrality(graph: &CodeGraph, projection: &Projection) -> Vec<DegreeScores> {
    let n = projection.len();
    let denom = n.saturating_sub(1).max(1) as f64;
    (0..n)
        .map(|idx| {
            let undirected = projection.degree(idx);
            DegreeScores {
                call_in: graph.callers(idx).len(),
                call_out: graph.callees(idx).len(),
                undirected,
                normalized: undirected as f64 / denom,
            }
        })
        .collect()
}

/// Normalized betweenness over the undirected projection.
///
/// Every unordered pair is seen from both ends, so raw sums are halved, then
/// scaled by `2 / ((n-1)(n-2))`. Graphs with fewer than three nodes score zero.
pub fn betweenness(projection: &Projection) -> Vec<f64> {
    let n = projection.len();
    if n < 3 {
        return vec![0.0; n];
    }

    let raw = (0..n)
        .into_par_iter()
        .fold(
            || vec![0.0f64; n],
            |mut acc, source| {
                accumulate_dependencies(projection, source, &mut acc);
                acc
            },
        )
        .reduce(
            || vec![0.0f64; n],
            |mut a, b| {
                for (x, y) in a.iter_mut().zip(b) {
                    *x += y;
                }
                a
            },
        );

    let scale = 2.0 / ((n - 1) as f64 * (n - 2) as f64);
    raw.into_iter().map(|v| v / 2.0 * scale).collect()
}

/// One Brandes pass: BFS from `source` counting shortest paths, then
/// dependency accumulation in reverse BFS order.
fn accumulate_dependencies(projection: &Projection, source: usize, acc: &mut [f64]) {
    let n = projection.len();
    let mut sigma = vec![0.0f64; n];
    let mut dist = vec![usize::MAX; n];
    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut order = Vec::with_capacity(n);
    let mut queue = VecDeque::new();

    sigma[source] = 1.0;
    dist[source] = 0;
    queue.push_back(source);

    while let Some(v) = queue.pop_front() {
        order.push(v);
        for &w in &projection.neighbors[v] {
            if dist[w] == usize::MAX {
                dist[w] = dist[v] + 1;
                queue.push_back(w);
            }
            if dist[w] == dist[v] + 1 {
                sigma[w] += sigma[v];
                preds[w].push(v);
            }
        }
    }

    let mut delta = vec![0.0f64; n];
    for &w in order.iter().rev() {
        for &v in &preds[w] {
            delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
        }
        if w != source {
            acc[w] += delta[w];
        }
    }
}

/// Weighted PageRank over directed out-edges `out[i] = [(j, weight)]`.
///
/// Transition probability is proportional to edge weight. Mass from nodes
/// without out-weight is spread uniformly. Stops when the L1 change drops
/// below `tolerance` or after `max_iterations`; the result always sums to 1.
pub fn pagerank(out: &[Vec<(usize, f64)>], config: &CentralityConfig) -> PageRankResult {
    let n = out.len();
    if n == 0 {
        return PageRankResult {
            scores: Vec::new(),
            iterations: 0,
            converged: true,
        };
    }

    let out_weight: Vec<f64> = out
        .iter()
        .map(|edges| edges.iter().filter(|&&(_, w)| w > 0.0).map(|&(_, w)| w).sum())
        .collect();

    // Pull form: incoming[j] = [(i, p_ij)].
    let mut incoming: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    for (i, edges) in out.iter().enumerate() {
        for &(j, w) in edges {
            if j < n && w > 0.0 {
                incoming[j].push((i, w / out_weight[i]));
            }
        }
    }

    let d = config.damping;
    let nf = n as f64;
    let mut rank = vec![1.0 / nf; n];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iterations {
        iterations += 1;
        let dangling: f64 = rank
            .iter()
            .zip(&out_weight)
            .filter(|&(_, &w)| w <= 0.0)
            .map(|(r, _)| r)
            .sum();
        let base = (1.0 - d) / nf + d * dangling / nf;

        let next: Vec<f64> = incoming
            .par_iter()
            .map(|ins| base + d * ins.iter().map(|&(i, p)| rank[i] * p).sum::<f64>())
            .collect();

        let delta: f64 = next.iter().zip(&rank).map(|(a, b)| (a - b).abs()).sum();
        rank = next;
        if delta < config.tolerance {
            converged = true;
            break;
        }
    }

    let total: f64 = rank.iter().sum();
    if total > 0.0 {
        rank.iter_mut().for_each(|r| *r /= total);
    }

    PageRankResult {
        scores: rank,
        iterations,
        converged,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRankSummary {
    pub iterations: usize,
    pub converged: bool,
    pub scores: BTreeMap<String, f64>,
}

/// Centrality scores keyed by node id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CentralityReport {
    pub degree: BTreeMap<String, DegreeScores>,
    pub betweenness: BTreeMap<String, f64>,
    pub page_rank: PageRankSummary,
    #[serde(skip)]
    metrics: Vec<NodeMetrics>,
}

impl CentralityReport {
    /// Per-node metrics: `degree`, `degreeCentrality`, `betweenness`, `pageRank`.
    pub fn node_metrics(&self) -> Vec<NodeMetrics> {
        self.metrics.clone()
    }
}

pub struct CentralityAnalyzer {
    config: CentralityConfig,
}

impl CentralityAnalyzer {
    pub fn new(config: CentralityConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, graph: &CodeGraph, projection: &Projection) -> CentralityReport {
        let (degree, (between, pr)) = rayon::join(
            || degree_centrality(graph, projection),
            || {
                rayon::join(
                    || betweenness(projection),
                    || {
                        let out: Vec<Vec<(usize, f64)>> = (0..graph.node_count())
                            .map(|idx| graph.weighted_callees(idx))
                            .collect();
                        pagerank(&out, &self.config)
                    },
                )
            },
        );
        debug!(
            iterations = pr.iterations,
            converged = pr.converged,
            "pagerank finished"
        );

        let ids: Vec<&str> = graph.nodes().iter().map(|n| n.id.as_str()).collect();
        let metrics = (0..ids.len())
            .map(|i| {
                let mut m = NodeMetrics::new();
                m.insert("degree".into(), json!(degree[i].undirected));
                m.insert("degreeCentrality".into(), json!(degree[i].normalized));
                m.insert("betweenness".into(), json!(between[i]));
                m.insert("pageRank".into(), json!(pr.scores[i]));
                m
            })
            .collect();

        CentralityReport {
            degree: ids.iter().map(|id| id.to_string()).zip(degree).collect(),
            betweenness: ids.iter().map(|id| id.to_string()).zip(between).collect(),
            page_rank: PageRankSummary {
                iterations: pr.iterations,
                converged: pr.converged,
                scores: ids.iter().map(|id| id.to_string()).zip(pr.scores).collect(),
            },
            metrics,
        }
    }
}

impl Default for CentralityAnalyzer {
    fn default() -> Self {
        Self::new(CentralityConfig::default())
    }
}
