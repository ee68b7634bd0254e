//! Fold several envelopes into one.
//!
//! Functions are keyed by id: the first occurrence wins and later copies only
//! fill in what it lacks. Call edges collapse per `(source, target)` and
//! similarity edges per unordered pair, using the same rules as the graph
//! builder. Resolver inputs are concatenated.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use super::envelope::Envelope;
use crate::graph::merge::{fill_missing, merge_call_edge, merge_similarity_edge};
use crate::types::FunctionNode;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeStats {
    pub envelopes: usize,
    pub functions: usize,
    pub duplicate_functions: usize,
    pub call_edges: usize,
    pub merged_call_edges: usize,
    pub similarity_edges: usize,
    pub merged_similarity_edges: usize,
}

#[derive(Debug, Clone)]
pub struct PayloadMerger {
    site_cap: usize,
}

impl PayloadMerger {
    pub fn new(site_cap: usize) -> Self {
        Self { site_cap }
    }

    pub fn merge(&self, envelopes: Vec<Envelope>) -> (Envelope, MergeStats) {
        let mut stats = MergeStats {
            envelopes: envelopes.len(),
            ..Default::default()
        };
        let mut out = Envelope::default();
        let mut function_index: HashMap<String, usize> = HashMap::new();
        let mut call_index: HashMap<(String, String), usize> = HashMap::new();
        let mut similarity_index: HashMap<(String, String), usize> = HashMap::new();

        for envelope in envelopes {
            for function in envelope.functions {
                // Id-less entries are left for the validator to report.
                if function.id.is_empty() {
                    out.functions.push(function);
                    continue;
                }
                match function_index.get(&function.id) {
                    Some(&at) => {
                        stats.duplicate_functions += 1;
                        fill_function(&mut out.functions[at], function);
                    }
                    None => {
                        function_index.insert(function.id.clone(), out.functions.len());
                        out.functions.push(function);
                    }
                }
            }

            for edge in envelope.call_edges {
                let key = (edge.source.clone(), edge.target.clone());
                match call_index.get(&key) {
                    Some(&at) => {
                        stats.merged_call_edges += 1;
                        merge_call_edge(&mut out.call_edges[at], edge, self.site_cap);
                    }
                    None => {
                        call_index.insert(key, out.call_edges.len());
                        out.call_edges.push(edge);
                    }
                }
            }

            for edge in envelope.similarity_edges {
                let (a, b) = edge.canonical_key();
                let key = (a.to_string(), b.to_string());
                match similarity_index.get(&key) {
                    Some(&at) => {
                        stats.merged_similarity_edges += 1;
                        merge_similarity_edge(&mut out.similarity_edges[at], edge);
                    }
                    None => {
                        similarity_index.insert(key, out.similarity_edges.len());
                        out.similarity_edges.push(edge);
                    }
                }
            }

            out.calls.extend(envelope.calls);
            out.imports.extend(envelope.imports);
            out.exports.extend(envelope.exports);
            out.symbols.extend(envelope.symbols);
        }

        stats.functions = out.functions.len();
        stats.call_edges = out.call_edges.len();
        stats.similarity_edges = out.similarity_edges.len();
        debug!(
            envelopes = stats.envelopes,
            duplicate_functions = stats.duplicate_functions,
            merged_call_edges = stats.merged_call_edges,
            "payloads merged"
        );
        (out, stats)
    }
}

impl Default for PayloadMerger {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Copy over the fields `existing` is missing.
fn fill_function(existing: &mut FunctionNode, incoming: FunctionNode) {
    if existing.name.is_empty() {
        existing.name = incoming.name;
    }
    if existing.file_path.is_empty() {
        existing.file_path = incoming.file_path;
    }
    if existing.language.is_empty() {
        existing.language = incoming.language;
    }
    if existing.fully_qualified_name.is_none() {
        existing.fully_qualified_name = incoming.fully_qualified_name;
    }
    if existing.module_id.is_none() {
        existing.module_id = incoming.module_id;
    }

    let span = &mut existing.span;
    if span.start_line == 0 && span.end_line == 0 {
        span.start_line = incoming.span.start_line;
        span.end_line = incoming.span.end_line;
    }
    span.start = span.start.or(incoming.span.start);
    span.end = span.end.or(incoming.span.end);
    span.start_column = span.start_column.or(incoming.span.start_column);
    span.end_column = span.end_column.or(incoming.span.end_column);

    // A real definition replaces a placeholder.
    existing.is_virtual &= incoming.is_virtual;
    fill_missing(&mut existing.metrics, incoming.metrics);
    fill_missing(&mut existing.extra, incoming.extra);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CallEdge, CallSite, RawCall, SimilarityEdge, SourceSpan};
    use serde_json::json;

    fn site(line: u32) -> CallSite {
        CallSite {
            file_path: "a.py".into(),
            line,
            column: 0,
            context: None,
        }
    }

    #[test]
    fn test_first_function_wins_and_gaps_fill() {
        let first = FunctionNode::new("f", "f", "a.py", "python", SourceSpan::lines(1, 5));
        let mut second = FunctionNode::new("f", "other", "b.py", "python", SourceSpan::lines(7, 9))
            .with_module("pkg.a");
        second.metrics.insert("loc".into(), json!(5));

        let (merged, stats) = PayloadMerger::default().merge(vec![
            Envelope {
                functions: vec![first],
                ..Default::default()
            },
            Envelope {
                functions: vec![second],
                ..Default::default()
            },
        ]);

        assert_eq!(stats.duplicate_functions, 1);
        assert_eq!(merged.functions.len(), 1);
        let f = &merged.functions[0];
        assert_eq!(f.name, "f");
        assert_eq!(f.span.start_line, 1);
        assert_eq!(f.module_id.as_deref(), Some("pkg.a"));
        assert_eq!(f.metrics.get("loc"), Some(&json!(5)));
    }

    #[test]
    fn test_parallel_call_edges_collapse() {
        let mut e1 = CallEdge::new("a", "b");
        e1.call_sites = vec![site(3), site(4)];
        let mut e2 = CallEdge::new("a", "b");
        e2.weight = 2.0;
        e2.is_dynamic = true;
        e2.call_sites = vec![site(8), site(9)];

        let (merged, stats) = PayloadMerger::new(3).merge(vec![
            Envelope {
                call_edges: vec![e1, CallEdge::new("b", "a")],
                ..Default::default()
            },
            Envelope {
                call_edges: vec![e2],
                ..Default::default()
            },
        ]);

        assert_eq!(stats.merged_call_edges, 1);
        assert_eq!(merged.call_edges.len(), 2);
        let edge = &merged.call_edges[0];
        assert_eq!(edge.weight, 3.0);
        assert!(edge.is_dynamic);
        assert_eq!(edge.call_sites.len(), 3);
    }

    #[test]
    fn test_similarity_edges_collapse_regardless_of_direction() {
        let (merged, stats) = PayloadMerger::default().merge(vec![Envelope {
            similarity_edges: vec![
                SimilarityEdge::new("a", "b", 0.4),
                SimilarityEdge::new("b", "a", 0.8),
            ],
            ..Default::default()
        }]);
        assert_eq!(stats.merged_similarity_edges, 1);
        assert_eq!(merged.similarity_edges.len(), 1);
        assert_eq!(merged.similarity_edges[0].similarity, 0.8);
    }

    #[test]
    fn test_resolver_inputs_concatenate() {
        let calls = |n: u32| Envelope {
            calls: (0..n).map(|i| RawCall::new("a.py", "f", i + 1, 0)).collect(),
            ..Default::default()
        };
        let (merged, stats) = PayloadMerger::default().merge(vec![calls(2), calls(3)]);
        assert_eq!(merged.calls.len(), 5);
        assert_eq!(stats.envelopes, 2);
    }
}
