//! Serialized form of the finished graph: `{nodes, edges}` with a `layer` tag
//! on every edge.

use serde::Serialize;

use super::model::CodeGraph;
use crate::types::{CallEdge, FunctionNode, SimilarityEdge};

#[derive(Debug, Serialize)]
#[serde(tag = "layer", rename_all = "lowercase")]
pub enum ExportEdge<'a> {
    Call(&'a CallEdge),
    Similarity(&'a SimilarityEdge),
}

#[derive(Debug, Serialize)]
pub struct GraphExport<'a> {
    pub nodes: &'a [FunctionNode],
    pub edges: Vec<ExportEdge<'a>>,
}

impl CodeGraph {
    /// Borrowing view for serialization. Call edges come first, in insertion order.
    pub fn export(&self) -> GraphExport<'_> {
        let edges = self
            .call_edges()
            .iter()
            .map(ExportEdge::Call)
            .chain(self.similarity_edges().iter().map(ExportEdge::Similarity))
            .collect();
        GraphExport {
            nodes: self.nodes(),
            edges,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self.export())
    }
}
