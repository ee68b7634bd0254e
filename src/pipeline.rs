//! End-to-end run: payload -> symbol tables -> resolution -> graph -> analytics.

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::analysis::{self, AnalysisConfig, CentralityReport, CommunityReport, CoreCliqueReport};
use crate::callgraph::{CallResolution, CallResolver, ResolutionStats, ResolverBuilder, ResolverConfig};
use crate::error::{PayloadError, ValidationIssue};
use crate::graph::{BuildStats, BuilderConfig, CodeGraph, GraphBuilder};
use crate::payload::{self, LoadedPayload, MergeStats, PayloadMerger, Validator};
use crate::symbols::SymbolTableManager;

/// Settings for every stage of a run.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub resolver: ResolverConfig,
    pub builder: BuilderConfig,
    pub analysis: AnalysisConfig,
    pub strict: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationSummary {
    pub issues: Vec<ValidationIssue>,
}

/// Everything a run reports besides the graph itself.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub build: BuildStats,
    pub resolution: ResolutionStats,
    pub centrality: CentralityReport,
    pub communities: CommunityReport,
    pub cliques: CoreCliqueReport,
    pub validation: ValidationSummary,
    pub merge: MergeStats,
}

pub struct PipelineOutput {
    pub graph: CodeGraph,
    pub summary: AnalysisSummary,
}

pub struct Pipeline {
    config: PipelineConfig,
    resolver: CallResolver,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let resolver = ResolverBuilder::new().config(config.resolver.clone()).build();
        Self { config, resolver }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Normalize, validate and merge raw JSON documents.
    pub fn load(&self, documents: Vec<Value>) -> Result<LoadedPayload, PayloadError> {
        payload::load(
            documents,
            &Validator::new(self.config.strict),
            &PayloadMerger::new(self.config.builder.call_site_cap),
        )
    }

    /// Resolve the payload's raw calls without building a graph.
    pub fn resolve(&self, loaded: &LoadedPayload) -> (Vec<CallResolution>, ResolutionStats) {
        let env = &loaded.envelope;
        let symbols =
            SymbolTableManager::from_inventory(&env.functions, &env.imports, &env.exports, &env.symbols);
        self.resolver.resolve_all(&env.calls, &env.functions, &symbols)
    }

    pub fn run(&self, loaded: LoadedPayload) -> PipelineOutput {
        let (resolutions, resolution) = self.resolve(&loaded);

        let env = &loaded.envelope;
        let (mut graph, mut build) = GraphBuilder::new(self.config.builder.clone()).build(
            &env.functions,
            &resolutions,
            &env.call_edges,
            &env.similarity_edges,
        );
        let merge = &loaded.merge;
        build.absorb_premerged(
            merge.duplicate_functions,
            merge.merged_call_edges,
            merge.merged_similarity_edges,
        );

        let report = analysis::analyze(&graph, &self.config.analysis);
        let collisions = report.apply_metrics(&mut graph);
        if collisions > 0 {
            warn!(collisions, "analysis metrics collided with existing node metrics");
        }
        info!(
            nodes = graph.node_count(),
            call_edges = graph.call_edge_count(),
            similarity_edges = graph.similarity_edge_count(),
            communities = report.communities.count(),
            degeneracy = report.cores.degeneracy,
            "analysis complete"
        );

        PipelineOutput {
            graph,
            summary: AnalysisSummary {
                build,
                resolution,
                centrality: report.centrality,
                communities: report.communities,
                cliques: report.cores,
                validation: ValidationSummary {
                    issues: loaded.issues,
                },
                merge: loaded.merge,
            },
        }
    }

    pub fn run_documents(&self, documents: Vec<Value>) -> Result<PipelineOutput, PayloadError> {
        let loaded = self.load(documents)?;
        Ok(self.run(loaded))
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_calls_become_edges_and_metrics() {
        let output = Pipeline::default()
            .run_documents(vec![json!({
                "functions": [
                    {"id": "main", "name": "main", "filePath": "app.py", "lang": "python", "startLine": 1, "endLine": 10},
                    {"id": "foo", "name": "foo", "filePath": "app.py", "lang": "python", "startLine": 12, "endLine": 15}
                ],
                "calls": [
                    {"filePath": "app.py", "calleeName": "foo", "line": 3},
                    {"filePath": "app.py", "calleeName": "doStuff", "line": 4}
                ]
            })])
            .unwrap();

        let graph = &output.graph;
        assert_eq!(output.summary.resolution.resolved, 1);
        assert_eq!(output.summary.resolution.unresolved, 1);
        assert!(graph.contains("virtual::app.py::doStuff"));
        assert_eq!(graph.call_edge_count(), 2);
        assert!(graph.metric("foo", "pageRank").is_some());

        let summary = serde_json::to_value(&output.summary).unwrap();
        assert!(summary["build"]["nodes"]["virtual"].is_number());
        assert!(summary["cliques"]["coreNumbers"].is_object());
        assert!(summary["validation"]["issues"].is_array());
    }

    #[test]
    fn test_strict_rejects_broken_payload() {
        let pipeline = Pipeline::new(PipelineConfig {
            strict: true,
            ..Default::default()
        });
        let err = pipeline
            .run_documents(vec![json!({"functions": [{"id": "x"}]})])
            .err();
        assert!(matches!(err, Some(PayloadError::Invalid { .. })));
    }
}
