//! Call resolver: orchestrates multiple resolution strategies.
//!
//! Per raw call:
//! 1. Skip empty names and member expressions (namespace imports excepted)
//! 2. Locate the caller: innermost function whose span contains the call
//! 3. Run every strategy, merge candidates, keep the best entry per function
//! 4. Rank, cap, and classify as resolved / ambiguous / unresolved

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, trace};

use super::context::ResolutionContext;
use super::strategies::{CallQuery, Candidate, NamespaceMemberStrategy, ResolutionStrategy};
use crate::symbols::SymbolTableManager;
use crate::types::{
    Confidence, FunctionNode, MatchType, RawCall, Resolution, ResolutionCandidate, ResolutionStatus,
};

/// Configuration for the resolver
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Maximum candidates kept per call after ranking.
    pub max_candidates: usize,
    /// Resolve `ns.fn()` when `ns` is a namespace import.
    pub resolve_namespace_members: bool,
    /// Extra names to treat as generic verbs.
    pub generic_names: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_candidates: 12,
            resolve_namespace_members: true,
            generic_names: Vec::new(),
        }
    }
}

/// Why a call produced no ranking at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    EmptyName,
    MemberExpression,
    NoEnclosingFunction,
}

/// A ranked candidate with enough identity to build an edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedCandidate {
    pub id: String,
    pub name: String,
    pub file_path: String,
    pub match_type: MatchType,
    pub confidence: Confidence,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum CallOutcome {
    Skipped {
        reason: SkipReason,
    },
    Ranked {
        status: ResolutionStatus,
        reason: String,
        candidates: Vec<RankedCandidate>,
    },
}

/// Result of resolving one raw call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallResolution {
    pub call: RawCall,
    /// Id of the enclosing function; `None` when the call was skipped before
    /// the caller was located.
    pub caller: Option<String>,
    #[serde(flatten)]
    pub outcome: CallOutcome,
}

impl CallResolution {
    pub fn status(&self) -> Option<ResolutionStatus> {
        match &self.outcome {
            CallOutcome::Ranked { status, .. } => Some(*status),
            CallOutcome::Skipped { .. } => None,
        }
    }

    pub fn candidates(&self) -> &[RankedCandidate] {
        match &self.outcome {
            CallOutcome::Ranked { candidates, .. } => candidates,
            CallOutcome::Skipped { .. } => &[],
        }
    }

    pub fn best(&self) -> Option<&RankedCandidate> {
        self.candidates().first()
    }

    /// Edge metadata for the whole call: every ranked candidate listed.
    pub fn resolution(&self) -> Option<Resolution> {
        let CallOutcome::Ranked {
            status,
            reason,
            candidates,
        } = &self.outcome
        else {
            return None;
        };
        let mut resolution = Resolution::new(*status).with_reason(reason.clone());
        resolution.match_type = candidates.first().map(|c| c.match_type);
        resolution.candidates = candidates.iter().map(to_resolution_candidate).collect();
        Some(resolution)
    }

    /// Edge metadata for one candidate of an ambiguous call.
    pub fn resolution_for(&self, candidate: &RankedCandidate) -> Resolution {
        let total = self.candidates().len();
        let mut resolution = Resolution::new(self.status().unwrap_or(ResolutionStatus::Ambiguous))
            .with_reason(candidate.match_type.reason());
        resolution.match_type = Some(candidate.match_type);
        resolution.candidates = vec![to_resolution_candidate(candidate)];
        resolution
            .extra
            .insert("candidateCount".to_string(), serde_json::Value::from(total));
        resolution
    }
}

fn to_resolution_candidate(c: &RankedCandidate) -> ResolutionCandidate {
    ResolutionCandidate {
        id: c.id.clone(),
        confidence: c.score,
        match_type: Some(c.match_type),
    }
}

/// The main resolver that combines strategies into ranked call resolutions.
pub struct CallResolver {
    strategies: Vec<Box<dyn ResolutionStrategy>>,
    namespace: NamespaceMemberStrategy,
    config: ResolverConfig,
}

impl CallResolver {
    pub fn new() -> Self {
        Self {
            strategies: vec![],
            namespace: NamespaceMemberStrategy,
            config: ResolverConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Add a resolution strategy. Order does not affect ranking.
    pub fn add_strategy(&mut self, strategy: Box<dyn ResolutionStrategy>) {
        self.strategies.push(strategy);
    }

    /// Convenience builder pattern
    pub fn with_strategy(mut self, strategy: Box<dyn ResolutionStrategy>) -> Self {
        self.add_strategy(strategy);
        self
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Build the lookup context this resolver runs against.
    pub fn context<'a>(
        &self,
        functions: &'a [FunctionNode],
        symbols: &'a SymbolTableManager,
    ) -> ResolutionContext<'a> {
        ResolutionContext::new(functions, symbols)
            .with_generic_names(self.config.generic_names.iter().cloned())
    }

    /// Resolve a batch of calls in parallel. Output order matches input order.
    pub fn resolve_all(
        &self,
        calls: &[RawCall],
        functions: &[FunctionNode],
        symbols: &SymbolTableManager,
    ) -> (Vec<CallResolution>, ResolutionStats) {
        let context = self.context(functions, symbols);
        let resolutions: Vec<CallResolution> = calls
            .par_iter()
            .map(|call| self.resolve_call(call, &context))
            .collect();

        let stats = ResolutionStats::from_resolutions(&resolutions);
        debug!(
            total = stats.total,
            resolved = stats.resolved,
            ambiguous = stats.ambiguous,
            unresolved = stats.unresolved,
            skipped = stats.skipped,
            no_enclosing = stats.no_enclosing_function,
            "resolved calls"
        );
        (resolutions, stats)
    }

    pub fn resolve_call(&self, call: &RawCall, context: &ResolutionContext) -> CallResolution {
        let skipped = |reason, caller: Option<String>| CallResolution {
            call: call.clone(),
            caller,
            outcome: CallOutcome::Skipped { reason },
        };

        if call.callee_name.trim().is_empty() {
            return skipped(SkipReason::EmptyName, None);
        }

        let query = CallQuery {
            call,
            scope_chain: context.enclosing_chain(&call.file_path, call.position()),
        };
        let Some(caller_idx) = query.caller() else {
            trace!(file = %call.file_path, line = call.line, callee = %call.callee_name, "no enclosing function");
            return skipped(SkipReason::NoEnclosingFunction, None);
        };
        let caller = context.function(caller_idx);

        let (candidates, namespace) = if call.is_member_expression() {
            if !self.config.resolve_namespace_members || !self.is_namespace_receiver(call, context) {
                return skipped(SkipReason::MemberExpression, Some(caller.id.clone()));
            }
            (self.namespace.resolve(&query, context), true)
        } else {
            let language = call.language.as_deref().unwrap_or(caller.language.as_str());
            let mut all = Vec::new();
            for strategy in &self.strategies {
                if !strategy.supports_language(language) {
                    continue;
                }
                all.extend(strategy.resolve(&query, context));
            }
            (all, false)
        };

        let ranked = self.rank(candidates, context);
        let status = if namespace && !ranked.is_empty() {
            ResolutionStatus::Ambiguous
        } else {
            classify(&ranked)
        };
        let reason = ranked
            .first()
            .map(|c| c.match_type.reason())
            .unwrap_or("no candidate definition found")
            .to_string();

        CallResolution {
            call: call.clone(),
            caller: Some(caller.id.clone()),
            outcome: CallOutcome::Ranked {
                status,
                reason,
                candidates: ranked,
            },
        }
    }

    fn is_namespace_receiver(&self, call: &RawCall, context: &ResolutionContext) -> bool {
        call.receiver
            .as_deref()
            .and_then(|r| context.symbols.lookup_import(&call.file_path, r))
            .is_some_and(|b| b.is_namespace)
    }

    /// Sort by (match rank, confidence rank, -score, id), keep the first entry
    /// per function, cap the list.
    fn rank(&self, mut candidates: Vec<Candidate>, context: &ResolutionContext) -> Vec<RankedCandidate> {
        candidates.sort_by(|a, b| {
            a.match_type
                .rank()
                .cmp(&b.match_type.rank())
                .then(a.confidence.rank().cmp(&b.confidence.rank()))
                .then(b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
                .then_with(|| context.function(a.index).id.cmp(&context.function(b.index).id))
        });

        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter(|c| seen.insert(c.index))
            .take(self.config.max_candidates)
            .map(|c| {
                let func = context.function(c.index);
                RankedCandidate {
                    id: func.id.clone(),
                    name: func.name.clone(),
                    file_path: func.file_path.clone(),
                    match_type: c.match_type,
                    confidence: c.confidence,
                    score: c.score,
                }
            })
            .collect()
    }
}

impl Default for CallResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Status for a ranked, deduplicated candidate list.
fn classify(ranked: &[RankedCandidate]) -> ResolutionStatus {
    match ranked {
        [] => ResolutionStatus::Unresolved,
        [_] => ResolutionStatus::Resolved,
        [best, rest @ ..] => {
            let unique_high = best.confidence == Confidence::High
                && rest.iter().all(|c| c.confidence != Confidence::High);
            if unique_high {
                ResolutionStatus::Resolved
            } else {
                ResolutionStatus::Ambiguous
            }
        }
    }
}

/// Statistics about call resolution
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionStats {
    pub total: usize,
    pub resolved: usize,
    pub ambiguous: usize,
    pub unresolved: usize,
    /// Empty names and member expressions.
    pub skipped: usize,
    pub no_enclosing_function: usize,
    /// Calls per match type of their best candidate.
    pub by_match_type: BTreeMap<String, usize>,
}

impl ResolutionStats {
    pub fn from_resolutions(resolutions: &[CallResolution]) -> Self {
        let mut stats = Self {
            total: resolutions.len(),
            ..Default::default()
        };
        for r in resolutions {
            match &r.outcome {
                CallOutcome::Skipped {
                    reason: SkipReason::NoEnclosingFunction,
                } => stats.no_enclosing_function += 1,
                CallOutcome::Skipped { .. } => stats.skipped += 1,
                CallOutcome::Ranked {
                    status, candidates, ..
                } => {
                    match status {
                        ResolutionStatus::Resolved => stats.resolved += 1,
                        ResolutionStatus::Ambiguous => stats.ambiguous += 1,
                        ResolutionStatus::Unresolved => stats.unresolved += 1,
                    }
                    if let Some(best) = candidates.first() {
                        *stats
                            .by_match_type
                            .entry(best.match_type.as_str().to_string())
                            .or_insert(0) += 1;
                    }
                }
            }
        }
        stats
    }

    /// Share of attempted calls (not skipped) that found at least one candidate.
    pub fn resolution_rate(&self) -> f64 {
        let attempted = self.resolved + self.ambiguous + self.unresolved;
        if attempted == 0 {
            return 1.0;
        }
        (self.resolved + self.ambiguous) as f64 / attempted as f64
    }
}

/// Builder for creating a fully-configured resolver with default strategies.
pub struct ResolverBuilder {
    config: ResolverConfig,
    lexical: bool,
    local: bool,
    imports: bool,
    symbol_table: bool,
    same_module: bool,
    external: bool,
}

impl ResolverBuilder {
    pub fn new() -> Self {
        Self {
            config: ResolverConfig::default(),
            lexical: true,
            local: true,
            imports: true,
            symbol_table: true,
            same_module: true,
            external: true,
        }
    }

    pub fn config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn lexical(mut self, enabled: bool) -> Self {
        self.lexical = enabled;
        self
    }

    pub fn local(mut self, enabled: bool) -> Self {
        self.local = enabled;
        self
    }

    pub fn imports(mut self, enabled: bool) -> Self {
        self.imports = enabled;
        self
    }

    pub fn symbol_table(mut self, enabled: bool) -> Self {
        self.symbol_table = enabled;
        self
    }

    pub fn same_module(mut self, enabled: bool) -> Self {
        self.same_module = enabled;
        self
    }

    pub fn external(mut self, enabled: bool) -> Self {
        self.external = enabled;
        self
    }

    pub fn build(self) -> CallResolver {
        use super::strategies::*;

        let mut resolver = CallResolver::new().with_config(self.config);

        if self.lexical {
            resolver.add_strategy(Box::new(LexicalStrategy));
        }
        if self.local {
            resolver.add_strategy(Box::new(LocalStrategy));
        }
        if self.imports {
            resolver.add_strategy(Box::new(ImportStrategy));
        }
        if self.symbol_table {
            resolver.add_strategy(Box::new(SymbolTableStrategy));
        }
        if self.same_module {
            resolver.add_strategy(Box::new(SameModuleStrategy::new()));
        }
        if self.external {
            resolver.add_strategy(Box::new(ExternalStrategy::new()));
        }

        resolver
    }
}

impl Default for ResolverBuilder {
    fn default() -> Self {
        Self::new()
    }
}
