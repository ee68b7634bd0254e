//! Pluggable resolution strategies for call graph construction.
//!
//! Each strategy is one independent signal. A strategy reports every candidate
//! it can justify, tagged with its match type and confidence; the resolver
//! merges the lists, keeps the best-ranked entry per function and decides the
//! status.
//!
//! # Strategy Hierarchy (by match rank)
//!
//! 1. LexicalStrategy - nested function visible from the call's scope chain
//! 2. LocalStrategy - defined in the caller's file
//! 3. ImportStrategy - named or default import binding
//! 4. SymbolTableStrategy - FQN lookup through the symbol tables
//! 5. SameModuleStrategy - candidate lives in a nearby directory
//! 6. ExternalStrategy - same name anywhere (fallback)
//!
//! `NamespaceMemberStrategy` is only consulted for member calls whose
//! receiver is a namespace import.

use super::context::{dir_segments, module_prefix, path_similarity, ResolutionContext};
use crate::types::{normalize_path, Confidence, MatchType, RawCall};

/// A resolution candidate with match type and confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Index into the resolver's function inventory.
    pub index: usize,
    pub match_type: MatchType,
    pub confidence: Confidence,
    /// Numeric score in [0, 1]; breaks ties inside one confidence level.
    pub score: f64,
}

impl Candidate {
    pub fn new(index: usize, match_type: MatchType, confidence: Confidence) -> Self {
        Self {
            index,
            match_type,
            confidence,
            score: confidence.score(),
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score.clamp(0.0, 1.0);
        self
    }
}

/// One call being resolved, with its located caller.
#[derive(Debug, Clone)]
pub struct CallQuery<'c> {
    pub call: &'c RawCall,
    /// Functions whose span contains the call, outermost first. The last one
    /// is the caller.
    pub scope_chain: Vec<usize>,
}

impl<'c> CallQuery<'c> {
    pub fn caller(&self) -> Option<usize> {
        self.scope_chain.last().copied()
    }

    pub fn callee(&self) -> &str {
        &self.call.callee_name
    }
}

/// Trait for pluggable resolution strategies.
pub trait ResolutionStrategy: Send + Sync {
    /// Strategy name for debugging/display
    fn name(&self) -> &'static str;

    /// All candidates this strategy can justify for the call.
    fn resolve(&self, query: &CallQuery, context: &ResolutionContext) -> Vec<Candidate>;

    /// Whether this strategy applies to the given language
    fn supports_language(&self, lang: &str) -> bool {
        let _ = lang;
        true
    }
}

fn same_file(a: &str, b: &str) -> bool {
    normalize_path(a) == normalize_path(b)
}

// =============================================================================
// Strategy Implementations
// =============================================================================

/// Nested functions reachable through the call's chain of enclosing scopes.
///
/// A candidate matches when its own parent function is one of the functions
/// enclosing the call. Zero scope boundaries between that parent and the call,
/// with the candidate defined before the call, is `high`; anything else
/// (outer scopes, hoisted definitions after the call) is `medium`. Top-level
/// functions are left to `LocalStrategy`.
#[derive(Debug, Default)]
pub struct LexicalStrategy;

impl ResolutionStrategy for LexicalStrategy {
    fn name(&self) -> &'static str {
        "lexical"
    }

    fn resolve(&self, query: &CallQuery, context: &ResolutionContext) -> Vec<Candidate> {
        let pos = query.call.position();
        context
            .find_by_name(query.callee())
            .iter()
            .copied()
            .filter(|&idx| same_file(&context.function(idx).file_path, &query.call.file_path))
            .filter_map(|idx| {
                let parent = context.parent_of(idx)?;
                let depth = query.scope_chain.iter().position(|&s| s == parent)?;
                let intervening = query.scope_chain.len() - 1 - depth;
                let before_call = context.function(idx).span.ends_before(pos);
                let confidence = if intervening == 0 && before_call {
                    Confidence::High
                } else {
                    Confidence::Medium
                };
                Some(Candidate::new(idx, MatchType::Lexical, confidence))
            })
            .collect()
    }
}

/// Definitions in the caller's file.
#[derive(Debug, Default)]
pub struct LocalStrategy;

impl ResolutionStrategy for LocalStrategy {
    fn name(&self) -> &'static str {
        "local"
    }

    fn resolve(&self, query: &CallQuery, context: &ResolutionContext) -> Vec<Candidate> {
        context
            .find_by_name(query.callee())
            .iter()
            .copied()
            .filter(|&idx| same_file(&context.function(idx).file_path, &query.call.file_path))
            .map(|idx| Candidate::new(idx, MatchType::Local, Confidence::High))
            .collect()
    }
}

/// Import-based resolution through the caller file's import bindings.
///
/// Given `import { parse as p } from "./parser"` and a call to `p()`, matches
/// `parse` in the bound module (`importExact`). A default import matches the
/// module's default export (`importDefault`).
#[derive(Debug, Default)]
pub struct ImportStrategy;

impl ResolutionStrategy for ImportStrategy {
    fn name(&self) -> &'static str {
        "import"
    }

    fn resolve(&self, query: &CallQuery, context: &ResolutionContext) -> Vec<Candidate> {
        let Some(binding) = context
            .symbols
            .lookup_import(&query.call.file_path, query.callee())
        else {
            return vec![];
        };
        if binding.is_namespace {
            return vec![];
        }

        let mut out: Vec<Candidate> = context
            .find_by_name(&binding.original_name)
            .iter()
            .copied()
            .filter(|&idx| {
                let func = context.function(idx);
                binding.targets_module(func.module_id.as_deref(), &func.file_path)
            })
            .map(|idx| Candidate::new(idx, MatchType::ImportExact, Confidence::High))
            .collect();

        if binding.is_default() {
            for idx in context.functions_in_module(binding) {
                let func = context.function(idx);
                if context.symbols.default_export(&func.file_path) == Some(func.name.as_str()) {
                    out.push(Candidate::new(idx, MatchType::ImportDefault, Confidence::High));
                }
            }
        }

        out
    }
}

/// Cross-file lookup through the symbol table manager.
///
/// The caller file's binding for the callee yields a best-effort FQN. A
/// candidate with exactly that FQN is `symbolTableExact`; one that shares the
/// FQN's module prefix is `symbolTableModule`.
#[derive(Debug, Default)]
pub struct SymbolTableStrategy;

impl ResolutionStrategy for SymbolTableStrategy {
    fn name(&self) -> &'static str {
        "symbol_table"
    }

    fn resolve(&self, query: &CallQuery, context: &ResolutionContext) -> Vec<Candidate> {
        let Some(fq) = context.symbols.resolve(&query.call.file_path, query.callee()) else {
            return vec![];
        };
        let module = module_prefix(&fq);
        let leaf = fq.rsplit(['.', ':', '/']).next().unwrap_or(fq.as_str());

        let mut pool: Vec<usize> = context.find_by_name(query.callee()).to_vec();
        if leaf != query.callee() {
            pool.extend_from_slice(context.find_by_name(leaf));
        }

        pool.into_iter()
            .filter_map(|idx| {
                let func = context.function(idx);
                if func.fq_name() == fq {
                    return Some(Candidate::new(idx, MatchType::SymbolTableExact, Confidence::High));
                }
                let module = module?;
                let shares_module = module_prefix(func.fq_name()) == Some(module)
                    || func.module_id.as_deref() == Some(module);
                shares_module
                    .then(|| Candidate::new(idx, MatchType::SymbolTableModule, Confidence::Medium))
            })
            .collect()
    }
}

/// Candidates whose directory equals, contains, or sits under the caller's.
///
/// Confidence scales with path similarity: shared leading directory segments
/// over the longer path's segment count.
#[derive(Debug)]
pub struct SameModuleStrategy {
    /// Score floor for related directories with nothing in common beyond the relation.
    pub base: f64,
    /// Extra score at full path similarity.
    pub similarity_weight: f64,
}

impl SameModuleStrategy {
    pub fn new() -> Self {
        Self {
            base: 0.3,
            similarity_weight: 0.4,
        }
    }
}

impl Default for SameModuleStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolutionStrategy for SameModuleStrategy {
    fn name(&self) -> &'static str {
        "same_module"
    }

    fn resolve(&self, query: &CallQuery, context: &ResolutionContext) -> Vec<Candidate> {
        let caller_dir = dir_segments(&query.call.file_path);

        context
            .find_by_name(query.callee())
            .iter()
            .copied()
            .filter_map(|idx| {
                let cand_dir = dir_segments(&context.function(idx).file_path);
                let shared = caller_dir.iter().zip(&cand_dir).take_while(|(a, b)| a == b).count();
                // Equal, ancestor or descendant: the shorter path is a prefix of the longer.
                if shared != caller_dir.len().min(cand_dir.len()) {
                    return None;
                }
                let similarity = path_similarity(&caller_dir, &cand_dir);
                let confidence = if similarity >= 0.5 {
                    Confidence::Medium
                } else {
                    Confidence::Low
                };
                Some(
                    Candidate::new(idx, MatchType::SameModule, confidence)
                        .with_score(self.base + self.similarity_weight * similarity),
                )
            })
            .collect()
    }
}

/// Fallback: name matching across the codebase.
///
/// Lowest confidence because name collisions are common; generic verbs like
/// `get` or `map` score lower still.
#[derive(Debug)]
pub struct ExternalStrategy {
    pub score: f64,
    pub generic_score: f64,
}

impl ExternalStrategy {
    pub fn new() -> Self {
        Self {
            score: Confidence::Low.score(),
            generic_score: 0.15,
        }
    }
}

impl Default for ExternalStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolutionStrategy for ExternalStrategy {
    fn name(&self) -> &'static str {
        "external"
    }

    fn resolve(&self, query: &CallQuery, context: &ResolutionContext) -> Vec<Candidate> {
        let score = if context.is_generic_name(query.callee()) {
            self.generic_score
        } else {
            self.score
        };
        context
            .find_by_name(query.callee())
            .iter()
            .map(|&idx| Candidate::new(idx, MatchType::External, Confidence::Low).with_score(score))
            .collect()
    }
}

/// Member call on a namespace import: `utils.slugify()` with
/// `import * as utils from "./utils"`.
///
/// Method identity on a namespace cannot be proven statically, so these
/// candidates never exceed `medium` and the resolver reports them as
/// ambiguous.
#[derive(Debug, Default)]
pub struct NamespaceMemberStrategy;

impl ResolutionStrategy for NamespaceMemberStrategy {
    fn name(&self) -> &'static str {
        "namespace_member"
    }

    fn resolve(&self, query: &CallQuery, context: &ResolutionContext) -> Vec<Candidate> {
        let Some(receiver) = query.call.receiver.as_deref() else {
            return vec![];
        };
        let Some(binding) = context.symbols.lookup_import(&query.call.file_path, receiver) else {
            return vec![];
        };
        if !binding.is_namespace {
            return vec![];
        }
        context
            .functions_in_module(binding)
            .into_iter()
            .filter(|&idx| context.function(idx).name == query.callee())
            .map(|idx| Candidate::new(idx, MatchType::ImportNamespace, Confidence::Medium))
            .collect()
    }
}
