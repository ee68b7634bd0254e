//! Call resolution with pluggable strategies.
//!
//! Raw call expressions come in with a file, a position and a callee name.
//! Each strategy contributes candidates tagged with a match type and a
//! confidence; the resolver ranks them and decides whether the call is
//! resolved, ambiguous or unresolved.
//!
//! # Quick Start
//!
//! ```ignore
//! let resolver = ResolverBuilder::new().build();
//! let (resolutions, stats) = resolver.resolve_all(&calls, &functions, &symbols);
//! println!("{:.1}% attempted calls matched", stats.resolution_rate() * 100.0);
//! ```
//!
//! - Strategies are independent; the builder can switch each one off
//! - Ranking depends only on the merged candidates, never on strategy order
//! - Ambiguity and failure are in-band results, never errors

mod context;
mod resolver;
mod strategies;

pub use context::{ResolutionContext, GENERIC_NAMES};
pub use resolver::{
    CallOutcome, CallResolution, CallResolver, RankedCandidate, ResolutionStats, ResolverBuilder,
    ResolverConfig, SkipReason,
};
pub use strategies::{
    CallQuery, Candidate, ExternalStrategy, ImportStrategy, LexicalStrategy, LocalStrategy,
    NamespaceMemberStrategy, ResolutionStrategy, SameModuleStrategy, SymbolTableStrategy,
};
