//! Analysis input: shape normalization, validation and merging.
//!
//! A load goes through three steps:
//! 1. each document is normalized into canonical [`Envelope`]s
//! 2. all envelopes are validated together, so cross-document references
//!    resolve and duplicate ids are reported with their positions
//! 3. duplicates are folded away by the [`PayloadMerger`]

pub mod envelope;
pub mod merge;
pub mod validate;

pub use envelope::{parse_str, parse_value, Envelope, ParsedPayload};
pub use merge::{MergeStats, PayloadMerger};
pub use validate::{is_known_language, validate, Validator, KNOWN_LANGUAGES};

use serde_json::Value;
use tracing::{info, warn};

use crate::error::{PayloadError, ValidationIssue};

/// A merged envelope ready for analysis.
#[derive(Debug, Clone, Default)]
pub struct LoadedPayload {
    pub envelope: Envelope,
    /// Normalization issues followed by validation issues.
    pub issues: Vec<ValidationIssue>,
    pub merge: MergeStats,
}

impl LoadedPayload {
    pub fn error_count(&self) -> usize {
        self.issues.iter().filter(|i| i.is_error()).count()
    }
}

/// Normalize, validate and merge a set of JSON documents.
pub fn load(
    documents: Vec<Value>,
    validator: &Validator,
    merger: &PayloadMerger,
) -> Result<LoadedPayload, PayloadError> {
    let mut issues = Vec::new();
    let mut envelopes = Vec::new();
    for document in documents {
        let parsed = parse_value(document)?;
        issues.extend(parsed.issues);
        envelopes.extend(parsed.envelopes);
    }
    let count = envelopes.len();

    let combined = concat(envelopes);
    match validator.check(&combined) {
        Ok(found) => issues.extend(found),
        Err(PayloadError::Invalid { issues: found }) => {
            issues.extend(found);
            return Err(PayloadError::Invalid { issues });
        }
        Err(other) => return Err(other),
    }
    if validator.is_strict() && issues.iter().any(ValidationIssue::is_error) {
        return Err(PayloadError::Invalid { issues });
    }

    let (envelope, mut merge) = merger.merge(vec![combined]);
    merge.envelopes = count;

    let errors = issues.iter().filter(|i| i.is_error()).count();
    if errors > 0 {
        warn!(errors, "payload has structural errors, analysis continues with entries as given");
    }
    info!(
        functions = envelope.functions.len(),
        call_edges = envelope.call_edges.len(),
        similarity_edges = envelope.similarity_edges.len(),
        calls = envelope.calls.len(),
        issues = issues.len(),
        "payload loaded"
    );

    Ok(LoadedPayload {
        envelope,
        issues,
        merge,
    })
}

fn concat(envelopes: Vec<Envelope>) -> Envelope {
    let mut iter = envelopes.into_iter();
    let mut out = iter.next().unwrap_or_default();
    for e in iter {
        out.functions.extend(e.functions);
        out.call_edges.extend(e.call_edges);
        out.similarity_edges.extend(e.similarity_edges);
        out.calls.extend(e.calls);
        out.imports.extend(e.imports);
        out.exports.extend(e.exports);
        out.symbols.extend(e.symbols);
    }
    out
}
