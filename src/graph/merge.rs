//! Merge rules for parallel edges.
//!
//! Shared by the graph builder and the payload merger so both collapse edges
//! the same way.

use crate::types::{Attributes, CallEdge, Resolution, SimilarityEdge};

/// Insert keys from `incoming` that `existing` lacks.
pub fn fill_missing(existing: &mut Attributes, incoming: Attributes) {
    for (key, value) in incoming {
        existing.entry(key).or_insert(value);
    }
}

/// Fold a second resolution for the same edge into the first.
///
/// Worst status wins. The reason and match type follow the worse side; on a
/// tie the existing ones are kept. Candidates are unioned by id keeping the
/// higher confidence, in first-seen order.
pub fn merge_resolution(existing: &mut Option<Resolution>, incoming: Option<Resolution>) {
    let Some(incoming) = incoming else {
        return;
    };
    let Some(current) = existing.as_mut() else {
        *existing = Some(incoming);
        return;
    };

    if incoming.status > current.status {
        current.status = incoming.status;
        current.reason = incoming.reason.or(current.reason.take());
        current.match_type = incoming.match_type.or(current.match_type);
    } else {
        if current.reason.is_none() {
            current.reason = incoming.reason;
        }
        if current.match_type.is_none() {
            current.match_type = incoming.match_type;
        }
    }

    for cand in incoming.candidates {
        match current.candidates.iter_mut().find(|c| c.id == cand.id) {
            Some(seen) => {
                if cand.confidence > seen.confidence {
                    seen.confidence = cand.confidence;
                    seen.match_type = cand.match_type.or(seen.match_type);
                }
            }
            None => current.candidates.push(cand),
        }
    }

    fill_missing(&mut current.extra, incoming.extra);
}

/// Collapse a parallel call edge into `existing`.
///
/// Weights add, `isDynamic` is OR-ed, call sites accumulate up to `site_cap`.
pub fn merge_call_edge(existing: &mut CallEdge, incoming: CallEdge, site_cap: usize) {
    existing.weight += incoming.weight;
    existing.is_dynamic |= incoming.is_dynamic;
    if existing.id.is_none() {
        existing.id = incoming.id;
    }
    if existing.language.is_none() {
        existing.language = incoming.language;
    }

    let room = site_cap.saturating_sub(existing.call_sites.len());
    existing
        .call_sites
        .extend(incoming.call_sites.into_iter().take(room));

    merge_resolution(&mut existing.resolution, incoming.resolution);
    fill_missing(&mut existing.extra, incoming.extra);
}

/// Collapse a second similarity edge for the same unordered pair.
///
/// The stronger edge supplies similarity, method and top pairs; the
/// representative similarity is the maximum of both.
pub fn merge_similarity_edge(existing: &mut SimilarityEdge, incoming: SimilarityEdge) {
    if existing.id.is_none() {
        existing.id = incoming.id.clone();
    }
    existing.representative_similarity = match (
        existing.representative_similarity,
        incoming.representative_similarity,
    ) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };

    if incoming.similarity > existing.similarity {
        existing.similarity = incoming.similarity;
        existing.method = incoming.method.or(existing.method.take());
        existing.top_pairs = incoming.top_pairs.or(existing.top_pairs.take());
    } else {
        if existing.method.is_none() {
            existing.method = incoming.method;
        }
        if existing.top_pairs.is_none() {
            existing.top_pairs = incoming.top_pairs;
        }
    }

    fill_missing(&mut existing.extra, incoming.extra);
}
