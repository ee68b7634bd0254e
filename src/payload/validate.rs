//! Structural checks over a normalized envelope.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use tracing::debug;

use super::envelope::Envelope;
use crate::error::{PayloadError, ValidationIssue};
use crate::types::{CallEdge, FunctionNode, ResolutionStatus, EXTERNAL_PREFIX};

/// Languages the call resolver knows how to treat.
pub static KNOWN_LANGUAGES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "python",
        "javascript",
        "typescript",
        "tsx",
        "jsx",
        "rust",
        "go",
        "java",
        "kotlin",
        "scala",
        "c",
        "cpp",
        "csharp",
        "ruby",
        "php",
        "swift",
        "lua",
        "bash",
    ]
    .into_iter()
    .collect()
});

pub fn is_known_language(lang: &str) -> bool {
    KNOWN_LANGUAGES.contains(lang.to_ascii_lowercase().as_str())
}

#[derive(Debug, Clone, Default)]
pub struct Validator {
    strict: bool,
}

impl Validator {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Validate and apply the strictness policy: in strict mode any
    /// error-severity issue fails the whole payload.
    pub fn check(&self, envelope: &Envelope) -> Result<Vec<ValidationIssue>, PayloadError> {
        let issues = validate(envelope);
        if self.strict && issues.iter().any(ValidationIssue::is_error) {
            return Err(PayloadError::Invalid { issues });
        }
        Ok(issues)
    }
}

/// Every structural finding, in section order.
pub fn validate(envelope: &Envelope) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let known = check_functions(&envelope.functions, &mut issues);
    check_call_edges(&envelope.call_edges, &known, &mut issues);
    check_similarity_edges(envelope, &known, &mut issues);
    check_calls(envelope, &mut issues);
    check_imports(envelope, &mut issues);
    debug!(issues = issues.len(), "payload validated");
    issues
}

fn check_functions<'a>(
    functions: &'a [FunctionNode],
    issues: &mut Vec<ValidationIssue>,
) -> HashSet<&'a str> {
    let mut seen: HashMap<&str, usize> = HashMap::new();

    for (i, f) in functions.iter().enumerate() {
        let at = format!("functions[{i}]");
        if f.id.is_empty() {
            issues.push(ValidationIssue::error(format!("{at}.id"), "missing id"));
            continue;
        }
        if let Some(first) = seen.get(f.id.as_str()) {
            issues.push(ValidationIssue::warning(
                format!("{at}.id"),
                format!("duplicate id `{}` (first at functions[{first}])", f.id),
            ));
            continue;
        }
        seen.insert(&f.id, i);

        // Placeholders carry only an id.
        if f.is_virtual {
            continue;
        }
        if f.name.is_empty() {
            issues.push(ValidationIssue::error(format!("{at}.name"), "missing name"));
        }
        if f.file_path.is_empty() {
            issues.push(ValidationIssue::error(format!("{at}.filePath"), "missing filePath"));
        }
        if f.language.is_empty() {
            issues.push(ValidationIssue::error(format!("{at}.lang"), "missing lang"));
        } else if !is_known_language(&f.language) {
            issues.push(ValidationIssue::error(
                format!("{at}.lang"),
                format!("unknown language `{}`", f.language),
            ));
        }
        let span = &f.span;
        if span.start_line < 1 {
            issues.push(ValidationIssue::error(
                format!("{at}.startLine"),
                "startLine must be at least 1",
            ));
        } else if span.end_line < span.start_line {
            issues.push(ValidationIssue::error(
                format!("{at}.endLine"),
                format!(
                    "endLine {} precedes startLine {}",
                    span.end_line, span.start_line
                ),
            ));
        }
    }

    seen.into_keys().collect()
}

/// Targets outside the node set are allowed when they are declared external
/// or when the edge admits it is not resolved.
fn is_placeholder_target(edge: &CallEdge) -> bool {
    edge.target.starts_with(EXTERNAL_PREFIX) || edge.status() != ResolutionStatus::Resolved
}

fn check_call_edges(edges: &[CallEdge], known: &HashSet<&str>, issues: &mut Vec<ValidationIssue>) {
    let mut pairs: HashMap<(&str, &str), usize> = HashMap::new();

    for (i, edge) in edges.iter().enumerate() {
        let at = format!("callEdges[{i}]");
        if edge.source.is_empty() {
            issues.push(ValidationIssue::error(format!("{at}.source"), "missing source"));
        } else if !known.contains(edge.source.as_str()) {
            issues.push(ValidationIssue::error(
                format!("{at}.source"),
                format!("unknown source `{}`", edge.source),
            ));
        }
        if edge.target.is_empty() {
            issues.push(ValidationIssue::error(format!("{at}.target"), "missing target"));
        } else if !known.contains(edge.target.as_str()) && !is_placeholder_target(edge) {
            issues.push(ValidationIssue::error(
                format!("{at}.target"),
                format!("unknown target `{}` on a resolved edge", edge.target),
            ));
        }
        if !(edge.weight >= 1.0) {
            issues.push(ValidationIssue::error(
                format!("{at}.weight"),
                format!("weight {} must be at least 1", edge.weight),
            ));
        }
        if let Some(resolution) = &edge.resolution {
            for (j, candidate) in resolution.candidates.iter().enumerate() {
                if !(0.0..=1.0).contains(&candidate.confidence) {
                    issues.push(ValidationIssue::error(
                        format!("{at}.resolution.candidates[{j}].confidence"),
                        format!("confidence {} outside [0, 1]", candidate.confidence),
                    ));
                }
            }
        }

        let key = (edge.source.as_str(), edge.target.as_str());
        if let Some(first) = pairs.get(&key) {
            issues.push(ValidationIssue::warning(
                at,
                format!(
                    "duplicate pair {} -> {} (first at callEdges[{first}]), will be merged",
                    edge.source, edge.target
                ),
            ));
        } else {
            pairs.insert(key, i);
        }
    }
}

fn check_similarity_edges(envelope: &Envelope, known: &HashSet<&str>, issues: &mut Vec<ValidationIssue>) {
    for (i, edge) in envelope.similarity_edges.iter().enumerate() {
        let at = format!("similarityEdges[{i}]");
        for (field, id) in [("source", &edge.source), ("target", &edge.target)] {
            if !known.contains(id.as_str()) {
                issues.push(ValidationIssue::error(
                    format!("{at}.{field}"),
                    format!("unknown {field} `{id}`"),
                ));
            }
        }
        if edge.source == edge.target {
            issues.push(ValidationIssue::error(at.clone(), "similarity edge to itself"));
        }
        if !(0.0..=1.0).contains(&edge.similarity) {
            issues.push(ValidationIssue::error(
                format!("{at}.similarity"),
                format!("similarity {} outside [0, 1]", edge.similarity),
            ));
        }
    }
}

fn check_calls(envelope: &Envelope, issues: &mut Vec<ValidationIssue>) {
    for (i, call) in envelope.calls.iter().enumerate() {
        let at = format!("calls[{i}]");
        if call.file_path.is_empty() {
            issues.push(ValidationIssue::error(format!("{at}.filePath"), "missing filePath"));
        }
        if call.line == 0 {
            issues.push(ValidationIssue::warning(
                format!("{at}.line"),
                "line 0 cannot fall inside any function",
            ));
        }
    }
}

fn check_imports(envelope: &Envelope, issues: &mut Vec<ValidationIssue>) {
    for (i, import) in envelope.imports.iter().enumerate() {
        let at = format!("imports[{i}]");
        if import.file_path.is_empty() {
            issues.push(ValidationIssue::error(format!("{at}.filePath"), "missing filePath"));
        }
        if import.local.is_empty() {
            issues.push(ValidationIssue::error(format!("{at}.local"), "missing local name"));
        }
    }
    for (i, export) in envelope.exports.iter().enumerate() {
        if export.file_path.is_empty() || export.name.is_empty() {
            issues.push(ValidationIssue::error(
                format!("exports[{i}]"),
                "export needs filePath and name",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Severity;
    use crate::types::{Resolution, SimilarityEdge, SourceSpan};

    fn func(id: &str) -> FunctionNode {
        FunctionNode::new(id, id, "src/app.py", "python", SourceSpan::lines(1, 4))
    }

    fn paths(issues: &[ValidationIssue]) -> Vec<&str> {
        issues.iter().map(|i| i.path.as_str()).collect()
    }

    #[test]
    fn test_clean_payload_has_no_issues() {
        let envelope = Envelope {
            functions: vec![func("a"), func("b")],
            call_edges: vec![CallEdge::new("a", "b"), CallEdge::new("a", "external::os.getenv")],
            similarity_edges: vec![SimilarityEdge::new("a", "b", 0.7)],
            ..Default::default()
        };
        assert!(validate(&envelope).is_empty());
    }

    #[test]
    fn test_function_rules() {
        let mut bad_lines = func("c");
        bad_lines.span = SourceSpan::lines(9, 3);
        let mut zero_line = func("d");
        zero_line.span = SourceSpan::lines(0, 3);
        let mut cobol = func("e");
        cobol.language = "cobol".into();
        let envelope = Envelope {
            functions: vec![
                func("a"),
                func("a"),
                FunctionNode::default(),
                bad_lines,
                zero_line,
                cobol,
                FunctionNode::virtual_placeholder("external::x", ""),
            ],
            ..Default::default()
        };
        let issues = validate(&envelope);
        assert_eq!(
            paths(&issues),
            vec![
                "functions[1].id",
                "functions[2].id",
                "functions[3].endLine",
                "functions[4].startLine",
                "functions[5].lang",
            ]
        );
        assert_eq!(issues[0].severity, Severity::Warning);
        assert!(issues[1..].iter().all(ValidationIssue::is_error));
    }

    #[test]
    fn test_edge_rules() {
        let mut heavy = CallEdge::new("a", "b");
        heavy.weight = 0.5;
        let envelope = Envelope {
            functions: vec![func("a"), func("b")],
            call_edges: vec![
                CallEdge::new("a", "ghost"),
                CallEdge::new("a", "ghost2")
                    .with_resolution(Resolution::new(ResolutionStatus::Unresolved)),
                CallEdge::new("nobody", "b"),
                heavy,
                CallEdge::new("a", "b"),
            ],
            similarity_edges: vec![
                SimilarityEdge::new("a", "a", 0.5),
                SimilarityEdge::new("a", "b", 1.5),
            ],
            ..Default::default()
        };
        let issues = validate(&envelope);
        assert_eq!(
            paths(&issues),
            vec![
                "callEdges[0].target",
                "callEdges[2].source",
                "callEdges[3].weight",
                "callEdges[4]",
                "similarityEdges[0]",
                "similarityEdges[1].similarity",
            ]
        );
        assert!(!issues[3].is_error());
    }

    #[test]
    fn test_strict_mode_rejects_errors_only() {
        let warn_only = Envelope {
            functions: vec![func("a"), func("a")],
            ..Default::default()
        };
        assert_eq!(Validator::new(true).check(&warn_only).unwrap().len(), 1);

        let broken = Envelope {
            functions: vec![FunctionNode::default()],
            ..Default::default()
        };
        assert!(Validator::new(false).check(&broken).is_ok());
        match Validator::new(true).check(&broken) {
            Err(PayloadError::Invalid { issues }) => assert_eq!(issues.len(), 1),
            other => panic!("expected invalid payload, got {other:?}"),
        }
    }

    #[test]
    fn test_language_is_case_insensitive() {
        assert!(is_known_language("TypeScript"));
        assert!(!is_known_language("cobol"));
    }
}
