//! Core data model for callscope.
//!
//! Every record that crosses the crate boundary lives here: function nodes,
//! call and similarity edges, resolution metadata, and the raw call/import
//! records the resolver consumes. All of them deserialize leniently from the
//! camelCase JSON envelope produced by the parsing collaborators, and carry an
//! explicit `extra` map for fields outside the known schema.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Open attribute bag. Known fields live on the structs; anything else lands here.
pub type Attributes = BTreeMap<String, Value>;

/// Prefix of ids that stand for targets outside the analyzed tree.
pub const EXTERNAL_PREFIX: &str = "external::";

/// Prefix of synthetic placeholder node ids.
pub const VIRTUAL_PREFIX: &str = "virtual::";

fn default_weight() -> f64 {
    1.0
}

fn is_false(b: &bool) -> bool {
    !*b
}

// =============================================================================
// Positions and spans
// =============================================================================

/// A (line, column) point in a source file. Lines are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Where a function lives in its file.
///
/// Columns are optional in the input; a missing start column means "from the
/// start of the line" and a missing end column means "to the end of the line".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSpan {
    /// Byte offset of the first character, if the parser reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<u64>,
    /// Byte offset one past the last character.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<u64>,
    #[serde(default)]
    pub start_line: u32,
    #[serde(default)]
    pub end_line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_column: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_column: Option<u32>,
}

impl SourceSpan {
    pub fn lines(start_line: u32, end_line: u32) -> Self {
        Self {
            start_line,
            end_line,
            ..Default::default()
        }
    }

    pub fn start_position(&self) -> Position {
        Position::new(self.start_line, self.start_column.unwrap_or(0))
    }

    pub fn end_position(&self) -> Position {
        Position::new(self.end_line, self.end_column.unwrap_or(u32::MAX))
    }

    /// Whether `pos` falls inside this span (inclusive on both ends).
    pub fn contains(&self, pos: Position) -> bool {
        self.start_position() <= pos && pos <= self.end_position()
    }

    /// Whether `other` lies entirely inside this span.
    pub fn encloses(&self, other: &SourceSpan) -> bool {
        self.start_position() <= other.start_position()
            && other.end_position() <= self.end_position()
    }

    /// Whether the span is closed before `pos` starts.
    pub fn ends_before(&self, pos: Position) -> bool {
        self.end_position() < pos
    }

    /// Number of lines covered; used to pick the innermost of nested spans.
    pub fn line_extent(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line)
    }
}

// =============================================================================
// Function nodes
// =============================================================================

/// One statically discovered function or method, or a synthetic placeholder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionNode {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(
        default,
        rename = "fullyQualifiedName",
        alias = "fqName",
        alias = "fqn",
        skip_serializing_if = "Option::is_none"
    )]
    pub fully_qualified_name: Option<String>,
    #[serde(default, alias = "file", alias = "path")]
    pub file_path: String,
    #[serde(default, alias = "lang")]
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    #[serde(flatten)]
    pub span: SourceSpan,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_virtual: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: Attributes,
    #[serde(flatten)]
    pub extra: Attributes,
}

impl FunctionNode {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        file_path: impl Into<String>,
        language: impl Into<String>,
        span: SourceSpan,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            file_path: file_path.into(),
            language: language.into(),
            span,
            ..Default::default()
        }
    }

    pub fn with_module(mut self, module_id: impl Into<String>) -> Self {
        self.module_id = Some(module_id.into());
        self
    }

    pub fn with_fq_name(mut self, fq: impl Into<String>) -> Self {
        self.fully_qualified_name = Some(fq.into());
        self
    }

    /// The fully-qualified name, falling back to the bare name.
    pub fn fq_name(&self) -> &str {
        self.fully_qualified_name.as_deref().unwrap_or(&self.name)
    }

    /// Placeholder for an unresolved call to `callee` from `caller_file`.
    ///
    /// Repeated unresolved calls to the same name from the same file map to the
    /// same id, so they collapse into one node.
    pub fn virtual_call_target(caller_file: &str, callee: &str, language: &str) -> Self {
        let file = normalize_path(caller_file);
        Self {
            id: virtual_node_id(&file, callee),
            name: callee.to_string(),
            fully_qualified_name: Some(callee.to_string()),
            file_path: file,
            language: language.to_string(),
            is_virtual: true,
            ..Default::default()
        }
    }

    /// Placeholder standing in for an explicit target id that is not in the
    /// node set (e.g. `external::lodash.map`).
    pub fn virtual_placeholder(id: &str, language: &str) -> Self {
        let bare = id.strip_prefix(EXTERNAL_PREFIX).unwrap_or(id);
        let name = bare.rsplit(['.', ':', '/']).next().unwrap_or(bare);
        Self {
            id: id.to_string(),
            name: name.to_string(),
            fully_qualified_name: Some(bare.to_string()),
            language: language.to_string(),
            is_virtual: true,
            ..Default::default()
        }
    }
}

/// Canonical form of a file path used in virtual node keys: forward slashes,
/// no leading `./`, no doubled separators.
pub fn normalize_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let trimmed = unified.trim_start_matches("./");
    trimmed
        .split('/')
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .collect::<Vec<_>>()
        .join("/")
}

pub fn virtual_node_id(normalized_file: &str, callee: &str) -> String {
    format!("{}{}::{}", VIRTUAL_PREFIX, normalized_file, callee)
}

// =============================================================================
// Resolution metadata
// =============================================================================

/// Outcome class of a call resolution. Ordered from best to worst, so the
/// "worst wins" merge is `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStatus {
    #[serde(alias = "Resolved", alias = "RESOLVED")]
    Resolved,
    #[serde(alias = "Ambiguous", alias = "AMBIGUOUS")]
    Ambiguous,
    #[serde(alias = "Unresolved", alias = "UNRESOLVED")]
    Unresolved,
}

impl ResolutionStatus {
    pub fn worst(self, other: Self) -> Self {
        self.max(other)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resolved => "resolved",
            Self::Ambiguous => "ambiguous",
            Self::Unresolved => "unresolved",
        }
    }
}

impl fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a candidate was matched to a call, in priority order (best first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchType {
    /// Nested function visible through the enclosing scope chain.
    Lexical,
    /// Defined in the caller's file.
    Local,
    /// Named import binding matches module and name.
    ImportExact,
    /// Default import matches the module's default export.
    ImportDefault,
    /// Member call on a namespace import (`utils.parse()`).
    ImportNamespace,
    /// FQN from the symbol tables matches exactly.
    SymbolTableExact,
    /// FQN from the symbol tables shares the module prefix.
    SymbolTableModule,
    /// Candidate's directory is near the caller's.
    SameModule,
    /// Same name anywhere else.
    External,
}

impl MatchType {
    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lexical => "lexical",
            Self::Local => "local",
            Self::ImportExact => "importExact",
            Self::ImportDefault => "importDefault",
            Self::ImportNamespace => "importNamespace",
            Self::SymbolTableExact => "symbolTableExact",
            Self::SymbolTableModule => "symbolTableModule",
            Self::SameModule => "sameModule",
            Self::External => "external",
        }
    }

    /// Short human-readable justification used as `resolution.reason`.
    pub fn reason(self) -> &'static str {
        match self {
            Self::Lexical => "defined in an enclosing scope of the call",
            Self::Local => "defined in the caller's file",
            Self::ImportExact => "matches the caller's named import",
            Self::ImportDefault => "matches the default export of the imported module",
            Self::ImportNamespace => "member of an imported module namespace",
            Self::SymbolTableExact => "fully-qualified name matches the symbol table",
            Self::SymbolTableModule => "shares a module with the symbol table binding",
            Self::SameModule => "defined in a nearby directory",
            Self::External => "same name defined elsewhere",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordinal confidence attached to a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn rank(self) -> u8 {
        self as u8
    }

    /// Nominal numeric score for the level.
    pub fn score(self) -> f64 {
        match self {
            Self::High => 0.9,
            Self::Medium => 0.6,
            Self::Low => 0.3,
        }
    }

    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            Self::High
        } else if score >= 0.5 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// A candidate target attached to a call edge's resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionCandidate {
    pub id: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_type: Option<MatchType>,
}

/// Resolution metadata carried by a call edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub status: ResolutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_type: Option<MatchType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<ResolutionCandidate>,
    #[serde(flatten)]
    pub extra: Attributes,
}

impl Resolution {
    pub fn new(status: ResolutionStatus) -> Self {
        Self {
            status,
            reason: None,
            match_type: None,
            candidates: Vec::new(),
            extra: Attributes::new(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

// =============================================================================
// Edges
// =============================================================================

/// One sampled occurrence of a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSite {
    #[serde(default, alias = "file")]
    pub file_path: String,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Directed call edge. Parallel raw calls between the same pair are folded
/// into one edge; `weight` counts them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEdge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub target: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub is_dynamic: bool,
    #[serde(default, alias = "lang", skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub call_sites: Vec<CallSite>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(flatten)]
    pub extra: Attributes,
}

impl CallEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: None,
            source: source.into(),
            target: target.into(),
            weight: 1.0,
            is_dynamic: false,
            language: None,
            call_sites: Vec::new(),
            resolution: None,
            extra: Attributes::new(),
        }
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = Some(resolution);
        self
    }

    /// Status, treating edges without resolution metadata as resolved.
    pub fn status(&self) -> ResolutionStatus {
        self.resolution
            .as_ref()
            .map(|r| r.status)
            .unwrap_or(ResolutionStatus::Resolved)
    }
}

/// Undirected semantic-similarity edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityEdge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub target: String,
    #[serde(default, alias = "score", alias = "weight")]
    pub similarity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub representative_similarity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_pairs: Option<Value>,
    #[serde(flatten)]
    pub extra: Attributes,
}

impl SimilarityEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, similarity: f64) -> Self {
        Self {
            id: None,
            source: source.into(),
            target: target.into(),
            similarity,
            method: None,
            representative_similarity: None,
            top_pairs: None,
            extra: Attributes::new(),
        }
    }

    /// Order-independent key for the endpoint pair.
    pub fn canonical_key(&self) -> (&str, &str) {
        match self.source.cmp(&self.target) {
            Ordering::Greater => (self.target.as_str(), self.source.as_str()),
            _ => (self.source.as_str(), self.target.as_str()),
        }
    }
}

// =============================================================================
// Resolver inputs
// =============================================================================

/// A raw call expression as emitted by the parser, before resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCall {
    #[serde(default, alias = "callerFile", alias = "file")]
    pub file_path: String,
    #[serde(default, alias = "callee", alias = "name")]
    pub callee_name: String,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
    /// Receiver expression of a member call (`obj` in `obj.method()`).
    #[serde(default, alias = "object", skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_member: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_dynamic: bool,
    #[serde(default, alias = "lang", skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl RawCall {
    pub fn new(file_path: impl Into<String>, callee: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file_path: file_path.into(),
            callee_name: callee.into(),
            line,
            column,
            ..Default::default()
        }
    }

    pub fn on_receiver(mut self, receiver: impl Into<String>) -> Self {
        self.receiver = Some(receiver.into());
        self.is_member = true;
        self
    }

    pub fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    pub fn is_member_expression(&self) -> bool {
        self.is_member || self.receiver.is_some()
    }

    pub fn call_site(&self) -> CallSite {
        CallSite {
            file_path: self.file_path.clone(),
            line: self.line,
            column: self.column,
            context: self.context.clone(),
        }
    }
}

/// An import statement binding a local name in a file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRecord {
    #[serde(default, alias = "file")]
    pub file_path: String,
    #[serde(default, alias = "localName")]
    pub local: String,
    #[serde(default, alias = "source", alias = "module")]
    pub from: String,
    #[serde(default, alias = "imported", skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_file_path: Option<String>,
    /// `import * as ns from "..."` / `import module`.
    #[serde(default, alias = "isNamespace", skip_serializing_if = "is_false")]
    pub namespace: bool,
}

/// An export declared by a file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    #[serde(default, alias = "file")]
    pub file_path: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_name: Option<String>,
}

/// An explicit local-name binding reported by the parser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolRecord {
    #[serde(default, alias = "file")]
    pub file_path: String,
    #[serde(default, alias = "name")]
    pub local: String,
    #[serde(default, alias = "fullyQualifiedName")]
    pub fq_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_worst_wins() {
        use ResolutionStatus::*;
        assert_eq!(Resolved.worst(Ambiguous), Ambiguous);
        assert_eq!(Unresolved.worst(Ambiguous), Unresolved);
        assert_eq!(Resolved.worst(Resolved), Resolved);
    }

    #[test]
    fn test_span_contains_without_columns() {
        let span = SourceSpan::lines(10, 20);
        assert!(span.contains(Position::new(10, 0)));
        assert!(span.contains(Position::new(20, 500)));
        assert!(!span.contains(Position::new(21, 0)));
        assert!(span.ends_before(Position::new(21, 0)));
    }

    #[test]
    fn test_function_node_accepts_envelope_fields() {
        let node: FunctionNode = serde_json::from_value(json!({
            "id": "f1",
            "name": "parse",
            "fqName": "pkg.parser.parse",
            "filePath": "pkg/parser.py",
            "lang": "python",
            "startLine": 3,
            "endLine": 9,
            "loc": 7,
            "doc": "Parse things."
        }))
        .unwrap();

        assert_eq!(node.fq_name(), "pkg.parser.parse");
        assert_eq!(node.language, "python");
        assert_eq!(node.span.start_line, 3);
        assert_eq!(node.extra.get("loc"), Some(&json!(7)));
        assert!(!node.extra.contains_key("startLine"));
    }

    #[test]
    fn test_virtual_ids_normalize_path() {
        let a = FunctionNode::virtual_call_target("./src\\app.js", "doStuff", "javascript");
        let b = FunctionNode::virtual_call_target("src/app.js", "doStuff", "javascript");
        assert_eq!(a.id, b.id);
        assert_eq!(a.id, "virtual::src/app.js::doStuff");
        assert!(a.is_virtual);
    }

    #[test]
    fn test_placeholder_name_from_external_id() {
        let node = FunctionNode::virtual_placeholder("external::lodash.map", "javascript");
        assert_eq!(node.name, "map");
        assert_eq!(node.fq_name(), "lodash.map");
    }

    #[test]
    fn test_similarity_canonical_key() {
        let e = SimilarityEdge::new("b", "a", 0.4);
        assert_eq!(e.canonical_key(), ("a", "b"));
    }

    #[test]
    fn test_match_type_serializes_camel_case() {
        let v = serde_json::to_value(MatchType::ImportExact).unwrap();
        assert_eq!(v, json!("importExact"));
        assert!(MatchType::Lexical.rank() < MatchType::External.rank());
    }
}
