//! Input envelope and shape normalization.
//!
//! Producers do not agree on one layout. Accepted shapes:
//! - the canonical object (`functions`, `callEdges`, `similarityEdges`, ...)
//! - a wrapper object `{graph: ...}`, `{data: ...}` or `{payload: ...}`
//! - a graph dump `{nodes, edges}` where each edge names its layer
//! - a JSON array of any of the above
//!
//! Entries are deserialized one by one. A bad entry becomes a validation
//! issue and is dropped; the rest of the payload survives.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PayloadError, ValidationIssue};
use crate::types::{
    CallEdge, ExportRecord, FunctionNode, ImportRecord, RawCall, SimilarityEdge, SymbolRecord,
};

const WRAPPER_KEYS: [&str; 3] = ["graph", "data", "payload"];
const CANONICAL_KEYS: [&str; 8] = [
    "functions",
    "callEdges",
    "similarityEdges",
    "calls",
    "imports",
    "exports",
    "symbols",
    "call_edges",
];
const LAYER_KEYS: [&str; 3] = ["layer", "kind", "type"];

/// One analysis input: function inventory, edges, and resolver inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(default)]
    pub functions: Vec<FunctionNode>,
    #[serde(default)]
    pub call_edges: Vec<CallEdge>,
    #[serde(default)]
    pub similarity_edges: Vec<SimilarityEdge>,
    #[serde(default)]
    pub calls: Vec<RawCall>,
    #[serde(default)]
    pub imports: Vec<ImportRecord>,
    #[serde(default)]
    pub exports: Vec<ExportRecord>,
    #[serde(default)]
    pub symbols: Vec<SymbolRecord>,
}

impl Envelope {
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
            && self.call_edges.is_empty()
            && self.similarity_edges.is_empty()
            && self.calls.is_empty()
            && self.imports.is_empty()
            && self.exports.is_empty()
            && self.symbols.is_empty()
    }
}

/// Envelopes found in one document plus the issues met while reading it.
#[derive(Debug, Clone, Default)]
pub struct ParsedPayload {
    pub envelopes: Vec<Envelope>,
    pub issues: Vec<ValidationIssue>,
}

pub fn parse_str(text: &str) -> Result<ParsedPayload, PayloadError> {
    let value: Value = serde_json::from_str(text)?;
    parse_value(value)
}

/// Normalize any accepted shape into canonical envelopes.
pub fn parse_value(value: Value) -> Result<ParsedPayload, PayloadError> {
    let mut parsed = ParsedPayload::default();
    collect(value, "$", &mut parsed)?;
    Ok(parsed)
}

fn collect(value: Value, path: &str, out: &mut ParsedPayload) -> Result<(), PayloadError> {
    match value {
        Value::Array(items) => {
            for (i, item) in items.into_iter().enumerate() {
                collect(item, &format!("{path}[{i}]"), out)?;
            }
            Ok(())
        }
        Value::Object(mut map) => {
            if let Some(key) = wrapper_key(&map) {
                let inner = map.remove(key).unwrap_or(Value::Null);
                return collect(inner, &format!("{path}.{key}"), out);
            }
            let envelope = from_object(map, path, out)?;
            out.envelopes.push(envelope);
            Ok(())
        }
        other => Err(PayloadError::UnsupportedShape(format!(
            "{path}: expected an object or array, found {}",
            kind_of(&other)
        ))),
    }
}

/// The wrapper key of an object that holds nothing but a nested payload.
fn wrapper_key(map: &Map<String, Value>) -> Option<&'static str> {
    let canonical = CANONICAL_KEYS.iter().any(|k| map.contains_key(*k));
    let dump = map.contains_key("nodes") || map.contains_key("edges");
    if canonical || dump {
        return None;
    }
    WRAPPER_KEYS.iter().copied().find(|k| map.contains_key(*k))
}

fn from_object(
    mut map: Map<String, Value>,
    path: &str,
    out: &mut ParsedPayload,
) -> Result<Envelope, PayloadError> {
    let recognized = CANONICAL_KEYS
        .iter()
        .chain(&["nodes", "edges"])
        .any(|k| map.contains_key(*k));
    if !recognized && !map.is_empty() {
        let keys: Vec<&str> = map.keys().map(String::as_str).take(5).collect();
        return Err(PayloadError::UnsupportedShape(format!(
            "{path}: no recognized sections (found {})",
            keys.join(", ")
        )));
    }

    let issues = &mut out.issues;
    let mut envelope = Envelope {
        functions: entries(&mut map, "functions", path, issues),
        similarity_edges: entries(&mut map, "similarityEdges", path, issues),
        imports: entries(&mut map, "imports", path, issues),
        exports: entries(&mut map, "exports", path, issues),
        symbols: entries(&mut map, "symbols", path, issues),
        ..Default::default()
    };
    envelope.call_edges = entries(&mut map, "callEdges", path, issues);
    envelope
        .call_edges
        .extend(entries::<CallEdge>(&mut map, "call_edges", path, issues));

    // `calls` holds raw call expressions, or pre-resolved edges when the
    // entries carry `source` and `target`.
    if let Some(section) = take_array(&mut map, "calls", path, issues) {
        for (i, item) in section.into_iter().enumerate() {
            let at = format!("{path}.calls[{i}]");
            if is_edge_like(&item) {
                push_entry(item, &at, &mut envelope.call_edges, issues);
            } else {
                push_entry(item, &at, &mut envelope.calls, issues);
            }
        }
    }

    envelope
        .functions
        .extend(entries::<FunctionNode>(&mut map, "nodes", path, issues));
    if let Some(edges) = take_array(&mut map, "edges", path, issues) {
        for (i, item) in edges.into_iter().enumerate() {
            let at = format!("{path}.edges[{i}]");
            route_dump_edge(item, &at, &mut envelope, issues);
        }
    }

    Ok(envelope)
}

fn route_dump_edge(
    item: Value,
    at: &str,
    envelope: &mut Envelope,
    issues: &mut Vec<ValidationIssue>,
) {
    let Value::Object(mut obj) = item else {
        issues.push(ValidationIssue::error(at, "edge must be an object"));
        return;
    };

    let mut layer: Option<String> = None;
    for key in LAYER_KEYS {
        if let Some(Value::String(s)) = obj.get(key) {
            layer = Some(s.to_ascii_lowercase());
            obj.remove(key);
            break;
        }
    }

    let is_similarity = match layer.as_deref() {
        Some("call" | "calls") => false,
        Some("similarity" | "similar" | "semantic") => true,
        Some(other) => {
            issues.push(ValidationIssue::error(
                at,
                format!("unknown edge layer `{other}`"),
            ));
            return;
        }
        None => obj.contains_key("similarity"),
    };

    if is_similarity {
        push_entry(Value::Object(obj), at, &mut envelope.similarity_edges, issues);
    } else {
        push_entry(Value::Object(obj), at, &mut envelope.call_edges, issues);
    }
}

fn is_edge_like(item: &Value) -> bool {
    item.get("source").is_some() && item.get("target").is_some()
}

fn take_array(
    map: &mut Map<String, Value>,
    key: &str,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<Vec<Value>> {
    match map.remove(key)? {
        Value::Array(items) => Some(items),
        Value::Null => None,
        other => {
            issues.push(ValidationIssue::error(
                format!("{path}.{key}"),
                format!("expected an array, found {}", kind_of(&other)),
            ));
            None
        }
    }
}

fn entries<T: DeserializeOwned>(
    map: &mut Map<String, Value>,
    key: &str,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Vec<T> {
    let mut out = Vec::new();
    if let Some(items) = take_array(map, key, path, issues) {
        for (i, item) in items.into_iter().enumerate() {
            push_entry(item, &format!("{path}.{key}[{i}]"), &mut out, issues);
        }
    }
    out
}

fn push_entry<T: DeserializeOwned>(
    item: Value,
    at: &str,
    out: &mut Vec<T>,
    issues: &mut Vec<ValidationIssue>,
) {
    match serde_json::from_value(item) {
        Ok(entry) => out.push(entry),
        Err(err) => issues.push(ValidationIssue::error(at, err.to_string())),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
