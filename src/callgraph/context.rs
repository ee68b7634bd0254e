//! Lookup indexes shared by every resolution strategy.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;

use crate::symbols::{ImportBinding, SymbolTableManager};
use crate::types::{normalize_path, FunctionNode, Position};

/// Names that are defined all over any codebase. A bare name match on one of
/// these says almost nothing about which definition is meant.
pub static GENERIC_NAMES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "get", "set", "create", "find", "map", "filter", "reduce", "update", "delete", "remove",
        "add", "init", "run", "handle", "process", "parse", "load", "save", "render", "call",
        "apply", "execute", "validate", "build", "toString",
    ]
    .into_iter()
    .collect()
});

/// Context passed to resolution strategies.
///
/// Built once per resolver run from the function inventory. Virtual nodes are
/// never indexed; they are not call targets.
pub struct ResolutionContext<'a> {
    pub functions: &'a [FunctionNode],
    pub symbols: &'a SymbolTableManager,
    by_name: HashMap<&'a str, Vec<usize>>,
    /// Normalized file path -> function indices.
    by_file: HashMap<String, Vec<usize>>,
    by_module: HashMap<&'a str, Vec<usize>>,
    /// Innermost other function whose span encloses each function.
    parents: Vec<Option<usize>>,
    extra_generic: HashSet<String>,
}

impl<'a> ResolutionContext<'a> {
    pub fn new(functions: &'a [FunctionNode], symbols: &'a SymbolTableManager) -> Self {
        let mut by_name: HashMap<&str, Vec<usize>> = HashMap::new();
        let mut by_file: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_module: HashMap<&str, Vec<usize>> = HashMap::new();

        for (idx, func) in functions.iter().enumerate() {
            if func.is_virtual || func.id.is_empty() {
                continue;
            }
            by_name.entry(func.name.as_str()).or_default().push(idx);
            by_file.entry(normalize_path(&func.file_path)).or_default().push(idx);
            if let Some(module) = func.module_id.as_deref() {
                by_module.entry(module).or_default().push(idx);
            }
        }

        let mut parents = vec![None; functions.len()];
        for members in by_file.values() {
            for &child in members {
                parents[child] = innermost_parent(functions, members, child);
            }
        }

        Self {
            functions,
            symbols,
            by_name,
            by_file,
            by_module,
            parents,
            extra_generic: HashSet::new(),
        }
    }

    pub fn with_generic_names(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.extra_generic.extend(names);
        self
    }

    pub fn function(&self, idx: usize) -> &'a FunctionNode {
        &self.functions[idx]
    }

    /// Function indices with exactly this name.
    pub fn find_by_name(&self, name: &str) -> &[usize] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn functions_in_file(&self, file: &str) -> &[usize] {
        self.by_file
            .get(&normalize_path(file))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn parent_of(&self, idx: usize) -> Option<usize> {
        self.parents.get(idx).copied().flatten()
    }

    /// Functions in `file` whose span contains `pos`, outermost first.
    pub fn enclosing_chain(&self, file: &str, pos: Position) -> Vec<usize> {
        let mut chain: Vec<usize> = self
            .functions_in_file(file)
            .iter()
            .copied()
            .filter(|&idx| self.functions[idx].span.contains(pos))
            .collect();
        chain.sort_by(|&a, &b| {
            let (fa, fb) = (&self.functions[a], &self.functions[b]);
            fb.span
                .line_extent()
                .cmp(&fa.span.line_extent())
                .then(fa.span.start_position().cmp(&fb.span.start_position()))
                .then(fb.span.end_position().cmp(&fa.span.end_position()))
                .then(a.cmp(&b))
        });
        chain
    }

    /// The innermost function containing `pos`: the caller of a call there.
    pub fn enclosing_function(&self, file: &str, pos: Position) -> Option<usize> {
        self.enclosing_chain(file, pos).last().copied()
    }

    /// Functions belonging to the module an import binding points at.
    pub fn functions_in_module(&self, binding: &ImportBinding) -> Vec<usize> {
        let mut out: Vec<usize> = Vec::new();
        if let Some(path) = binding.resolved_file_path.as_deref() {
            out.extend_from_slice(self.functions_in_file(path));
        }
        let module = binding.module_id.as_deref().unwrap_or(binding.from.as_str());
        if let Some(members) = self.by_module.get(module) {
            out.extend(members.iter().copied());
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn is_generic_name(&self, name: &str) -> bool {
        GENERIC_NAMES.contains(name) || self.extra_generic.contains(name)
    }
}

fn innermost_parent(functions: &[FunctionNode], members: &[usize], child: usize) -> Option<usize> {
    let child_span = &functions[child].span;
    members
        .iter()
        .copied()
        .filter(|&other| other != child)
        .filter(|&other| {
            let span = &functions[other].span;
            if !span.encloses(child_span) {
                return false;
            }
            // Identical spans: the earlier entry is the parent, never both ways.
            span.line_extent() > child_span.line_extent()
                || span.start_position() < child_span.start_position()
                || span.end_position() > child_span.end_position()
                || other < child
        })
        .min_by(|&a, &b| {
            let (sa, sb) = (&functions[a].span, &functions[b].span);
            sa.line_extent()
                .cmp(&sb.line_extent())
                .then(sb.start_position().cmp(&sa.start_position()))
                .then(sa.end_position().cmp(&sb.end_position()))
                .then(b.cmp(&a))
        })
}

/// Directory segments of a file path (`src/a/b.ts` -> `["src", "a"]`).
pub fn dir_segments(path: &str) -> Vec<String> {
    let normalized = normalize_path(path);
    let mut segs: Vec<String> = normalized.split('/').map(str::to_string).collect();
    segs.pop();
    segs.retain(|s| !s.is_empty());
    segs
}

/// Shared leading directory segments over the longer segment count.
/// Two files at the root compare as 1.0.
pub fn path_similarity(a: &[String], b: &[String]) -> f64 {
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    let shared = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    shared as f64 / longest as f64
}

/// `pkg.mod.fn` -> `pkg.mod`; also splits on `::` and `/`.
pub fn module_prefix(fq: &str) -> Option<&str> {
    let cut = fq.rfind(['.', ':', '/'])?;
    let prefix = fq[..cut].trim_end_matches(':');
    (!prefix.is_empty()).then_some(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceSpan;

    fn func(id: &str, name: &str, file: &str, start: u32, end: u32) -> FunctionNode {
        FunctionNode::new(id, name, file, "javascript", SourceSpan::lines(start, end))
    }

    #[test]
    fn test_enclosing_chain_orders_outermost_first() {
        let functions = vec![
            func("outer", "outer", "a.js", 1, 30),
            func("inner", "inner", "a.js", 5, 10),
            func("other", "other", "b.js", 1, 30),
        ];
        let symbols = SymbolTableManager::new();
        let ctx = ResolutionContext::new(&functions, &symbols);

        assert_eq!(ctx.enclosing_chain("a.js", Position::new(7, 2)), vec![0, 1]);
        assert_eq!(ctx.enclosing_function("a.js", Position::new(20, 0)), Some(0));
        assert_eq!(ctx.enclosing_function("a.js", Position::new(40, 0)), None);
        assert_eq!(ctx.parent_of(1), Some(0));
        assert_eq!(ctx.parent_of(0), None);
    }

    #[test]
    fn test_identical_spans_do_not_parent_each_other() {
        let functions = vec![func("x", "x", "a.js", 1, 5), func("y", "y", "a.js", 1, 5)];
        let symbols = SymbolTableManager::new();
        let ctx = ResolutionContext::new(&functions, &symbols);
        assert_eq!(ctx.parent_of(1), Some(0));
        assert_eq!(ctx.parent_of(0), None);
    }

    #[test]
    fn test_same_line_nesting_uses_columns() {
        let on_line = |id: &str, start: u32, end: u32| {
            let span = SourceSpan {
                start_column: Some(start),
                end_column: Some(end),
                ..SourceSpan::lines(3, 3)
            };
            FunctionNode::new(id, id, "a.js", "javascript", span)
        };
        // Innermost listed first so index order alone would pick the outermost.
        let functions = vec![on_line("inner", 20, 40), on_line("middle", 10, 50), on_line("outer", 0, 60)];
        let symbols = SymbolTableManager::new();
        let ctx = ResolutionContext::new(&functions, &symbols);

        assert_eq!(ctx.parent_of(0), Some(1));
        assert_eq!(ctx.parent_of(1), Some(2));
        assert_eq!(ctx.parent_of(2), None);
        assert_eq!(ctx.enclosing_function("a.js", Position::new(3, 30)), Some(0));
    }

    #[test]
    fn test_path_similarity() {
        let a = dir_segments("src/api/users.ts");
        let b = dir_segments("src/api/v2/users.ts");
        assert!((path_similarity(&a, &b) - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(path_similarity(&dir_segments("a.ts"), &dir_segments("b.ts")), 1.0);
    }

    #[test]
    fn test_module_prefix() {
        assert_eq!(module_prefix("pkg.io.load"), Some("pkg.io"));
        assert_eq!(module_prefix("crate::io::load"), Some("crate::io"));
        assert_eq!(module_prefix("load"), None);
    }

    #[test]
    fn test_generic_names() {
        let functions: Vec<FunctionNode> = vec![];
        let symbols = SymbolTableManager::new();
        let ctx = ResolutionContext::new(&functions, &symbols)
            .with_generic_names(vec!["dispatch".to_string()]);
        assert!(ctx.is_generic_name("get"));
        assert!(ctx.is_generic_name("dispatch"));
        assert!(!ctx.is_generic_name("computeInvoice"));
    }
}
