//! Per-file symbol table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::normalize_path;

/// What a file exports under a given name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportInfo {
    #[serde(default)]
    pub is_default: bool,
    /// Local binding behind the export when it differs from the exported name
    /// (`export { parse as default }`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_name: Option<String>,
}

impl ExportInfo {
    pub fn named() -> Self {
        Self::default()
    }

    pub fn default_export() -> Self {
        Self {
            is_default: true,
            local_name: None,
        }
    }
}

/// Where an imported local name comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBinding {
    /// Module specifier as written (`./utils`, `pkg.helpers`).
    pub from: String,
    /// Name in the exporting module; equals the local name unless aliased.
    pub original_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_file_path: Option<String>,
    /// Whole-module binding (`import * as ns`, `import pkg`).
    #[serde(default)]
    pub is_namespace: bool,
}

impl ImportBinding {
    pub fn new(from: impl Into<String>, original_name: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            original_name: original_name.into(),
            ..Default::default()
        }
    }

    pub fn is_default(&self) -> bool {
        self.original_name == "default"
    }

    /// Best-effort FQN for the bound name: `<from>.<originalName>`.
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.from, self.original_name)
    }

    /// Whether the binding points at the module identified by `module_id` or
    /// `file_path`.
    pub fn targets_module(&self, module_id: Option<&str>, file_path: &str) -> bool {
        if let Some(resolved) = self.resolved_file_path.as_deref() {
            if normalize_path(resolved) == normalize_path(file_path) {
                return true;
            }
        }
        let Some(module_id) = module_id else {
            return false;
        };
        self.module_id.as_deref() == Some(module_id) || self.from == module_id
    }
}

/// Local-name bindings, exports and imports of a single file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolTable {
    pub symbols: BTreeMap<String, String>,
    pub exports: BTreeMap<String, ExportInfo>,
    pub imports: BTreeMap<String, ImportBinding>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_symbol(&mut self, local: impl Into<String>, fq_name: impl Into<String>) {
        self.symbols.insert(local.into(), fq_name.into());
    }

    /// Registers the import and the derived symbol `local -> from.originalName`.
    pub fn add_import(&mut self, local: impl Into<String>, binding: ImportBinding) {
        let local = local.into();
        self.symbols.insert(local.clone(), binding.qualified());
        self.imports.insert(local, binding);
    }

    pub fn add_export(&mut self, name: impl Into<String>, info: ExportInfo) {
        self.exports.insert(name.into(), info);
    }

    pub fn resolve(&self, local: &str) -> Option<String> {
        if let Some(fq) = self.symbols.get(local) {
            return Some(fq.clone());
        }
        self.imports.get(local).map(ImportBinding::qualified)
    }

    /// Name of the function behind `export default`, if any.
    pub fn default_export(&self) -> Option<&str> {
        self.exports
            .iter()
            .find(|(_, info)| info.is_default)
            .map(|(name, info)| info.local_name.as_deref().unwrap_or(name.as_str()))
    }
}
