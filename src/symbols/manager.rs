//! Cross-file symbol resolution.

use std::collections::HashMap;

use super::table::{ExportInfo, ImportBinding, SymbolTable};
use crate::types::{normalize_path, ExportRecord, FunctionNode, ImportRecord, SymbolRecord};

/// Owns one [`SymbolTable`] per file path. Holds no other state.
///
/// File keys are normalized (`./src/a.ts` and `src/a.ts` are the same file).
#[derive(Debug, Clone, Default)]
pub struct SymbolTableManager {
    tables: HashMap<String, SymbolTable>,
}

impl SymbolTableManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed tables from a function inventory plus parser-reported imports,
    /// exports and explicit symbols.
    ///
    /// Every function binds its own name to its FQN in its file. Imports are
    /// applied after that, so an import of the same name takes over the alias.
    pub fn from_inventory(
        functions: &[FunctionNode],
        imports: &[ImportRecord],
        exports: &[ExportRecord],
        symbols: &[SymbolRecord],
    ) -> Self {
        let mut manager = Self::new();

        for func in functions.iter().filter(|f| !f.is_virtual && !f.name.is_empty()) {
            manager.add_symbol(&func.file_path, &func.name, func.fq_name());
        }
        for sym in symbols {
            manager.add_symbol(&sym.file_path, &sym.local, &sym.fq_name);
        }
        for imp in imports {
            let binding = ImportBinding {
                from: imp.from.clone(),
                original_name: imp.original_name.clone().unwrap_or_else(|| imp.local.clone()),
                module_id: imp.module_id.clone(),
                resolved_file_path: imp.resolved_file_path.clone(),
                is_namespace: imp.namespace,
            };
            manager.add_import_binding(&imp.file_path, &imp.local, binding);
        }
        for exp in exports {
            manager.add_export(
                &exp.file_path,
                &exp.name,
                ExportInfo {
                    is_default: exp.is_default,
                    local_name: exp.local_name.clone(),
                },
            );
        }

        manager
    }

    fn table_mut(&mut self, file: &str) -> &mut SymbolTable {
        self.tables.entry(normalize_path(file)).or_default()
    }

    pub fn add_symbol(&mut self, file: &str, local: &str, fq_name: &str) {
        self.table_mut(file).add_symbol(local, fq_name);
    }

    /// Register `import { original as local } from "from"`.
    ///
    /// Also creates the local symbol alias `local -> from.original`.
    pub fn add_import(&mut self, file: &str, local: &str, from: &str, original_name: Option<&str>) {
        let binding = ImportBinding::new(from, original_name.unwrap_or(local));
        self.add_import_binding(file, local, binding);
    }

    pub fn add_import_binding(&mut self, file: &str, local: &str, binding: ImportBinding) {
        self.table_mut(file).add_import(local, binding);
    }

    pub fn add_export(&mut self, file: &str, name: &str, info: ExportInfo) {
        self.table_mut(file).add_export(name, info);
    }

    /// Best-effort FQN for `local` as seen from `file`.
    pub fn resolve(&self, file: &str, local: &str) -> Option<String> {
        self.table(file)?.resolve(local)
    }

    pub fn lookup_import(&self, file: &str, local: &str) -> Option<&ImportBinding> {
        self.table(file)?.imports.get(local)
    }

    pub fn exports_of(&self, file: &str) -> Option<&std::collections::BTreeMap<String, ExportInfo>> {
        self.table(file).map(|t| &t.exports)
    }

    pub fn default_export(&self, file: &str) -> Option<&str> {
        self.table(file)?.default_export()
    }

    pub fn table(&self, file: &str) -> Option<&SymbolTable> {
        self.tables.get(&normalize_path(file))
    }

    pub fn file_count(&self) -> usize {
        self.tables.len()
    }
}
