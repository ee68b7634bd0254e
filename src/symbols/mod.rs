//! Symbol tables: what each local name in a file refers to.
//!
//! One [`SymbolTable`] per file records local bindings, exports and imports.
//! The [`SymbolTableManager`] aggregates them and answers "what FQN does this
//! name mean in this file", which the call resolver uses as one of its signals.

mod manager;
mod table;

pub use manager::SymbolTableManager;
pub use table::{ExportInfo, ImportBinding, SymbolTable};
