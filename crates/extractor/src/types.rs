use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One import statement observed in a source file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportRecord {
    /// The specifier exactly as written (`./util`, `react`, `../models/user`)
    pub raw_specifier: String,

    /// True for `import(...)` expressions, false for static forms
    #[serde(default)]
    pub is_dynamic: bool,

    /// Local names bound by this import, in declaration order
    #[serde(default)]
    pub bindings: Vec<String>,
}

impl ImportRecord {
    /// Create a static import
    pub fn new(raw_specifier: impl Into<String>, bindings: Vec<String>) -> Self {
        Self {
            raw_specifier: raw_specifier.into(),
            is_dynamic: false,
            bindings,
        }
    }

    /// Create a dynamic `import(...)` record
    pub fn dynamic(raw_specifier: impl Into<String>) -> Self {
        Self {
            raw_specifier: raw_specifier.into(),
            is_dynamic: true,
            bindings: Vec::new(),
        }
    }
}

/// One exported name
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportRecord {
    /// Exported name; `default` for default exports, `*` for star re-exports
    pub name: String,

    /// True when this is the module's default export
    #[serde(default)]
    pub is_default: bool,
}

impl ExportRecord {
    /// Create a named export
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_default: false,
        }
    }

    /// Create the default export entry
    pub fn default_export(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_default: true,
        }
    }
}

/// Kind of symbol declared at the top level of a file
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Class,
    Method,
    Variable,
    Interface,
    TypeAlias,
    Enum,
}

impl SymbolKind {
    /// Get symbol kind as string
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Method => "method",
            SymbolKind::Variable => "variable",
            SymbolKind::Interface => "interface",
            SymbolKind::TypeAlias => "type_alias",
            SymbolKind::Enum => "enum",
        }
    }
}

/// A top-level declaration, kept for reporting only (never used for edges)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeclaredSymbol {
    /// Symbol name; class methods are qualified as `Class.method`
    pub name: String,

    /// What the declaration is
    pub kind: SymbolKind,
}

impl DeclaredSymbol {
    /// Create a new declared symbol
    pub fn new(name: impl Into<String>, kind: SymbolKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Structural classification of a file, derived from its path
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Spec,
    Entry,
    Component,
    Utility,
    Model,
    Route,
    Test,
    Module,
}

impl FileKind {
    /// Get file kind as string
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            FileKind::Spec => "spec",
            FileKind::Entry => "entry",
            FileKind::Component => "component",
            FileKind::Utility => "utility",
            FileKind::Model => "model",
            FileKind::Route => "route",
            FileKind::Test => "test",
            FileKind::Module => "module",
        }
    }
}

/// Structural summary of one analyzed source file.
///
/// Records are keyed by `path` (project-relative, `/`-separated) and replaced
/// wholesale whenever the underlying file changes; no field is ever patched in
/// place. `resolved_dependencies` is stamped at graph-build time and always
/// refers to paths that have records of their own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRecord {
    /// Project-relative path, the unique key
    pub path: String,

    /// Path-derived classification tag
    pub kind: FileKind,

    /// Importance tier: 0 = spec/doc, 1 = entry point, deeper = detail
    pub depth: u32,

    /// Imports in source order
    #[serde(default)]
    pub imports: Vec<ImportRecord>,

    /// Exported names in source order
    #[serde(default)]
    pub exports: Vec<ExportRecord>,

    /// Top-level declarations, for reporting
    #[serde(default)]
    pub declared_symbols: Vec<DeclaredSymbol>,

    /// Internal dependencies resolved from `imports`; subset of known records
    #[serde(default)]
    pub resolved_dependencies: BTreeSet<String>,

    /// Modification time of the underlying file (ms since epoch), the staleness key
    pub mod_time: u64,

    /// When this record was produced (ms since epoch), bookkeeping only
    pub cached_at: u64,
}

impl FileRecord {
    /// Names of declared symbols, in declaration order
    #[must_use]
    pub fn declared_symbol_names(&self) -> Vec<String> {
        self.declared_symbols
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }

    /// Number of import statements (static and dynamic)
    #[must_use]
    pub fn import_count(&self) -> usize {
        self.imports.len()
    }

    /// Number of exported names
    #[must_use]
    pub fn export_count(&self) -> usize {
        self.exports.len()
    }
}
