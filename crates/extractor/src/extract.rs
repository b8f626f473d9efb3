use crate::classify;
use crate::error::{ExtractorError, Result};
use crate::language::Language;
use crate::sfc::SfcScanner;
use crate::types::{DeclaredSymbol, ExportRecord, FileRecord, ImportRecord, SymbolKind};
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use tree_sitter::{Node, Parser, Tree};

/// Structural facts harvested from one file, before classification and
/// timestamps are applied
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SourceStructure {
    pub imports: Vec<ImportRecord>,
    pub exports: Vec<ExportRecord>,
    pub declared_symbols: Vec<DeclaredSymbol>,
}

/// Error-tolerant structural extractor for the tracked languages.
///
/// Parsers are created lazily per grammar and reused across files. The
/// extractor performs no I/O and reads no clocks: content and timestamps come
/// from the caller, so it is testable without a filesystem. Malformed source
/// degrades to a partial structure (ERROR subtrees simply match nothing)
/// rather than an error.
pub struct Extractor {
    parsers: HashMap<Language, Parser>,
    sfc: Option<SfcScanner>,
}

impl Extractor {
    pub fn new() -> Self {
        Self {
            parsers: HashMap::new(),
            sfc: None,
        }
    }

    /// Extract a full record for one file.
    ///
    /// `path` must be project-relative with `/` separators; it drives kind and
    /// depth classification. Returns `Ok(None)` when the extension is not
    /// tracked — skipping is not an error.
    pub fn extract(
        &mut self,
        path: &str,
        source: &str,
        mod_time_ms: u64,
        cached_at_ms: u64,
    ) -> Result<Option<FileRecord>> {
        let language = Language::from_path(path);
        if language == Language::Unknown {
            return Ok(None);
        }

        let structure = self.structure_of(path, source, language)?;
        let (kind, depth) = classify::classify(path);
        Ok(Some(FileRecord {
            path: path.to_string(),
            kind,
            depth,
            imports: structure.imports,
            exports: structure.exports,
            declared_symbols: structure.declared_symbols,
            resolved_dependencies: BTreeSet::new(),
            mod_time: mod_time_ms,
            cached_at: cached_at_ms,
        }))
    }

    /// Harvest imports/exports/symbols without assembling a record
    pub fn structure_of(
        &mut self,
        path: &str,
        source: &str,
        language: Language,
    ) -> Result<SourceStructure> {
        match language {
            Language::Vue => {
                let script = self.sfc_scanner()?.script_block(source).map(str::to_string);
                match script {
                    Some(script) => self.parse_structure(path, &script, Language::TypeScript),
                    None => {
                        let imports = self.sfc_scanner()?.fallback_imports(source);
                        Ok(SourceStructure {
                            imports,
                            ..SourceStructure::default()
                        })
                    }
                }
            }
            Language::Unknown => Err(ExtractorError::unsupported_language(path)),
            lang => self.parse_structure(path, source, lang),
        }
    }

    fn parse_structure(
        &mut self,
        path: &str,
        source: &str,
        language: Language,
    ) -> Result<SourceStructure> {
        let tree = self.parse_tree(path, source, language)?;
        let root = tree.root_node();
        if root.has_error() {
            log::debug!("tolerating syntax errors in {path}");
        }

        let mut structure = SourceStructure::default();
        collect_module_statements(root, source, &mut structure);
        collect_call_imports(root, source, &mut structure.imports);
        Ok(structure)
    }

    fn parse_tree(&mut self, path: &str, source: &str, language: Language) -> Result<Tree> {
        let parser = match self.parsers.entry(language) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let ts_language = language.tree_sitter_language()?;
                let mut parser = Parser::new();
                parser.set_language(&ts_language).map_err(|e| {
                    ExtractorError::tree_sitter(format!("failed to set language: {e}"))
                })?;
                entry.insert(parser)
            }
        };
        parser
            .parse(source, None)
            .ok_or_else(|| ExtractorError::parse(path, "parser returned no tree"))
    }

    fn sfc_scanner(&mut self) -> Result<&SfcScanner> {
        if self.sfc.is_none() {
            self.sfc = Some(SfcScanner::new()?);
        }
        match self.sfc.as_ref() {
            Some(scanner) => Ok(scanner),
            None => Err(ExtractorError::pattern("scanner initialization failed")),
        }
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk the direct children of the program node: static imports, exports and
/// top-level declarations all live there.
fn collect_module_statements(root: Node, source: &str, out: &mut SourceStructure) {
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        match child.kind() {
            "import_statement" => {
                if let Some(record) = import_from_statement(child, source) {
                    out.imports.push(record);
                }
            }
            "export_statement" => collect_export(child, source, out),
            _ => collect_declaration(child, source, &mut out.declared_symbols),
        }
    }
}

/// Top-level declaration forms shared by plain statements and `export` bodies
fn collect_declaration(node: Node, source: &str, symbols: &mut Vec<DeclaredSymbol>) {
    match node.kind() {
        "function_declaration" | "generator_function_declaration" => {
            push_named_symbol(node, source, SymbolKind::Function, symbols);
        }
        "class_declaration" | "abstract_class_declaration" => {
            collect_class(node, source, symbols);
        }
        "lexical_declaration" | "variable_declaration" => {
            collect_declarators(node, source, symbols);
        }
        "interface_declaration" => {
            push_named_symbol(node, source, SymbolKind::Interface, symbols);
        }
        "type_alias_declaration" => {
            push_named_symbol(node, source, SymbolKind::TypeAlias, symbols);
        }
        "enum_declaration" => {
            push_named_symbol(node, source, SymbolKind::Enum, symbols);
        }
        _ => {}
    }
}

fn push_named_symbol(node: Node, source: &str, kind: SymbolKind, symbols: &mut Vec<DeclaredSymbol>) {
    if let Some(name) = node.child_by_field_name("name") {
        symbols.push(DeclaredSymbol::new(node_text(name, source), kind));
    }
}

/// Record a class plus its methods as `Class.method` entries
fn collect_class(node: Node, source: &str, symbols: &mut Vec<DeclaredSymbol>) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let class_name = node_text(name_node, source);
    symbols.push(DeclaredSymbol::new(class_name.clone(), SymbolKind::Class));

    let Some(body) = node.child_by_field_name("body") else {
        return;
    };
    let mut cursor = body.walk();
    for member in body.children(&mut cursor) {
        if member.kind() != "method_definition" {
            continue;
        }
        let Some(method_name) = member.child_by_field_name("name") else {
            continue;
        };
        let method = node_text(method_name, source);
        if method == "constructor" {
            continue;
        }
        symbols.push(DeclaredSymbol::new(
            format!("{class_name}.{method}"),
            SymbolKind::Method,
        ));
    }
}

fn collect_declarators(node: Node, source: &str, symbols: &mut Vec<DeclaredSymbol>) {
    let mut cursor = node.walk();
    for declarator in node.children(&mut cursor) {
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        if let Some(name) = declarator.child_by_field_name("name") {
            if name.kind() == "identifier" {
                symbols.push(DeclaredSymbol::new(
                    node_text(name, source),
                    SymbolKind::Variable,
                ));
            }
        }
    }
}

fn import_from_statement(node: Node, source: &str) -> Option<ImportRecord> {
    let source_node = node.child_by_field_name("source")?;
    let specifier = string_value(source_node, source)?;

    let mut bindings = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "import_clause" {
            collect_import_bindings(child, source, &mut bindings);
        }
    }
    Some(ImportRecord::new(specifier, bindings))
}

fn collect_import_bindings(clause: Node, source: &str, out: &mut Vec<String>) {
    let mut cursor = clause.walk();
    for child in clause.children(&mut cursor) {
        match child.kind() {
            // default import
            "identifier" => out.push(node_text(child, source)),
            "named_imports" => {
                let mut inner = child.walk();
                for spec in child.children(&mut inner) {
                    if spec.kind() != "import_specifier" {
                        continue;
                    }
                    // the local binding is the alias when present
                    let local = spec
                        .child_by_field_name("alias")
                        .or_else(|| spec.child_by_field_name("name"));
                    if let Some(local) = local {
                        out.push(spec_name_text(local, source));
                    }
                }
            }
            "namespace_import" => {
                let mut inner = child.walk();
                for part in child.children(&mut inner) {
                    if part.kind() == "identifier" {
                        out.push(node_text(part, source));
                    }
                }
            }
            _ => {}
        }
    }
}

/// Handle every `export` form: declarations, clauses, defaults, re-exports.
/// Re-exports (`export ... from './x'`) also record an import of the source,
/// since they create a dependency exactly like an import does.
fn collect_export(node: Node, source: &str, out: &mut SourceStructure) {
    let mut cursor = node.walk();
    let has_default = node.children(&mut cursor).any(|c| c.kind() == "default");
    let source_spec = node
        .child_by_field_name("source")
        .and_then(|n| string_value(n, source));

    // names re-exported from another module, for the synthetic import below
    let mut reexported: Vec<String> = Vec::new();

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "export_clause" => {
                let mut inner = child.walk();
                for spec in child.children(&mut inner) {
                    if spec.kind() != "export_specifier" {
                        continue;
                    }
                    let Some(name_node) = spec.child_by_field_name("name") else {
                        continue;
                    };
                    let local = spec_name_text(name_node, source);
                    let exported = spec
                        .child_by_field_name("alias")
                        .map(|a| spec_name_text(a, source))
                        .unwrap_or_else(|| local.clone());
                    let is_default = exported == "default";
                    out.exports.push(ExportRecord {
                        name: exported,
                        is_default,
                    });
                    reexported.push(local);
                }
            }
            "*" => {
                out.exports.push(ExportRecord::named("*"));
                reexported.push("*".to_string());
            }
            "namespace_export" => {
                let mut inner = child.walk();
                if let Some(name) = child.children(&mut inner).find(|c| c.is_named()) {
                    out.exports.push(ExportRecord::named(node_text(name, source)));
                }
                reexported.push("*".to_string());
            }
            _ => {}
        }
    }

    if let Some(declaration) = node.child_by_field_name("declaration") {
        let before = out.declared_symbols.len();
        collect_declaration(declaration, source, &mut out.declared_symbols);
        for symbol in &out.declared_symbols[before..] {
            // methods are reported as Class.method but are not exported names
            if !symbol.name.contains('.') {
                out.exports.push(ExportRecord {
                    name: symbol.name.clone(),
                    is_default: has_default,
                });
            }
        }
    } else if let Some(value) = node.child_by_field_name("value") {
        // `export default <expression>`
        let name = if value.kind() == "identifier" {
            node_text(value, source)
        } else {
            "default".to_string()
        };
        out.exports.push(ExportRecord {
            name,
            is_default: true,
        });
    }

    if let Some(spec) = source_spec {
        out.imports.push(ImportRecord::new(spec, reexported));
    }
}

/// Recursive pass for `import(...)` and `require('...')`, which can appear at
/// any nesting depth
fn collect_call_imports(node: Node, source: &str, imports: &mut Vec<ImportRecord>) {
    if node.kind() == "call_expression" {
        if let Some(record) = call_import(node, source) {
            imports.push(record);
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_call_imports(child, source, imports);
    }
}

fn call_import(node: Node, source: &str) -> Option<ImportRecord> {
    let callee = node.child_by_field_name("function")?;
    let arguments = node.child_by_field_name("arguments")?;

    let mut cursor = arguments.walk();
    let first_string = arguments
        .children(&mut cursor)
        .find(|c| c.kind() == "string")?;
    let specifier = string_value(first_string, source)?;

    match callee.kind() {
        "import" => Some(ImportRecord::dynamic(specifier)),
        "identifier" if node_text(callee, source) == "require" => Some(ImportRecord {
            raw_specifier: specifier,
            is_dynamic: false,
            bindings: require_bindings(node, source),
        }),
        _ => None,
    }
}

/// Local names bound by `const x = require(...)` or
/// `const { a, b } = require(...)`
fn require_bindings(call: Node, source: &str) -> Vec<String> {
    let Some(parent) = call.parent() else {
        return Vec::new();
    };
    if parent.kind() != "variable_declarator" {
        return Vec::new();
    }
    let Some(name) = parent.child_by_field_name("name") else {
        return Vec::new();
    };

    let mut bindings = Vec::new();
    collect_pattern_identifiers(name, source, &mut bindings);
    bindings
}

fn collect_pattern_identifiers(node: Node, source: &str, out: &mut Vec<String>) {
    match node.kind() {
        "identifier" | "shorthand_property_identifier_pattern" | "shorthand_property_identifier" => {
            out.push(node_text(node, source));
            return;
        }
        // `{ a: renamed }` binds the value side only
        "pair_pattern" => {
            if let Some(value) = node.child_by_field_name("value") {
                collect_pattern_identifiers(value, source, out);
            }
            return;
        }
        _ => {}
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_pattern_identifiers(child, source, out);
    }
}

fn node_text(node: Node, source: &str) -> String {
    node.utf8_text(source.as_bytes()).unwrap_or_default().to_string()
}

/// Specifier names may be identifiers or string literals
fn spec_name_text(node: Node, source: &str) -> String {
    if node.kind() == "string" {
        string_value(node, source).unwrap_or_default()
    } else {
        node_text(node, source)
    }
}

/// Unquoted contents of a string literal node
fn string_value(node: Node, source: &str) -> Option<String> {
    if node.kind() != "string" {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "string_fragment" {
            return Some(node_text(child, source));
        }
    }
    // empty literal has no fragment child
    Some(String::new())
}
