use crate::error::{ExtractorError, Result};
use std::path::Path;

/// Extensions eligible for analysis, in canonical order.
///
/// The Path Resolver appends these to extensionless specifiers in exactly this
/// order, so the order is part of the resolution contract, not cosmetic.
pub const TRACKED_EXTENSIONS: [&str; 7] = ["js", "jsx", "ts", "tsx", "mjs", "cjs", "vue"];

/// Source language of an analyzed file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    JavaScript,
    TypeScript,
    Tsx,
    Vue,
    Unknown,
}

impl Language {
    /// Detect language from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "js" | "mjs" | "cjs" | "jsx" => Language::JavaScript,
            "ts" => Language::TypeScript,
            "tsx" => Language::Tsx,
            "vue" => Language::Vue,
            _ => Language::Unknown,
        }
    }

    /// Detect language from file path
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    /// Get language name as string
    pub fn as_str(self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
            Language::Vue => "vue",
            Language::Unknown => "unknown",
        }
    }

    /// Check if this language parses directly with a tree-sitter grammar.
    /// Vue files do not: their script block is lifted out first.
    pub fn supports_ast(self) -> bool {
        matches!(
            self,
            Language::JavaScript | Language::TypeScript | Language::Tsx
        )
    }

    /// Get Tree-sitter language instance
    pub fn tree_sitter_language(self) -> Result<tree_sitter::Language> {
        match self {
            Language::JavaScript => Ok(tree_sitter_javascript::LANGUAGE.into()),
            Language::TypeScript => Ok(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Language::Tsx => Ok(tree_sitter_typescript::LANGUAGE_TSX.into()),
            _ => Err(ExtractorError::unsupported_language(self.as_str())),
        }
    }
}

/// Check whether an extension is in the tracked set
pub fn is_tracked_extension(ext: &str) -> bool {
    let lowered = ext.to_lowercase();
    TRACKED_EXTENSIONS.contains(&lowered.as_str())
}

/// Check whether a path has a tracked extension
pub fn is_tracked_path(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(is_tracked_extension)
}
