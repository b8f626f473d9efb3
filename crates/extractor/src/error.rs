use thiserror::Error;

/// Result type for extraction operations
pub type Result<T> = std::result::Result<T, ExtractorError>;

/// Errors that can occur while extracting structure from a source file
#[derive(Error, Debug)]
pub enum ExtractorError {
    /// Failed to parse the source code
    #[error("Parse error in {path}: {reason}")]
    ParseError { path: String, reason: String },

    /// Extension is not in the tracked set
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Tree-sitter grammar could not be loaded
    #[error("Tree-sitter error: {0}")]
    TreeSitterError(String),

    /// A scanning pattern failed to compile
    #[error("Invalid pattern: {0}")]
    PatternError(String),
}

impl ExtractorError {
    /// Create a parse error
    pub fn parse(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ParseError {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an unsupported language error
    pub fn unsupported_language(lang: impl Into<String>) -> Self {
        Self::UnsupportedLanguage(lang.into())
    }

    /// Create a tree-sitter error
    pub fn tree_sitter(msg: impl Into<String>) -> Self {
        Self::TreeSitterError(msg.into())
    }

    /// Create a pattern error
    pub fn pattern(msg: impl Into<String>) -> Self {
        Self::PatternError(msg.into())
    }
}
