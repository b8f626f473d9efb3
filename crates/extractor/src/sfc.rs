//! Vue single-file-component handling.
//!
//! SFCs are not parsed whole: the `<script>` block is lifted out and handed to
//! the TypeScript grammar (a superset of what legally appears there). When no
//! script block can be found the scanner still harvests import specifiers
//! textually so the file keeps its dependency edges.

use crate::error::{ExtractorError, Result};
use crate::types::ImportRecord;
use regex::Regex;

/// Textual scanner for `.vue` files
pub struct SfcScanner {
    script_block: Regex,
    import_specifier: Regex,
    require_specifier: Regex,
}

impl SfcScanner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            script_block: compile(r"(?is)<script[^>]*>(.*?)</script>")?,
            import_specifier: compile(r#"import\s+(?:[^'";]*?from\s+)?['"]([^'"]+)['"]"#)?,
            require_specifier: compile(r#"require\(\s*['"]([^'"]+)['"]\s*\)"#)?,
        })
    }

    /// Contents of the first `<script>` block, if any
    pub fn script_block<'a>(&self, source: &'a str) -> Option<&'a str> {
        self.script_block
            .captures(source)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    /// Best-effort import harvest for files with no parseable script block
    pub fn fallback_imports(&self, source: &str) -> Vec<ImportRecord> {
        let mut imports = Vec::new();
        for caps in self.import_specifier.captures_iter(source) {
            if let Some(spec) = caps.get(1) {
                imports.push(ImportRecord::new(spec.as_str(), Vec::new()));
            }
        }
        for caps in self.require_specifier.captures_iter(source) {
            if let Some(spec) = caps.get(1) {
                imports.push(ImportRecord::new(spec.as_str(), Vec::new()));
            }
        }
        imports
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| ExtractorError::pattern(e.to_string()))
}
