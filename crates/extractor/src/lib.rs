//! # Codemap Extractor
//!
//! Structural extraction for JavaScript/TypeScript/Vue sources: one file in,
//! one [`FileRecord`] out.
//!
//! ## Architecture
//!
//! ```text
//! Source text
//!     │
//!     ├──> Language detection (extension)
//!     │
//!     ├──> Tree-sitter parse (error-tolerant; Vue lifts its <script> block)
//!     │
//!     ├──> Node walk
//!     │    ├─> imports (static, dynamic, require, re-export sources)
//!     │    ├─> exports (named, default, star)
//!     │    └─> top-level declarations
//!     │
//!     └──> Path classification (kind + depth) → FileRecord
//! ```
//!
//! The extractor is pure over its inputs: content and timestamps are supplied
//! by the caller, no filesystem or clock is consulted, and malformed source
//! yields a partial record instead of an error.
//!
//! ## Example
//!
//! ```rust
//! use codemap_extractor::Extractor;
//!
//! let mut extractor = Extractor::new();
//! let source = "import { helper } from './util';\nexport default function run() {}\n";
//! let record = extractor
//!     .extract("src/run.js", source, 0, 0)
//!     .unwrap()
//!     .expect("tracked extension");
//!
//! assert_eq!(record.imports[0].raw_specifier, "./util");
//! assert!(record.exports[0].is_default);
//! ```

mod classify;
mod error;
mod extract;
mod language;
mod sfc;
mod types;

pub use classify::{classify, depth_for_path, kind_for_path, MAX_DEPTH};
pub use error::{ExtractorError, Result};
pub use extract::{Extractor, SourceStructure};
pub use language::{is_tracked_extension, is_tracked_path, Language, TRACKED_EXTENSIONS};
pub use types::{
    DeclaredSymbol, ExportRecord, FileKind, FileRecord, ImportRecord, SymbolKind,
};
