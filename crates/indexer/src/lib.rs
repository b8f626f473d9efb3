//! # Codemap Indexer
//!
//! Incremental dependency indexing for JavaScript, TypeScript, and Vue
//! projects.
//!
//! ## Pipeline
//!
//! ```text
//! Directory
//!     │
//!     ├──> Project Walker (.gitignore aware)
//!     │      └─> Tracked source files
//!     │
//!     ├──> Extractor (AST-based, changed files only)
//!     │      └─> File records (imports, exports, symbols)
//!     │
//!     └──> Dependency Graph (full re-link)
//!            └─> Report + snapshot under .codemap/
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use codemap_indexer::ProjectAnalyzer;
//!
//! #[tokio::main]
//! async fn main() -> codemap_indexer::Result<()> {
//!     let analyzer = ProjectAnalyzer::new("/path/to/project")?;
//!     let report = analyzer.analyze().await?;
//!
//!     println!("Indexed {} files", report.file_count);
//!     Ok(())
//! }
//! ```

mod analyzer;
mod cache;
mod error;
mod report;
mod scanner;
mod watcher;

pub use analyzer::{AnalyzerConfig, ProjectAnalyzer};
pub use cache::{
    compute_project_hash, AnalysisCache, CacheMetadata, CacheStats, FileDiff, CACHE_DIR_NAME,
};
pub use error::{IndexerError, Result};
pub use report::{AnalysisReport, AnalysisStatistics, FileSummary};
pub use scanner::{
    is_ignored_key, relative_key, ProjectWalker, ScannedFile, IGNORED_DIRS, MAX_FILE_SIZE_BYTES,
};
pub use watcher::{ChangeBatch, ChangeWatcher, WatcherConfig};
