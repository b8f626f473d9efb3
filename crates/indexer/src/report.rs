use codemap_extractor::{FileKind, FileRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Full-project analysis report consumed by downstream tooling.
///
/// Maps are `BTreeMap`s and edge lists are sorted, so an unchanged project
/// serializes byte-identically across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub file_count: usize,
    pub files: BTreeMap<String, FileSummary>,
    /// Forward edges: path -> resolved dependency paths.
    pub connections: BTreeMap<String, Vec<String>>,
    pub statistics: AnalysisStatistics,
}

/// Per-file slice of the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub kind: FileKind,
    pub depth: u32,
    pub import_count: usize,
    pub export_count: usize,
    pub declared_symbol_names: Vec<String>,
    pub dependencies: Vec<String>,
}

impl FileSummary {
    pub fn from_record(record: &FileRecord, dependencies: Vec<String>) -> Self {
        Self {
            kind: record.kind,
            depth: record.depth,
            import_count: record.import_count(),
            export_count: record.export_count(),
            declared_symbol_names: record.declared_symbol_names(),
            dependencies,
        }
    }
}

/// Run statistics; the only report section that varies between identical runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStatistics {
    /// Wall-clock time of the analysis in milliseconds.
    pub duration_ms: u64,

    /// Files parsed this run.
    pub files_extracted: usize,

    /// Files served from the cache unchanged.
    pub files_from_cache: usize,

    /// Files that failed to read or parse this run.
    pub files_failed: usize,

    /// Count of files per classification kind.
    pub by_kind: BTreeMap<String, usize>,

    /// `path: reason` strings for every failure.
    pub errors: Vec<String>,
}

impl AnalysisStatistics {
    pub fn add_kind(&mut self, kind: FileKind) {
        *self.by_kind.entry(kind.as_str().to_string()).or_insert(0) += 1;
    }

    pub fn add_error(&mut self, path: &str, reason: &str) {
        self.files_failed += 1;
        self.errors.push(format!("{path}: {reason}"));
    }
}
