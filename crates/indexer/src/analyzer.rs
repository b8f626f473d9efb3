use crate::cache::{compute_project_hash, AnalysisCache, CacheStats, FileDiff, CACHE_DIR_NAME};
use crate::error::{IndexerError, Result};
use crate::report::{AnalysisReport, AnalysisStatistics, FileSummary};
use crate::scanner::{mod_time_ms, ProjectWalker, ScannedFile};
use codemap_extractor::{Extractor, FileRecord};
use codemap_graph::DependencyGraph;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Overrides the default `<root>/.codemap` cache directory.
    pub cache_dir: Option<PathBuf>,

    /// Upper bound on concurrently extracted files.
    pub max_concurrency: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        // Extraction mixes IO and parsing CPU; the cap bounds fan-out so large
        // projects do not spike CPU or RAM.
        let max_concurrency = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .clamp(2, 8);
        Self {
            cache_dir: None,
            max_concurrency,
        }
    }
}

/// Project analyzer that walks, extracts, and links source files into the
/// dependency index, re-extracting only what the cache reports stale.
#[derive(Debug)]
pub struct ProjectAnalyzer {
    root: PathBuf,
    cache: Arc<AnalysisCache>,
    config: AnalyzerConfig,
}

impl ProjectAnalyzer {
    /// Create an analyzer for the project at `root`.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(root, AnalyzerConfig::default())
    }

    pub fn with_config(root: impl AsRef<Path>, config: AnalyzerConfig) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        if !root.exists() {
            return Err(IndexerError::InvalidPath(format!(
                "Path does not exist: {}",
                root.display()
            )));
        }

        let cache_dir = config
            .cache_dir
            .clone()
            .unwrap_or_else(|| root.join(CACHE_DIR_NAME));
        let cache = Arc::new(AnalysisCache::open(cache_dir)?);

        Ok(Self {
            root,
            cache,
            config,
        })
    }

    /// Analyze the project (with incremental support).
    pub async fn analyze(&self) -> Result<AnalysisReport> {
        self.analyze_with_mode(false, None).await
    }

    /// Analyze in full mode (skip the incremental check).
    pub async fn analyze_full(&self) -> Result<AnalysisReport> {
        self.analyze_with_mode(true, None).await
    }

    /// Analyze with a best-effort time budget.
    ///
    /// Budget enforcement is cooperative and checked between phases and between
    /// extraction chunks. When the budget is exceeded, no snapshot is persisted
    /// and already-committed records stay intact.
    pub async fn analyze_with_budget(&self, max_duration: Duration) -> Result<AnalysisReport> {
        self.analyze_with_mode(false, Some(Instant::now() + max_duration))
            .await
    }

    async fn analyze_with_mode(
        &self,
        force_full: bool,
        deadline: Option<Instant>,
    ) -> Result<AnalysisReport> {
        let start = Instant::now();
        let mut statistics = AnalysisStatistics::default();

        log::info!("Analyzing project at {}", self.root.display());
        check_budget(deadline)?;

        // 1. Walk the tree.
        let walker = ProjectWalker::new(&self.root);
        let scanned = walker.scan();
        check_budget(deadline)?;

        // 2. Decide scope: full rescan or cache-guided incremental.
        let project_hash = compute_project_hash(&self.root);
        let (_, _, overflowed) = self.cache.dirty_snapshot();
        if overflowed {
            log::info!("Dirty-set overflow; falling back to a full rescan");
        }
        let full = force_full || overflowed || self.cache.needs_full_analysis(&project_hash);

        let targets: Vec<ScannedFile> = if full {
            scanned.clone()
        } else {
            let diff = self.cache.diff(&scanned);
            let wanted: HashSet<&String> = diff.new.iter().chain(diff.changed.iter()).collect();
            scanned
                .iter()
                .filter(|file| wanted.contains(&file.relative_path))
                .cloned()
                .collect()
        };
        if !full {
            log::info!(
                "Incremental: extracting {} of {} files",
                targets.len(),
                scanned.len()
            );
        }
        statistics.files_from_cache = scanned.len() - targets.len();

        // 3. Drop records for files no longer on disk.
        let live: BTreeSet<String> = scanned
            .iter()
            .map(|file| file.relative_path.clone())
            .collect();
        let removed = self.cache.retain_live(&live);
        if removed > 0 {
            log::info!("Purged {removed} records for deleted files");
        }

        // 4. Extract stale files in parallel; commit per file. A failed file is
        // logged and left as-is in the cache so the next cycle retries it.
        let results = self.extract_files_parallel(&targets, deadline).await?;
        for result in results {
            check_budget(deadline)?;
            match result {
                Ok(Some(record)) => {
                    statistics.files_extracted += 1;
                    self.cache.insert(record);
                }
                Ok(None) => {}
                Err((path, reason)) => {
                    log::warn!("Failed to extract {path}: {reason}");
                    statistics.add_error(&path, &reason);
                }
            }
        }
        check_budget(deadline)?;

        // 5. Graph build barrier: runs only after every extraction has landed,
        // re-resolving all imports against the current record set.
        let records = self.cache.records_snapshot();
        let graph = DependencyGraph::build(&records);
        self.cache.stamp_dependencies(graph.connections());

        // 6. Assemble the report.
        let mut files = BTreeMap::new();
        for (path, record) in &records {
            statistics.add_kind(record.kind);
            let dependencies = graph.dependencies_of(path).to_vec();
            files.insert(path.clone(), FileSummary::from_record(record, dependencies));
        }
        check_budget(deadline)?;

        // 7. Persist the snapshot; only a completed run advances the metadata.
        self.cache.finish_analysis(&project_hash, current_unix_ms());
        self.cache.save()?;
        self.cache.clear_dirty();

        statistics.duration_ms = elapsed_ms(start);
        log::info!(
            "Analysis completed: {} files ({} extracted, {} cached, {} failed) in {}ms",
            files.len(),
            statistics.files_extracted,
            statistics.files_from_cache,
            statistics.files_failed,
            statistics.duration_ms
        );

        Ok(AnalysisReport {
            file_count: files.len(),
            files,
            connections: graph.connections().clone(),
            statistics,
        })
    }

    /// Extract files in parallel with a bounded fan-out.
    async fn extract_files_parallel(
        &self,
        files: &[ScannedFile],
        deadline: Option<Instant>,
    ) -> Result<Vec<ExtractOutcome>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let max_concurrent = self.config.max_concurrency.max(1);
        let mut aggregated = Vec::with_capacity(files.len());

        for chunk in files.chunks(max_concurrent) {
            check_budget(deadline)?;
            let mut tasks = Vec::with_capacity(chunk.len());
            for file in chunk {
                let file = file.clone();
                tasks.push((file.relative_path.clone(), tokio::spawn(extract_one(file))));
            }

            for (relative_path, task) in tasks {
                match task.await {
                    Ok(outcome) => aggregated.push(outcome),
                    Err(e) => {
                        aggregated.push(Err((relative_path, format!("task panicked: {e}"))));
                    }
                }
            }
        }

        Ok(aggregated)
    }

    /// Bounded bidirectional traversal over the current dependency graph.
    ///
    /// `max_depth = 0` yields the empty set; the start file is never included.
    pub fn related_files(&self, path: &str, max_depth: u32) -> BTreeSet<String> {
        let records = self.cache.records_snapshot();
        let graph = DependencyGraph::build(&records);
        graph.related_files(path, max_depth)
    }

    /// Partition the live file set against the cache without extracting anything.
    pub fn files_to_analyze(&self) -> FileDiff {
        let scanned = ProjectWalker::new(&self.root).scan();
        self.cache.diff(&scanned)
    }

    /// Whether `path` has a record that is still fresh against the disk mtime.
    pub fn is_file_cached(&self, path: &str) -> bool {
        let Ok(meta) = std::fs::metadata(self.root.join(path)) else {
            return false;
        };
        self.cache.is_file_cached(path, mod_time_ms(&meta))
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Delete the persisted snapshot and empty the cache, forcing a cold start.
    pub fn clear_cache(&self) -> Result<()> {
        self.cache.clear()
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Shared handle to the cache, for wiring up a [`crate::ChangeWatcher`].
    pub fn cache(&self) -> Arc<AnalysisCache> {
        Arc::clone(&self.cache)
    }
}

type ExtractOutcome = std::result::Result<Option<FileRecord>, (String, String)>;

async fn extract_one(file: ScannedFile) -> ExtractOutcome {
    let source = match tokio::fs::read_to_string(&file.absolute_path).await {
        Ok(source) => source,
        Err(e) => return Err((file.relative_path, e.to_string())),
    };

    let mut extractor = Extractor::new();
    extractor
        .extract(
            &file.relative_path,
            &source,
            file.mod_time_ms,
            current_unix_ms(),
        )
        .map_err(|e| (file.relative_path.clone(), e.to_string()))
}

fn check_budget(deadline: Option<Instant>) -> Result<()> {
    if let Some(deadline) = deadline {
        if Instant::now() >= deadline {
            return Err(IndexerError::BudgetExceeded);
        }
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn elapsed_ms(start: Instant) -> u64 {
    let ms = start.elapsed().as_millis() as u64;
    ms.max(1)
}

pub(crate) fn current_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .ok()
        .and_then(|dur| u64::try_from(dur.as_millis()).ok())
        .unwrap_or(0)
}
