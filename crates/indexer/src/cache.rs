use crate::error::Result;
use crate::scanner::{is_ignored_key, ScannedFile};
use codemap_extractor::FileRecord;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Default cache directory name under the project root.
pub const CACHE_DIR_NAME: &str = ".codemap";

const RECORDS_FILE: &str = "records.json";
const META_FILE: &str = "meta.json";

/// Dirty-set capacity; beyond this the cache degrades to a full rescan.
pub(crate) const MAX_PENDING_PATHS: usize = 512;

/// Root-level files whose contents feed the project hash, in fixed order.
const PROJECT_MARKER_FILES: &[&str] = &[
    "package.json",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "tsconfig.json",
    "jsconfig.json",
];

/// Whole-project bookkeeping persisted alongside the records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// Unix milliseconds of the last completed analysis, or unset.
    #[serde(default)]
    pub last_full_analysis: Option<u64>,

    /// Digest over root-level marker files; a mismatch invalidates everything.
    #[serde(default)]
    pub project_hash: String,

    /// Record count at the last completed analysis, for reporting only.
    #[serde(default)]
    pub total_files: usize,
}

/// Partition of the live file set against the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileDiff {
    /// On disk, no record.
    pub new: Vec<String>,
    /// Record exists but is stale (mtime advanced or watcher-flagged).
    pub changed: Vec<String>,
    /// Record exists and is fresh.
    pub cached: Vec<String>,
}

/// Cache state summary for the `stats` surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_cached: usize,
    pub changed_files: usize,
    pub deleted_files: usize,
    pub last_full_analysis: Option<u64>,
    pub project_hash: String,
}

#[derive(Debug, Default)]
struct DirtySet {
    changed: BTreeSet<String>,
    deleted: BTreeSet<String>,
    overflowed: bool,
}

impl DirtySet {
    fn mark_changed(&mut self, path: String) {
        self.deleted.remove(&path);
        self.insert_bounded(path, true);
    }

    fn mark_deleted(&mut self, path: String) {
        self.changed.remove(&path);
        self.insert_bounded(path, false);
    }

    fn insert_bounded(&mut self, path: String, changed: bool) {
        if self.overflowed {
            return;
        }
        if self.changed.len() + self.deleted.len() >= MAX_PENDING_PATHS {
            // Past the cap the set stops naming paths; the overflow flag
            // turns the next analysis into a full rescan.
            self.overflowed = true;
            self.changed.clear();
            self.deleted.clear();
            return;
        }
        if changed {
            self.changed.insert(path);
        } else {
            self.deleted.insert(path);
        }
    }

    fn clear(&mut self) {
        self.changed.clear();
        self.deleted.clear();
        self.overflowed = false;
    }
}

#[derive(Debug)]
struct CacheInner {
    records: BTreeMap<String, FileRecord>,
    metadata: CacheMetadata,
    dirty: DirtySet,
}

/// Persistent per-project record store with mtime-keyed staleness.
///
/// All mutation goes through whole-record replace and delete operations, so
/// concurrent readers observe either the old or the new record, never a
/// partial one. Snapshots are written atomically (tmp file + rename) and an
/// unreadable snapshot cold-starts instead of failing.
#[derive(Debug)]
pub struct AnalysisCache {
    dir: PathBuf,
    inner: RwLock<CacheInner>,
}

impl AnalysisCache {
    /// Open (or cold-start) the cache stored under `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        let mut records: BTreeMap<String, FileRecord> =
            load_artifact(&dir.join(RECORDS_FILE)).unwrap_or_default();
        let metadata: CacheMetadata = load_artifact(&dir.join(META_FILE)).unwrap_or_default();

        let before = records.len();
        records.retain(|path, _| !is_ignored_key(path));
        if records.len() < before {
            log::info!(
                "Dropped {} snapshot records under ignored scopes",
                before - records.len()
            );
        }
        for record in records.values_mut() {
            record.mod_time = normalize_mtime_ms(record.mod_time);
        }

        Ok(Self {
            dir,
            inner: RwLock::new(CacheInner {
                records,
                metadata,
                dirty: DirtySet::default(),
            }),
        })
    }

    /// Write both snapshot artifacts atomically.
    pub fn save(&self) -> Result<()> {
        let (records_json, meta_json) = {
            let inner = self.read();
            (
                serde_json::to_string_pretty(&inner.records)?,
                serde_json::to_string_pretty(&inner.metadata)?,
            )
        };
        write_artifact(&self.dir.join(RECORDS_FILE), &records_json)?;
        write_artifact(&self.dir.join(META_FILE), &meta_json)?;
        Ok(())
    }

    /// Delete both artifacts and empty the in-memory state.
    pub fn clear(&self) -> Result<()> {
        for name in [RECORDS_FILE, META_FILE] {
            match std::fs::remove_file(self.dir.join(name)) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        let mut inner = self.write();
        inner.records.clear();
        inner.metadata = CacheMetadata::default();
        inner.dirty.clear();
        Ok(())
    }

    /// Staleness predicate: a record exists and its stored mtime has not been
    /// overtaken on disk. Watcher flags do not factor in here; they widen the
    /// `changed` partition of [`AnalysisCache::diff`] instead.
    pub fn is_file_cached(&self, path: &str, disk_mod_time_ms: u64) -> bool {
        let inner = self.read();
        inner
            .records
            .get(path)
            .is_some_and(|record| record.mod_time >= disk_mod_time_ms)
    }

    /// Partition the scanned file set into new / changed / cached.
    pub fn diff(&self, scanned: &[ScannedFile]) -> FileDiff {
        let inner = self.read();
        let mut diff = FileDiff::default();

        for file in scanned {
            match inner.records.get(&file.relative_path) {
                None => diff.new.push(file.relative_path.clone()),
                Some(record) => {
                    let stale = record.mod_time < file.mod_time_ms
                        || inner.dirty.changed.contains(&file.relative_path);
                    if stale {
                        diff.changed.push(file.relative_path.clone());
                    } else {
                        diff.cached.push(file.relative_path.clone());
                    }
                }
            }
        }

        diff.new.sort();
        diff.changed.sort();
        diff.cached.sort();
        diff
    }

    /// True when incremental analysis cannot be trusted: no completed analysis
    /// yet, the project hash moved, or the record set is empty.
    pub fn needs_full_analysis(&self, current_project_hash: &str) -> bool {
        let inner = self.read();
        inner.metadata.last_full_analysis.is_none()
            || inner.metadata.project_hash != current_project_hash
            || inner.records.is_empty()
    }

    pub fn record(&self, path: &str) -> Option<FileRecord> {
        self.read().records.get(path).cloned()
    }

    /// Clone of the full record map, for graph builds and reporting.
    pub fn records_snapshot(&self) -> BTreeMap<String, FileRecord> {
        self.read().records.clone()
    }

    /// Insert-or-replace one record wholesale.
    pub fn insert(&self, record: FileRecord) {
        let mut inner = self.write();
        inner.records.insert(record.path.clone(), record);
    }

    pub fn remove(&self, path: &str) -> bool {
        self.write().records.remove(path).is_some()
    }

    /// Drop records whose files are no longer present; returns the count removed.
    pub fn retain_live(&self, live: &BTreeSet<String>) -> usize {
        let mut inner = self.write();
        let before = inner.records.len();
        inner.records.retain(|path, _| live.contains(path));
        before - inner.records.len()
    }

    /// Replace every record's resolved dependency set from a freshly built
    /// graph's forward edges.
    pub fn stamp_dependencies(&self, connections: &BTreeMap<String, Vec<String>>) {
        let mut inner = self.write();
        for (path, dependencies) in connections {
            if let Some(record) = inner.records.get_mut(path) {
                record.resolved_dependencies = dependencies.iter().cloned().collect();
            }
        }
    }

    pub fn mark_changed(&self, path: String) {
        self.write().dirty.mark_changed(path);
    }

    pub fn mark_deleted(&self, path: String) {
        self.write().dirty.mark_deleted(path);
    }

    /// Snapshot of the pending dirty-set: (changed, deleted, overflowed).
    pub fn dirty_snapshot(&self) -> (BTreeSet<String>, BTreeSet<String>, bool) {
        let inner = self.read();
        (
            inner.dirty.changed.clone(),
            inner.dirty.deleted.clone(),
            inner.dirty.overflowed,
        )
    }

    pub fn clear_dirty(&self) {
        self.write().dirty.clear();
    }

    /// Record a completed analysis in the metadata.
    pub fn finish_analysis(&self, project_hash: &str, completed_at_ms: u64) {
        let mut inner = self.write();
        let total_files = inner.records.len();
        inner.metadata = CacheMetadata {
            last_full_analysis: Some(completed_at_ms),
            project_hash: project_hash.to_string(),
            total_files,
        };
    }

    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().records.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.read();
        CacheStats {
            total_cached: inner.records.len(),
            changed_files: inner.dirty.changed.len(),
            deleted_files: inner.dirty.deleted.len(),
            last_full_analysis: inner.metadata.last_full_analysis,
            project_hash: inner.metadata.project_hash.clone(),
        }
    }

    // A poisoned lock still holds consistent data (records are replaced
    // wholesale), so recover the guard instead of propagating the panic.
    fn read(&self) -> RwLockReadGuard<'_, CacheInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn load_artifact<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    let json = match std::fs::read_to_string(path) {
        Ok(json) => json,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
        Err(err) => {
            log::warn!("Failed to read {}: {err}; starting cold", path.display());
            return None;
        }
    };
    match serde_json::from_str(&json) {
        Ok(value) => Some(value),
        Err(err) => {
            log::warn!("Invalid snapshot {}: {err}; starting cold", path.display());
            None
        }
    }
}

fn write_artifact(path: &Path, json: &str) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Digest over the root path plus root-level marker files, hex-truncated to
/// 16 characters. Changing a manifest or lockfile changes the hash and forces
/// a full reanalysis.
pub fn compute_project_hash(root: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(root.to_string_lossy().as_bytes());
    for name in PROJECT_MARKER_FILES {
        let Ok(contents) = std::fs::read(root.join(name)) else {
            continue;
        };
        hasher.update(name.as_bytes());
        hasher.update(&contents);
    }
    hasher
        .finalize()
        .iter()
        .take(8)
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

pub(crate) const fn normalize_mtime_ms(value: u64) -> u64 {
    // Older snapshots persisted seconds since the Unix epoch. Milliseconds
    // since the epoch are ~1e12 in 2025; seconds are ~1e9.
    if value < 100_000_000_000 {
        value.saturating_mul(1000)
    } else {
        value
    }
}
