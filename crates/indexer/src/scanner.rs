use codemap_extractor::is_tracked_path;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// One eligible source file found under the project root.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    /// Project-relative path with `/` separators; the record key everywhere.
    pub relative_path: String,
    pub absolute_path: PathBuf,
    /// Modification time in milliseconds since the Unix epoch.
    pub mod_time_ms: u64,
}

/// Walker for finding tracked source files in a project (.gitignore aware).
pub struct ProjectWalker {
    root: PathBuf,
}

impl ProjectWalker {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Enumerate tracked files under the root, skipping ignored scopes outright.
    pub fn scan(&self) -> Vec<ScannedFile> {
        let mut files = Vec::new();

        let root = self.root.clone();
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(true) // do not index hidden files
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true);
        builder.filter_entry(move |entry| !ProjectWalker::is_ignored_scope(entry.path(), &root));

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    let Some(file_type) = entry.file_type() else {
                        continue;
                    };
                    if !file_type.is_file() {
                        continue;
                    }

                    let path = entry.path();
                    if !is_tracked_path(path) {
                        continue;
                    }

                    let Ok(meta) = entry.metadata() else {
                        continue;
                    };
                    if meta.len() > MAX_FILE_SIZE_BYTES {
                        log::debug!(
                            "Skipping large file {} ({} bytes > {})",
                            path.display(),
                            meta.len(),
                            MAX_FILE_SIZE_BYTES
                        );
                        continue;
                    }

                    let Some(relative_path) = relative_key(&self.root, path) else {
                        continue;
                    };

                    files.push(ScannedFile {
                        relative_path,
                        absolute_path: path.to_path_buf(),
                        mod_time_ms: mod_time_ms(&meta),
                    });
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        log::info!("Found {} tracked files", files.len());
        files
    }

    fn is_ignored_scope(path: &Path, root: &Path) -> bool {
        if let Ok(relative) = path.strip_prefix(root) {
            for component in relative.components() {
                if let std::path::Component::Normal(name) = component {
                    let lowered = name.to_string_lossy().to_lowercase();
                    if IGNORED_DIRS.iter().any(|ignored| ignored == &lowered) {
                        return true;
                    }
                }
            }
        }
        false
    }
}

/// Project-relative `/`-separated key for `path`, or `None` if it escapes `root`.
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut key = relative.to_string_lossy().to_string();
    if key.contains('\\') {
        key = key.replace('\\', "/");
    }
    (!key.is_empty()).then_some(key)
}

/// Whether a relative record key sits under an ignored scope.
///
/// Used to drop stale snapshot entries when the ignore list changes between runs.
pub fn is_ignored_key(path: &str) -> bool {
    path.split('/')
        .any(|segment| IGNORED_DIRS.iter().any(|ignored| segment.eq_ignore_ascii_case(ignored)))
}

pub(crate) fn mod_time_ms(meta: &std::fs::Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|modified| modified.duration_since(SystemTime::UNIX_EPOCH).ok())
        .and_then(|duration| u64::try_from(duration.as_millis()).ok())
        .unwrap_or(0)
}

/// Directory names never descended into, including the cache's own storage.
pub const IGNORED_DIRS: &[&str] = &[
    // VCS / tooling
    ".git",
    ".hg",
    ".svn",
    // caches / builds
    "node_modules",
    "dist",
    "build",
    "out",
    "coverage",
    ".next",
    ".nuxt",
    ".cache",
    ".turbo",
    ".output",
    "vendor",
    "tmp",
    // our own index storage
    ".codemap",
];

pub const MAX_FILE_SIZE_BYTES: u64 = 1_048_576; // 1 MB
