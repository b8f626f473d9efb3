use crate::cache::{AnalysisCache, MAX_PENDING_PATHS};
use crate::error::{IndexerError, Result};
use crate::scanner::{is_ignored_key, relative_key};
use codemap_extractor::is_tracked_path;
use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tokio::time;

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Quiet period after the last event before a batch is published.
    pub debounce: Duration,

    /// Upper bound on how long a steady event stream may delay publication.
    pub max_batch_wait: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(250),
            max_batch_wait: Duration::from_secs(1),
        }
    }
}

/// One debounced unit of filesystem change, keyed by `/`-separated paths
/// relative to the project root.
#[derive(Debug, Clone, Default)]
pub struct ChangeBatch {
    pub changed: BTreeSet<String>,
    pub deleted: BTreeSet<String>,

    /// Set when the pending set overflowed. Per-path detail was dropped and
    /// the next analysis runs as a full rescan.
    pub overflowed: bool,
}

impl ChangeBatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.deleted.is_empty() && !self.overflowed
    }
}

enum WatcherCommand {
    Flush,
    Shutdown,
}

/// Filesystem watcher that folds raw notify events into debounced
/// [`ChangeBatch`]es and mirrors every relevant path into the analysis
/// cache's dirty set.
///
/// Watch errors are logged and do not stop the loop; whatever they hid is
/// reconciled by the next analysis walk. Handles are cheap to clone; the
/// loop shuts down when the last one is dropped.
#[derive(Clone)]
pub struct ChangeWatcher {
    inner: Arc<ChangeWatcherInner>,
}

struct ChangeWatcherInner {
    command_tx: mpsc::Sender<WatcherCommand>,
    batch_tx: broadcast::Sender<ChangeBatch>,
    _fs_watcher: std::sync::Mutex<Option<RecommendedWatcher>>,
}

impl ChangeWatcher {
    /// Start watching `root` recursively, feeding the dirty set of `cache`.
    pub fn start(
        cache: Arc<AnalysisCache>,
        root: impl AsRef<Path>,
        config: WatcherConfig,
    ) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.exists() {
            return Err(IndexerError::InvalidPath(format!(
                "Path does not exist: {}",
                root.display()
            )));
        }

        let (event_tx, event_rx) = mpsc::channel(1024);
        let (command_tx, command_rx) = mpsc::channel(16);
        let (batch_tx, _) = broadcast::channel(32);

        let fs_watcher = create_fs_watcher(&root, event_tx)?;

        spawn_watch_loop(cache, root, config, event_rx, command_rx, batch_tx.clone());

        Ok(Self {
            inner: Arc::new(ChangeWatcherInner {
                command_tx,
                batch_tx,
                _fs_watcher: std::sync::Mutex::new(Some(fs_watcher)),
            }),
        })
    }

    /// Subscribe to debounced change batches.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeBatch> {
        self.inner.batch_tx.subscribe()
    }

    /// Publish the pending batch immediately, even when it is empty.
    pub async fn flush(&self) -> Result<()> {
        self.inner
            .command_tx
            .send(WatcherCommand::Flush)
            .await
            .map_err(|e| IndexerError::Other(format!("failed to send flush: {e}")))?;
        Ok(())
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) == 1 {
            let _ = self.inner.command_tx.try_send(WatcherCommand::Shutdown);
        }
    }
}

fn create_fs_watcher(
    root: &Path,
    sender: mpsc::Sender<notify::Result<Event>>,
) -> Result<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = sender.blocking_send(res);
        },
        NotifyConfig::default(),
    )?;
    watcher.watch(root, RecursiveMode::Recursive)?;
    Ok(watcher)
}

fn spawn_watch_loop(
    cache: Arc<AnalysisCache>,
    root: PathBuf,
    config: WatcherConfig,
    mut event_rx: mpsc::Receiver<notify::Result<Event>>,
    mut command_rx: mpsc::Receiver<WatcherCommand>,
    batch_tx: broadcast::Sender<ChangeBatch>,
) {
    tokio::spawn(async move {
        let mut state = DebounceState::new(config.debounce, config.max_batch_wait);

        loop {
            let next_deadline = state.next_deadline();

            tokio::select! {
                maybe_event = event_rx.recv() => {
                    match maybe_event {
                        Some(event) => handle_event(&cache, &root, event, &mut state),
                        None => break,
                    }
                }
                Some(cmd) = command_rx.recv() => {
                    match cmd {
                        WatcherCommand::Flush => state.force_publish(),
                        WatcherCommand::Shutdown => break,
                    }
                }
                () = async {
                    if let Some(deadline) = next_deadline {
                        time::sleep_until(deadline).await;
                    }
                }, if state.should_publish() && next_deadline.is_some() => {
                    let _ = batch_tx.send(state.take_batch());
                }
            }
        }
    });
}

fn handle_event(
    cache: &AnalysisCache,
    root: &Path,
    event: notify::Result<Event>,
    state: &mut DebounceState,
) {
    match event {
        Ok(evt) => {
            if matches!(evt.kind, EventKind::Access(_)) {
                return;
            }

            let deleted = matches!(evt.kind, EventKind::Remove(_));
            for path in &evt.paths {
                let Some(key) = relative_tracked_path(root, path) else {
                    continue;
                };
                if deleted {
                    cache.mark_deleted(key.clone());
                    state.record_deleted(key);
                } else {
                    cache.mark_changed(key.clone());
                    state.record_changed(key);
                }
            }
        }
        Err(err) => {
            log::warn!("Watch error: {err}");
        }
    }
}

/// Relative key for `path` when it is a tracked source inside `root`.
fn relative_tracked_path(root: &Path, path: &Path) -> Option<String> {
    let key = relative_key(root, path)?;
    if is_ignored_key(&key) || !is_tracked_path(&key) {
        return None;
    }
    Some(key)
}

struct DebounceState {
    debounce: Duration,
    max_batch: Duration,
    changed: BTreeSet<String>,
    deleted: BTreeSet<String>,
    overflowed: bool,
    dirty: bool,
    last_event: Option<Instant>,
    first_event: Option<Instant>,
    force_immediate: bool,
}

impl DebounceState {
    fn new(debounce: Duration, max_batch: Duration) -> Self {
        Self {
            debounce,
            max_batch,
            changed: BTreeSet::new(),
            deleted: BTreeSet::new(),
            overflowed: false,
            dirty: false,
            last_event: None,
            first_event: None,
            force_immediate: false,
        }
    }

    fn record_changed(&mut self, path: String) {
        self.deleted.remove(&path);
        self.insert_bounded(path, false);
        self.touch();
    }

    fn record_deleted(&mut self, path: String) {
        self.changed.remove(&path);
        self.insert_bounded(path, true);
        self.touch();
    }

    fn insert_bounded(&mut self, path: String, deleted: bool) {
        if self.overflowed {
            return;
        }
        if self.changed.len() + self.deleted.len() >= MAX_PENDING_PATHS {
            self.overflowed = true;
            self.changed.clear();
            self.deleted.clear();
            return;
        }
        if deleted {
            self.deleted.insert(path);
        } else {
            self.changed.insert(path);
        }
    }

    fn touch(&mut self) {
        self.last_event = Some(Instant::now());
        self.first_event.get_or_insert_with(Instant::now);
        self.dirty = true;
    }

    fn force_publish(&mut self) {
        self.force_immediate = true;
        self.dirty = true;
    }

    const fn should_publish(&self) -> bool {
        self.dirty
    }

    fn next_deadline(&self) -> Option<time::Instant> {
        if !self.dirty {
            return None;
        }

        if self.force_immediate {
            return Some(time::Instant::now());
        }

        let mut deadline = self.last_event.map(|last| last + self.debounce);

        if let Some(first) = self.first_event {
            let forced = first + self.max_batch;
            deadline = Some(match deadline {
                Some(current) if forced < current => forced,
                Some(current) => current,
                None => forced,
            });
        }

        deadline.map(time::Instant::from_std)
    }

    fn take_batch(&mut self) -> ChangeBatch {
        let batch = ChangeBatch {
            changed: std::mem::take(&mut self.changed),
            deleted: std::mem::take(&mut self.deleted),
            overflowed: self.overflowed,
        };
        self.overflowed = false;
        self.dirty = false;
        self.last_event = None;
        self.first_event = None;
        self.force_immediate = false;
        batch
    }
}
