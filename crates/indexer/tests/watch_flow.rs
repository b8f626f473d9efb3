use codemap_indexer::{ChangeBatch, ChangeWatcher, ProjectAnalyzer, WatcherConfig};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::broadcast::Receiver;

#[cfg_attr(
    not(target_os = "linux"),
    ignore = "watcher timing tests are only reliable on Linux"
)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn watcher_publishes_changes_and_deletions() {
    if std::env::var("SKIP_WATCH_FLOW").is_ok() {
        eprintln!("skipping watch_flow due to SKIP_WATCH_FLOW");
        return;
    }
    if low_fd_limit() {
        warn_skip_fd();
        return;
    }
    ensure_ulimit();

    let temp = TempDir::new().expect("tempdir");
    let src_dir = temp.path().join("src");
    std::fs::create_dir_all(&src_dir).expect("create src");
    std::fs::write(src_dir.join("main.js"), "export const main = 1;\n").expect("write main.js");

    let analyzer = ProjectAnalyzer::new(temp.path()).expect("analyzer");
    analyzer.analyze().await.expect("initial analyze");

    let config = WatcherConfig {
        debounce: Duration::from_millis(100),
        max_batch_wait: Duration::from_millis(500),
    };
    let watcher = match ChangeWatcher::start(analyzer.cache(), temp.path(), config) {
        Ok(w) => w,
        Err(e) if e.to_string().contains("Too many open files") => {
            warn_skip_watcher(&e.to_string());
            return;
        }
        Err(e) => panic!("start watcher: {e}"),
    };
    let mut batches = watcher.subscribe();

    tokio::time::sleep(Duration::from_millis(150)).await;
    drain(&mut batches);

    std::fs::write(src_dir.join("extra.js"), "export const extra = 2;\n")
        .expect("write extra.js");

    let batch = wait_for_batch_containing(&mut batches, "src/extra.js", Duration::from_secs(4))
        .await
        .expect("timeout waiting for change batch");
    assert!(batch.changed.contains("src/extra.js"));
    assert!(batch.deleted.is_empty());
    assert_eq!(
        analyzer.stats().changed_files,
        1,
        "batch paths must also land in the cache dirty set"
    );

    std::fs::remove_file(src_dir.join("extra.js")).expect("remove extra.js");

    let batch = wait_for_batch_containing(&mut batches, "src/extra.js", Duration::from_secs(4))
        .await
        .expect("timeout waiting for deletion batch");
    assert!(batch.deleted.contains("src/extra.js"));

    let stats = analyzer.stats();
    assert_eq!(stats.changed_files, 0, "deletion must supersede the change flag");
    assert_eq!(stats.deleted_files, 1);
}

#[cfg_attr(
    not(target_os = "linux"),
    ignore = "watcher timing tests are only reliable on Linux"
)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn watcher_ignores_scoped_directories() {
    if std::env::var("SKIP_WATCH_FLOW").is_ok() {
        eprintln!("skipping watch_flow due to SKIP_WATCH_FLOW");
        return;
    }
    if low_fd_limit() {
        warn_skip_fd();
        return;
    }
    ensure_ulimit();

    let temp = TempDir::new().expect("tempdir");
    std::fs::create_dir_all(temp.path().join("src")).expect("create src");
    std::fs::create_dir_all(temp.path().join("node_modules/pkg")).expect("create node_modules");

    let analyzer = ProjectAnalyzer::new(temp.path()).expect("analyzer");

    let config = WatcherConfig {
        debounce: Duration::from_millis(100),
        max_batch_wait: Duration::from_millis(500),
    };
    let watcher = match ChangeWatcher::start(analyzer.cache(), temp.path(), config) {
        Ok(w) => w,
        Err(e) if e.to_string().contains("Too many open files") => {
            warn_skip_watcher(&e.to_string());
            return;
        }
        Err(e) => panic!("start watcher: {e}"),
    };
    let mut batches = watcher.subscribe();

    tokio::time::sleep(Duration::from_millis(150)).await;
    drain(&mut batches);

    std::fs::write(
        temp.path().join("node_modules/pkg/index.js"),
        "module.exports = {};\n",
    )
    .expect("write dependency file");
    std::fs::write(temp.path().join("src/app.js"), "export const app = 1;\n")
        .expect("write app.js");

    let batch = wait_for_batch_containing(&mut batches, "src/app.js", Duration::from_secs(4))
        .await
        .expect("timeout waiting for change batch");
    assert!(batch.changed.contains("src/app.js"));
    assert!(
        !batch.changed.contains("node_modules/pkg/index.js"),
        "ignored scopes must never reach a batch"
    );
}

#[cfg_attr(
    not(target_os = "linux"),
    ignore = "watcher timing tests are only reliable on Linux"
)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn flush_bypasses_the_debounce_window() {
    if std::env::var("SKIP_WATCH_FLOW").is_ok() {
        eprintln!("skipping watch_flow due to SKIP_WATCH_FLOW");
        return;
    }
    if low_fd_limit() {
        warn_skip_fd();
        return;
    }
    ensure_ulimit();

    let temp = TempDir::new().expect("tempdir");
    std::fs::create_dir_all(temp.path().join("src")).expect("create src");

    let analyzer = ProjectAnalyzer::new(temp.path()).expect("analyzer");

    // Debounce far beyond the test timeout; only a flush can publish in time.
    let config = WatcherConfig {
        debounce: Duration::from_secs(30),
        max_batch_wait: Duration::from_secs(60),
    };
    let watcher = match ChangeWatcher::start(analyzer.cache(), temp.path(), config) {
        Ok(w) => w,
        Err(e) if e.to_string().contains("Too many open files") => {
            warn_skip_watcher(&e.to_string());
            return;
        }
        Err(e) => panic!("start watcher: {e}"),
    };
    let mut batches = watcher.subscribe();

    std::fs::write(temp.path().join("src/app.js"), "export const app = 1;\n")
        .expect("write app.js");
    tokio::time::sleep(Duration::from_millis(300)).await;

    watcher.flush().await.expect("flush");

    let batch = wait_for_batch_containing(&mut batches, "src/app.js", Duration::from_secs(2))
        .await
        .expect("flush must publish the pending batch immediately");
    assert!(batch.changed.contains("src/app.js"));
}

#[cfg_attr(
    not(target_os = "linux"),
    ignore = "watcher timing tests are only reliable on Linux"
)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropping_the_last_handle_stops_the_loop() {
    if std::env::var("SKIP_WATCH_FLOW").is_ok() {
        eprintln!("skipping watch_flow due to SKIP_WATCH_FLOW");
        return;
    }
    if low_fd_limit() {
        warn_skip_fd();
        return;
    }
    ensure_ulimit();

    let temp = TempDir::new().expect("tempdir");
    let analyzer = ProjectAnalyzer::new(temp.path()).expect("analyzer");

    let watcher = match ChangeWatcher::start(analyzer.cache(), temp.path(), WatcherConfig::default())
    {
        Ok(w) => w,
        Err(e) if e.to_string().contains("Too many open files") => {
            warn_skip_watcher(&e.to_string());
            return;
        }
        Err(e) => panic!("start watcher: {e}"),
    };
    let mut batches = watcher.subscribe();

    drop(watcher);

    let outcome = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match batches.recv().await {
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    })
    .await;
    assert!(outcome.is_ok(), "loop must shut down when the last handle drops");
}

async fn wait_for_batch_containing(
    batches: &mut Receiver<ChangeBatch>,
    path: &str,
    timeout: Duration,
) -> Option<ChangeBatch> {
    tokio::time::timeout(timeout, async {
        loop {
            match batches.recv().await {
                Ok(batch) if batch.changed.contains(path) || batch.deleted.contains(path) => {
                    break Some(batch);
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

fn drain(batches: &mut Receiver<ChangeBatch>) {
    while matches!(batches.try_recv(), Ok(_) | Err(TryRecvError::Lagged(_))) {}
}

fn low_fd_limit() -> bool {
    rlimit::Resource::NOFILE
        .get()
        .map(|(soft, _)| soft < 1024)
        .unwrap_or(false)
}

fn ensure_ulimit() {
    if let Ok((_soft, hard)) = rlimit::Resource::NOFILE.get() {
        let target = 2048.min(hard);
        let _ = rlimit::Resource::NOFILE.set(target, hard);
    }
}

fn warn_skip_fd() {
    eprintln!("skipping watcher tests: NOFILE soft limit < 1024");
}

fn warn_skip_watcher(reason: &str) {
    eprintln!("skipping watcher tests: {reason}");
}
