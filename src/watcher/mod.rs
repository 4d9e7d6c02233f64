//! Recursive filesystem watcher with per-path debouncing.
//!
//! Raw `notify` callbacks only forward paths into a tokio channel. An intake
//! task turns each path into a debounce task keyed by the full path; a newer
//! notification for the same path aborts the pending task and schedules a
//! fresh one, so only the last event of a burst is emitted.
//!
//! Directory-level notifications and deletions of never-seen paths produce
//! no event: a path is reported `Removed` only if it was previously seen.

use crate::error::{HmrError, HmrResult};
use crate::hash::ContentHashCache;
use crate::models::{ChangeKind, FileChangeEvent, ModuleId};
use crate::utils::{is_excluded, lock, scan_directory, ScanOptions};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Callback invoked synchronously for every emitted change.
pub type ChangeListener = Arc<dyn Fn(&FileChangeEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherStats {
    pub watched_directories: usize,
    pub pending_events: usize,
    pub known_files: usize,
}

struct PendingEvent {
    generation: u64,
    task: JoinHandle<()>,
}

struct WatcherInner {
    root: PathBuf,
    exclude_patterns: Vec<String>,
    debounce: Duration,
    cache: Arc<ContentHashCache>,
    seen: Mutex<HashSet<PathBuf>>,
    pending: Mutex<HashMap<PathBuf, PendingEvent>>,
    listeners: Mutex<Vec<(u64, ChangeListener)>>,
    next_id: AtomicU64,
    running: AtomicBool,
}

impl WatcherInner {
    fn module_id(&self, full_path: &Path) -> ModuleId {
        ModuleId::from_path(&self.root, full_path)
    }

    fn is_excluded(&self, full_path: &Path) -> bool {
        is_excluded(self.module_id(full_path).as_str(), &self.exclude_patterns)
    }

    /// Cancel-and-reschedule the debounce task for `full_path`.
    fn schedule(self: &Arc<Self>, full_path: PathBuf) {
        if !self.running.load(Ordering::SeqCst) || self.is_excluded(&full_path) {
            return;
        }

        let generation = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut pending = lock(&self.pending);

        let inner = Arc::clone(self);
        let key = full_path.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            {
                let mut pending = lock(&inner.pending);
                match pending.get(&key) {
                    Some(entry) if entry.generation == generation => {
                        pending.remove(&key);
                    }
                    // Superseded while waiting for the lock
                    _ => return,
                }
            }
            inner.emit(&key);
        });

        if let Some(previous) = pending.insert(full_path, PendingEvent { generation, task }) {
            previous.task.abort();
        }
    }

    /// Classify the settled path and notify every listener.
    fn emit(&self, full_path: &Path) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }

        let hash = self.cache.fingerprint(full_path);
        let kind = {
            let mut seen = lock(&self.seen);
            if hash.is_empty() {
                if !seen.remove(full_path) {
                    log::debug!(
                        "[hmr:watcher] Ignoring unseen path without content: {}",
                        full_path.display()
                    );
                    return;
                }
                ChangeKind::Removed
            } else if seen.insert(full_path.to_path_buf()) {
                ChangeKind::Added
            } else {
                ChangeKind::Modified
            }
        };

        let event = FileChangeEvent::new(kind, self.module_id(full_path), full_path.to_path_buf(), hash);
        log::debug!("[hmr:watcher] {:?} {}", event.kind, event.path);

        let listeners: Vec<ChangeListener> = lock(&self.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                log::error!("[hmr:watcher] Listener panicked while handling {}", event.path);
            }
        }
    }

    fn cancel_pending(&self) {
        for (_, entry) in lock(&self.pending).drain() {
            entry.task.abort();
        }
    }
}

/// Handle returned by [`FileSystemWatcher::subscribe`].
pub struct Subscription {
    id: u64,
    inner: Weak<WatcherInner>,
}

impl Subscription {
    /// Remove the listener. Safe to call after the watcher is gone.
    pub fn unsubscribe(self) {
        if let Some(inner) = self.inner.upgrade() {
            lock(&inner.listeners).retain(|(id, _)| *id != self.id);
        }
    }
}

pub struct FileSystemWatcher {
    inner: Arc<WatcherInner>,
    os_watcher: Mutex<Option<RecommendedWatcher>>,
    intake: Mutex<Option<JoinHandle<()>>>,
}

impl FileSystemWatcher {
    /// Create a watcher for `root`.
    ///
    /// Nothing is observed until [`start`](Self::start) is called.
    pub fn new(
        root: impl Into<PathBuf>,
        exclude_patterns: Vec<String>,
        debounce: Duration,
        cache: Arc<ContentHashCache>,
    ) -> Self {
        let root: PathBuf = root.into();
        // notify reports canonical paths on some platforms
        let root = root.canonicalize().unwrap_or(root);

        Self {
            inner: Arc::new(WatcherInner {
                root,
                exclude_patterns,
                debounce,
                cache,
                seen: Mutex::new(HashSet::new()),
                pending: Mutex::new(HashMap::new()),
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
                running: AtomicBool::new(false),
            }),
            os_watcher: Mutex::new(None),
            intake: Mutex::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&FileChangeEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.listeners).push((id, Arc::new(listener)));
        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Prime the seen set and begin recursive observation.
    ///
    /// Must be called from within a tokio runtime. Starting an already
    /// running watcher is a no-op.
    pub fn start(&self) -> HmrResult<()> {
        self.start_inner(true)
    }

    /// Like [`start`](Self::start), but without an OS subscription.
    ///
    /// For hosts that own their notification source: raw paths are fed in
    /// through [`ingest`](Self::ingest) and go through the same filtering and
    /// debouncing.
    pub fn start_with_external_events(&self) -> HmrResult<()> {
        self.start_inner(false)
    }

    fn start_inner(&self, observe_os: bool) -> HmrResult<()> {
        if self.is_running() {
            log::warn!("[hmr:watcher] Already watching {}", self.inner.root.display());
            return Ok(());
        }

        let root = self.inner.root.clone();
        if !root.is_dir() {
            return Err(HmrError::Config(format!(
                "Watch directory does not exist: {}",
                root.display()
            )));
        }

        self.prime();

        if observe_os {
            let (tx, mut rx) = mpsc::unbounded_channel::<PathBuf>();
            let mut os_watcher = RecommendedWatcher::new(
                move |res: notify::Result<Event>| match res {
                    Ok(event) => {
                        if matches!(event.kind, EventKind::Access(_)) {
                            return;
                        }
                        for path in event.paths {
                            let _ = tx.send(path);
                        }
                    }
                    Err(e) => log::warn!("[hmr:watcher] Notification error: {}", e),
                },
                Config::default(),
            )?;
            os_watcher.watch(&root, RecursiveMode::Recursive)?;

            let inner = Arc::clone(&self.inner);
            let intake = tokio::spawn(async move {
                while let Some(path) = rx.recv().await {
                    inner.schedule(path);
                }
            });

            *lock(&self.os_watcher) = Some(os_watcher);
            *lock(&self.intake) = Some(intake);
        }

        self.inner.running.store(true, Ordering::SeqCst);

        log::info!(
            "[hmr:watcher] Watching {} (debounce {}ms, {} known files)",
            root.display(),
            self.inner.debounce.as_millis(),
            lock(&self.inner.seen).len()
        );
        Ok(())
    }

    /// Cancel pending debounce tasks and release the OS subscription.
    pub fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            log::debug!("[hmr:watcher] Stop requested while not running");
        }

        self.inner.cancel_pending();
        lock(&self.os_watcher).take();
        if let Some(intake) = lock(&self.intake).take() {
            intake.abort();
        }
        lock(&self.inner.seen).clear();
        log::info!("[hmr:watcher] Stopped watching {}", self.inner.root.display());
    }

    /// Feed a raw notification for `full_path`, exactly as the OS callback does.
    ///
    /// Ignored while the watcher is stopped.
    pub fn ingest(&self, full_path: impl Into<PathBuf>) {
        self.inner.schedule(full_path.into());
    }

    /// Files currently known to exist (primed by the initial scan).
    pub fn known_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = lock(&self.inner.seen).iter().cloned().collect();
        files.sort();
        files
    }

    pub fn stats(&self) -> WatcherStats {
        WatcherStats {
            watched_directories: usize::from(self.is_running()),
            pending_events: lock(&self.inner.pending).len(),
            known_files: lock(&self.inner.seen).len(),
        }
    }

    fn prime(&self) {
        let options = ScanOptions::with_excludes(self.inner.exclude_patterns.clone());
        let files = match scan_directory(&self.inner.root, &options) {
            Ok(files) => files,
            Err(e) => {
                log::warn!("[hmr:watcher] Initial scan failed: {}", e);
                return;
            }
        };

        let mut seen = lock(&self.inner.seen);
        seen.clear();
        for file in files {
            self.inner.cache.fingerprint(&file.absolute_path);
            seen.insert(file.absolute_path);
        }
    }
}

impl Drop for FileSystemWatcher {
    fn drop(&mut self) {
        self.inner.running.store(false, Ordering::SeqCst);
        self.inner.cancel_pending();
        if let Some(intake) = lock(&self.intake).take() {
            intake.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn watcher(root: &Path) -> FileSystemWatcher {
        FileSystemWatcher::new(
            root,
            vec!["node_modules".to_string(), ".git".to_string()],
            Duration::from_millis(100),
            Arc::new(ContentHashCache::new()),
        )
    }

    fn collect(watcher: &FileSystemWatcher) -> Arc<Mutex<Vec<FileChangeEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        watcher.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
        events
    }

    #[tokio::test]
    async fn test_start_primes_seen_set() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("node_modules/react")).unwrap();
        fs::write(temp_dir.path().join("styles.css"), "a").unwrap();
        fs::write(temp_dir.path().join("node_modules/react/index.js"), "x").unwrap();

        let cache = Arc::new(ContentHashCache::new());
        let w = FileSystemWatcher::new(
            temp_dir.path(),
            vec!["node_modules".to_string()],
            Duration::from_millis(100),
            Arc::clone(&cache),
        );
        w.start().unwrap();

        assert_eq!(w.known_files().len(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(w.stats().watched_directories, 1);

        w.stop();
        assert_eq!(w.stats().watched_directories, 0);
    }

    #[tokio::test]
    async fn test_start_rejects_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let w = watcher(&temp_dir.path().join("missing"));
        assert!(matches!(w.start(), Err(HmrError::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ingest_ignored_when_stopped() {
        let temp_dir = TempDir::new().unwrap();
        let w = watcher(temp_dir.path());
        let events = collect(&w);

        fs::write(temp_dir.path().join("a.ts"), "a").unwrap();
        w.ingest(temp_dir.path().join("a.ts"));
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert!(events.lock().unwrap().is_empty());
        assert_eq!(w.stats().pending_events, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_listener_does_not_block_others() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        let w = watcher(&root);
        w.subscribe(|_| panic!("listener failure"));
        let events = collect(&w);
        w.start_with_external_events().unwrap();

        let path = root.join("new.ts");
        fs::write(&path, "export {}").unwrap();
        w.ingest(&path);
        tokio::time::sleep(Duration::from_millis(150)).await;

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ChangeKind::Added);
        assert_eq!(events[0].path.as_str(), "new.ts");
        w.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        let w = watcher(&root);
        let events = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&events);
        let subscription = w.subscribe(move |_| *sink.lock().unwrap() += 1);
        w.start_with_external_events().unwrap();

        let path = root.join("a.css");
        fs::write(&path, "a").unwrap();
        w.ingest(&path);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(*events.lock().unwrap(), 1);

        subscription.unsubscribe();
        fs::write(&path, "b").unwrap();
        w.ingest(&path);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(*events.lock().unwrap(), 1);
        w.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_excluded_paths_are_dropped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("node_modules/lib")).unwrap();
        let w = watcher(&root);
        let events = collect(&w);
        w.start_with_external_events().unwrap();

        let path = root.join("node_modules/lib/index.js");
        fs::write(&path, "x").unwrap();
        w.ingest(&path);
        assert_eq!(w.stats().pending_events, 0);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(events.lock().unwrap().is_empty());
        w.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_timers() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        let w = watcher(&root);
        let events = collect(&w);
        w.start_with_external_events().unwrap();

        let path = root.join("late.ts");
        fs::write(&path, "x").unwrap();
        w.ingest(&path);
        assert_eq!(w.stats().pending_events, 1);

        w.stop();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(events.lock().unwrap().is_empty());
        assert_eq!(w.stats().pending_events, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unseen_directory_produces_no_event() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        let w = watcher(&root);
        let events = collect(&w);
        w.start_with_external_events().unwrap();

        fs::create_dir(root.join("components")).unwrap();
        w.ingest(root.join("components"));
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(events.lock().unwrap().is_empty());
        w.stop();
    }
}
