use super::backend::{EventSink, WatchBackend, WatchEventKind, WatchHandle};
use crate::error::{Result, TransferError};
use crate::metrics::Metrics;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::{Duration, Instant};
use walkdir::WalkDir;

/// Repeats of the same path inside this window are dropped.
pub const DEDUP_COOLDOWN: Duration = Duration::from_secs(5);

/// Callback receiving every admitted event of one watcher.
pub type WatchCallback = Arc<dyn Fn(WatchEventKind, &Utf8Path) + Send + Sync>;

/// "Recently notified" paths, each expiring on its own.
#[derive(Debug)]
pub struct DedupWindow {
    cooldown: Duration,
    seen: HashMap<Utf8PathBuf, Instant>,
}

impl DedupWindow {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            seen: HashMap::new(),
        }
    }

    /// Returns true if `path` has not been seen within the cool-down and
    /// records it; false for a repeat.
    pub fn admit(&mut self, path: &Utf8Path, now: Instant) -> bool {
        let cooldown = self.cooldown;
        self.seen
            .retain(|_, seen_at| now.saturating_duration_since(*seen_at) < cooldown);

        if self.seen.contains_key(path) {
            return false;
        }
        self.seen.insert(path.to_path_buf(), now);
        true
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

/// Handle table and dedup set, guarded together.
struct WatchTable {
    active: bool,
    handles: HashMap<Utf8PathBuf, Box<dyn WatchHandle>>,
    recent: DedupWindow,
}

struct Shared {
    root: Utf8PathBuf,
    recursive: bool,
    root_present: bool,
    backend: Arc<dyn WatchBackend>,
    callback: WatchCallback,
    metrics: Option<Arc<Metrics>>,
    table: Mutex<WatchTable>,
}

/// Watches one root directory, optionally its whole subtree.
///
/// Each directory gets its own non-recursive handle. Under a recursive root,
/// a directory that appears while watching gets a handle of its own as soon
/// as its creation event arrives, so nested arrivals are seen without a
/// restart. A directory that is deleted and created again gets a fresh
/// handle, and handles of directories that have disappeared are released.
///
/// Events pass through a [`DedupWindow`] before reaching the callback.
pub struct DirectoryWatcher {
    shared: Arc<Shared>,
}

impl DirectoryWatcher {
    /// A root that does not exist now produces a watcher that never reports.
    pub fn new(
        root: impl Into<Utf8PathBuf>,
        recursive: bool,
        backend: Arc<dyn WatchBackend>,
        callback: WatchCallback,
    ) -> Self {
        let root = root.into();
        let root_present = root.exists();
        if !root_present {
            tracing::debug!("Watch root {} does not exist; watcher is inert", root);
        }

        Self {
            shared: Arc::new(Shared {
                root,
                recursive,
                root_present,
                backend,
                callback,
                metrics: None,
                table: Mutex::new(WatchTable {
                    active: false,
                    handles: HashMap::new(),
                    recent: DedupWindow::new(DEDUP_COOLDOWN),
                }),
            }),
        }
    }

    /// Count received and deduplicated events into `metrics`.
    ///
    /// Must be called before [`start_watching`](Self::start_watching).
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.metrics = Some(metrics);
        }
        self
    }

    pub fn root(&self) -> &Utf8Path {
        &self.shared.root
    }

    pub fn is_recursive(&self) -> bool {
        self.shared.recursive
    }

    /// Install handles on the root and, if recursive, every existing
    /// subdirectory. Calling it on a started watcher does nothing.
    pub fn start_watching(&self) -> Result<()> {
        let shared = &self.shared;
        if !shared.root_present {
            return Ok(());
        }
        if !shared.root.is_dir() {
            return Err(TransferError::WatchSetup {
                path: shared.root.clone(),
                reason: "not a directory".to_string(),
            });
        }

        {
            let mut table = shared.lock();
            if table.active {
                return Ok(());
            }
            table.active = true;
        }

        // The root itself must be watchable; subdirectories are best effort
        let root_handle = match shared.backend.watch(&shared.root, Shared::sink(shared)) {
            Ok(handle) => handle,
            Err(e) => {
                shared.lock().active = false;
                return Err(e);
            }
        };
        if let Some(rejected) = shared.adopt(vec![(shared.root.clone(), root_handle)]) {
            rejected.into_iter().for_each(|h| h.stop());
        }

        if shared.recursive {
            Shared::install_subtree(shared, &shared.root, false);
        }

        tracing::info!(
            "Watching {} ({} directories, recursive={})",
            shared.root,
            self.watched_directories().len(),
            shared.recursive
        );
        Ok(())
    }

    /// Tear down every handle and forget recent events. Idempotent.
    pub fn stop_watching(&self) {
        let handles = {
            let mut table = self.shared.lock();
            table.active = false;
            table.recent.clear();
            std::mem::take(&mut table.handles)
        };

        if handles.is_empty() {
            return;
        }

        let count = handles.len();
        for (_, handle) in handles {
            handle.stop();
        }
        tracing::info!("Stopped watching {} ({} directories)", self.shared.root, count);
    }

    pub fn is_watching(&self) -> bool {
        self.shared.lock().active
    }

    /// Directories currently holding a handle, sorted.
    pub fn watched_directories(&self) -> Vec<Utf8PathBuf> {
        let mut dirs: Vec<Utf8PathBuf> = self.shared.lock().handles.keys().cloned().collect();
        dirs.sort();
        dirs
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        self.stop_watching();
    }
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, WatchTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sink for a new handle. Holds only a weak reference so live handles
    /// never keep a dropped watcher alive.
    fn sink(this: &Arc<Self>) -> EventSink {
        let weak: Weak<Self> = Arc::downgrade(this);
        Arc::new(move |kind, path| {
            if let Some(shared) = weak.upgrade() {
                Shared::handle_event(&shared, kind, path);
            }
        })
    }

    fn handle_event(this: &Arc<Self>, kind: WatchEventKind, path: Utf8PathBuf) {
        if let Some(metrics) = &this.metrics {
            metrics.record_event_received();
        }

        let admitted = {
            let mut table = this.lock();
            if !table.active {
                return;
            }
            table.recent.admit(&path, Instant::now())
        };

        if !admitted {
            tracing::trace!("Dropping repeat event for {}", path);
            if let Some(metrics) = &this.metrics {
                metrics.record_event_deduplicated();
            }
            return;
        }

        if this.recursive && path.is_dir() {
            tracing::debug!("New directory under recursive root: {}", path);
            this.release_stale(&path);
            Self::install_subtree(this, &path, true);
        }

        (this.callback)(kind, path.as_path());
    }

    /// Stop handles that cannot be live any more: those at or below a
    /// directory that was just created, and those whose directory is gone.
    fn release_stale(&self, created: &Utf8Path) {
        let known: Vec<Utf8PathBuf> = self.lock().handles.keys().cloned().collect();
        let stale: Vec<Utf8PathBuf> = known
            .into_iter()
            .filter(|dir| dir.starts_with(created) || !dir.is_dir())
            .collect();
        if stale.is_empty() {
            return;
        }

        let released: Vec<Box<dyn WatchHandle>> = {
            let mut table = self.lock();
            stale
                .iter()
                .filter_map(|dir| table.handles.remove(dir))
                .collect()
        };

        tracing::debug!("Releasing {} stale watch handles", released.len());
        released.into_iter().for_each(|h| h.stop());
    }

    /// Install handles for `dir`'s subdirectories, depth first, and for `dir`
    /// itself when `include_self` is set.
    ///
    /// Handles are created outside the table lock. Directories that vanish
    /// mid-walk are skipped.
    fn install_subtree(this: &Arc<Self>, dir: &Utf8Path, include_self: bool) {
        let min_depth = if include_self { 0 } else { 1 };
        let dirs: Vec<Utf8PathBuf> = WalkDir::new(dir)
            .min_depth(min_depth)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_dir())
            .filter_map(|entry| Utf8PathBuf::from_path_buf(entry.into_path()).ok())
            .collect();

        let mut fresh = Vec::with_capacity(dirs.len());
        for dir in dirs {
            if this.lock().handles.contains_key(&dir) {
                continue;
            }
            match this.backend.watch(&dir, Self::sink(this)) {
                Ok(handle) => fresh.push((dir, handle)),
                Err(e) => tracing::warn!("Skipping subdirectory: {}", e),
            }
        }

        if let Some(rejected) = this.adopt(fresh) {
            rejected.into_iter().for_each(|h| h.stop());
        }
    }

    /// Move new handles into the table. Returns the ones that could not be
    /// adopted (watcher stopped meanwhile, or directory already covered) so
    /// the caller can stop them outside the lock.
    fn adopt(
        &self,
        fresh: Vec<(Utf8PathBuf, Box<dyn WatchHandle>)>,
    ) -> Option<Vec<Box<dyn WatchHandle>>> {
        if fresh.is_empty() {
            return None;
        }

        let mut rejected = Vec::new();
        let mut table = self.lock();
        for (dir, handle) in fresh {
            if !table.active || table.handles.contains_key(&dir) {
                rejected.push(handle);
            } else {
                table.handles.insert(dir, handle);
            }
        }

        if rejected.is_empty() {
            None
        } else {
            Some(rejected)
        }
    }
}
