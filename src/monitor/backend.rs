use crate::error::{Result, TransferError};
use camino::{Utf8Path, Utf8PathBuf};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// The two kinds of arrival the monitor reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchEventKind {
    Created,
    MovedIn,
}

/// Receiver for raw events from a single watched directory.
///
/// Called on the backend's own thread; must not block for long.
pub type EventSink = Arc<dyn Fn(WatchEventKind, Utf8PathBuf) + Send + Sync>;

/// A live subscription on one directory.
pub trait WatchHandle: Send {
    /// Release the subscription. No events are delivered afterwards.
    fn stop(self: Box<Self>);
}

/// Installs non-recursive subscriptions on single directories.
pub trait WatchBackend: Send + Sync {
    fn watch(&self, dir: &Utf8Path, sink: EventSink) -> Result<Box<dyn WatchHandle>>;
}

/// Production backend: one shared `notify::RecommendedWatcher` for every
/// directory, with events routed to sinks by parent directory.
///
/// The watcher is created on the first [`watch`](WatchBackend::watch) call.
/// Its callback only forwards events to a routing thread, so sinks are free
/// to install further watches from inside an event.
#[derive(Clone, Default)]
pub struct NotifyBackend {
    inner: Arc<NotifyInner>,
}

#[derive(Default)]
struct NotifyInner {
    watcher: Mutex<Option<notify::RecommendedWatcher>>,
    routes: Arc<Mutex<RouteTable>>,
}

/// Sinks per watched directory. A directory is unwatched once its last sink
/// is gone.
#[derive(Default)]
struct RouteTable {
    next_id: u64,
    sinks: HashMap<Utf8PathBuf, Vec<(u64, EventSink)>>,
}

impl RouteTable {
    fn add(&mut self, dir: &Utf8Path, sink: EventSink) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.sinks.entry(dir.to_path_buf()).or_default().push((id, sink));
        id
    }

    /// Returns true when `dir` has no sinks left.
    fn remove(&mut self, dir: &Utf8Path, id: u64) -> bool {
        let Some(entries) = self.sinks.get_mut(dir) else {
            return false;
        };
        entries.retain(|(entry_id, _)| *entry_id != id);
        if entries.is_empty() {
            self.sinks.remove(dir);
            true
        } else {
            false
        }
    }

    fn sinks_for(&self, dir: &Utf8Path) -> Vec<EventSink> {
        self.sinks
            .get(dir)
            .map(|entries| entries.iter().map(|(_, sink)| Arc::clone(sink)).collect())
            .unwrap_or_default()
    }
}

impl NotifyBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of directories with at least one live handle.
    pub fn watched_count(&self) -> usize {
        lock(&self.inner.routes).sinks.len()
    }
}

impl std::fmt::Debug for NotifyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyBackend")
            .field("watched", &self.watched_count())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl NotifyInner {
    fn create_watcher(&self) -> notify::Result<notify::RecommendedWatcher> {
        let (tx, mut rx) = mpsc::unbounded_channel::<notify::Event>();

        let watcher = notify::RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    // Receiver only goes away with the backend
                    let _ = tx.send(event);
                }
                Err(e) => tracing::warn!("Watch backend error: {}", e),
            },
            notify::Config::default(),
        )?;

        let routes = Arc::clone(&self.routes);
        std::thread::Builder::new()
            .name("autoclassify-watch".to_string())
            .spawn(move || {
                while let Some(event) = rx.blocking_recv() {
                    route(&routes, &event);
                }
                tracing::trace!("Watch routing thread exiting");
            })
            .map_err(notify::Error::io)?;

        Ok(watcher)
    }
}

/// Deliver a translated event to the sinks of its parent directory.
fn route(routes: &Mutex<RouteTable>, event: &notify::Event) {
    let Some((kind, path)) = translate(event) else {
        return;
    };
    let Some(parent) = path.parent() else {
        return;
    };

    let sinks = lock(routes).sinks_for(parent);
    for sink in sinks {
        sink(kind, path.clone());
    }
}

struct NotifyHandle {
    dir: Utf8PathBuf,
    id: u64,
    inner: Arc<NotifyInner>,
}

impl WatchHandle for NotifyHandle {
    fn stop(self: Box<Self>) {
        let last = lock(&self.inner.routes).remove(&self.dir, self.id);
        if !last {
            return;
        }

        if let Some(watcher) = lock(&self.inner.watcher).as_mut() {
            if let Err(e) = watcher.unwatch(self.dir.as_std_path()) {
                // The directory may already be gone, taking its watch with it
                tracing::debug!("Unwatch {} failed: {}", self.dir, e);
            }
        }
    }
}

impl WatchBackend for NotifyBackend {
    fn watch(&self, dir: &Utf8Path, sink: EventSink) -> Result<Box<dyn WatchHandle>> {
        let setup_error = |e: notify::Error| TransferError::WatchSetup {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        };

        // Route first so nothing arriving right after the watch is lost
        let id = lock(&self.inner.routes).add(dir, sink);

        let installed = {
            let mut slot = lock(&self.inner.watcher);
            let watcher = match slot.take() {
                Some(watcher) => Ok(watcher),
                None => self.inner.create_watcher(),
            };
            watcher.and_then(|mut watcher| {
                let result = watcher.watch(dir.as_std_path(), RecursiveMode::NonRecursive);
                *slot = Some(watcher);
                result
            })
        };

        if let Err(e) = installed {
            lock(&self.inner.routes).remove(dir, id);
            return Err(setup_error(e));
        }

        tracing::trace!("Watch handle installed on {}", dir);
        Ok(Box::new(NotifyHandle {
            dir: dir.to_path_buf(),
            id,
            inner: Arc::clone(&self.inner),
        }))
    }
}

/// Map a notify event onto an arrival, if it is one.
///
/// Renames carrying both ends report the destination. Non-UTF-8 paths are
/// dropped since nothing downstream could name them.
fn translate(event: &notify::Event) -> Option<(WatchEventKind, Utf8PathBuf)> {
    let kind = match event.kind {
        EventKind::Create(_) => WatchEventKind::Created,
        EventKind::Modify(ModifyKind::Name(RenameMode::To))
        | EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => WatchEventKind::MovedIn,
        _ => return None,
    };

    let path = event.paths.last()?.clone();
    let path = Utf8PathBuf::from_path_buf(path).ok()?;
    Some((kind, path))
}
