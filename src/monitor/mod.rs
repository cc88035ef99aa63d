//! Monitor module - filesystem watching and delayed dispatch.
//!
//! # Components
//!
//! - [`WatchBackend`] / [`WatchHandle`]: one non-recursive subscription per
//!   directory. [`NotifyBackend`] is the production implementation and
//!   multiplexes every directory over a single OS watcher.
//! - [`DirectoryWatcher`]: a root plus, when recursive, every directory
//!   below it, including ones created while watching. Filters repeats
//!   through a [`DedupWindow`].
//! - [`Dispatcher`]: schedules a classification `delay` seconds after a
//!   regular file shows up, and runs organize-now sweeps.
//!
//! # Threading
//!
//! Backend threads call straight into the watcher and the dispatcher. The
//! dispatcher only spawns a timer task, so event delivery never waits on a
//! move.

pub mod backend;
pub mod dispatcher;
pub mod watcher;

pub use backend::{EventSink, NotifyBackend, WatchBackend, WatchEventKind, WatchHandle};
pub use dispatcher::{Dispatcher, ORGANIZE_PACING, PendingClassification};
pub use watcher::{DEDUP_COOLDOWN, DedupWindow, DirectoryWatcher, WatchCallback};
