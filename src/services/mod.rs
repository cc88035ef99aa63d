//! Services module - classification decisions and the moves that follow them.
//!
//! The services have no knowledge of watchers or timers; they take a file
//! path and a configuration snapshot and act on it.
//!
//! # Components
//!
//! - [`ClassificationEngine`]: decides a file's category and target directory, then moves it:
//!   - Extension extraction (case-insensitive, text after the last `.`)
//!   - No-suffix and ignore-list skips
//!   - First-match rule priority, `[name]` dynamic categories, default type fallback
//!   - Optional origin-label nesting (`sub_app`)
//!   - Collision-safe naming (`a.txt`, `a_1.txt`, ...)
//!
//! - [`ClassifyJob`] / [`JobRunner`]: the unit of work and the substrate that runs it.
//!   [`BlockingJobRunner`] executes jobs on the tokio blocking pool and reports
//!   failures through [`StateManager`](crate::state::StateManager).
//!
//! # Failure isolation
//!
//! Deciding never fails: bad or partial configuration degrades to the
//! default type and a flat target path. Creating the target directory,
//! finding a free name and renaming can fail; such a failure ends that one
//! job and is never retried.
//!
//! # Usage Example
//!
//! ```ignore
//! use autoclassify::services::ClassificationEngine;
//!
//! let engine = ClassificationEngine::new(placeholders);
//! match engine.classify(Utf8Path::new("/sdcard/Download/photo.JPG"), &config)? {
//!     ClassifyOutcome::Moved { destination, .. } => println!("now at {destination}"),
//!     other => println!("left in place: {other:?}"),
//! }
//! ```

pub mod classify;
pub mod job;

pub use classify::{
    ClassificationEngine, ClassifyOutcome, Decision, SkipReason, split_name, unique_destination,
};
pub use job::{BlockingJobRunner, ClassifyJob, JobRunner};
