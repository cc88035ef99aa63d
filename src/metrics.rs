// Performance metrics module
//
// Lightweight counters for the watch -> schedule -> move pipeline

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Pipeline counters.
///
/// Uses atomic operations so watcher threads, timer tasks and blocking
/// move jobs can all record without locks. Logged when monitoring stops.
#[derive(Debug)]
pub struct Metrics {
    /// Raw events delivered by watch handles
    pub events_received: AtomicU64,

    /// Raw events dropped by the cool-down window
    pub events_deduplicated: AtomicU64,

    /// Classification jobs scheduled behind the settle delay
    pub jobs_scheduled: AtomicU64,

    /// Files moved into a category directory
    pub files_moved: AtomicU64,

    /// Files left in place (ignored, no suffix, vanished)
    pub files_skipped: AtomicU64,

    /// Jobs that ended in a storage error
    pub files_failed: AtomicU64,

    /// Total time spent inside successful moves, in microseconds
    pub total_move_time_us: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            events_received: AtomicU64::new(0),
            events_deduplicated: AtomicU64::new(0),
            jobs_scheduled: AtomicU64::new(0),
            files_moved: AtomicU64::new(0),
            files_skipped: AtomicU64::new(0),
            files_failed: AtomicU64::new(0),
            total_move_time_us: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_event_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_deduplicated(&self) {
        self.events_deduplicated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_job_scheduled(&self) {
        self.jobs_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_file_moved(&self) {
        self.files_moved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_file_skipped(&self) {
        self.files_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_file_failed(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_move_time(&self, duration: Duration) {
        self.total_move_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average time per successful move in milliseconds
    pub fn avg_move_time_ms(&self) -> f64 {
        let total = self.total_move_time_us.load(Ordering::Relaxed);
        let count = self.files_moved.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64 / 1000.0
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("=== Classification Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Events: {} received, {} deduplicated; {} jobs scheduled",
            self.events_received.load(Ordering::Relaxed),
            self.events_deduplicated.load(Ordering::Relaxed),
            self.jobs_scheduled.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Files: {} moved, {} skipped, {} failed (avg move: {:.2}ms)",
            self.files_moved.load(Ordering::Relaxed),
            self.files_skipped.load(Ordering::Relaxed),
            self.files_failed.load(Ordering::Relaxed),
            self.avg_move_time_ms()
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
