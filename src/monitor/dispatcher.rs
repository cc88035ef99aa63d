use super::backend::WatchEventKind;
use crate::metrics::Metrics;
use crate::models::{PathPlaceholders, TransferConfig};
use crate::services::{ClassifyJob, JobRunner};
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// Pause between submissions of a manual organize sweep.
pub const ORGANIZE_PACING: Duration = Duration::from_millis(100);

/// A classification waiting out its settle delay.
#[derive(Debug)]
pub struct PendingClassification {
    pub path: Utf8PathBuf,
    pub config: Arc<TransferConfig>,
    pub deadline: Instant,
    abort: AbortHandle,
}

impl PendingClassification {
    /// Drop the job if it has not fired yet.
    pub fn cancel(&self) {
        self.abort.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

/// Turns watcher events into delayed classification jobs and runs
/// organize-now sweeps.
///
/// Scheduled jobs outlive the monitoring session that produced them: stopping
/// the watchers never cancels a pending classification.
pub struct Dispatcher {
    runtime: tokio::runtime::Handle,
    runner: Arc<dyn JobRunner>,
    placeholders: PathPlaceholders,
    metrics: Arc<Metrics>,
    outstanding: Mutex<Vec<AbortHandle>>,
}

impl Dispatcher {
    pub fn new(
        runtime: tokio::runtime::Handle,
        runner: Arc<dyn JobRunner>,
        placeholders: PathPlaceholders,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            runtime,
            runner,
            placeholders,
            metrics,
            outstanding: Mutex::new(Vec::new()),
        }
    }

    /// Schedule a classification if `path` is a regular file right now.
    ///
    /// Safe to call from any thread, including watch backend threads.
    pub fn on_event(
        &self,
        kind: WatchEventKind,
        path: &Utf8Path,
        config: &Arc<TransferConfig>,
    ) -> Option<PendingClassification> {
        if !path.is_file() {
            tracing::trace!("Ignoring {:?} for non-file {}", kind, path);
            return None;
        }

        tracing::debug!("{:?}: {} (settle {}s)", kind, path, config.delay);
        Some(self.schedule(path.to_path_buf(), Arc::clone(config)))
    }

    /// Schedule a classification of `path` after `config.delay` seconds.
    ///
    /// The source is checked again when the timer fires; a file that is gone
    /// by then is not submitted.
    pub fn schedule(&self, path: Utf8PathBuf, config: Arc<TransferConfig>) -> PendingClassification {
        let deadline = Instant::now() + Duration::from_secs(u64::from(config.delay));
        let job = ClassifyJob::new(path.clone(), Arc::clone(&config));
        let runner = Arc::clone(&self.runner);

        let task = self.runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if !job.source.exists() {
                tracing::debug!("{} vanished during settle delay", job.source);
                return;
            }
            runner.submit(job);
        });

        let abort = task.abort_handle();
        {
            let mut outstanding = self
                .outstanding
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            outstanding.retain(|h| !h.is_finished());
            outstanding.push(abort.clone());
        }
        self.metrics.record_job_scheduled();

        PendingClassification {
            path,
            config,
            deadline,
            abort,
        }
    }

    /// Abort every job that has not fired yet.
    pub fn cancel_all(&self) {
        let handles = std::mem::take(
            &mut *self
                .outstanding
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        let count = handles.iter().filter(|h| !h.is_finished()).count();
        for handle in handles {
            handle.abort();
        }
        if count > 0 {
            tracing::info!("Cancelled {} pending classifications", count);
        }
    }

    /// Number of scheduled jobs whose timer has not completed.
    pub fn outstanding(&self) -> usize {
        self.outstanding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// Submit every regular file directly inside each configured watch path.
    ///
    /// Only immediate children are considered, regardless of recursive
    /// flags. Submissions are spaced by [`ORGANIZE_PACING`];
    /// `on_progress` receives the running count after each one. Returns the
    /// number of files submitted.
    pub async fn organize<F>(&self, config: &Arc<TransferConfig>, mut on_progress: F) -> usize
    where
        F: FnMut(usize),
    {
        let mut submitted = 0usize;

        for target in config.watch_targets(&self.placeholders) {
            let files = match list_files(&target.path).await {
                Ok(files) => files,
                Err(e) => {
                    tracing::debug!("Organize skipping {}: {}", target.path, e);
                    continue;
                }
            };

            tracing::info!("Organizing {} ({} files)", target.path, files.len());
            for file in files {
                if submitted > 0 {
                    tokio::time::sleep(ORGANIZE_PACING).await;
                }
                self.runner.submit(ClassifyJob::new(file, Arc::clone(config)));
                submitted += 1;
                on_progress(submitted);
            }
        }

        submitted
    }
}

/// Regular files directly inside `dir`, sorted by name.
async fn list_files(dir: &Utf8Path) -> std::io::Result<Vec<Utf8PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
            continue;
        };
        let is_file = tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if is_file {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
