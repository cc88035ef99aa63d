use super::classify::{ClassificationEngine, ClassifyOutcome};
use crate::error::Result;
use crate::metrics::Metrics;
use crate::models::TransferConfig;
use crate::state::StateManager;
use camino::Utf8PathBuf;
use std::sync::Arc;

/// One file to classify against one configuration snapshot.
#[derive(Debug, Clone)]
pub struct ClassifyJob {
    pub source: Utf8PathBuf,
    pub config: Arc<TransferConfig>,
}

impl ClassifyJob {
    pub fn new(source: Utf8PathBuf, config: Arc<TransferConfig>) -> Self {
        Self { source, config }
    }

    pub fn run(&self, engine: &ClassificationEngine) -> Result<ClassifyOutcome> {
        engine.classify(&self.source, &self.config)
    }
}

/// Execution substrate for classification jobs.
///
/// `submit` hands the job off and returns immediately; the job's `run` is
/// executed exactly once at some later point.
#[cfg_attr(test, mockall::automock)]
pub trait JobRunner: Send + Sync {
    fn submit(&self, job: ClassifyJob);
}

/// Runs jobs on the tokio blocking pool so a slow rename never stalls the
/// timers or the watchers.
pub struct BlockingJobRunner {
    runtime: tokio::runtime::Handle,
    engine: Arc<ClassificationEngine>,
    state: Arc<StateManager>,
    metrics: Arc<Metrics>,
}

impl BlockingJobRunner {
    pub fn new(
        runtime: tokio::runtime::Handle,
        engine: Arc<ClassificationEngine>,
        state: Arc<StateManager>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            runtime,
            engine,
            state,
            metrics,
        }
    }
}

impl JobRunner for BlockingJobRunner {
    fn submit(&self, job: ClassifyJob) {
        let engine = Arc::clone(&self.engine);
        let state = Arc::clone(&self.state);
        let metrics = Arc::clone(&self.metrics);

        self.runtime.spawn_blocking(move || {
            let started = std::time::Instant::now();
            match job.run(&engine) {
                Ok(ClassifyOutcome::Moved { .. }) => {
                    metrics.record_file_moved();
                    metrics.record_move_time(started.elapsed());
                }
                Ok(ClassifyOutcome::Skipped(_)) | Ok(ClassifyOutcome::SourceMissing) => {
                    metrics.record_file_skipped();
                }
                Err(e) => {
                    tracing::error!("Classification failed for {}: {}", job.source, e);
                    metrics.record_file_failed();
                    state.report_classification_failure(job.source.clone(), e.to_string());
                }
            }
        });
    }
}
