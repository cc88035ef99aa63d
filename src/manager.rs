// Transfer manager
//
// Owns every collaborator and is the only control surface: monitoring,
// organize-now, feature flags, and configuration changes.

use crate::config::ConfigStore;
use crate::error::Result;
use crate::metrics::Metrics;
use crate::models::{PathPlaceholders, TransferConfig};
use crate::monitor::{
    DirectoryWatcher, Dispatcher, NotifyBackend, WatchBackend, WatchCallback, WatchEventKind,
};
use crate::preferences::{PreferenceStore, Preferences};
use crate::services::{BlockingJobRunner, ClassificationEngine, JobRunner};
use crate::state::{StateManager, StatusEvent};
use camino::Utf8Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

/// Watchers of one monitoring epoch and the snapshot they dispatch with.
struct MonitorSession {
    watchers: Vec<DirectoryWatcher>,
    config: Arc<TransferConfig>,
}

impl MonitorSession {
    fn stop(self) {
        for watcher in &self.watchers {
            watcher.stop_watching();
        }
    }
}

/// Collaborators a [`TransferManager`] can be built from.
///
/// [`TransferManager::new`] fills in the production pieces; tests swap the
/// backend or the runner.
pub struct ManagerParts {
    pub config_store: ConfigStore,
    pub preferences: PreferenceStore,
    pub placeholders: PathPlaceholders,
    pub backend: Arc<dyn WatchBackend>,
    pub runner: Option<Arc<dyn JobRunner>>,
}

/// Orchestrates configuration, watchers and dispatch.
///
/// Constructed once by the host. Every reconfiguration runs stop, change,
/// start, so a monitoring session never mixes two configurations.
pub struct TransferManager {
    config_store: ConfigStore,
    preferences: PreferenceStore,
    placeholders: PathPlaceholders,
    backend: Arc<dyn WatchBackend>,
    dispatcher: Arc<Dispatcher>,
    state: Arc<StateManager>,
    metrics: Arc<Metrics>,
    session: Mutex<Option<MonitorSession>>,
}

impl TransferManager {
    /// Production wiring: notify backend and blocking-pool job runner.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config_store: ConfigStore,
        preferences: PreferenceStore,
        placeholders: PathPlaceholders,
    ) -> Self {
        Self::from_parts(ManagerParts {
            config_store,
            preferences,
            placeholders,
            backend: Arc::new(NotifyBackend::new()),
            runner: None,
        })
    }

    pub fn from_parts(parts: ManagerParts) -> Self {
        let runtime = tokio::runtime::Handle::current();
        let state = Arc::new(StateManager::new());
        let metrics = Arc::new(Metrics::new());

        let runner: Arc<dyn JobRunner> = match parts.runner {
            Some(runner) => runner,
            None => {
                let engine = Arc::new(ClassificationEngine::new(parts.placeholders.clone()));
                Arc::new(BlockingJobRunner::new(
                    runtime.clone(),
                    engine,
                    Arc::clone(&state),
                    Arc::clone(&metrics),
                ))
            }
        };

        let dispatcher = Arc::new(Dispatcher::new(
            runtime,
            runner,
            parts.placeholders.clone(),
            Arc::clone(&metrics),
        ));

        Self {
            config_store: parts.config_store,
            preferences: parts.preferences,
            placeholders: parts.placeholders,
            backend: parts.backend,
            dispatcher,
            state,
            metrics,
            session: Mutex::new(None),
        }
    }

    fn session(&self) -> MutexGuard<'_, Option<MonitorSession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load persisted configuration and flags, then act on them: monitor if
    /// transfer and background monitoring are enabled, organize if transfer
    /// and auto-organize are enabled.
    pub async fn initialize(&self) -> Result<Preferences> {
        let config = self.config_store.load()?;
        let preferences = self.preferences.load()?;
        tracing::info!(
            "Initialized with config '{}' ({} rules, {} listen labels), {:?}",
            config.name,
            config.suffix_rules.len(),
            config.listen_directories.len(),
            preferences
        );

        if preferences.should_monitor() {
            self.start_monitoring()?;
        }
        if preferences.should_organize_on_startup() {
            self.organize_now().await?;
        }

        Ok(preferences)
    }

    /// Install watchers for every configured watch target.
    ///
    /// Replaces a running session. Roots that cannot be watched are logged
    /// and skipped. Returns the number of roots being watched.
    pub fn start_monitoring(&self) -> Result<usize> {
        let config = self.config_store.current();
        if let Err(e) = self.config_store.ensure_classify_directory() {
            tracing::warn!("Classify directory unavailable: {}", e);
        }

        let mut session = self.session();
        if let Some(previous) = session.take() {
            previous.stop();
        }

        let mut watchers = Vec::new();
        for target in config.watch_targets(&self.placeholders) {
            let dispatcher = Arc::clone(&self.dispatcher);
            let snapshot = Arc::clone(&config);
            let callback: WatchCallback =
                Arc::new(move |kind: WatchEventKind, path: &Utf8Path| {
                    dispatcher.on_event(kind, path, &snapshot);
                });

            let watcher = DirectoryWatcher::new(
                target.path.clone(),
                target.recursive,
                Arc::clone(&self.backend),
                callback,
            )
            .with_metrics(Arc::clone(&self.metrics));

            match watcher.start_watching() {
                Ok(()) if watcher.is_watching() => watchers.push(watcher),
                Ok(()) => tracing::debug!("Watch root {} absent, skipped", target.path),
                Err(e) => tracing::warn!("Skipping watch root: {}", e),
            }
        }

        let roots = watchers.len();
        *session = Some(MonitorSession { watchers, config });
        drop(session);

        self.state.monitoring_started(roots);
        tracing::info!("Monitoring started on {} roots", roots);
        Ok(roots)
    }

    /// Tear down all watchers. Already scheduled classifications still run.
    pub fn stop_monitoring(&self) {
        let previous = self.session().take();
        if let Some(session) = previous {
            session.stop();
            self.state.monitoring_stopped();
            tracing::info!("Monitoring stopped");
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.session().is_some()
    }

    /// Configuration the running session dispatches with, if any.
    pub fn session_config(&self) -> Option<Arc<TransferConfig>> {
        self.session().as_ref().map(|s| Arc::clone(&s.config))
    }

    /// Submit every file currently sitting in a watch root. Returns the
    /// number submitted.
    pub async fn organize_now(&self) -> Result<usize> {
        self.state.organize_started();

        if let Err(e) = self.config_store.ensure_classify_directory() {
            tracing::error!("Organize aborted: {}", e);
            self.state.organize_failed(e.to_string());
            return Err(e);
        }

        let config = self.config_store.current();
        let state = Arc::clone(&self.state);
        let count = self
            .dispatcher
            .organize(&config, |n| {
                state.organize_progress(n);
            })
            .await;

        self.state.organize_finished();
        tracing::info!("Organize submitted {} files", count);
        Ok(count)
    }

    pub fn set_transfer_enabled(&self, enabled: bool) -> Result<()> {
        let preferences = self.preferences.update(|p| p.transfer_enabled = enabled)?;
        self.apply_monitor_preference(preferences)
    }

    pub fn set_background_monitor_enabled(&self, enabled: bool) -> Result<()> {
        let preferences = self.preferences.update(|p| p.background_monitor = enabled)?;
        self.apply_monitor_preference(preferences)
    }

    /// Takes effect at the next [`initialize`](Self::initialize).
    pub fn set_auto_organize_on_startup(&self, enabled: bool) -> Result<()> {
        self.preferences
            .update(|p| p.auto_organize_on_startup = enabled)?;
        Ok(())
    }

    pub fn preferences(&self) -> Preferences {
        self.preferences.current()
    }

    fn apply_monitor_preference(&self, preferences: Preferences) -> Result<()> {
        match (preferences.should_monitor(), self.is_monitoring()) {
            (true, false) => self.start_monitoring().map(|_| ()),
            (false, true) => {
                self.stop_monitoring();
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Stop, apply `change`, then restart if monitoring was running.
    ///
    /// The restart happens even when `change` fails, so a bad import leaves
    /// the previous configuration watching.
    fn reconfigure<F>(&self, change: F) -> Result<Arc<TransferConfig>>
    where
        F: FnOnce(&ConfigStore) -> Result<Arc<TransferConfig>>,
    {
        let was_monitoring = self.is_monitoring();
        if was_monitoring {
            self.stop_monitoring();
        }

        let result = change(&self.config_store);

        if was_monitoring {
            self.start_monitoring()?;
        }
        result
    }

    pub fn import_config(&self, path: &Utf8Path) -> Result<Arc<TransferConfig>> {
        self.reconfigure(|store| store.import(path))
    }

    pub fn export_config(&self, path: &Utf8Path) -> Result<()> {
        self.config_store.export(path)
    }

    pub fn reset_to_default(&self) -> Result<Arc<TransferConfig>> {
        self.reconfigure(|store| store.reset_to_default())
    }

    pub fn update_config(&self, config: TransferConfig) -> Result<Arc<TransferConfig>> {
        self.reconfigure(|store| store.update(config))
    }

    pub fn current_config(&self) -> Arc<TransferConfig> {
        self.config_store.current()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.state.subscribe()
    }

    pub fn state(&self) -> &Arc<StateManager> {
        &self.state
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}

impl Drop for TransferManager {
    fn drop(&mut self) {
        self.stop_monitoring();
    }
}
