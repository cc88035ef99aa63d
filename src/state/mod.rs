// State management module
//
// This module provides the StateManager which wraps MonitorState with thread-safe access
// using Arc<RwLock<T>> and emits status events for whatever presentation layer listens.

use camino::Utf8PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Status events emitted toward the presentation layer.
#[derive(Clone, Debug, PartialEq)]
pub enum StatusEvent {
    /// Watchers are installed for the configured roots
    MonitoringStarted { watched_roots: usize },

    /// All watchers were torn down
    MonitoringStopped,

    /// A manual organize sweep began
    OrganizeStarted,

    /// Number of files submitted so far by the running sweep
    OrganizeProgress { count: usize },

    /// The sweep submitted every file it found
    OrganizeComplete { count: usize },

    /// The sweep could not run
    OrganizeFailed { reason: String },

    /// A single classification job failed; siblings are unaffected
    ClassificationFailed { path: Utf8PathBuf, reason: String },
}

/// Snapshot of what the monitor is doing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MonitorState {
    pub monitoring: bool,
    pub watched_roots: usize,
    pub organizing: bool,
    pub organize_count: usize,
    pub last_organize_error: Option<String>,
}

/// Thread-safe monitor state with event emission
///
/// - [`read()`](Self::read) / [`snapshot()`](Self::snapshot) for reading
/// - [`update()`](Self::update) for mutations; changes are diffed and broadcast
/// - [`subscribe()`](Self::subscribe) for listening to [`StatusEvent`]s
pub struct StateManager {
    state: Arc<RwLock<MonitorState>>,

    /// Multiple subscribers can listen for status events
    status_tx: broadcast::Sender<StatusEvent>,
}

impl StateManager {
    /// Create a new StateManager with a broadcast buffer of 100 events
    pub fn new() -> Self {
        let (status_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(MonitorState::default())),
            status_tx,
        }
    }

    pub fn snapshot(&self) -> MonitorState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&MonitorState) -> R,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Apply `update_fn`, then emit an event for every observable change.
    ///
    /// Returns the events that were emitted.
    pub fn update<F>(&self, update_fn: F) -> Vec<StatusEvent>
    where
        F: FnOnce(&mut MonitorState),
    {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let old_state = state.clone();

        update_fn(&mut state);

        let changes = Self::detect_changes(&old_state, &state);
        for change in &changes {
            self.emit(change.clone());
        }

        changes
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.status_tx.subscribe()
    }

    fn emit(&self, event: StatusEvent) {
        // No subscribers is fine
        let _ = self.status_tx.send(event);
    }

    fn detect_changes(old: &MonitorState, new: &MonitorState) -> Vec<StatusEvent> {
        let mut changes = Vec::new();

        if old.monitoring != new.monitoring {
            if new.monitoring {
                changes.push(StatusEvent::MonitoringStarted {
                    watched_roots: new.watched_roots,
                });
            } else {
                changes.push(StatusEvent::MonitoringStopped);
            }
        }

        if !old.organizing && new.organizing {
            changes.push(StatusEvent::OrganizeStarted);
        }

        if new.organizing && old.organize_count != new.organize_count {
            changes.push(StatusEvent::OrganizeProgress {
                count: new.organize_count,
            });
        }

        if old.organizing && !new.organizing {
            match &new.last_organize_error {
                Some(reason) => changes.push(StatusEvent::OrganizeFailed {
                    reason: reason.clone(),
                }),
                None => changes.push(StatusEvent::OrganizeComplete {
                    count: new.organize_count,
                }),
            }
        }

        changes
    }

    pub fn monitoring_started(&self, watched_roots: usize) -> Vec<StatusEvent> {
        self.update(|state| {
            state.monitoring = true;
            state.watched_roots = watched_roots;
        })
    }

    pub fn monitoring_stopped(&self) -> Vec<StatusEvent> {
        self.update(|state| {
            state.monitoring = false;
            state.watched_roots = 0;
        })
    }

    pub fn organize_started(&self) -> Vec<StatusEvent> {
        self.update(|state| {
            state.organizing = true;
            state.organize_count = 0;
            state.last_organize_error = None;
        })
    }

    pub fn organize_progress(&self, count: usize) -> Vec<StatusEvent> {
        self.update(|state| state.organize_count = count)
    }

    pub fn organize_finished(&self) -> Vec<StatusEvent> {
        self.update(|state| state.organizing = false)
    }

    pub fn organize_failed(&self, reason: String) -> Vec<StatusEvent> {
        self.update(|state| {
            state.organizing = false;
            state.last_organize_error = Some(reason);
        })
    }

    /// Report a failed job. Not part of [`MonitorState`]; emitted directly.
    pub fn report_classification_failure(&self, path: Utf8PathBuf, reason: String) -> StatusEvent {
        let event = StatusEvent::ClassificationFailed { path, reason };
        self.emit(event.clone());
        event
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitoring_transitions() {
        let state = StateManager::new();

        let changes = state.monitoring_started(3);
        assert_eq!(
            changes,
            vec![StatusEvent::MonitoringStarted { watched_roots: 3 }]
        );

        // Already monitoring: nothing new to report
        assert!(state.monitoring_started(3).is_empty());

        assert_eq!(state.monitoring_stopped(), vec![StatusEvent::MonitoringStopped]);
        assert!(!state.read(|s| s.monitoring));
    }

    #[test]
    fn test_organize_lifecycle() {
        let state = StateManager::new();

        assert_eq!(state.organize_started(), vec![StatusEvent::OrganizeStarted]);
        assert_eq!(
            state.organize_progress(1),
            vec![StatusEvent::OrganizeProgress { count: 1 }]
        );
        assert_eq!(
            state.organize_finished(),
            vec![StatusEvent::OrganizeComplete { count: 1 }]
        );
    }

    #[test]
    fn test_organize_failure() {
        let state = StateManager::new();
        state.organize_started();

        let changes = state.organize_failed("disk full".to_string());
        assert_eq!(
            changes,
            vec![StatusEvent::OrganizeFailed {
                reason: "disk full".to_string()
            }]
        );

        // A new sweep clears the previous error
        state.organize_started();
        assert_eq!(state.snapshot().last_organize_error, None);
    }

    #[tokio::test]
    async fn test_classification_failure_broadcast() {
        let state = StateManager::new();
        let mut rx = state.subscribe();

        state.report_classification_failure("/in/a.txt".into(), "denied".to_string());

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            StatusEvent::ClassificationFailed {
                path: "/in/a.txt".into(),
                reason: "denied".to_string()
            }
        );
    }
}
