use crate::error::{Result, TransferError};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::{Mutex, PoisonError, RwLock};

/// Feature flags that survive restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Master switch for automatic transfer.
    pub transfer_enabled: bool,

    /// Keep watching while the host is in the background.
    pub background_monitor: bool,

    /// Run an organize sweep right after startup.
    pub auto_organize_on_startup: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            transfer_enabled: false,
            background_monitor: true,
            auto_organize_on_startup: false,
        }
    }
}

impl Preferences {
    /// Monitoring should be running.
    pub fn should_monitor(&self) -> bool {
        self.transfer_enabled && self.background_monitor
    }

    /// A sweep should run at startup.
    pub fn should_organize_on_startup(&self) -> bool {
        self.transfer_enabled && self.auto_organize_on_startup
    }
}

/// YAML-backed [`Preferences`].
///
/// A missing file means defaults; nothing is written until a flag changes.
pub struct PreferenceStore {
    path: Utf8PathBuf,
    current: RwLock<Preferences>,
    write_lock: Mutex<()>,
}

impl PreferenceStore {
    pub fn new<P: AsRef<Utf8Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            current: RwLock::new(Preferences::default()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn current(&self) -> Preferences {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn load(&self) -> Result<Preferences> {
        let preferences = if self.path.exists() {
            let contents =
                fs::read_to_string(&self.path).map_err(|e| TransferError::storage(&self.path, e))?;
            serde_yaml_ng::from_str(&contents).map_err(|e| TransferError::Parse {
                format: "yaml",
                source: Box::new(e),
            })?
        } else {
            tracing::debug!("No preferences at {}, using defaults", self.path);
            Preferences::default()
        };

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = preferences;
        Ok(preferences)
    }

    /// Apply `change` and persist the result.
    pub fn update<F>(&self, change: F) -> Result<Preferences>
    where
        F: FnOnce(&mut Preferences),
    {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut preferences = self.current();
        change(&mut preferences);

        let yaml = serde_yaml_ng::to_string(&preferences).map_err(|e| TransferError::Parse {
            format: "yaml",
            source: Box::new(e),
        })?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| TransferError::storage(parent, e))?;
            }
        }
        fs::write(&self.path, yaml).map_err(|e| TransferError::storage(&self.path, e))?;

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = preferences;
        tracing::debug!("Saved preferences: {:?}", preferences);
        Ok(preferences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(temp: &TempDir) -> PreferenceStore {
        PreferenceStore::new(Utf8PathBuf::from_path_buf(temp.path().join("prefs/flags.yaml")).unwrap())
    }

    #[test]
    fn test_defaults_when_missing() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        let prefs = store.load().unwrap();
        assert_eq!(prefs, Preferences::default());
        assert!(!prefs.should_monitor());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_update_persists() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        store.update(|p| p.transfer_enabled = true).unwrap();

        let reopened = store_in(&temp);
        let prefs = reopened.load().unwrap();
        assert!(prefs.transfer_enabled);
        assert!(prefs.background_monitor);
        assert!(prefs.should_monitor());
        assert!(!prefs.should_organize_on_startup());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "auto_organize_on_startup: true\n").unwrap();

        let prefs = store.load().unwrap();
        assert!(prefs.auto_organize_on_startup);
        assert!(prefs.background_monitor);
        assert!(!prefs.transfer_enabled);
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "transfer_enabled: [not, a, bool]\n").unwrap();

        assert!(matches!(store.load(), Err(TransferError::Parse { .. })));
    }
}
