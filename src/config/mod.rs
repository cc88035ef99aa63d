//! Configuration persistence.
//!
//! - [`codec`]: parse/serialize in FVV or JSON, file helpers selected by extension
//! - [`fvv`]: the FVV tokenizer, parser and writer
//! - [`ConfigStore`]: current snapshot plus the persisted file it is loaded from

pub mod codec;
pub mod fvv;

pub use codec::{ConfigFormat, parse, read_config_file, serialize, write_config_file};
pub use fvv::FvvSyntaxError;

use crate::error::{Result, TransferError};
use crate::models::TransferConfig;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Holds the current configuration snapshot and its persisted location.
///
/// Saves are serialized through `write_lock`; nothing guards against another
/// process editing the file, the last writer wins.
#[derive(Debug)]
pub struct ConfigStore {
    config_path: Utf8PathBuf,
    current: RwLock<Arc<TransferConfig>>,
    write_lock: Mutex<()>,
}

impl ConfigStore {
    /// Create a store persisting to `config_path` (`.fvv` or `.json`).
    ///
    /// The snapshot starts as the built-in configuration; call [`load`](Self::load)
    /// to read the file.
    pub fn new<P: AsRef<Utf8Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref().to_path_buf();
        ConfigFormat::from_path(&config_path)?;

        Ok(Self {
            config_path,
            current: RwLock::new(Arc::new(TransferConfig::builtin())),
            write_lock: Mutex::new(()),
        })
    }

    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }

    /// The current snapshot.
    pub fn current(&self) -> Arc<TransferConfig> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn replace(&self, config: TransferConfig) -> Arc<TransferConfig> {
        let config = Arc::new(config);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&config);
        config
    }

    /// Load the persisted configuration.
    ///
    /// When the file does not exist the built-in configuration is written
    /// there and used. A file that exists but cannot be read or parsed is an
    /// error; it is never silently replaced.
    pub fn load(&self) -> Result<Arc<TransferConfig>> {
        if !self.config_path.exists() {
            tracing::warn!(
                "Config file not found at {}, writing defaults",
                self.config_path
            );
            let config = self.replace(TransferConfig::builtin());
            self.save()?;
            return Ok(config);
        }

        let config = read_config_file(&self.config_path)?;
        tracing::info!(
            "Loaded config '{}' from {} ({} rules, {} listen groups)",
            config.name,
            self.config_path,
            config.suffix_rules.len(),
            config.listen_directories.len()
        );
        Ok(self.replace(config))
    }

    /// Persist the current snapshot, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let config = self.current();

        if let Some(parent) = self.config_path.parent() {
            if !parent.as_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| TransferError::storage(parent, e))?;
            }
        }

        write_config_file(&config, &self.config_path)?;
        tracing::info!("Saved config to {}", self.config_path);
        Ok(())
    }

    /// Replace the snapshot and persist it.
    pub fn update(&self, config: TransferConfig) -> Result<Arc<TransferConfig>> {
        let config = self.replace(config);
        self.save()?;
        Ok(config)
    }

    /// Replace the snapshot with the built-in configuration and persist it.
    pub fn reset_to_default(&self) -> Result<Arc<TransferConfig>> {
        tracing::info!("Resetting config to built-in defaults");
        self.update(TransferConfig::builtin())
    }

    /// Read a configuration from `path`, make it current and persist it.
    pub fn import(&self, path: &Utf8Path) -> Result<Arc<TransferConfig>> {
        let config = read_config_file(path)?;
        tracing::info!("Imported config '{}' from {}", config.name, path);
        self.update(config)
    }

    /// Write the current snapshot to `path` in the format its extension names.
    pub fn export(&self, path: &Utf8Path) -> Result<()> {
        write_config_file(&self.current(), path)?;
        tracing::info!("Exported config to {}", path);
        Ok(())
    }

    /// Make sure the output root exists and is a directory.
    pub fn ensure_classify_directory(&self) -> Result<()> {
        let config = self.current();
        let dir = &config.classify_directory;
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| TransferError::storage(dir.as_path(), e))?;
        } else if !dir.is_dir() {
            return Err(TransferError::not_a_directory(dir.as_path()));
        }
        Ok(())
    }
}
