//! Process-level settings: where files live and how to log.
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! `autoclassify.{toml,yaml,json}` file, then `AUTOCLASSIFY_*` environment
//! variables (e.g. `AUTOCLASSIFY_STORAGE_ROOT=/mnt/sdcard`).

use crate::logging::LogSettings;
use crate::models::PathPlaceholders;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

/// Base name of the optional settings file in the working directory.
pub const SETTINGS_FILE_STEM: &str = "autoclassify";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "AUTOCLASSIFY";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostSettings {
    /// Persisted classification config (`.fvv` or `.json`)
    pub config_path: Utf8PathBuf,

    /// Persisted feature flags
    pub preferences_path: Utf8PathBuf,

    /// Value of the `{storage}` placeholder
    pub storage_root: String,

    /// Value of the `{androidData}` placeholder
    pub android_data_root: String,

    pub log_dir: Utf8PathBuf,
    pub debug: bool,
    pub console_log: bool,
    pub json_logs: bool,
}

impl HostSettings {
    /// Defaults, the settings file in the working directory if any, and the
    /// environment.
    pub fn load() -> Result<Self> {
        Self::build(None)
    }

    /// Like [`load`](Self::load) but with an explicit settings file, which
    /// must exist.
    pub fn load_from(path: &Utf8Path) -> Result<Self> {
        Self::build(Some(path))
    }

    fn build(path: Option<&Utf8Path>) -> Result<Self> {
        let file = match path {
            Some(path) => ::config::File::with_name(path.as_str()).required(true),
            None => ::config::File::with_name(SETTINGS_FILE_STEM).required(false),
        };

        let settings = ::config::Config::builder()
            .set_default("config_path", "autoclassify-data/transfer_config.fvv")?
            .set_default("preferences_path", "autoclassify-data/preferences.yaml")?
            .set_default("storage_root", "/storage/emulated/0")?
            .set_default("android_data_root", "/storage/emulated/0/Android/data")?
            .set_default("log_dir", "logs")?
            .set_default("debug", false)?
            .set_default("console_log", true)?
            .set_default("json_logs", false)?
            .add_source(file)
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("Failed to assemble host settings")?;

        settings
            .try_deserialize()
            .context("Invalid host settings")
    }

    /// Placeholder table for listen-directory templates.
    pub fn placeholders(&self) -> PathPlaceholders {
        PathPlaceholders::standard(&self.storage_root, &self.android_data_root)
    }

    pub fn log_settings(&self) -> LogSettings {
        LogSettings {
            log_dir: self.log_dir.clone(),
            log_prefix: crate::APP_NAME.to_string(),
            debug: self.debug,
            console: self.console_log,
            json: self.json_logs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_settings_file_overrides_defaults() {
        let temp = TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("host.toml")).unwrap();
        fs::write(
            &path,
            "storage_root = \"/mnt/sd\"\nconfig_path = \"/etc/autoclassify/rules.json\"\ndebug = true\n",
        )
        .unwrap();

        let settings = HostSettings::load_from(&path).unwrap();
        assert_eq!(settings.storage_root, "/mnt/sd");
        assert_eq!(settings.config_path, "/etc/autoclassify/rules.json");
        assert!(settings.debug);

        // Untouched keys keep their defaults
        assert_eq!(settings.android_data_root, "/storage/emulated/0/Android/data");
        assert!(settings.console_log);
        assert!(!settings.json_logs);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        assert!(HostSettings::load_from(Utf8Path::new("/no/such/host.toml")).is_err());
    }

    #[test]
    fn test_placeholders_from_settings() {
        let temp = TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("host.toml")).unwrap();
        fs::write(&path, "storage_root = \"/sd\"\nandroid_data_root = \"/sd/Android/data\"\n")
            .unwrap();

        let placeholders = HostSettings::load_from(&path).unwrap().placeholders();
        assert_eq!(placeholders.expand("{storage}/Download"), "/sd/Download");
        assert_eq!(placeholders.expand("{androidData}/x"), "/sd/Android/data/x");
    }
}
