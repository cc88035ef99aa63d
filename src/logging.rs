use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Where and how to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Directory for log files (e.g., "logs")
    pub log_dir: Utf8PathBuf,
    /// Prefix for log files (e.g., "autoclassify")
    pub log_prefix: String,
    /// Debug level instead of info, unless `RUST_LOG` says otherwise
    pub debug: bool,
    /// Also log to the console with ANSI colors
    pub console: bool,
    /// Write the file log as JSON lines
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            log_dir: Utf8PathBuf::from("logs"),
            log_prefix: crate::APP_NAME.to_string(),
            debug: false,
            console: true,
            json: false,
        }
    }
}

impl LogSettings {
    fn env_filter(&self) -> EnvFilter {
        let default_level = if self.debug { "debug" } else { "info" };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    }
}

/// Create the log directory if it doesn't exist.
fn ensure_log_dir(settings: &LogSettings) -> Result<()> {
    if !settings.log_dir.exists() {
        fs::create_dir_all(&settings.log_dir).with_context(|| {
            format!("Failed to create log directory: {}", settings.log_dir)
        })?;
    }
    Ok(())
}

/// Setup logging with a daily rotating file appender and optional console output.
///
/// # Returns
/// A guard that must be held for the duration of the program to keep logging active
///
/// # Errors
/// Fails if the log directory cannot be created or a global subscriber is
/// already installed.
pub fn init_logging(settings: &LogSettings) -> Result<WorkerGuard> {
    ensure_log_dir(settings)?;

    let file_appender = rolling::daily(&settings.log_dir, &settings.log_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = if settings.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false) // No ANSI codes in log files
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    let console_layer = settings.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(settings.env_filter())
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    tracing::info!(
        "Logging initialized: dir={}, prefix={}, debug={}, console={}, json={}",
        settings.log_dir,
        settings.log_prefix,
        settings.debug,
        settings.console,
        settings.json
    );

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_logging_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let log_dir = Utf8PathBuf::from_path_buf(temp_dir.path().join("logs")).unwrap();
        let settings = LogSettings {
            log_dir: log_dir.clone(),
            console: false,
            ..LogSettings::default()
        };

        // May fail if another test already installed a subscriber, but the
        // directory is created first either way
        let _guard = init_logging(&settings);

        assert!(log_dir.exists());
    }

    #[test]
    fn test_default_settings() {
        let settings = LogSettings::default();
        assert_eq!(settings.log_dir, "logs");
        assert_eq!(settings.log_prefix, "autoclassify");
        assert!(!settings.debug);
        assert!(!settings.json);
    }
}
