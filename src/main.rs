//! AutoClassify - watch inbox directories and file new arrivals into category folders.
//!
//! Main entry point for the daemon.
//!
//! # Execution Flow
//!
//! 1. Load [`HostSettings`] (defaults → `autoclassify.{toml,yaml,json}` → `AUTOCLASSIFY_*` env)
//! 2. Initialize logging → `<log_dir>/autoclassify.<date>`
//! 3. Create tokio runtime (timers, blocking pool for moves)
//! 4. Build the [`TransferManager`] and apply persisted flags
//! 5. Run until Ctrl-C, forwarding status events to the log
//! 6. Stop watchers, log metrics, shut the runtime down with a 5s timeout
//!
//! An optional first argument names an explicit settings file.

use anyhow::{Context, Result};
use autoclassify::{
    APP_NAME, ConfigStore, HostSettings, PreferenceStore, StatusEvent, TransferManager, VERSION,
};
use camino::Utf8PathBuf;
use std::time::Duration;

fn main() -> Result<()> {
    let settings = match std::env::args().nth(1) {
        Some(path) => HostSettings::load_from(&Utf8PathBuf::from(path))?,
        None => HostSettings::load()?,
    };

    let _log_guard = autoclassify::logging::init_logging(&settings.log_settings())?;
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    tracing::debug!("Host settings: {:?}", settings);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("autoclassify-worker")
        .build()
        .context("Failed to build tokio runtime")?;

    let result = runtime.block_on(run(&settings));

    runtime.shutdown_timeout(Duration::from_secs(5));
    tracing::info!("Shutdown complete");

    result
}

async fn run(settings: &HostSettings) -> Result<()> {
    let config_store = ConfigStore::new(&settings.config_path)
        .with_context(|| format!("Unusable config path {}", settings.config_path))?;
    let preferences = PreferenceStore::new(&settings.preferences_path);

    let manager = TransferManager::new(config_store, preferences, settings.placeholders());
    let mut events = manager.subscribe();

    let preferences = manager
        .initialize()
        .await
        .context("Failed to initialize transfer manager")?;
    if !preferences.transfer_enabled {
        tracing::warn!(
            "Transfer is disabled in {}; running idle",
            settings.preferences_path
        );
    }

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                tracing::info!("Interrupt received, stopping");
                break;
            }
            event = events.recv() => match event {
                Ok(StatusEvent::ClassificationFailed { path, reason }) => {
                    tracing::warn!("Could not classify {}: {}", path, reason);
                }
                Ok(event) => tracing::debug!("Status: {:?}", event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!("Status listener lagged by {} events", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    manager.stop_monitoring();
    manager.metrics().log_summary();
    Ok(())
}
