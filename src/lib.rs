// AutoClassify - watch inbox directories and file new arrivals by extension
//
// This is the library crate containing the core logic and data structures.
// The binary crate (main.rs) runs it as a daemon.

pub mod config;
pub mod error;
pub mod logging;
pub mod manager;
pub mod metrics;
pub mod models;
pub mod monitor;
pub mod preferences;
pub mod services;
pub mod settings;
pub mod state;

// Re-export commonly used types for convenience
pub use crate::config::{ConfigFormat, ConfigStore};
pub use error::{Result, TransferError};
pub use manager::{ManagerParts, TransferManager};
pub use metrics::Metrics;
pub use models::{PathPlaceholders, TransferConfig};
pub use preferences::{PreferenceStore, Preferences};
pub use services::ClassificationEngine;
pub use settings::HostSettings;
pub use state::{MonitorState, StateManager, StatusEvent};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
