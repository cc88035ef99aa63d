use camino::Utf8PathBuf;
use std::io;
use thiserror::Error;

/// Errors raised by the configuration, watcher and classification layers.
///
/// Classification failures never travel further than the job that produced
/// them; configuration failures surface to whoever asked for the load/save.
#[derive(Error, Debug)]
pub enum TransferError {
    /// Config text could not be parsed.
    #[error("Failed to parse {format} config: {source}")]
    Parse {
        format: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Config file extension is neither `.fvv` nor `.json`.
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(Utf8PathBuf),

    /// Generic filesystem failure (missing parent, non-directory collision, move).
    #[error("Storage error at {path}: {source}")]
    Storage {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    /// A watch handle could not be installed for a root.
    #[error("Cannot watch {path}: {reason}")]
    WatchSetup { path: Utf8PathBuf, reason: String },
}

impl TransferError {
    pub(crate) fn storage(path: impl Into<Utf8PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn not_a_directory(path: impl Into<Utf8PathBuf>) -> Self {
        Self::storage(
            path,
            io::Error::new(
                io::ErrorKind::AlreadyExists,
                "path exists but is not a directory",
            ),
        )
    }
}

pub type Result<T, E = TransferError> = std::result::Result<T, E>;
