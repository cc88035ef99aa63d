use crate::error::{Result, TransferError};
use crate::models::{NAME_PLACEHOLDER, PathPlaceholders, TransferConfig};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::sync::{Arc, Mutex, PoisonError};

/// Why a file was left where it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No extension and `ignore_no_suffix` is set.
    NoSuffix,
    /// Matched an ignore-list token.
    Ignored(String),
}

/// Where a file should go, decided from its name and the configuration alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Skip(SkipReason),
    Move {
        category: String,
        target_dir: Utf8PathBuf,
    },
}

/// Result of classifying one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifyOutcome {
    /// The source disappeared before the job ran.
    SourceMissing,
    Skipped(SkipReason),
    Moved {
        category: String,
        destination: Utf8PathBuf,
    },
}

/// Split a file name into (base name, lowercased extension).
///
/// The extension is whatever follows the last `.`; a name without a dot has
/// an empty extension and is its own base name.
pub fn split_name(file_name: &str) -> (&str, String) {
    match file_name.rsplit_once('.') {
        Some((base, ext)) => (base, ext.to_lowercase()),
        None => (file_name, String::new()),
    }
}

/// Decides categories and moves files into them.
///
/// Holds the placeholder table needed to resolve origin labels; every call
/// gets the configuration snapshot explicitly.
///
/// Picking a free destination name and renaming onto it happen under one
/// lock shared by all clones of an engine, so concurrent moves of equally
/// named files never land on the same target.
#[derive(Debug, Clone, Default)]
pub struct ClassificationEngine {
    placeholders: PathPlaceholders,
    move_lock: Arc<Mutex<()>>,
}

impl ClassificationEngine {
    pub fn new(placeholders: PathPlaceholders) -> Self {
        Self {
            placeholders,
            move_lock: Arc::default(),
        }
    }

    /// Resolve the category for an extension: first matching rule in
    /// configured order, otherwise the default type.
    pub fn resolve_category(&self, config: &TransferConfig, file_name: &str) -> String {
        let (base, extension) = split_name(file_name);

        let matched = config.suffix_rules.iter().find(|(_, suffixes)| {
            suffixes
                .iter()
                .any(|s| s == &extension || s.to_lowercase() == extension)
        });

        match matched {
            Some((label, _)) if label.contains(NAME_PLACEHOLDER) => {
                label.replace(NAME_PLACEHOLDER, base)
            }
            Some((label, _)) => label.clone(),
            None => config.default_type.clone(),
        }
    }

    /// Pure decision for `source`; never touches the filesystem and never fails.
    pub fn decide(&self, source: &Utf8Path, config: &TransferConfig) -> Decision {
        let file_name = source.file_name().unwrap_or_default();
        let (_, extension) = split_name(file_name);

        if extension.is_empty() && config.ignore_no_suffix {
            return Decision::Skip(SkipReason::NoSuffix);
        }

        let lowered_name = file_name.to_lowercase();
        let ignored = config.ignore_list.iter().find(|token| {
            !token.is_empty()
                && (**token == extension || lowered_name.contains(&token.to_lowercase()))
        });
        if let Some(token) = ignored {
            return Decision::Skip(SkipReason::Ignored(token.clone()));
        }

        let category = self.resolve_category(config, file_name);

        let mut target_dir = config.classify_directory.clone();
        if config.sub_app {
            if let Some(origin) = config.origin_label(source, &self.placeholders) {
                target_dir.push(origin);
            }
        }
        target_dir.push(&category);

        Decision::Move {
            category,
            target_dir,
        }
    }

    /// Classify and move one file.
    ///
    /// A vanished source is not an error. Only directory creation, name
    /// allocation and the rename itself can fail.
    pub fn classify(&self, source: &Utf8Path, config: &TransferConfig) -> Result<ClassifyOutcome> {
        if !source.exists() {
            tracing::debug!("Source vanished before classification: {}", source);
            return Ok(ClassifyOutcome::SourceMissing);
        }

        let (category, target_dir) = match self.decide(source, config) {
            Decision::Skip(reason) => {
                tracing::debug!("Skipping {}: {:?}", source, reason);
                return Ok(ClassifyOutcome::Skipped(reason));
            }
            Decision::Move {
                category,
                target_dir,
            } => (category, target_dir),
        };

        if !target_dir.exists() {
            fs::create_dir_all(&target_dir)
                .map_err(|e| TransferError::storage(target_dir.as_path(), e))?;
        } else if !target_dir.is_dir() {
            return Err(TransferError::not_a_directory(target_dir));
        }

        let file_name = source.file_name().unwrap_or_default();
        let destination = {
            let _guard = self.move_lock.lock().unwrap_or_else(PoisonError::into_inner);
            let destination = unique_destination(&target_dir, file_name);
            fs::rename(source, &destination).map_err(|e| TransferError::storage(source, e))?;
            destination
        };

        tracing::info!("Moved {} -> {} [{}]", source, destination, category);
        Ok(ClassifyOutcome::Moved {
            category,
            destination,
        })
    }
}

/// First free name in `dir`: `name.ext`, then `name_1.ext`, `name_2.ext`, ...
///
/// A trailing dot counts as no extension: `name.` continues as `name_1`.
pub fn unique_destination(dir: &Utf8Path, file_name: &str) -> Utf8PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let (base, extension) = match file_name.rsplit_once('.') {
        Some((base, "")) => (base, None),
        Some((base, ext)) => (base, Some(ext)),
        None => (file_name, None),
    };

    (1u64..)
        .map(|n| match extension {
            Some(ext) => dir.join(format!("{}_{}.{}", base, n, ext)),
            None => dir.join(format!("{}_{}", base, n)),
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}
