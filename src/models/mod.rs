//! Data models for AutoClassify.
//!
//! - [`TransferConfig`]: the classification configuration snapshot (rules, listen directories, ignore list)
//! - [`WatchTarget`]: a listen template after placeholder expansion
//! - [`PathPlaceholders`]: host-supplied values for `{storage}` / `{androidData}` tokens
//!
//! # Architecture Note
//!
//! A `TransferConfig` is loaded once per monitoring session and shared as
//! `Arc<TransferConfig>` by every watcher and job of that session. Changing
//! settings replaces the snapshot; it is never edited in place.

pub mod config;
pub mod placeholders;

pub use self::config::{NAME_PLACEHOLDER, TransferConfig, WatchTarget};
pub use placeholders::PathPlaceholders;
