// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Mapping changed source paths to the tasks that watch them.
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//! - (Optionally) content hashing, so saves that do not change a file's
//!   bytes do not cause rebuilds.
//!
//! It does not expand dependents; that happens in the watch core.

pub mod cache;
pub mod event_handler;
pub mod hash;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use event_handler::{process_paths, ContentFilter};
pub use patterns::Subscriptions;
pub use watcher::{spawn_watcher, WatcherHandle};
