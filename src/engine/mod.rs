// src/engine/mod.rs

//! Build orchestration and the watch loop.
//!
//! - [`orchestrator`] runs the task graph wave by wave for the active
//!   profile, consulting the [`staleness`] tracker and aggregating a
//!   [`result::BuildResult`].
//! - [`core`] is the pure watch-loop state machine; [`runtime`] is the async
//!   shell that feeds it events, owns the debounce timer and spawns builds
//!   through a [`backend::BuildBackend`].
//! - [`queue`] coalesces triggers that arrive while a build is running.

pub mod backend;
pub mod core;
pub mod orchestrator;
pub mod queue;
pub mod result;
pub mod runtime;
pub mod staleness;

pub use crate::dag::TaskName;

/// Events flowing into the watch loop from the filesystem watcher and
/// signal handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Paths relative to the source root (forward slashes) changed.
    Changed(Vec<String>),
    /// The underlying watcher reported a non-fatal error.
    Error(String),
    /// Graceful shutdown requested (e.g. Ctrl-C).
    Shutdown,
}

pub use backend::{BuildBackend, BuildFuture};
pub use core::{WatchCommand, WatchCore, WatchState};
pub use orchestrator::{BuildSettings, Orchestrator};
pub use queue::TriggerQueue;
pub use result::{BuildResult, TaskReport, TaskStatus};
pub use runtime::WatchLoop;
pub use staleness::{StalenessRecord, StalenessTracker};
