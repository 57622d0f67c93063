// src/engine/backend.rs

//! Pluggable build backend abstraction.
//!
//! The watch loop talks to a `BuildBackend` instead of the orchestrator
//! directly, so tests can swap in a fake that records requested builds and
//! controls how long they take.

use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;

use crate::dag::TaskName;
use crate::errors::ConfigurationError;

use super::orchestrator::Orchestrator;
use super::result::BuildResult;

pub type BuildFuture =
    Pin<Box<dyn Future<Output = Result<BuildResult, ConfigurationError>> + Send + 'static>>;

/// Trait abstracting how a (partial) build is executed.
pub trait BuildBackend: Send + Sync {
    /// Start a build restricted to `tasks`. The returned future is spawned
    /// by the caller and must not borrow from `self`.
    fn start_build(&self, tasks: BTreeSet<TaskName>) -> BuildFuture;
}

impl BuildBackend for Orchestrator {
    fn start_build(&self, tasks: BTreeSet<TaskName>) -> BuildFuture {
        let this = self.clone();
        Box::pin(async move { this.build_tasks(&tasks).await })
    }
}
