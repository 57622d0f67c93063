// src/engine/core.rs

//! Pure watch-loop state machine.
//!
//! `WatchCore` consumes watch events (changed paths, debounce expiry, build
//! completion, shutdown) and returns [`WatchCommand`]s describing what the IO
//! shell should do next. It has no channels, timers or Tokio types, so its
//! transitions are unit tested directly.
//!
//! ```text
//! Idle -> Watching -> Triggered -> Building -> Watching ...
//!                                     \-> Building (queued re-run)
//! any -> Stopped
//! ```

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::dag::{TaskGraph, TaskName};
use crate::watch::Subscriptions;

use super::queue::TriggerQueue;
use super::result::BuildResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Before the initial build has succeeded.
    Idle,
    Watching,
    /// A change arrived; coalescing further changes until the debounce fires.
    Triggered,
    Building,
    Stopped,
}

/// Instructions for the IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchCommand {
    /// Start the debounce timer (no-op if one is already running).
    ArmDebounce,
    /// Build exactly these tasks.
    StartBuild(BTreeSet<TaskName>),
    /// Tell the reload collaborator about changed outputs.
    NotifyReload(Vec<PathBuf>),
    /// Leave the loop.
    Stop,
}

#[derive(Debug)]
pub struct WatchCore {
    state: WatchState,
    graph: Arc<TaskGraph>,
    subscriptions: Subscriptions,
    /// Tasks matched by changes since the loop entered `Triggered`.
    pending: BTreeSet<TaskName>,
    /// Triggers that arrived during a build.
    queue: TriggerQueue,
    /// Whether the shell has a debounce timer running.
    debounce_armed: bool,
}

impl WatchCore {
    pub fn new(graph: Arc<TaskGraph>, subscriptions: Subscriptions, queue_length: usize) -> Self {
        Self {
            state: WatchState::Idle,
            graph,
            subscriptions,
            pending: BTreeSet::new(),
            queue: TriggerQueue::new(queue_length),
            debounce_armed: false,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    /// The initial build succeeded; start reacting to changes.
    pub fn start_watching(&mut self) {
        if self.state == WatchState::Idle {
            info!("watching for changes");
            self.state = WatchState::Watching;
        }
    }

    /// Changed paths (relative to the source root, forward slashes).
    pub fn on_change(&mut self, paths: &[String]) -> Vec<WatchCommand> {
        let affected: BTreeSet<TaskName> = paths
            .iter()
            .flat_map(|p| self.subscriptions.affected_tasks(p))
            .collect();
        if affected.is_empty() {
            debug!(?paths, "change matches no subscription");
            return Vec::new();
        }

        match self.state {
            WatchState::Watching => {
                debug!(tasks = ?affected, "change detected; debouncing");
                self.pending = affected;
                self.state = WatchState::Triggered;
                self.debounce_armed = true;
                vec![WatchCommand::ArmDebounce]
            }
            WatchState::Triggered => {
                self.pending.extend(affected);
                Vec::new()
            }
            WatchState::Building => {
                debug!(tasks = ?affected, "change during build; queued");
                self.queue.record_trigger(affected);
                if self.debounce_armed {
                    Vec::new()
                } else {
                    self.debounce_armed = true;
                    vec![WatchCommand::ArmDebounce]
                }
            }
            WatchState::Idle | WatchState::Stopped => Vec::new(),
        }
    }

    /// The debounce window has closed.
    pub fn on_debounce_elapsed(&mut self) -> Vec<WatchCommand> {
        self.debounce_armed = false;
        match self.state {
            WatchState::Triggered => {
                let roots = std::mem::take(&mut self.pending);
                vec![self.begin_build(roots)]
            }
            WatchState::Building => {
                // Changes that arrived together during the build form one
                // queued re-run.
                self.queue.seal_batch();
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// A build started by [`WatchCommand::StartBuild`] has finished.
    ///
    /// Failed builds do not stop the loop.
    pub fn on_build_finished(&mut self, result: &BuildResult) -> Vec<WatchCommand> {
        let mut commands = Vec::new();

        let changed = result.changed_outputs();
        if !changed.is_empty() {
            commands.push(WatchCommand::NotifyReload(changed));
        }

        self.after_build(&mut commands);
        commands
    }

    /// A build ended without producing a result (rejected graph or a
    /// crashed worker). Treated like a failed build.
    pub fn on_build_aborted(&mut self) -> Vec<WatchCommand> {
        let mut commands = Vec::new();
        self.after_build(&mut commands);
        commands
    }

    fn after_build(&mut self, commands: &mut Vec<WatchCommand>) {
        if self.state != WatchState::Building {
            return;
        }
        match self.queue.pop_next() {
            Some(roots) => commands.push(self.begin_build(roots)),
            None => self.state = WatchState::Watching,
        }
    }

    pub fn on_shutdown(&mut self) -> Vec<WatchCommand> {
        info!(from = ?self.state, "watch loop stopping");
        self.state = WatchState::Stopped;
        self.pending.clear();
        vec![WatchCommand::Stop]
    }

    fn begin_build(&mut self, roots: BTreeSet<TaskName>) -> WatchCommand {
        let targets = self.graph.dependents_closure(roots.iter().map(String::as_str));
        info!(triggered = ?roots, tasks = ?targets, "rebuilding affected tasks");
        self.state = WatchState::Building;
        WatchCommand::StartBuild(targets)
    }
}
