// src/engine/queue.rs

use std::collections::{BTreeSet, VecDeque};

use tracing::{debug, warn};

use crate::dag::TaskName;

/// Queue of triggers that arrive while a build is already executing.
///
/// Semantics:
/// - Each queued entry is a *batch* of task names to rebuild together once
///   the current build finishes.
/// - `max_runs` bounds how many batches are remembered. With the default of
///   1, every trigger during a build merges into a single follow-up run.
/// - `pop_next()` hands out the oldest batch when the current build ends.
///
/// Triggers are never dropped: once `max_runs` batches are queued, later
/// triggers join the last one.
#[derive(Debug)]
pub struct TriggerQueue {
    max_runs: usize,
    runs: VecDeque<BTreeSet<TaskName>>,
    /// The last batch is closed; the next trigger opens a new one if there
    /// is room.
    sealed: bool,
}

impl TriggerQueue {
    /// `max_runs` is clamped to at least 1.
    pub fn new(max_runs: usize) -> Self {
        Self {
            max_runs: max_runs.max(1),
            runs: VecDeque::new(),
            sealed: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Number of queued batches.
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Record tasks triggered while a build is in progress.
    ///
    /// The tasks join the last batch unless it has been sealed and there is
    /// room for another one.
    pub fn record_trigger<I>(&mut self, tasks: I)
    where
        I: IntoIterator<Item = TaskName>,
    {
        let batch: BTreeSet<TaskName> = tasks.into_iter().collect();
        if batch.is_empty() {
            return;
        }

        let queued = self.runs.len();
        let open_new = queued == 0 || (self.sealed && queued < self.max_runs);
        match self.runs.back_mut() {
            Some(last_batch) if !open_new => {
                if self.sealed {
                    warn!(
                        current_batches = queued,
                        max_runs = self.max_runs,
                        "queue full; merging trigger into last batch"
                    );
                }
                last_batch.extend(batch);
                debug!(batch_size = last_batch.len(), "merged trigger into last queued batch");
            }
            _ => {
                debug!(batch_size = batch.len(), queued, "queued new batch");
                self.runs.push_back(batch);
            }
        }
        self.sealed = false;
    }

    /// Close the current batch; later triggers form a separate run while
    /// `max_runs` allows it.
    pub fn seal_batch(&mut self) {
        if !self.runs.is_empty() {
            self.sealed = true;
        }
    }

    /// Take the oldest batch for the next run.
    pub fn pop_next(&mut self) -> Option<BTreeSet<TaskName>> {
        let batch = self.runs.pop_front()?;
        if self.runs.is_empty() {
            self.sealed = false;
        }
        debug!(batch_size = batch.len(), remaining = self.runs.len(), "dequeued batch for next run");
        Some(batch)
    }
}
