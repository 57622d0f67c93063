// src/engine/staleness.rs

//! Timestamp-based staleness tracking.
//!
//! The tracker is an optimisation only. It errs towards "stale": a missing
//! record, an unreadable input, a changed input set, or an input modified at
//! or after the recorded build time all force a rebuild.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

use crate::fs::FileSystem;

/// What the tracker remembers about the last successful build of an output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalenessRecord {
    /// When the successful build started.
    pub built_at: SystemTime,
    /// The input files that contributed to it.
    pub inputs: BTreeSet<PathBuf>,
}

#[derive(Debug, Default)]
pub struct StalenessTracker {
    records: HashMap<PathBuf, StalenessRecord>,
}

impl StalenessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `output` must be rebuilt from `inputs`.
    pub fn is_stale(&self, fs: &dyn FileSystem, inputs: &[PathBuf], output: &Path) -> bool {
        let Some(record) = self.records.get(output) else {
            debug!(output = ?output, "no staleness record");
            return true;
        };

        if inputs.len() != record.inputs.len() || inputs.iter().any(|i| !record.inputs.contains(i)) {
            debug!(output = ?output, "input set changed since last build");
            return true;
        }

        for input in inputs {
            match fs.modified(input) {
                Ok(mtime) if mtime < record.built_at => {}
                Ok(_) => {
                    debug!(output = ?output, input = ?input, "input modified since last build");
                    return true;
                }
                Err(_) => return true,
            }
        }

        false
    }

    /// Record a successful build of `output` from `inputs`, started at `at`.
    pub fn record_built(&mut self, output: &Path, inputs: &[PathBuf], at: SystemTime) {
        self.records.insert(
            output.to_path_buf(),
            StalenessRecord {
                built_at: at,
                inputs: inputs.iter().cloned().collect(),
            },
        );
    }

    pub fn record(&self, output: &Path) -> Option<&StalenessRecord> {
        self.records.get(output)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
