// src/engine/result.rs

use std::path::PathBuf;
use std::time::Duration;

use crate::dag::TaskName;
use crate::errors::ProcessingError;
use crate::types::Profile;

/// Outcome of one task within a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Succeeded {
        outputs: Vec<PathBuf>,
        duration: Duration,
    },
    /// Stale-skippable task whose inputs did not change.
    Skipped,
    Failed {
        error: ProcessingError,
    },
    /// Not run because a dependency failed or was itself blocked.
    Blocked {
        dependency: TaskName,
    },
    /// Not run because a fatal error aborted the build earlier.
    NotRun,
}

impl TaskStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, TaskStatus::Succeeded { .. } | TaskStatus::Skipped)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub name: TaskName,
    /// Index of the execution wave the task belonged to.
    pub wave: usize,
    pub status: TaskStatus,
}

/// Aggregated result of one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    pub profile: Profile,
    /// Per-task reports in execution order.
    pub tasks: Vec<TaskReport>,
    pub success: bool,
    /// Task whose fatal error aborted the build, if any.
    pub fatal_task: Option<TaskName>,
}

impl BuildResult {
    pub fn from_reports(profile: Profile, tasks: Vec<TaskReport>, fatal_task: Option<TaskName>) -> Self {
        let success = fatal_task.is_none() && tasks.iter().all(|t| t.status.is_ok());
        Self {
            profile,
            tasks,
            success,
            fatal_task,
        }
    }

    pub fn status_of(&self, task: &str) -> Option<&TaskStatus> {
        self.tasks.iter().find(|t| t.name == task).map(|t| &t.status)
    }

    /// Names of tasks that actually ran their processor successfully.
    pub fn executed(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|t| matches!(t.status, TaskStatus::Succeeded { .. }))
            .map(|t| t.name.as_str())
            .collect()
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Skipped)
            .map(|t| t.name.as_str())
            .collect()
    }

    /// All output paths written by succeeded tasks.
    pub fn changed_outputs(&self) -> Vec<PathBuf> {
        self.tasks
            .iter()
            .filter_map(|t| match &t.status {
                TaskStatus::Succeeded { outputs, .. } => Some(outputs.iter().cloned()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// The task to blame for a failed build: the fatal task if there is one,
    /// otherwise the first failed task.
    pub fn failed_task(&self) -> Option<(&str, &ProcessingError)> {
        let report = match &self.fatal_task {
            Some(name) => self.tasks.iter().find(|t| &t.name == name),
            None => self
                .tasks
                .iter()
                .find(|t| matches!(t.status, TaskStatus::Failed { .. })),
        }?;
        match &report.status {
            TaskStatus::Failed { error } => Some((report.name.as_str(), error)),
            _ => None,
        }
    }
}
