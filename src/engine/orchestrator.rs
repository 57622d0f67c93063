// src/engine/orchestrator.rs

//! Executes the task graph wave by wave.
//!
//! Tasks within a wave run concurrently on the blocking pool; waves run
//! strictly one after another, so every dependency's output is written and
//! flushed before a dependent starts. A single build lock serialises builds,
//! which keeps the staleness tracker and output directories free of
//! interleaved writers.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Instant, SystemTime};

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::dag::{Task, TaskGraph, TaskName};
use crate::errors::{ConfigurationError, ProcessingError};
use crate::fs::FileSystem;
use crate::processor::ProcessorInputs;
use crate::types::{OutputPolicy, OutputRoot, Profile};

use super::result::{BuildResult, TaskReport, TaskStatus};
use super::staleness::{StalenessRecord, StalenessTracker};

/// Immutable build configuration, constructed once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
    pub profile: Profile,
    pub source_root: PathBuf,
    pub build_root: PathBuf,
}

impl BuildSettings {
    pub fn new(profile: Profile, source_root: impl Into<PathBuf>, build_root: impl Into<PathBuf>) -> Self {
        Self {
            profile,
            source_root: source_root.into(),
            build_root: build_root.into(),
        }
    }

    /// Absolute output location of a task.
    pub fn output_path(&self, task: &Task) -> PathBuf {
        match task.output_root {
            OutputRoot::Build => self.build_root.join(&task.output),
            OutputRoot::Source => self.source_root.join(&task.output),
        }
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    graph: Arc<TaskGraph>,
    settings: Arc<BuildSettings>,
    fs: Arc<dyn FileSystem>,
    tracker: Arc<Mutex<StalenessTracker>>,
    build_lock: Arc<tokio::sync::Mutex<()>>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("settings", &self.settings)
            .field("tasks", &self.graph.len())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Bind a validated graph to a profile and filesystem.
    pub fn new(
        graph: TaskGraph,
        settings: BuildSettings,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self, ConfigurationError> {
        graph.validate()?;
        Ok(Self {
            graph: Arc::new(graph),
            settings: Arc::new(settings),
            fs,
            tracker: Arc::new(Mutex::new(StalenessTracker::new())),
            build_lock: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    pub fn graph(&self) -> &Arc<TaskGraph> {
        &self.graph
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    pub fn profile(&self) -> Profile {
        self.settings.profile
    }

    /// Output location of a task, if it exists.
    pub fn output_path(&self, task: &str) -> Option<PathBuf> {
        self.graph.task(task).map(|t| self.settings.output_path(t))
    }

    /// Snapshot of the staleness record for an output location.
    pub fn staleness_record(&self, output: &Path) -> Option<StalenessRecord> {
        self.tracker().ok()?.record(output).cloned()
    }

    fn tracker(&self) -> Result<MutexGuard<'_, StalenessTracker>, ProcessingError> {
        self.tracker
            .lock()
            .map_err(|_| ProcessingError::Recoverable("staleness tracker lock poisoned".to_string()))
    }

    /// Build every task in the graph.
    pub async fn build(&self) -> Result<BuildResult, ConfigurationError> {
        let all: BTreeSet<TaskName> = self.graph.task_names().map(str::to_string).collect();
        self.build_tasks(&all).await
    }

    /// Build only `selected`; dependencies outside the selection are assumed
    /// to be up to date.
    pub async fn build_tasks(&self, selected: &BTreeSet<TaskName>) -> Result<BuildResult, ConfigurationError> {
        self.graph.validate()?;
        let _guard = self.build_lock.lock().await;

        let profile = self.settings.profile;
        let started = Instant::now();
        info!(%profile, tasks = selected.len(), "build started");

        let mut reports: Vec<TaskReport> = Vec::with_capacity(selected.len());
        let mut failed: HashSet<TaskName> = HashSet::new();
        let mut fatal_task: Option<TaskName> = None;

        for (wave_idx, wave) in self.graph.execution_order_for(selected).enumerate() {
            if fatal_task.is_some() {
                reports.extend(wave.into_iter().map(|name| TaskReport {
                    name,
                    wave: wave_idx,
                    status: TaskStatus::NotRun,
                }));
                continue;
            }

            debug!(wave = wave_idx, tasks = ?wave, "starting wave");
            let mut wave_reports = Vec::with_capacity(wave.len());
            let mut set = JoinSet::new();

            for name in &wave {
                let blocked_by = self
                    .graph
                    .dependencies_of(name)
                    .iter()
                    .find(|dep| failed.contains(dep.as_str()));
                if let Some(dep) = blocked_by {
                    warn!(task = %name, dependency = %dep, "not run: dependency failed");
                    wave_reports.push(TaskReport {
                        name: name.clone(),
                        wave: wave_idx,
                        status: TaskStatus::Blocked {
                            dependency: dep.clone(),
                        },
                    });
                    continue;
                }

                let Some(task) = self.graph.task(name).cloned() else {
                    continue;
                };
                let this = self.clone();
                set.spawn(async move {
                    let task_name = task.name.clone();
                    let status = match tokio::task::spawn_blocking(move || this.run_task(&task)).await {
                        Ok(status) => status,
                        Err(err) => TaskStatus::Failed {
                            error: ProcessingError::Recoverable(format!("task worker failed: {err}")),
                        },
                    };
                    (task_name, status)
                });
            }

            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((name, status)) => {
                        wave_reports.push(TaskReport {
                            name,
                            wave: wave_idx,
                            status,
                        });
                    }
                    Err(err) => error!(wave = wave_idx, error = %err, "wave worker failed to join"),
                }
            }

            wave_reports.sort_by_key(|r| wave.iter().position(|n| n == &r.name));
            for report in &wave_reports {
                match &report.status {
                    TaskStatus::Failed { error } => {
                        failed.insert(report.name.clone());
                        if error.is_fatal() && fatal_task.is_none() {
                            fatal_task = Some(report.name.clone());
                        }
                    }
                    TaskStatus::Blocked { .. } => {
                        failed.insert(report.name.clone());
                    }
                    _ => {}
                }
            }
            reports.extend(wave_reports);

            if let Some(task) = &fatal_task {
                error!(task = %task, wave = wave_idx, "fatal error; remaining waves aborted");
            }
        }

        let result = BuildResult::from_reports(profile, reports, fatal_task);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        if result.success {
            info!(%profile, elapsed_ms, "build finished");
        } else {
            warn!(%profile, elapsed_ms, "build finished with errors");
        }
        Ok(result)
    }

    /// Run one task to completion on the current (blocking) thread.
    fn run_task(&self, task: &Task) -> TaskStatus {
        match self.try_run_task(task) {
            Ok(status) => status,
            Err(error) => {
                let error = if task.fatal { error.escalate() } else { error };
                if error.is_fatal() {
                    error!(task = %task.name, error = %error, "task failed (fatal)");
                } else {
                    warn!(task = %task.name, error = %error, "task failed");
                }
                TaskStatus::Failed { error }
            }
        }
    }

    fn try_run_task(&self, task: &Task) -> Result<TaskStatus, ProcessingError> {
        let fs = self.fs.as_ref();
        let started_at = SystemTime::now();
        let timer = Instant::now();

        let output = self.settings.output_path(task);
        let files = task
            .inputs
            .resolve(fs, &self.settings.source_root)
            .map_err(ProcessingError::recoverable)?;

        let skippable = task.stale_skippable && !task.processor.kind().always_reruns();
        if skippable && !self.tracker()?.is_stale(fs, &files, &output) {
            info!(task = %task.name, "up to date; skipped");
            return Ok(TaskStatus::Skipped);
        }

        if task.output_policy == OutputPolicy::Clean {
            debug!(task = %task.name, output = ?output, "clearing previous output");
            fs.remove_all(&output).map_err(ProcessingError::recoverable)?;
        }

        let base = self.settings.source_root.join(task.inputs.base());
        let inputs = ProcessorInputs {
            task: &task.name,
            files: &files,
            base: &base,
            output: &output,
            fs,
        };
        let outputs = task.processor.run(&inputs, &task.options)?;

        self.tracker()?.record_built(&output, &files, started_at);

        let duration = timer.elapsed();
        info!(
            task = %task.name,
            elapsed_ms = duration.as_millis() as u64,
            outputs = outputs.len(),
            "task finished"
        );
        Ok(TaskStatus::Succeeded { outputs, duration })
    }
}
