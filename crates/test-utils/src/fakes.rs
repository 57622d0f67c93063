use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use assetdag::dag::{InputSpec, Task, TaskGraph};
use assetdag::engine::{BuildBackend, BuildFuture, BuildResult, TaskReport, TaskStatus};
use assetdag::errors::{ConfigurationError, ProcessingError};
use assetdag::processor::{Processor, ProcessorInputs, ProcessorOptions};
use assetdag::reload::ReloadNotifier;
use assetdag::types::{ProcessorKind, Profile};

/// How a [`FakeProcessor`] behaves when run.
#[derive(Debug, Clone)]
pub enum FakeOutcome {
    /// Write `<output>/<task>.out` listing the input file names.
    Succeed,
    FailRecoverable(String),
    FailFatal(String),
}

/// One recorded processor invocation.
#[derive(Debug, Clone)]
pub struct FakeRun {
    pub task: String,
    pub inputs: Vec<PathBuf>,
    pub started: Instant,
    pub finished: Instant,
}

/// A processor that:
/// - records each invocation (task, inputs, start/end time)
/// - optionally sleeps to make overlap observable
/// - succeeds by writing a deterministic output file, or fails as told.
#[derive(Debug, Clone)]
pub struct FakeProcessor {
    outcome: FakeOutcome,
    delay: Duration,
    runs: Arc<Mutex<Vec<FakeRun>>>,
}

impl FakeProcessor {
    pub fn new(outcome: FakeOutcome, runs: Arc<Mutex<Vec<FakeRun>>>) -> Self {
        Self {
            outcome,
            delay: Duration::ZERO,
            runs,
        }
    }

    pub fn succeeding(runs: Arc<Mutex<Vec<FakeRun>>>) -> Self {
        Self::new(FakeOutcome::Succeed, runs)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Processor for FakeProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Copy
    }

    fn run(
        &self,
        inputs: &ProcessorInputs<'_>,
        _options: &ProcessorOptions,
    ) -> Result<Vec<PathBuf>, ProcessingError> {
        let started = Instant::now();
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        let result = match &self.outcome {
            FakeOutcome::Succeed => {
                let out = inputs.output.join(format!("{}.out", inputs.task));
                let listing = inputs
                    .files
                    .iter()
                    .filter_map(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("\n");
                inputs
                    .fs
                    .write(&out, listing.as_bytes())
                    .map_err(ProcessingError::recoverable)?;
                Ok(vec![out])
            }
            FakeOutcome::FailRecoverable(msg) => Err(ProcessingError::Recoverable(msg.clone())),
            FakeOutcome::FailFatal(msg) => Err(ProcessingError::Fatal(msg.clone())),
        };

        self.runs.lock().unwrap().push(FakeRun {
            task: inputs.task.to_string(),
            inputs: inputs.files.to_vec(),
            started,
            finished: Instant::now(),
        });
        result
    }
}

/// Task `name` reading `<name>/*` and writing to `<name>/` under the build
/// root, backed by `processor`.
pub fn fake_task(name: &str, processor: FakeProcessor) -> Task {
    let inputs = InputSpec::new(&[format!("{name}/*")]).expect("valid glob");
    Task::new(name, Arc::new(processor), inputs, name)
}

/// Graph from `(task, dependencies)` pairs, every task backed by a clone of
/// `processor` unless overridden in `overrides`.
pub fn fake_graph(
    edges: &[(&str, &[&str])],
    processor: &FakeProcessor,
    overrides: &[(&str, FakeProcessor)],
) -> TaskGraph {
    let mut graph = TaskGraph::new();
    for (name, _) in edges {
        let proc = overrides
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p.clone())
            .unwrap_or_else(|| processor.clone());
        graph.add_task(fake_task(name, proc)).expect("unique task");
    }
    for (name, deps) in edges {
        for dep in *deps {
            graph.add_dependency(name, dep).expect("known dependency");
        }
    }
    graph
}

/// A build backend that records requested task sets and reports every task
/// as succeeded (with output `build/<task>`) after an optional delay.
#[derive(Debug, Clone, Default)]
pub struct FakeBuildBackend {
    builds: Arc<Mutex<Vec<BTreeSet<String>>>>,
    delay: Duration,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl FakeBuildBackend {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Task sets of every build started so far, in order.
    pub fn builds(&self) -> Vec<BTreeSet<String>> {
        self.builds.lock().unwrap().clone()
    }

    pub fn build_count(&self) -> usize {
        self.builds.lock().unwrap().len()
    }

    /// Highest number of builds observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl BuildBackend for FakeBuildBackend {
    fn start_build(&self, tasks: BTreeSet<String>) -> BuildFuture {
        self.builds.lock().unwrap().push(tasks.clone());
        let delay = self.delay;
        let in_flight = Arc::clone(&self.in_flight);
        let max_in_flight = Arc::clone(&self.max_in_flight);

        Box::pin(async move {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            max_in_flight.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(delay).await;

            let reports = tasks
                .into_iter()
                .map(|name| TaskReport {
                    status: TaskStatus::Succeeded {
                        outputs: vec![PathBuf::from("build").join(&name)],
                        duration: delay,
                    },
                    name,
                    wave: 0,
                })
                .collect();

            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok::<_, ConfigurationError>(BuildResult::from_reports(Profile::Development, reports, None))
        })
    }
}

/// Notifier that records every change set it is given.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    calls: Arc<Mutex<Vec<Vec<PathBuf>>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Vec<PathBuf>> {
        self.calls.lock().unwrap().clone()
    }
}

impl ReloadNotifier for RecordingNotifier {
    fn notify(&self, changed: &[PathBuf]) {
        self.calls.lock().unwrap().push(changed.to_vec());
    }
}
