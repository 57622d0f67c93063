// src/processor/mod.rs

//! Processors: the content transformations a task delegates to.
//!
//! The orchestrator treats a processor as an opaque, synchronous call
//! (`run(inputs, options) -> outputs | ProcessingError`). Each built-in
//! processor covers one role of the fixed set in [`ProcessorKind`].
//!
//! Profile-conditional behaviour is not looked up inside `run`: it arrives
//! pre-selected in [`ProcessorOptions::behavior`], chosen once per task
//! when the pipeline is constructed.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::errors::ProcessingError;
use crate::fs::FileSystem;
use crate::types::{Profile, ProcessorKind};

pub mod assets;
pub mod datauri;
pub mod markup;
pub mod scripts;
pub mod styles;

pub use assets::CopyProcessor;
pub use datauri::DataUriProcessor;
pub use markup::MarkupProcessor;
pub use scripts::ScriptsProcessor;
pub use styles::StylesProcessor;

/// Everything a processor may read during one invocation.
#[derive(Debug, Clone, Copy)]
pub struct ProcessorInputs<'a> {
    /// Name of the invoking task (for diagnostics).
    pub task: &'a str,
    /// Resolved input files, absolute and sorted.
    pub files: &'a [PathBuf],
    /// Absolute directory that output paths are mirrored from.
    pub base: &'a Path,
    /// Absolute output location (a directory, or a file for single-artifact
    /// processors).
    pub output: &'a Path,
    pub fs: &'a dyn FileSystem,
}

impl ProcessorInputs<'_> {
    /// Output path for `file`, mirroring its position below `base`.
    pub fn mirrored_output(&self, file: &Path) -> PathBuf {
        match file.strip_prefix(self.base) {
            Ok(rel) => self.output.join(rel),
            Err(_) => self
                .output
                .join(file.file_name().unwrap_or(file.as_os_str())),
        }
    }
}

/// A transformation from input assets to output assets.
pub trait Processor: Send + Sync + Debug {
    fn kind(&self) -> ProcessorKind;

    /// Transform `inputs`, returning the output paths actually written.
    fn run(
        &self,
        inputs: &ProcessorInputs<'_>,
        options: &ProcessorOptions,
    ) -> Result<Vec<PathBuf>, ProcessingError>;
}

/// Development behaviour: fast, debuggable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevBehavior {
    /// Run static checks; failures abort the build.
    pub lint: bool,
    /// Log before/after byte counts.
    pub report_sizes: bool,
}

/// Production behaviour: shipped-artifact quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProdBehavior {
    pub minify: bool,
    pub strip_debug: bool,
    /// Concatenate inputs in dependency order into one bundle.
    pub concatenate: bool,
}

/// Profile-specific strategy, selected once per task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Dev(DevBehavior),
    Prod(ProdBehavior),
}

impl Behavior {
    /// Policy for a processor kind under a profile.
    pub fn for_profile(profile: Profile, kind: ProcessorKind) -> Self {
        match profile {
            Profile::Development => Behavior::Dev(DevBehavior {
                lint: kind == ProcessorKind::Scripts,
                report_sizes: true,
            }),
            Profile::Production => Behavior::Prod(ProdBehavior {
                minify: matches!(
                    kind,
                    ProcessorKind::Markup | ProcessorKind::Styles | ProcessorKind::Scripts
                ),
                strip_debug: kind == ProcessorKind::Scripts,
                concatenate: kind == ProcessorKind::Scripts,
            }),
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Behavior::Dev(_))
    }

    pub fn minify(&self) -> bool {
        matches!(self, Behavior::Prod(ProdBehavior { minify: true, .. }))
    }

    pub fn report_sizes(&self) -> bool {
        matches!(self, Behavior::Dev(DevBehavior { report_sizes: true, .. }))
    }
}

impl Default for Behavior {
    fn default() -> Self {
        Behavior::Dev(DevBehavior {
            lint: false,
            report_sizes: false,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessorOptions {
    pub behavior: Behavior,
    /// Values available to markup templating.
    pub context: Arc<BTreeMap<String, String>>,
    /// Bundle file name for concatenating processors.
    pub bundle: Option<String>,
}

impl ProcessorOptions {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            ..Self::default()
        }
    }

    pub fn with_context(mut self, context: Arc<BTreeMap<String, String>>) -> Self {
        self.context = context;
        self
    }

    pub fn with_bundle(mut self, bundle: Option<String>) -> Self {
        self.bundle = bundle;
        self
    }
}

/// The built-in processor for a kind.
pub fn builtin(kind: ProcessorKind) -> Arc<dyn Processor> {
    match kind {
        ProcessorKind::Markup => Arc::new(MarkupProcessor),
        ProcessorKind::Styles => Arc::new(StylesProcessor),
        ProcessorKind::Scripts => Arc::new(ScriptsProcessor),
        ProcessorKind::Datauri => Arc::new(DataUriProcessor::default()),
        ProcessorKind::Images | ProcessorKind::Fonts | ProcessorKind::Copy => {
            Arc::new(CopyProcessor::new(kind))
        }
    }
}

/// Log a before/after size diagnostic when the behaviour asks for it.
pub(crate) fn report_size(options: &ProcessorOptions, task: &str, file: &Path, before: usize, after: usize) {
    if options.behavior.report_sizes() {
        info!(task = %task, file = ?file, before, after, "size");
    }
}

/// Write `contents` through the processor's filesystem, mapping failures.
pub(crate) fn write_output(
    inputs: &ProcessorInputs<'_>,
    path: &Path,
    contents: &[u8],
) -> Result<(), ProcessingError> {
    inputs
        .fs
        .write(path, contents)
        .map_err(ProcessingError::recoverable)
}
