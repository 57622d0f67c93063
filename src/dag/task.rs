// src/dag/task.rs

//! Task definitions: a named unit of work bound to a processor.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::fs::{walk_files, FileSystem};
use crate::processor::{Processor, ProcessorOptions};
use crate::types::{OutputPolicy, OutputRoot};

use super::TaskName;

/// A compiled set of glob patterns, relative to the source root.
///
/// Patterns prefixed with `!` exclude matching paths, e.g.
/// `["scss/**/*", "!scss/images/_datauri.scss"]`. A single `*` never
/// crosses a directory separator; use `**` for recursive matching.
#[derive(Clone)]
pub struct InputSpec {
    patterns: Vec<String>,
    include: GlobSet,
    exclude: Option<GlobSet>,
    base: PathBuf,
}

impl fmt::Debug for InputSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputSpec")
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl InputSpec {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, globset::Error> {
        let patterns: Vec<String> = patterns.iter().map(|p| p.as_ref().to_string()).collect();

        let mut include = GlobSetBuilder::new();
        let mut exclude = GlobSetBuilder::new();
        let mut has_exclude = false;
        let mut base = None;

        for pat in &patterns {
            if let Some(negated) = pat.strip_prefix('!') {
                exclude.add(compile_glob(negated)?);
                has_exclude = true;
            } else {
                if base.is_none() {
                    base = Some(literal_base(pat));
                }
                include.add(compile_glob(pat)?);
            }
        }

        Ok(Self {
            include: include.build()?,
            exclude: if has_exclude { Some(exclude.build()?) } else { None },
            base: base.unwrap_or_default(),
            patterns,
        })
    }

    /// Same patterns plus extra exclusions (given without the `!` prefix).
    pub fn with_exclusions<S: AsRef<str>>(patterns: &[S], exclude: &[S]) -> Result<Self, globset::Error> {
        let mut all: Vec<String> = patterns.iter().map(|p| p.as_ref().to_string()).collect();
        all.extend(exclude.iter().map(|e| format!("!{}", e.as_ref())));
        Self::new(&all)
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Directory (relative to the source root) that output paths are
    /// mirrored from: the literal prefix of the first include pattern.
    ///
    /// `js/**/*` has base `js`, `*.html` has an empty base.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Whether a path relative to the source root (forward slashes) is selected.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.include.is_match(rel_path) {
            return false;
        }
        match &self.exclude {
            Some(exclude) => !exclude.is_match(rel_path),
            None => true,
        }
    }

    /// Expand the patterns against the files currently under `root`.
    ///
    /// Returns absolute (root-joined) paths in sorted order.
    pub fn resolve(&self, fs: &dyn FileSystem, root: &Path) -> Result<Vec<PathBuf>> {
        let files = walk_files(fs, root)?
            .into_iter()
            .filter(|path| {
                path.strip_prefix(root)
                    .map(|rel| self.matches(&rel.to_string_lossy().replace('\\', "/")))
                    .unwrap_or(false)
            })
            .collect();
        Ok(files)
    }
}

fn compile_glob(pattern: &str) -> Result<globset::Glob, globset::Error> {
    GlobBuilder::new(pattern).literal_separator(true).build()
}

fn literal_base(pattern: &str) -> PathBuf {
    let parts: Vec<&str> = pattern.split('/').collect();
    let mut base = PathBuf::new();
    for (i, part) in parts.iter().enumerate() {
        let is_last = i + 1 == parts.len();
        if is_last || part.contains(['*', '?', '[', '{']) {
            break;
        }
        base.push(part);
    }
    base
}

/// A named, dependency-aware unit of build work.
///
/// Dependencies are not stored here; they are edges of the owning
/// [`TaskGraph`](super::TaskGraph). The profile-specific behaviour lives in
/// `options` and is fixed when the task is constructed.
#[derive(Clone)]
pub struct Task {
    pub name: TaskName,
    pub inputs: InputSpec,
    /// Patterns that re-trigger this task in watch mode.
    pub watch: InputSpec,
    /// Output location, relative to `output_root`.
    pub output: PathBuf,
    pub output_root: OutputRoot,
    pub processor: Arc<dyn Processor>,
    pub options: ProcessorOptions,
    pub stale_skippable: bool,
    pub output_policy: OutputPolicy,
    /// Escalate every processing error of this task to fatal.
    pub fatal: bool,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("processor", &self.processor.kind())
            .field("inputs", &self.inputs.patterns())
            .field("output", &self.output)
            .field("stale_skippable", &self.stale_skippable)
            .field("output_policy", &self.output_policy)
            .finish_non_exhaustive()
    }
}

impl Task {
    /// New task watching its own inputs, with additive output and default
    /// options.
    pub fn new(
        name: impl Into<TaskName>,
        processor: Arc<dyn Processor>,
        inputs: InputSpec,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            watch: inputs.clone(),
            inputs,
            output: output.into(),
            output_root: OutputRoot::Build,
            processor,
            options: ProcessorOptions::default(),
            stale_skippable: false,
            output_policy: OutputPolicy::Additive,
            fatal: false,
        }
    }

    pub fn watch(mut self, watch: InputSpec) -> Self {
        self.watch = watch;
        self
    }

    pub fn options(mut self, options: ProcessorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn output_root(mut self, root: OutputRoot) -> Self {
        self.output_root = root;
        self
    }

    pub fn stale_skippable(mut self, yes: bool) -> Self {
        self.stale_skippable = yes;
        self
    }

    pub fn output_policy(mut self, policy: OutputPolicy) -> Self {
        self.output_policy = policy;
        self
    }

    pub fn fatal(mut self, yes: bool) -> Self {
        self.fatal = yes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_star_does_not_cross_directories() {
        let spec = InputSpec::new(&["*.html"]).unwrap();
        assert!(spec.matches("index.html"));
        assert!(!spec.matches("template/header.html"));
    }

    #[test]
    fn negated_patterns_exclude() {
        let spec = InputSpec::new(&["scss/**/*", "!scss/images/_datauri.scss"]).unwrap();
        assert!(spec.matches("scss/main.scss"));
        assert!(spec.matches("scss/partials/_nav.scss"));
        assert!(!spec.matches("scss/images/_datauri.scss"));
    }

    #[test]
    fn base_is_literal_prefix_of_first_include() {
        assert_eq!(InputSpec::new(&["js/**/*"]).unwrap().base(), Path::new("js"));
        assert_eq!(InputSpec::new(&["*.html"]).unwrap().base(), Path::new(""));
        assert_eq!(
            InputSpec::new(&["scss/main.scss"]).unwrap().base(),
            Path::new("scss")
        );
        assert_eq!(
            InputSpec::new(&["!x", "images/inline/*"]).unwrap().base(),
            Path::new("images/inline")
        );
    }

    #[test]
    fn resolve_returns_sorted_absolute_paths() {
        let fs = crate::fs::MockFileSystem::new();
        fs.add_file("/src/images/b.png", "b");
        fs.add_file("/src/images/a.png", "a");
        fs.add_file("/src/images/inline/icon.png", "i");

        let spec = InputSpec::new(&["images/*.*"]).unwrap();
        let files = spec.resolve(&fs, Path::new("/src")).unwrap();
        assert_eq!(
            files,
            vec![PathBuf::from("/src/images/a.png"), PathBuf::from("/src/images/b.png")]
        );
    }
}
