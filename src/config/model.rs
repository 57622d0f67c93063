// src/config/model.rs

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::types::{OutputRoot, ProcessorKind};

/// Configuration exactly as read from TOML, before validation.
///
/// ```toml
/// [package]
/// name = "my-site"
/// version = "1.2.0"
///
/// [config]
/// source_root = "source"
/// build_root = "build"
///
/// [context]
/// analytics_id = "UA-0000"
///
/// [task.sass]
/// processor = "styles"
/// input = ["scss/main.scss"]
/// watch = ["scss/**/*", "!scss/images/_datauri.scss"]
/// output = "css"
/// after = ["imguri"]
/// ```
///
/// All sections are optional except that at least one task is required by
/// validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub package: PackageSection,

    #[serde(default)]
    pub config: ConfigSection,

    /// Extra values exposed to markup templates.
    #[serde(default)]
    pub context: BTreeMap<String, String>,

    /// Tasks from `[task.<name>]`, in document order.
    #[serde(default, deserialize_with = "ordered_tasks")]
    pub task: Vec<(String, TaskConfig)>,
}

/// Validated configuration. Obtain via `ConfigFile::try_from(raw)` or the
/// loader.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub package: PackageSection,
    pub config: ConfigSection,
    pub context: BTreeMap<String, String>,
    pub tasks: Vec<(String, TaskConfig)>,
    /// Directory relative roots are resolved against (the config file's
    /// directory).
    pub base_dir: PathBuf,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            package: raw.package,
            config: raw.config,
            context: raw.context,
            tasks: raw.task,
            base_dir: PathBuf::from("."),
        }
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    pub fn task(&self, name: &str) -> Option<&TaskConfig> {
        self.tasks.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    pub fn source_root(&self) -> PathBuf {
        resolve(&self.base_dir, &self.config.source_root)
    }

    pub fn build_root(&self) -> PathBuf {
        resolve(&self.base_dir, &self.config.build_root)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.config.debounce_ms)
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() || base == Path::new(".") {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// `[package]`: read-only project metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageSection {
    #[serde(default = "default_package_name")]
    pub name: String,
    #[serde(default = "default_package_version")]
    pub version: String,
    #[serde(default)]
    pub author: String,
}

fn default_package_name() -> String {
    "assetdag".to_string()
}

fn default_package_version() -> String {
    "0.0.0".to_string()
}

impl Default for PackageSection {
    fn default() -> Self {
        Self {
            name: default_package_name(),
            version: default_package_version(),
            author: String::new(),
        }
    }
}

/// `[config]`: global behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    #[serde(default = "default_source_root")]
    pub source_root: PathBuf,

    #[serde(default = "default_build_root")]
    pub build_root: PathBuf,

    /// Environment variable whose value selects the profile. Only the
    /// literal `production` selects production.
    #[serde(default = "default_profile_env")]
    pub profile_env: String,

    /// Quiet period after the first change before a rebuild starts.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Maximum number of queued re-runs to remember while a build runs.
    #[serde(default = "default_queue_length")]
    pub queue_length: usize,

    /// Ignore change events whose file content did not change.
    #[serde(default)]
    pub use_hash: bool,

    /// Shell command run after each rebuild that changed outputs.
    #[serde(default)]
    pub reload_command: Option<String>,
}

fn default_source_root() -> PathBuf {
    PathBuf::from("source")
}

fn default_build_root() -> PathBuf {
    PathBuf::from("build")
}

fn default_profile_env() -> String {
    "NODE_ENV".to_string()
}

fn default_debounce_ms() -> u64 {
    200
}

fn default_queue_length() -> usize {
    1
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            source_root: default_source_root(),
            build_root: default_build_root(),
            profile_env: default_profile_env(),
            debounce_ms: default_debounce_ms(),
            queue_length: default_queue_length(),
            use_hash: false,
            reload_command: None,
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    pub processor: ProcessorKind,

    /// Input globs relative to the source root. `!` negates.
    pub input: Vec<String>,

    /// Globs that trigger this task in watch mode. Defaults to `input`.
    #[serde(default)]
    pub watch: Option<Vec<String>>,

    /// Extra exclusions applied to both `input` and `watch`.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Output directory (or file, for `datauri`) relative to the output root.
    #[serde(default)]
    pub output: PathBuf,

    #[serde(default)]
    pub output_root: OutputRoot,

    /// Dependency list: this task runs after all tasks listed here.
    #[serde(default)]
    pub after: Vec<String>,

    /// Skip the task when its inputs are older than the last build.
    /// Defaults per processor kind.
    #[serde(default)]
    pub stale_skippable: Option<bool>,

    /// Any failure of this task aborts the whole build.
    #[serde(default)]
    pub fatal: bool,

    /// Empty the output directory before writing. Defaults to true only for
    /// production scripts bundles.
    #[serde(default)]
    pub clean_output: Option<bool>,

    /// Bundle file name for production scripts (default `main.js`).
    #[serde(default)]
    pub bundle: Option<String>,
}

impl TaskConfig {
    pub fn new<S: AsRef<str>>(processor: ProcessorKind, input: &[S], output: impl Into<PathBuf>) -> Self {
        Self {
            processor,
            input: input.iter().map(|s| s.as_ref().to_string()).collect(),
            watch: None,
            exclude: Vec::new(),
            output: output.into(),
            output_root: OutputRoot::default(),
            after: Vec::new(),
            stale_skippable: None,
            fatal: false,
            clean_output: None,
            bundle: None,
        }
    }

    pub fn effective_stale_skippable(&self) -> bool {
        self.stale_skippable
            .unwrap_or_else(|| self.processor.default_stale_skippable())
    }
}

/// Deserialize `[task.*]` tables keeping the order they appear in.
fn ordered_tasks<'de, D>(deserializer: D) -> Result<Vec<(String, TaskConfig)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct TaskTableVisitor;

    impl<'de> Visitor<'de> for TaskTableVisitor {
        type Value = Vec<(String, TaskConfig)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a table of task definitions")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut tasks = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, task)) = map.next_entry::<String, TaskConfig>()? {
                tasks.push((name, task));
            }
            Ok(tasks)
        }
    }

    deserializer.deserialize_map(TaskTableVisitor)
}
