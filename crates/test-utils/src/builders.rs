#![allow(dead_code)]

use std::path::PathBuf;

use assetdag::config::{ConfigFile, RawConfigFile, TaskConfig};
use assetdag::errors::ConfigurationError;
use assetdag::types::{OutputRoot, ProcessorKind};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
    base_dir: Option<PathBuf>,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
            base_dir: None,
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.push((name.to_string(), task));
        self
    }

    pub fn with_package(mut self, name: &str, version: &str) -> Self {
        self.config.package.name = name.to_string();
        self.config.package.version = version.to_string();
        self
    }

    pub fn with_context(mut self, key: &str, value: &str) -> Self {
        self.config.context.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn with_queue_length(mut self, len: usize) -> Self {
        self.config.config.queue_length = len;
        self
    }

    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.config.config.debounce_ms = ms;
        self
    }

    pub fn build(self) -> ConfigFile {
        self.try_build().expect("Failed to build valid config from builder")
    }

    /// Like `build`, but hands back the validation error.
    pub fn try_build(self) -> Result<ConfigFile, ConfigurationError> {
        let cfg = ConfigFile::try_from(self.config)?;
        Ok(match self.base_dir {
            Some(dir) => cfg.with_base_dir(dir),
            None => cfg,
        })
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(processor: ProcessorKind, input: &str) -> Self {
        Self {
            task: TaskConfig::new(processor, &[input], ""),
        }
    }

    pub fn input(mut self, pattern: &str) -> Self {
        self.task.input.push(pattern.to_string());
        self
    }

    pub fn output(mut self, output: &str) -> Self {
        self.task.output = PathBuf::from(output);
        self
    }

    pub fn output_root(mut self, root: OutputRoot) -> Self {
        self.task.output_root = root;
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn watch(mut self, pattern: &str) -> Self {
        let watches = self.task.watch.get_or_insert(vec![]);
        watches.push(pattern.to_string());
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.task.exclude.push(pattern.to_string());
        self
    }

    pub fn stale_skippable(mut self, val: bool) -> Self {
        self.task.stale_skippable = Some(val);
        self
    }

    pub fn fatal(mut self, val: bool) -> Self {
        self.task.fatal = val;
        self
    }

    pub fn clean_output(mut self, val: bool) -> Self {
        self.task.clean_output = Some(val);
        self
    }

    pub fn bundle(mut self, name: &str) -> Self {
        self.task.bundle = Some(name.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
