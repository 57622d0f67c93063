// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::ConfigurationError;
use crate::types::ProcessorKind;

type Result<T> = std::result::Result<T, ConfigurationError>;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = ConfigurationError;

    fn try_from(raw: RawConfigFile) -> Result<Self> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

/// Checks that need only the config itself. Dependency references and
/// cycles are checked when the task graph is built.
fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_tasks(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(ConfigurationError::Invalid(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.queue_length == 0 {
        return Err(ConfigurationError::Invalid(
            "[config].queue_length must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.config.profile_env.trim().is_empty() {
        return Err(ConfigurationError::Invalid(
            "[config].profile_env must name an environment variable".to_string(),
        ));
    }
    Ok(())
}

fn validate_tasks(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();

    for (name, task) in &cfg.task {
        if !seen.insert(name.as_str()) {
            return Err(ConfigurationError::DuplicateTask(name.clone()));
        }
        if task.input.iter().all(|p| p.trim().is_empty() || p.starts_with('!')) {
            return Err(ConfigurationError::Invalid(format!(
                "task '{name}' needs at least one non-negated `input` pattern"
            )));
        }
        if task.bundle.is_some() && task.processor != ProcessorKind::Scripts {
            return Err(ConfigurationError::Invalid(format!(
                "task '{name}': `bundle` is only valid for scripts tasks (processor = \"{}\")",
                task.processor.as_str()
            )));
        }
        if task.stale_skippable == Some(true) && task.processor.always_reruns() {
            return Err(ConfigurationError::Invalid(format!(
                "task '{name}': {} tasks always re-run and cannot be `stale_skippable`",
                task.processor.as_str()
            )));
        }
        if task.after.iter().any(|dep| dep == name) {
            return Err(ConfigurationError::Cycle {
                members: vec![name.clone()],
            });
        }
    }
    Ok(())
}
