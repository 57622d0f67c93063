// src/pipeline.rs

//! Turns a validated [`ConfigFile`] into a task graph bound to a profile.
//!
//! Everything profile-specific (processor behaviour, markup context, output
//! policy) is decided here, once, so the orchestrator never branches on the
//! profile itself.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::{ConfigFile, TaskConfig};
use crate::dag::{InputSpec, Task, TaskGraph};
use crate::engine::BuildSettings;
use crate::errors::ConfigurationError;
use crate::processor::{builtin, Behavior, ProcessorOptions};
use crate::types::{OutputPolicy, ProcessorKind, Profile};

/// Build and validate the task graph for `profile`.
///
/// Unknown `after` references and cycles are reported here, before any
/// build is attempted.
pub fn build_graph(cfg: &ConfigFile, profile: Profile) -> Result<TaskGraph, ConfigurationError> {
    let context = Arc::new(markup_context(cfg, profile));
    let mut graph = TaskGraph::new();

    for (name, task_cfg) in &cfg.tasks {
        graph.add_task(build_task(name, task_cfg, profile, &context)?)?;
    }

    for (name, task_cfg) in &cfg.tasks {
        for dep in &task_cfg.after {
            graph.add_dependency(name, dep)?;
        }
    }

    graph.validate()?;
    debug!(tasks = graph.len(), %profile, "task graph built");
    Ok(graph)
}

/// Roots and profile for the orchestrator.
pub fn build_settings(cfg: &ConfigFile, profile: Profile) -> BuildSettings {
    BuildSettings::new(profile, cfg.source_root(), cfg.build_root())
}

/// Resolve the profile from the configured environment variable.
pub fn resolve_profile(cfg: &ConfigFile) -> Profile {
    Profile::from_env(&cfg.config.profile_env)
}

/// `"{name} {version}, {profile} build"`.
pub fn startup_line(cfg: &ConfigFile, profile: Profile) -> String {
    format!("{} {}, {} build", cfg.package.name, cfg.package.version, profile)
}

/// Values available to `<!-- @echo -->` and `<!-- @if -->` directives.
///
/// `[context]` entries override the package metadata but never `devBuild`.
pub fn markup_context(cfg: &ConfigFile, profile: Profile) -> BTreeMap<String, String> {
    let mut ctx = BTreeMap::new();
    ctx.insert("name".to_string(), cfg.package.name.clone());
    ctx.insert("version".to_string(), cfg.package.version.clone());
    ctx.insert("author".to_string(), cfg.package.author.clone());
    ctx.extend(cfg.context.iter().map(|(k, v)| (k.clone(), v.clone())));
    ctx.insert("devBuild".to_string(), profile.is_development().to_string());
    ctx
}

fn build_task(
    name: &str,
    cfg: &TaskConfig,
    profile: Profile,
    context: &Arc<BTreeMap<String, String>>,
) -> Result<Task, ConfigurationError> {
    let inputs = InputSpec::with_exclusions(&cfg.input, &cfg.exclude)
        .map_err(|e| invalid_glob(name, "input", e))?;
    let watch = match &cfg.watch {
        Some(patterns) => InputSpec::with_exclusions(patterns, &cfg.exclude)
            .map_err(|e| invalid_glob(name, "watch", e))?,
        None => inputs.clone(),
    };

    let options = ProcessorOptions::new(Behavior::for_profile(profile, cfg.processor))
        .with_context(Arc::clone(context))
        .with_bundle(cfg.bundle.clone());

    let task = Task::new(name, builtin(cfg.processor), inputs, cfg.output.clone())
        .watch(watch)
        .options(options)
        .output_root(cfg.output_root)
        .stale_skippable(cfg.effective_stale_skippable())
        .output_policy(output_policy(cfg, profile))
        .fatal(cfg.fatal);
    Ok(task)
}

/// Production script bundles replace their output directory; everything
/// else is additive unless configured otherwise.
fn output_policy(cfg: &TaskConfig, profile: Profile) -> OutputPolicy {
    let clean = cfg
        .clean_output
        .unwrap_or(cfg.processor == ProcessorKind::Scripts && profile == Profile::Production);
    if clean {
        OutputPolicy::Clean
    } else {
        OutputPolicy::Additive
    }
}

fn invalid_glob(task: &str, field: &str, err: globset::Error) -> ConfigurationError {
    ConfigurationError::Invalid(format!("task '{task}' has an invalid `{field}` pattern: {err}"))
}
