// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod pipeline;
pub mod processor;
pub mod reload;
pub mod types;
pub mod watch;

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{load_or_default, ConfigFile};
use crate::dag::TaskGraph;
use crate::engine::{Orchestrator, WatchCore, WatchEvent, WatchLoop};
use crate::errors::{AssetdagError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::reload::{CommandNotifier, ReloadNotifier, TracingNotifier};
use crate::types::Profile;
use crate::watch::{spawn_watcher, Subscriptions};

/// Capacity of the watcher -> watch loop channel. Senders wait when full.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and profile resolution
/// - task graph construction and validation
/// - the initial build
/// - (unless `--once`) the file watcher, Ctrl-C handling and the watch loop
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_or_default(&args.config)?;
    let profile = pipeline::resolve_profile(&cfg);
    eprintln!("{}", pipeline::startup_line(&cfg, profile));

    let graph = pipeline::build_graph(&cfg, profile)?;

    if args.dry_run {
        print_dry_run(&cfg, &graph, profile);
        return Ok(());
    }

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let settings = pipeline::build_settings(&cfg, profile);

    if args.clean {
        info!(root = %settings.build_root.display(), "cleaning build root");
        fs.remove_all(&settings.build_root)?;
    }

    let orchestrator = Orchestrator::new(graph, settings, Arc::clone(&fs))?;

    let initial = orchestrator.build().await?;
    if let Some((task, error)) = initial.failed_task() {
        return Err(AssetdagError::BuildFailed {
            task: task.to_string(),
            error: error.clone(),
        });
    }
    info!(
        executed = initial.executed().len(),
        skipped = initial.skipped().len(),
        "initial build complete"
    );

    if args.once {
        return Ok(());
    }

    let (tx, rx) = mpsc::channel::<WatchEvent>(EVENT_CHANNEL_CAPACITY);
    // The watcher owns the only event sender; once it is gone the loop
    // reports the watch as lost.
    let _watcher = spawn_watcher(cfg.source_root(), tx, cfg.config.use_hash)?;

    let (stop_tx, stop_rx) = oneshot::channel();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            return;
        }
        let _ = stop_tx.send(());
    });

    let graph = Arc::clone(orchestrator.graph());
    let subscriptions = Subscriptions::from_graph(&graph);
    let core = WatchCore::new(graph, subscriptions, cfg.config.queue_length);
    let watch_loop = WatchLoop::new(core, rx, orchestrator, notifiers(&cfg), cfg.debounce())
        .with_shutdown(stop_rx);
    watch_loop.run().await?;
    Ok(())
}

fn notifiers(cfg: &ConfigFile) -> Vec<Box<dyn ReloadNotifier>> {
    let mut notifiers: Vec<Box<dyn ReloadNotifier>> = vec![Box::new(TracingNotifier)];
    if let Some(command) = &cfg.config.reload_command {
        debug!(cmd = %command, "reload command configured");
        notifiers.push(Box::new(CommandNotifier::new(command.clone())));
    }
    notifiers
}

/// Print the resolved profile, tasks and execution waves.
fn print_dry_run(cfg: &ConfigFile, graph: &TaskGraph, profile: Profile) {
    println!("assetdag dry-run");
    println!("  profile = {profile}");
    println!("  source_root = {}", cfg.source_root().display());
    println!("  build_root = {}", cfg.build_root().display());
    println!("  debounce_ms = {}", cfg.config.debounce_ms);
    println!("  queue_length = {}", cfg.config.queue_length);
    println!();

    println!("tasks ({}):", graph.len());
    for task in graph.tasks() {
        println!("  - {}", task.name);
        println!("      processor: {}", task.processor.kind().as_str());
        println!("      input: {:?}", task.inputs.patterns());
        if task.watch.patterns() != task.inputs.patterns() {
            println!("      watch: {:?}", task.watch.patterns());
        }
        println!("      output: {}", task.output.display());
        let deps = graph.dependencies_of(&task.name);
        if !deps.is_empty() {
            println!("      after: {deps:?}");
        }
        if task.stale_skippable {
            println!("      stale_skippable: true");
        }
    }
    println!();

    println!("waves:");
    for (idx, wave) in graph.execution_order().enumerate() {
        println!("  {idx}: {}", wave.join(", "));
    }

    debug!("dry-run complete (nothing built)");
}
