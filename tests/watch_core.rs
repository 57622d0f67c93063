mod common;
use crate::common::fakes::{fake_graph, FakeProcessor};
use crate::common::init_tracing;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assetdag::engine::{BuildResult, TaskReport, TaskStatus, WatchCommand, WatchCore, WatchState};
use assetdag::types::Profile;
use assetdag::watch::Subscriptions;

/// imguri -> sass, plus an independent html. Each task watches `<name>/*`.
fn core(queue_length: usize) -> WatchCore {
    let processor = FakeProcessor::succeeding(Arc::new(Mutex::new(Vec::new())));
    let graph = Arc::new(fake_graph(
        &[("imguri", &[]), ("sass", &["imguri"]), ("html", &[])],
        &processor,
        &[],
    ));
    let subs = Subscriptions::from_graph(&graph);
    let mut core = WatchCore::new(graph, subs, queue_length);
    core.start_watching();
    core
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn paths(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn finished(outputs: &[(&str, &str)]) -> BuildResult {
    let reports = outputs
        .iter()
        .map(|(task, out)| TaskReport {
            name: task.to_string(),
            wave: 0,
            status: TaskStatus::Succeeded {
                outputs: vec![PathBuf::from(out)],
                duration: Duration::from_millis(1),
            },
        })
        .collect();
    BuildResult::from_reports(Profile::Development, reports, None)
}

#[test]
fn changes_before_watching_are_ignored() {
    init_tracing();

    let processor = FakeProcessor::succeeding(Arc::new(Mutex::new(Vec::new())));
    let graph = Arc::new(fake_graph(&[("html", &[])], &processor, &[]));
    let subs = Subscriptions::from_graph(&graph);
    let mut core = WatchCore::new(graph, subs, 1);

    assert_eq!(core.state(), WatchState::Idle);
    assert!(core.on_change(&paths(&["html/index.html"])).is_empty());
    assert_eq!(core.state(), WatchState::Idle);
}

#[test]
fn first_change_arms_debounce_and_later_ones_coalesce() {
    init_tracing();

    let mut core = core(1);
    assert_eq!(core.on_change(&paths(&["html/index.html"])), vec![WatchCommand::ArmDebounce]);
    assert_eq!(core.state(), WatchState::Triggered);

    assert!(core.on_change(&paths(&["sass/main.scss"])).is_empty());
    assert!(core.on_change(&paths(&["html/about.html"])).is_empty());

    assert_eq!(
        core.on_debounce_elapsed(),
        vec![WatchCommand::StartBuild(set(&["html", "sass"]))]
    );
    assert_eq!(core.state(), WatchState::Building);
}

#[test]
fn rebuild_set_includes_transitive_dependents() {
    let mut core = core(1);
    core.on_change(&paths(&["imguri/dot.png"]));

    assert_eq!(
        core.on_debounce_elapsed(),
        vec![WatchCommand::StartBuild(set(&["imguri", "sass"]))]
    );
}

#[test]
fn unmatched_paths_do_nothing() {
    let mut core = core(1);
    assert!(core.on_change(&paths(&["README.md", "docs/notes.txt"])).is_empty());
    assert_eq!(core.state(), WatchState::Watching);
}

#[test]
fn finished_build_notifies_reload_and_returns_to_watching() {
    let mut core = core(1);
    core.on_change(&paths(&["html/index.html"]));
    core.on_debounce_elapsed();

    let commands = core.on_build_finished(&finished(&[("html", "build/index.html")]));
    assert_eq!(
        commands,
        vec![WatchCommand::NotifyReload(vec![PathBuf::from("build/index.html")])]
    );
    assert_eq!(core.state(), WatchState::Watching);
}

#[test]
fn build_without_changed_outputs_does_not_notify() {
    let mut core = core(1);
    core.on_change(&paths(&["html/index.html"]));
    core.on_debounce_elapsed();

    let skipped = BuildResult::from_reports(
        Profile::Development,
        vec![TaskReport {
            name: "html".into(),
            wave: 0,
            status: TaskStatus::Skipped,
        }],
        None,
    );
    assert!(core.on_build_finished(&skipped).is_empty());
}

#[test]
fn changes_during_a_build_queue_exactly_one_follow_up() {
    init_tracing();

    let mut core = core(1);
    core.on_change(&paths(&["html/index.html"]));
    core.on_debounce_elapsed();
    assert_eq!(core.state(), WatchState::Building);

    assert_eq!(core.on_change(&paths(&["sass/main.scss"])), vec![WatchCommand::ArmDebounce]);
    assert!(core.on_change(&paths(&["sass/_vars.scss"])).is_empty());
    assert!(core.on_debounce_elapsed().is_empty());
    assert_eq!(core.on_change(&paths(&["imguri/dot.png"])), vec![WatchCommand::ArmDebounce]);
    assert!(core.on_debounce_elapsed().is_empty());

    // queue_length = 1: everything folds into a single re-run.
    let commands = core.on_build_finished(&finished(&[("html", "build/index.html")]));
    assert_eq!(
        commands,
        vec![
            WatchCommand::NotifyReload(vec![PathBuf::from("build/index.html")]),
            WatchCommand::StartBuild(set(&["imguri", "sass"])),
        ]
    );
    assert_eq!(core.state(), WatchState::Building);

    assert_eq!(
        core.on_build_finished(&finished(&[("sass", "build/css/main.css")])),
        vec![WatchCommand::NotifyReload(vec![PathBuf::from("build/css/main.css")])]
    );
    assert_eq!(core.state(), WatchState::Watching);
}

#[test]
fn longer_queue_keeps_debounced_batches_apart() {
    let mut core = core(2);
    core.on_change(&paths(&["html/index.html"]));
    core.on_debounce_elapsed();

    core.on_change(&paths(&["sass/main.scss"]));
    core.on_debounce_elapsed();
    core.on_change(&paths(&["html/index.html"]));
    core.on_debounce_elapsed();

    assert_eq!(
        core.on_build_aborted(),
        vec![WatchCommand::StartBuild(set(&["sass"]))]
    );
    assert_eq!(
        core.on_build_aborted(),
        vec![WatchCommand::StartBuild(set(&["html"]))]
    );
    assert!(core.on_build_aborted().is_empty());
    assert_eq!(core.state(), WatchState::Watching);
}

#[test]
fn failed_build_keeps_watching() {
    let mut core = core(1);
    core.on_change(&paths(&["html/index.html"]));
    core.on_debounce_elapsed();

    assert!(core.on_build_aborted().is_empty());
    assert_eq!(core.state(), WatchState::Watching);
    assert_eq!(core.on_change(&paths(&["html/index.html"])), vec![WatchCommand::ArmDebounce]);
}

#[test]
fn shutdown_stops_from_any_state() {
    let mut core = core(1);
    core.on_change(&paths(&["html/index.html"]));
    assert_eq!(core.on_shutdown(), vec![WatchCommand::Stop]);
    assert_eq!(core.state(), WatchState::Stopped);
    assert!(core.on_change(&paths(&["html/index.html"])).is_empty());
    assert!(core.on_debounce_elapsed().is_empty());
}
