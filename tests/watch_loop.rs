mod common;
use crate::common::fakes::{fake_graph, FakeBuildBackend, FakeProcessor, RecordingNotifier};
use crate::common::{init_tracing, with_timeout};

use std::collections::BTreeSet;
use std::error::Error;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use assetdag::engine::{WatchCore, WatchEvent, WatchLoop};
use assetdag::errors::WatchError;
use assetdag::watch::Subscriptions;

type TestResult = Result<(), Box<dyn Error>>;

const DEBOUNCE: Duration = Duration::from_millis(50);

struct Harness {
    tx: mpsc::Sender<WatchEvent>,
    backend: FakeBuildBackend,
    notifier: RecordingNotifier,
    handle: JoinHandle<Result<(), WatchError>>,
}

/// Loop over imguri -> sass plus an independent html, each watching
/// `<name>/*`.
fn spawn_loop(build_delay: Duration) -> Harness {
    let processor = FakeProcessor::succeeding(Arc::new(Mutex::new(Vec::new())));
    let graph = Arc::new(fake_graph(
        &[("imguri", &[]), ("sass", &["imguri"]), ("html", &[])],
        &processor,
        &[],
    ));
    let subs = Subscriptions::from_graph(&graph);
    let core = WatchCore::new(graph, subs, 1);

    let (tx, rx) = mpsc::channel(64);
    let backend = FakeBuildBackend::new(build_delay);
    let notifier = RecordingNotifier::new();
    let watch_loop = WatchLoop::new(core, rx, backend.clone(), notifier.clone(), DEBOUNCE);
    let handle = tokio::spawn(watch_loop.run());

    Harness {
        tx,
        backend,
        notifier,
        handle,
    }
}

fn changed(paths: &[&str]) -> WatchEvent {
    WatchEvent::Changed(paths.iter().map(|p| p.to_string()).collect())
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn burst_of_changes_triggers_one_build() -> TestResult {
    init_tracing();

    let h = spawn_loop(Duration::ZERO);
    for _ in 0..5 {
        h.tx.send(changed(&["html/index.html"])).await?;
        sleep(Duration::from_millis(5)).await;
    }
    sleep(DEBOUNCE * 4).await;

    assert_eq!(h.backend.builds(), vec![set(&["html"])]);

    h.tx.send(WatchEvent::Shutdown).await?;
    with_timeout(h.handle).await??;
    Ok(())
}

#[tokio::test]
async fn changes_during_a_build_cause_exactly_one_more() -> TestResult {
    init_tracing();

    let h = spawn_loop(Duration::from_millis(300));
    h.tx.send(changed(&["html/index.html"])).await?;
    // Let the debounce fire so the first build is in flight.
    sleep(DEBOUNCE * 2).await;
    assert_eq!(h.backend.build_count(), 1);

    for path in ["sass/main.scss", "html/index.html", "sass/_vars.scss"] {
        h.tx.send(changed(&[path])).await?;
        sleep(Duration::from_millis(10)).await;
    }

    sleep(Duration::from_millis(900)).await;

    let builds = h.backend.builds();
    assert_eq!(builds.len(), 2, "{builds:?}");
    assert_eq!(builds[1], set(&["html", "sass"]));
    assert_eq!(h.backend.max_in_flight(), 1);

    h.tx.send(WatchEvent::Shutdown).await?;
    with_timeout(h.handle).await??;
    Ok(())
}

#[tokio::test]
async fn rebuild_includes_dependents_and_notifies_reload() -> TestResult {
    init_tracing();

    let h = spawn_loop(Duration::ZERO);
    h.tx.send(changed(&["imguri/dot.png"])).await?;
    sleep(DEBOUNCE * 4).await;

    assert_eq!(h.backend.builds(), vec![set(&["imguri", "sass"])]);
    assert_eq!(
        h.notifier.calls(),
        vec![vec![PathBuf::from("build/imguri"), PathBuf::from("build/sass")]]
    );

    h.tx.send(WatchEvent::Shutdown).await?;
    with_timeout(h.handle).await??;
    Ok(())
}

#[tokio::test]
async fn unmatched_changes_and_watcher_errors_do_not_build() -> TestResult {
    init_tracing();

    let h = spawn_loop(Duration::ZERO);
    h.tx.send(changed(&["notes/todo.txt"])).await?;
    h.tx.send(WatchEvent::Error("inotify queue overflow".into())).await?;
    sleep(DEBOUNCE * 3).await;

    assert_eq!(h.backend.build_count(), 0);
    assert!(h.notifier.calls().is_empty());

    // Still responsive after the error.
    h.tx.send(changed(&["html/index.html"])).await?;
    sleep(DEBOUNCE * 3).await;
    assert_eq!(h.backend.build_count(), 1);

    h.tx.send(WatchEvent::Shutdown).await?;
    with_timeout(h.handle).await??;
    Ok(())
}

#[tokio::test]
async fn shutdown_waits_for_the_in_flight_build() -> TestResult {
    init_tracing();

    let h = spawn_loop(Duration::from_millis(200));
    h.tx.send(changed(&["html/index.html"])).await?;
    sleep(DEBOUNCE * 2).await;
    h.tx.send(WatchEvent::Shutdown).await?;

    with_timeout(h.handle).await??;
    assert_eq!(h.backend.build_count(), 1);
    assert_eq!(h.backend.max_in_flight(), 1);
    Ok(())
}

#[tokio::test]
async fn closed_event_channel_is_reported_as_lost() -> TestResult {
    init_tracing();

    let h = spawn_loop(Duration::ZERO);
    drop(h.tx);

    let result = with_timeout(h.handle).await?;
    assert!(matches!(result, Err(WatchError::Lost)));
    Ok(())
}

fn spawn_loop_with_signal() -> (
    mpsc::Sender<WatchEvent>,
    oneshot::Sender<()>,
    FakeBuildBackend,
    JoinHandle<Result<(), WatchError>>,
) {
    let processor = FakeProcessor::succeeding(Arc::new(Mutex::new(Vec::new())));
    let graph = Arc::new(fake_graph(&[("html", &[])], &processor, &[]));
    let core = WatchCore::new(Arc::clone(&graph), Subscriptions::from_graph(&graph), 1);

    let (tx, rx) = mpsc::channel(8);
    let (stop_tx, stop_rx) = oneshot::channel();
    let backend = FakeBuildBackend::new(Duration::ZERO);
    let watch_loop = WatchLoop::new(core, rx, backend.clone(), RecordingNotifier::new(), DEBOUNCE)
        .with_shutdown(stop_rx);
    (tx, stop_tx, backend, tokio::spawn(watch_loop.run()))
}

#[tokio::test]
async fn shutdown_signal_stops_the_loop() -> TestResult {
    init_tracing();

    let (tx, stop, backend, handle) = spawn_loop_with_signal();
    tx.send(changed(&["html/index.html"])).await?;
    sleep(DEBOUNCE * 3).await;

    stop.send(()).map_err(|_| "loop already gone")?;
    with_timeout(handle).await??;
    assert_eq!(backend.build_count(), 1);
    Ok(())
}

#[tokio::test]
async fn losing_the_watcher_is_reported_even_with_a_signal_pending() -> TestResult {
    init_tracing();

    let (tx, _stop, _backend, handle) = spawn_loop_with_signal();
    drop(tx);

    let result = with_timeout(handle).await?;
    assert!(matches!(result, Err(WatchError::Lost)));
    Ok(())
}

#[tokio::test]
async fn dropped_signal_does_not_stop_the_loop() -> TestResult {
    init_tracing();

    let (tx, stop, backend, handle) = spawn_loop_with_signal();
    drop(stop);
    sleep(DEBOUNCE).await;

    tx.send(changed(&["html/index.html"])).await?;
    sleep(DEBOUNCE * 3).await;
    assert_eq!(backend.build_count(), 1);

    tx.send(WatchEvent::Shutdown).await?;
    with_timeout(handle).await??;
    Ok(())
}
