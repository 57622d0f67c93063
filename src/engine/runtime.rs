// src/engine/runtime.rs

use std::fmt;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::errors::{ConfigurationError, WatchError};
use crate::reload::ReloadNotifier;

use super::backend::BuildBackend;
use super::core::{WatchCommand, WatchCore};
use super::result::BuildResult;
use super::WatchEvent;

type InFlight = JoinHandle<Result<BuildResult, ConfigurationError>>;

/// Async IO shell around [`WatchCore`].
///
/// Consumes [`WatchEvent`]s from a bounded channel, owns the debounce timer
/// and the single in-flight build, and forwards changed outputs to the
/// reload notifier. Event intake never waits for a build: builds run as a
/// spawned task and their completion is just another `select!` branch.
pub struct WatchLoop<B: BuildBackend, N: ReloadNotifier> {
    core: WatchCore,
    events: mpsc::Receiver<WatchEvent>,
    backend: B,
    notifier: N,
    debounce: Duration,
    /// Out-of-band stop request (Ctrl-C), so the event channel is owned by
    /// the watcher alone.
    shutdown: Option<oneshot::Receiver<()>>,
}

impl<B: BuildBackend, N: ReloadNotifier> fmt::Debug for WatchLoop<B, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchLoop")
            .field("core", &self.core)
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

async fn until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn until_signal(
    signal: &mut Option<oneshot::Receiver<()>>,
) -> Result<(), oneshot::error::RecvError> {
    match signal {
        Some(rx) => rx.await,
        None => std::future::pending().await,
    }
}

async fn until_finished(
    build: &mut Option<InFlight>,
) -> Result<Result<BuildResult, ConfigurationError>, tokio::task::JoinError> {
    match build {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

impl<B: BuildBackend, N: ReloadNotifier> WatchLoop<B, N> {
    pub fn new(
        core: WatchCore,
        events: mpsc::Receiver<WatchEvent>,
        backend: B,
        notifier: N,
        debounce: Duration,
    ) -> Self {
        Self {
            core,
            events,
            backend,
            notifier,
            debounce,
            shutdown: None,
        }
    }

    /// Stop the loop when `signal` fires, in addition to
    /// [`WatchEvent::Shutdown`].
    pub fn with_shutdown(mut self, signal: oneshot::Receiver<()>) -> Self {
        self.shutdown = Some(signal);
        self
    }

    /// Main event loop. Call only after the initial build succeeded.
    ///
    /// Returns `Ok(())` on shutdown, or `WatchError::Lost` if the event
    /// channel closes (every watcher is gone).
    pub async fn run(mut self) -> Result<(), WatchError> {
        self.core.start_watching();

        let mut deadline: Option<Instant> = None;
        let mut in_flight: Option<InFlight> = None;
        let mut shutdown = self.shutdown.take();

        loop {
            let commands = tokio::select! {
                event = self.events.recv() => match event {
                    Some(WatchEvent::Changed(paths)) => {
                        debug!(?paths, "change event");
                        self.core.on_change(&paths)
                    }
                    Some(WatchEvent::Error(message)) => {
                        warn!(error = %message, "watcher reported an error; still watching");
                        Vec::new()
                    }
                    Some(WatchEvent::Shutdown) => self.core.on_shutdown(),
                    None => {
                        error!("watch event channel closed");
                        if let Some(handle) = in_flight.take() {
                            let _ = handle.await;
                        }
                        return Err(WatchError::Lost);
                    }
                },

                signal = until_signal(&mut shutdown) => {
                    shutdown = None;
                    match signal {
                        Ok(()) => self.core.on_shutdown(),
                        Err(_) => {
                            debug!("shutdown signal dropped without firing");
                            Vec::new()
                        }
                    }
                }

                _ = until_deadline(deadline) => {
                    deadline = None;
                    self.core.on_debounce_elapsed()
                }

                joined = until_finished(&mut in_flight) => {
                    in_flight = None;
                    match joined {
                        Ok(Ok(result)) => {
                            report_build(&result);
                            self.core.on_build_finished(&result)
                        }
                        Ok(Err(err)) => {
                            error!(error = %err, "rebuild rejected by task graph");
                            self.core.on_build_aborted()
                        }
                        Err(err) => {
                            error!(error = %err, "rebuild task failed to join");
                            self.core.on_build_aborted()
                        }
                    }
                }
            };

            for command in commands {
                match command {
                    WatchCommand::ArmDebounce => {
                        if deadline.is_none() {
                            deadline = Some(Instant::now() + self.debounce);
                        }
                    }
                    WatchCommand::StartBuild(tasks) => {
                        debug!(?tasks, "starting rebuild");
                        in_flight = Some(tokio::spawn(self.backend.start_build(tasks)));
                    }
                    WatchCommand::NotifyReload(outputs) => {
                        self.notifier.notify(&outputs);
                    }
                    WatchCommand::Stop => {
                        if let Some(handle) = in_flight.take() {
                            info!("waiting for in-flight build before exit");
                            let _ = handle.await;
                        }
                        info!("watch loop stopped");
                        return Ok(());
                    }
                }
            }
        }
    }
}

fn report_build(result: &BuildResult) {
    match result.failed_task() {
        Some((task, error)) => {
            warn!(task = %task, error = %error, "rebuild failed; still watching");
        }
        None if result.success => {
            debug!(tasks = result.tasks.len(), "rebuild succeeded");
        }
        None => warn!("rebuild incomplete; still watching"),
    }
}
