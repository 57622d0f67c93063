// src/watch/watcher.rs

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::engine::WatchEvent;
use crate::errors::WatchError;
use crate::fs::{FileSystem, RealFileSystem};
use crate::watch::event_handler::{is_relevant, process_paths, ContentFilter};

/// Keeps the underlying `RecommendedWatcher` alive. Dropping the handle
/// stops watching and, once every sender is gone, closes the event channel.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
    root: PathBuf,
}

impl WatcherHandle {
    /// The canonical directory being watched.
    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").field("root", &self.root).finish()
    }
}

/// Watch `source_root` recursively and forward changed paths (relative to
/// the root) as [`WatchEvent::Changed`].
///
/// With `use_hash`, events for files whose content hash is unchanged are
/// dropped. Watcher errors are forwarded as [`WatchEvent::Error`]; they do
/// not stop watching.
pub fn spawn_watcher(
    source_root: impl Into<PathBuf>,
    tx: mpsc::Sender<WatchEvent>,
    use_hash: bool,
) -> Result<WatcherHandle, WatchError> {
    let root = source_root.into();
    let root = root.canonicalize().unwrap_or(root);

    let filter = if use_hash {
        let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
        let mut filter = ContentFilter::new(fs);
        filter.prime(&root);
        Some(filter)
    } else {
        None
    };
    let filter = Mutex::new(filter);

    // Runs on notify's own thread, so blocking sends are fine here.
    let handler_root = root.clone();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if !is_relevant(&event.kind) {
                    return;
                }
                let changed = {
                    let mut guard = filter.lock().unwrap_or_else(|e| e.into_inner());
                    process_paths(&handler_root, &event.paths, guard.as_mut())
                };
                if changed.is_empty() {
                    return;
                }
                debug!(?changed, "forwarding change");
                if tx.blocking_send(WatchEvent::Changed(changed)).is_err() {
                    debug!("watch loop gone; dropping change event");
                }
            }
            Err(err) => {
                let _ = tx.blocking_send(WatchEvent::Error(err.to_string()));
            }
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;
    info!(root = %root.display(), use_hash, "file watcher started");

    Ok(WatcherHandle {
        _inner: watcher,
        root,
    })
}
