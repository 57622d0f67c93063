// src/watch/event_handler.rs

//! Turns raw filesystem event paths into the relative change list the watch
//! loop consumes.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::EventKind;
use tracing::{debug, warn};

use crate::fs::{walk_files, FileSystem};
use crate::watch::cache::FileCache;
use crate::watch::path_utils::relative_str;

/// Whether an event kind can change what a build would produce.
///
/// Access events (and `Any`/`Other` noise) are ignored.
pub fn is_relevant(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Drops events for files whose content did not actually change
/// (editors that touch on save, `chmod`, metadata-only writes).
#[derive(Debug)]
pub struct ContentFilter {
    fs: Arc<dyn FileSystem>,
    cache: FileCache,
}

impl ContentFilter {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            cache: FileCache::new(),
        }
    }

    /// Seed the cache with every file currently under `root`.
    pub fn prime(&mut self, root: &Path) {
        match walk_files(self.fs.as_ref(), root) {
            Ok(files) => self.cache.prime(self.fs.as_ref(), &files),
            Err(err) => warn!(error = %err, "could not prime content hashes"),
        }
    }

    /// Returns `true` if `path` should be reported as changed.
    ///
    /// Removed or unreadable files always count as changed.
    pub fn admit(&mut self, path: &Path) -> bool {
        if !self.fs.is_file(path) {
            self.cache.invalidate(path);
            return true;
        }
        match self.cache.update(self.fs.as_ref(), path) {
            Ok(changed) => changed,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "hash failed; treating as changed");
                true
            }
        }
    }
}

/// Relativise `paths` against `root`, drop directories the content filter
/// rejects, and dedupe.
///
/// The result is sorted, uses forward slashes, and may be empty.
pub fn process_paths(
    root: &Path,
    paths: &[PathBuf],
    mut filter: Option<&mut ContentFilter>,
) -> Vec<String> {
    let mut out = BTreeSet::new();

    for path in paths {
        let Some(rel) = relative_str(root, path) else {
            warn!(path = %path.display(), root = %root.display(), "could not relativise event path");
            continue;
        };
        if rel.is_empty() {
            continue;
        }
        if let Some(filter) = filter.as_deref_mut() {
            if !filter.admit(path) {
                debug!(rel = %rel, "content unchanged; ignoring event");
                continue;
            }
        }
        out.insert(rel);
    }

    out.into_iter().collect()
}
