// src/watch/cache.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::debug;

use crate::fs::FileSystem;
use crate::watch::hash::compute_file_hash;

/// In-memory cache of the last seen content hash per file.
///
/// Only the file named by an event is re-hashed.
#[derive(Debug, Default)]
pub struct FileCache {
    hashes: HashMap<PathBuf, String>,
}

impl FileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Option<&str> {
        self.hashes.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Re-hash `path` and store the result. Returns `true` if the hash
    /// differs from the cached one (or none was cached).
    pub fn update(&mut self, fs: &dyn FileSystem, path: &Path) -> Result<bool> {
        let hash = compute_file_hash(fs, path)?;
        let changed = self.hashes.get(path) != Some(&hash);
        if changed {
            debug!(path = %path.display(), "content hash changed");
            self.hashes.insert(path.to_path_buf(), hash);
        }
        Ok(changed)
    }

    pub fn invalidate(&mut self, path: &Path) {
        if self.hashes.remove(path).is_some() {
            debug!(path = %path.display(), "invalidated cached hash");
        }
    }

    /// Hash every file in `files`, ignoring unreadable ones.
    pub fn prime<'a, I>(&mut self, fs: &dyn FileSystem, files: I)
    where
        I: IntoIterator<Item = &'a PathBuf>,
    {
        for path in files {
            if let Ok(hash) = compute_file_hash(fs, path) {
                self.hashes.insert(path.clone(), hash);
            }
        }
        debug!(files = self.hashes.len(), "primed content hash cache");
    }
}
