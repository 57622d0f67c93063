#![allow(dead_code)]

#[allow(unused_imports)]
pub use assetdag_test_utils::{builders, fakes, init_tracing, with_timeout};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Write `content` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// Move a file's modification time into the past, so a build that starts
/// now sees it as older than its start time regardless of timestamp
/// granularity.
pub fn backdate(path: &Path, by: Duration) {
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - by).unwrap();
}

/// Backdate every file below `root`.
pub fn backdate_tree(root: &Path, by: Duration) {
    for entry in fs::read_dir(root).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            backdate_tree(&path, by);
        } else {
            backdate(&path, by);
        }
    }
}
