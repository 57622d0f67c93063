// src/reload/mod.rs

//! Reload collaborator: told which outputs changed after each rebuild.
//!
//! Notification is fire-and-forget. Implementations log their own failures
//! and never report them back to the build.

use std::path::PathBuf;

use tracing::info;

pub mod command;

pub use command::CommandNotifier;

pub trait ReloadNotifier: Send + Sync {
    fn notify(&self, changed: &[PathBuf]);
}

/// Logs the change set.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl ReloadNotifier for TracingNotifier {
    fn notify(&self, changed: &[PathBuf]) {
        info!(outputs = changed.len(), changed = ?changed, "reload");
    }
}

impl<N: ReloadNotifier + ?Sized> ReloadNotifier for Box<N> {
    fn notify(&self, changed: &[PathBuf]) {
        (**self).notify(changed)
    }
}

/// Fan out to several notifiers in order.
impl<N: ReloadNotifier> ReloadNotifier for Vec<N> {
    fn notify(&self, changed: &[PathBuf]) {
        for notifier in self {
            notifier.notify(changed);
        }
    }
}
