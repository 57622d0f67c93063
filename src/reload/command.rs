// src/reload/command.rs

//! Runs a shell command as the reload collaborator.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::ReloadNotifier;

/// Environment variable carrying the newline-separated changed outputs.
pub const CHANGED_ENV: &str = "ASSETDAG_CHANGED";

/// Spawns `command` through the platform shell on every notification.
///
/// The command runs in the background; its exit status is logged.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    command: String,
}

impl CommandNotifier {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

fn shell(command: &str) -> Command {
    // Build a shell command appropriate for the platform.
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    }
}

async fn run_reload_command(command: String, changed: String) -> Result<()> {
    debug!(cmd = %command, "starting reload command");
    let status = shell(&command)
        .env(CHANGED_ENV, changed)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
        .with_context(|| format!("spawning reload command '{command}'"))?;

    if status.success() {
        info!(cmd = %command, "reload command finished");
    } else {
        warn!(cmd = %command, exit_code = status.code().unwrap_or(-1), "reload command failed");
    }
    Ok(())
}

impl ReloadNotifier for CommandNotifier {
    fn notify(&self, changed: &[PathBuf]) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(cmd = %self.command, "no async runtime; reload command not run");
            return;
        };

        let joined = changed
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("\n");
        let command = self.command.clone();

        handle.spawn(async move {
            if let Err(err) = run_reload_command(command, joined).await {
                warn!(error = %err, "reload command error");
            }
        });
    }
}
