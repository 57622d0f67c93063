// src/errors.rs

//! Crate-wide error types.
//!
//! The taxonomy follows how failures are handled:
//! - [`ConfigurationError`]: a malformed task graph. Always fatal, surfaced
//!   before any build is attempted.
//! - [`ProcessingError`]: produced by a processor while running a task. The
//!   variant decides whether the build continues with independent tasks.
//! - [`WatchError`]: problems with filesystem notification.

use thiserror::Error;

/// Problems with the shape of the task graph or the config that defines it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("duplicate task name '{0}'")]
    DuplicateTask(String),

    #[error("unknown task '{name}' referenced {context}")]
    UnknownTask { name: String, context: String },

    #[error("cycle detected in task graph: {}", members.join(" -> "))]
    Cycle { members: Vec<String> },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Error returned by a processor.
///
/// `Recoverable` failures are logged and attributed to the task while
/// independent tasks keep running. `Fatal` failures abort all remaining
/// waves of the build.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessingError {
    #[error("{0}")]
    Recoverable(String),

    #[error("{0}")]
    Fatal(String),
}

impl ProcessingError {
    pub fn recoverable(err: impl Into<anyhow::Error>) -> Self {
        ProcessingError::Recoverable(format!("{:#}", err.into()))
    }

    pub fn fatal(err: impl Into<anyhow::Error>) -> Self {
        ProcessingError::Fatal(format!("{:#}", err.into()))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ProcessingError::Fatal(_))
    }

    /// Upgrade to `Fatal`, keeping the message.
    pub fn escalate(self) -> Self {
        match self {
            ProcessingError::Recoverable(msg) => ProcessingError::Fatal(msg),
            fatal => fatal,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ProcessingError::Recoverable(msg) | ProcessingError::Fatal(msg) => msg,
        }
    }
}

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("filesystem notification error: {0}")]
    Notify(#[from] notify::Error),

    #[error("invalid watch pattern: {0}")]
    Pattern(#[from] globset::Error),

    #[error("lost all filesystem notifications; watch loop cannot continue")]
    Lost,
}

#[derive(Error, Debug)]
pub enum AssetdagError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigurationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] WatchError),

    #[error("Build failed in task '{task}': {error}")]
    BuildFailed { task: String, error: ProcessingError },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, AssetdagError>;
