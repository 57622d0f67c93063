use std::fmt;

use serde::Deserialize;

/// Build profile, selected once at startup and never mutated afterwards.
///
/// Development favours fast, debuggable output; production favours shipped
/// artifact quality (concatenation, debug stripping, minification).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Profile {
    #[default]
    Development,
    Production,
}

/// Literal value of the environment signal that selects [`Profile::Production`].
pub const PRODUCTION_MARKER: &str = "production";

impl Profile {
    /// Resolve the profile from the raw value of the environment signal.
    ///
    /// The value is trimmed and compared case-insensitively. Anything other
    /// than the production marker (including an absent value) selects
    /// development.
    pub fn from_signal(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case(PRODUCTION_MARKER) => Profile::Production,
            _ => Profile::Development,
        }
    }

    /// Read the named environment variable and resolve the profile from it.
    pub fn from_env(var: &str) -> Self {
        Self::from_signal(std::env::var(var).ok().as_deref())
    }

    pub fn is_development(self) -> bool {
        matches!(self, Profile::Development)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Profile::Development => "development",
            Profile::Production => "production",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fixed, closed set of processor roles a task can bind to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorKind {
    Markup,
    Styles,
    Scripts,
    Images,
    Fonts,
    Datauri,
    Copy,
}

impl ProcessorKind {
    /// Whether tasks of this kind may be skipped when their inputs are
    /// older than the last successful build.
    ///
    /// Markup, styles and scripts always re-run when triggered so that they
    /// reflect the current profile-specific options.
    pub fn default_stale_skippable(self) -> bool {
        matches!(
            self,
            ProcessorKind::Images | ProcessorKind::Fonts | ProcessorKind::Copy
        )
    }

    /// Kinds whose output depends on profile-specific options. These are
    /// never skipped as up to date.
    pub fn always_reruns(self) -> bool {
        matches!(
            self,
            ProcessorKind::Markup | ProcessorKind::Styles | ProcessorKind::Scripts
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProcessorKind::Markup => "markup",
            ProcessorKind::Styles => "styles",
            ProcessorKind::Scripts => "scripts",
            ProcessorKind::Images => "images",
            ProcessorKind::Fonts => "fonts",
            ProcessorKind::Datauri => "datauri",
            ProcessorKind::Copy => "copy",
        }
    }
}

/// What happens to a task's prior output before the processor writes.
///
/// - `Clean`: the output directory is emptied first, so no stale leftovers
///   survive (production script bundles).
/// - `Additive`: existing files are left in place and overwritten or added
///   to (images, fonts, per-file copies).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputPolicy {
    Clean,
    #[default]
    Additive,
}

/// Which tree a task's output location is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputRoot {
    #[default]
    Build,
    /// Generated sources (e.g. a stylesheet partial consumed by another task).
    Source,
}
