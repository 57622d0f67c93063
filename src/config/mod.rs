// src/config/mod.rs

//! Configuration loading and validation for assetdag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk, or fall back to the built-in pipeline
//!   (`loader.rs`, `defaults.rs`).
//! - Validate config-level rules (`validate.rs`). Dependency references and
//!   cycles are checked by the task graph itself.

pub mod defaults;
pub mod loader;
pub mod model;
pub mod validate;

pub use defaults::default_pipeline;
pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{ConfigFile, ConfigSection, PackageSection, RawConfigFile, TaskConfig};
