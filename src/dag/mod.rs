// src/dag/mod.rs

//! Task graph representation and execution ordering.
//!
//! - [`task`] defines tasks and their compiled input patterns.
//! - [`graph`] owns the tasks plus dependency edges and detects cycles.
//! - [`waves`] turns the graph (or a subset of it) into execution waves.

pub mod graph;
pub mod task;
pub mod waves;

/// Canonical task name type used throughout the crate.
pub type TaskName = String;

pub use graph::TaskGraph;
pub use task::{InputSpec, Task};
pub use waves::ExecutionWaves;
