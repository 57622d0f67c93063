// src/watch/patterns.rs

use std::fmt;

use crate::dag::{InputSpec, TaskGraph, TaskName};

/// One task's interest in source paths.
#[derive(Clone)]
struct Subscription {
    task: TaskName,
    spec: InputSpec,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("task", &self.task)
            .field("patterns", &self.spec.patterns())
            .finish()
    }
}

/// Watch patterns for every task, in declaration order.
///
/// Paths are relative to the source root with forward slashes
/// (e.g. `"scss/_vars.scss"`). A path matched by several tasks triggers all
/// of them; dependents are added later by the watch core.
#[derive(Debug, Clone, Default)]
pub struct Subscriptions {
    entries: Vec<Subscription>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe each task in `graph` with its `watch` spec.
    pub fn from_graph(graph: &TaskGraph) -> Self {
        let mut subs = Self::new();
        for task in graph.tasks() {
            subs.subscribe(task.name.clone(), task.watch.clone());
        }
        subs
    }

    pub fn subscribe(&mut self, task: impl Into<TaskName>, spec: InputSpec) {
        self.entries.push(Subscription {
            task: task.into(),
            spec,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tasks whose watch patterns match `rel_path`.
    pub fn affected_tasks(&self, rel_path: &str) -> Vec<TaskName> {
        self.entries
            .iter()
            .filter(|s| s.spec.matches(rel_path))
            .map(|s| s.task.clone())
            .collect()
    }

    /// Whether any task cares about `rel_path`.
    pub fn is_watched(&self, rel_path: &str) -> bool {
        self.entries.iter().any(|s| s.spec.matches(rel_path))
    }
}
