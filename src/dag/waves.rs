// src/dag/waves.rs

use std::collections::{HashMap, HashSet};

use super::graph::TaskGraph;
use super::TaskName;

/// Lazy sequence of execution waves (Kahn layering).
///
/// Each yielded wave contains tasks whose in-selection dependencies all
/// appeared in earlier waves, so no two members of one wave depend on each
/// other. Members keep declaration order.
#[derive(Debug)]
pub struct ExecutionWaves<'g> {
    graph: &'g TaskGraph,
    remaining: Vec<TaskName>,
    pending_deps: HashMap<TaskName, usize>,
}

impl<'g> ExecutionWaves<'g> {
    pub(crate) fn new(graph: &'g TaskGraph, members: Vec<TaskName>) -> Self {
        let selected: HashSet<&str> = members.iter().map(String::as_str).collect();
        let pending_deps = members
            .iter()
            .map(|name| {
                let count = graph
                    .dependencies_of(name)
                    .iter()
                    .filter(|dep| selected.contains(dep.as_str()))
                    .count();
                (name.clone(), count)
            })
            .collect();

        Self {
            graph,
            remaining: members,
            pending_deps,
        }
    }

    /// Tasks that were never yielded. Non-empty only after exhausting the
    /// iterator on a cyclic graph.
    pub fn unscheduled(&self) -> &[TaskName] {
        &self.remaining
    }
}

impl Iterator for ExecutionWaves<'_> {
    type Item = Vec<TaskName>;

    fn next(&mut self) -> Option<Self::Item> {
        let (wave, rest): (Vec<TaskName>, Vec<TaskName>) = std::mem::take(&mut self.remaining)
            .into_iter()
            .partition(|name| self.pending_deps.get(name).copied().unwrap_or(0) == 0);
        self.remaining = rest;

        if wave.is_empty() {
            return None;
        }

        for name in &wave {
            for dependent in self.graph.dependents_of(name) {
                if let Some(count) = self.pending_deps.get_mut(dependent) {
                    *count = count.saturating_sub(1);
                }
            }
        }

        Some(wave)
    }
}
