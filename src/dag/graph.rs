// src/dag/graph.rs

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;

use crate::errors::ConfigurationError;

use super::task::Task;
use super::waves::ExecutionWaves;
use super::TaskName;

/// Internal node structure: stores the task plus immediate deps and dependents.
#[derive(Debug, Clone)]
struct DagNode {
    task: Arc<Task>,
    /// Direct dependencies: tasks whose output must be complete first.
    deps: Vec<TaskName>,
    /// Direct dependents: tasks that depend on this one.
    dependents: Vec<TaskName>,
}

/// The set of tasks plus their dependency edges.
///
/// Declaration order is preserved and used as the order within a wave.
/// Edges may be added in any order; [`TaskGraph::validate`] must pass before
/// the graph is executed.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    nodes: HashMap<TaskName, DagNode>,
    order: Vec<TaskName>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_task(&mut self, task: Task) -> Result<(), ConfigurationError> {
        if self.nodes.contains_key(&task.name) {
            return Err(ConfigurationError::DuplicateTask(task.name));
        }
        let name = task.name.clone();
        self.order.push(name.clone());
        self.nodes.insert(
            name,
            DagNode {
                task: Arc::new(task),
                deps: Vec::new(),
                dependents: Vec::new(),
            },
        );
        Ok(())
    }

    /// Record that `task` depends on `depends_on`: the latter must complete
    /// before the former starts.
    ///
    /// Adding the same edge twice is a no-op.
    pub fn add_dependency(&mut self, task: &str, depends_on: &str) -> Result<(), ConfigurationError> {
        for name in [task, depends_on] {
            if !self.nodes.contains_key(name) {
                return Err(ConfigurationError::UnknownTask {
                    name: name.to_string(),
                    context: format!("in dependency '{task}' -> '{depends_on}'"),
                });
            }
        }

        if let Some(node) = self.nodes.get_mut(task) {
            if node.deps.iter().any(|d| d == depends_on) {
                return Ok(());
            }
            node.deps.push(depends_on.to_string());
        }
        if let Some(dep_node) = self.nodes.get_mut(depends_on) {
            dep_node.dependents.push(task.to_string());
        }
        Ok(())
    }

    /// Check that the dependency relation is acyclic.
    ///
    /// On failure the error names every member of one cycle, sorted.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        // Edge direction: dep -> task
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for name in &self.order {
            graph.add_node(name.as_str());
        }
        for (name, node) in &self.nodes {
            for dep in &node.deps {
                graph.add_edge(dep.as_str(), name.as_str(), ());
            }
        }

        let mut cycles: Vec<Vec<String>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut members: Vec<String> = scc.into_iter().map(str::to_string).collect();
                members.sort();
                members
            })
            .collect();
        cycles.sort();

        match cycles.into_iter().next() {
            Some(members) => Err(ConfigurationError::Cycle { members }),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Task names in declaration order.
    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn task(&self, name: &str) -> Option<&Arc<Task>> {
        self.nodes.get(name).map(|n| &n.task)
    }

    /// Tasks in declaration order.
    pub fn tasks(&self) -> impl Iterator<Item = &Arc<Task>> {
        self.order.iter().filter_map(|name| self.task(name))
    }

    /// Immediate dependencies of a task.
    pub fn dependencies_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task.
    pub fn dependents_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Execution waves over the whole graph.
    ///
    /// The sequence is lazy. On a cyclic graph it ends early, leaving the
    /// cycle members unscheduled, so callers validate first.
    pub fn execution_order(&self) -> ExecutionWaves<'_> {
        ExecutionWaves::new(self, self.order.iter().cloned().collect())
    }

    /// Execution waves restricted to `selected`.
    ///
    /// Dependencies outside the selection are treated as already satisfied.
    /// Unknown names are ignored.
    pub fn execution_order_for(&self, selected: &BTreeSet<TaskName>) -> ExecutionWaves<'_> {
        let members = self
            .order
            .iter()
            .filter(|name| selected.contains(*name))
            .cloned()
            .collect();
        ExecutionWaves::new(self, members)
    }

    /// `roots` plus every task that transitively depends on any of them.
    pub fn dependents_closure<'a, I>(&self, roots: I) -> BTreeSet<TaskName>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<TaskName> = roots
            .into_iter()
            .filter(|name| self.contains(name))
            .map(str::to_string)
            .collect();

        while let Some(name) = queue.pop_front() {
            if seen.contains(&name) {
                continue;
            }
            for dependent in self.dependents_of(&name) {
                if !seen.contains(dependent) {
                    queue.push_back(dependent.clone());
                }
            }
            seen.insert(name);
        }

        seen
    }
}
