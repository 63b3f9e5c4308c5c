//! Materialized task graph.
//!
//! The graph is the in-memory reduction of the event log: a task map, a
//! forward dependency adjacency (task -> prerequisites), and per-task
//! bookkeeping that only compaction reads. The reverse adjacency is never
//! maintained incrementally; replay inverts the final forward edges once
//! after the scan, which removes a whole class of ordering bugs from
//! interleaved link/unlink pairs.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;
use crate::state::TaskState;

/// Worker affinity: who may claim a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Worker {
    #[default]
    Any,
    Agent,
    Human,
}

impl Worker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Worker::Any => "any",
            Worker::Agent => "agent",
            Worker::Human => "human",
        }
    }

    /// Whether a claimant of the given kind may take a task with this
    /// affinity. `Any` claimants are only stopped by nothing; `Any` tasks
    /// accept everyone.
    pub fn accepts(&self, claimant: Worker) -> bool {
        matches!(self, Worker::Any) || claimant == Worker::Any || *self == claimant
    }
}

impl fmt::Display for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Worker {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "any" => Ok(Worker::Any),
            "agent" => Ok(Worker::Agent),
            "human" => Ok(Worker::Human),
            other => Err(Error::InvalidArgument(format!(
                "unknown worker affinity '{other}' (expected any|agent|human)"
            ))),
        }
    }
}

/// A task as materialized from the log.
///
/// A task with no `epic_id` is an epic: a grouping and dependency unit whose
/// status is derived from its children rather than set directly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: String,
    pub uuid: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epic_id: Option<String>,
    pub state: TaskState,
    pub body: String,
    pub worker: Worker,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Direct prerequisites, ID-sorted. Derived from adjacency after replay,
    /// never primary data.
    pub deps: Vec<String>,
    /// Direct dependents, ID-sorted. Same derivation.
    pub rdeps: Vec<String>,
}

impl Task {
    pub fn is_epic(&self) -> bool {
        self.epic_id.is_none()
    }
}

/// As-created values and last-event timestamps, tracked per task purely so
/// compaction can reproduce the original creation event and give its delta
/// events honest timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskMeta {
    pub created_body: String,
    pub created_state: TaskState,
    pub created_worker: Worker,
    pub created_epic: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_state_event: Option<DateTime<Utc>>,
    pub last_claim_event: Option<DateTime<Utc>>,
}

/// Directed dependency graph over task IDs.
///
/// Only the forward direction (`from` depends on `to`) is stored; reverse
/// neighbors are computed by [`DepGraph::invert`]. Ordered containers keep
/// iteration deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DepGraph {
    forward: BTreeMap<String, BTreeSet<String>>,
}

impl DepGraph {
    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.forward
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
    }

    pub fn remove_edge(&mut self, from: &str, to: &str) {
        if let Some(targets) = self.forward.get_mut(from) {
            targets.remove(to);
            if targets.is_empty() {
                self.forward.remove(from);
            }
        }
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.forward
            .get(from)
            .is_some_and(|targets| targets.contains(to))
    }

    /// Forward neighbors of `from`: the tasks it depends on.
    pub fn forward_neighbors(&self, from: &str) -> impl Iterator<Item = &str> {
        self.forward
            .get(from)
            .into_iter()
            .flat_map(|targets| targets.iter().map(String::as_str))
    }

    /// All edges as `(from, to)` pairs, ordered.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.forward.iter().flat_map(|(from, targets)| {
            targets.iter().map(move |to| (from.as_str(), to.as_str()))
        })
    }

    pub fn edge_count(&self) -> usize {
        self.forward.values().map(BTreeSet::len).sum()
    }

    /// Rebuild the reverse adjacency from the forward edges.
    pub fn invert(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut reverse: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (from, to) in self.edges() {
            reverse
                .entry(to.to_string())
                .or_default()
                .insert(from.to_string());
        }
        reverse
    }

    /// Whether `goal` is reachable from `start` over forward edges.
    pub fn reaches(&self, start: &str, goal: &str) -> bool {
        if start == goal {
            return true;
        }
        let mut seen: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = vec![start];
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            for next in self.forward_neighbors(current) {
                if next == goal {
                    return true;
                }
                stack.push(next);
            }
        }
        false
    }
}

/// The materialized view of an event log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    tasks: BTreeMap<String, Task>,
    deps: DepGraph,
    meta: BTreeMap<String, TaskMeta>,
}

impl Graph {
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    /// Tasks in ID order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn deps(&self) -> &DepGraph {
        &self.deps
    }

    pub fn meta(&self, id: &str) -> Option<&TaskMeta> {
        self.meta.get(id)
    }

    pub(crate) fn insert(&mut self, task: Task, meta: TaskMeta) {
        self.meta.insert(task.id.clone(), meta);
        self.tasks.insert(task.id.clone(), task);
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.get_mut(id)
    }

    pub(crate) fn meta_mut(&mut self, id: &str) -> Option<&mut TaskMeta> {
        self.meta.get_mut(id)
    }

    pub(crate) fn deps_mut(&mut self) -> &mut DepGraph {
        &mut self.deps
    }

    /// Finalize after a full replay scan: invert the forward adjacency once
    /// and materialize every task's sorted deps/rdeps lists.
    pub(crate) fn finish(&mut self) {
        let reverse = self.deps.invert();
        for (id, task) in self.tasks.iter_mut() {
            task.deps = self
                .deps
                .forward
                .get(id)
                .map(|targets| targets.iter().cloned().collect())
                .unwrap_or_default();
            task.rdeps = reverse
                .get(id)
                .map(|sources| sources.iter().cloned().collect())
                .unwrap_or_default();
        }
    }

    /// Observable equality for round-trip checks: tasks (including derived
    /// deps/rdeps) and edges, ignoring `updated_at` bookkeeping drift.
    pub fn observably_equal(&self, other: &Graph) -> bool {
        if self.tasks.len() != other.tasks.len() || self.deps != other.deps {
            return false;
        }
        self.tasks.iter().all(|(id, task)| {
            other.tasks.get(id).is_some_and(|candidate| {
                task.uuid == candidate.uuid
                    && task.epic_id == candidate.epic_id
                    && task.state == candidate.state
                    && task.body == candidate.body
                    && task.worker == candidate.worker
                    && task.claimed_by == candidate.claimed_by
                    && task.created_at == candidate.created_at
                    && task.deps == candidate.deps
                    && task.rdeps == candidate.rdeps
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_index_is_rebuilt_from_forward_edges() {
        let mut deps = DepGraph::default();
        deps.add_edge("a", "b");
        deps.add_edge("a", "c");
        deps.add_edge("b", "c");
        deps.remove_edge("a", "c");

        let reverse = deps.invert();
        assert!(!reverse.contains_key("a"));
        assert_eq!(
            reverse["b"].iter().collect::<Vec<_>>(),
            vec![&"a".to_string()]
        );
        assert_eq!(
            reverse["c"].iter().collect::<Vec<_>>(),
            vec![&"b".to_string()]
        );
    }

    #[test]
    fn remove_edge_drops_empty_source() {
        let mut deps = DepGraph::default();
        deps.add_edge("a", "b");
        deps.remove_edge("a", "b");
        assert_eq!(deps.edge_count(), 0);
        assert!(!deps.has_edge("a", "b"));
    }

    #[test]
    fn reachability_follows_forward_edges_only() {
        let mut deps = DepGraph::default();
        deps.add_edge("a", "b");
        deps.add_edge("b", "c");

        assert!(deps.reaches("a", "c"));
        assert!(!deps.reaches("c", "a"));
        assert!(deps.reaches("a", "a"));
    }

    #[test]
    fn worker_affinity_matching() {
        assert!(Worker::Any.accepts(Worker::Agent));
        assert!(Worker::Any.accepts(Worker::Human));
        assert!(Worker::Agent.accepts(Worker::Agent));
        assert!(!Worker::Agent.accepts(Worker::Human));
        assert!(!Worker::Human.accepts(Worker::Agent));
        assert!(Worker::Human.accepts(Worker::Any));
    }
}
