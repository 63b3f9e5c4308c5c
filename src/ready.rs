//! Readiness, blocking, epic completeness, and cycle queries.
//!
//! Everything here is a pure read over a materialized [`Graph`]; mutations
//! go through `ops` under the store lock.

use crate::graph::{Graph, Task, Worker};
use crate::state::TaskState;

/// An epic is complete when it has no child tasks, or every child task has
/// settled (done or canceled). Epic status is always derived; an epic never
/// carries a directly settable state.
pub fn is_epic_complete(graph: &Graph, epic_id: &str) -> bool {
    graph
        .tasks()
        .filter(|task| task.epic_id.as_deref() == Some(epic_id))
        .all(|task| task.state.is_settled())
}

/// Eligible to be claimed: todo, unclaimed, every direct dependency settled,
/// and if the task belongs to an epic, every epic-level dependency of that
/// epic is itself epic-complete. Epics themselves are never ready.
pub fn is_ready(graph: &Graph, task: &Task) -> bool {
    if task.is_epic() {
        return false;
    }
    if task.state != TaskState::Todo || task.claimed_by.is_some() {
        return false;
    }
    let deps_settled = task.deps.iter().all(|dep| {
        graph
            .get(dep)
            .is_some_and(|prerequisite| prerequisite.state.is_settled())
    });
    if !deps_settled {
        return false;
    }
    if let Some(epic_id) = task.epic_id.as_deref() {
        if let Some(epic) = graph.get(epic_id) {
            let epic_deps_complete = epic
                .deps
                .iter()
                .all(|epic_dep| is_epic_complete(graph, epic_dep));
            if !epic_deps_complete {
                return false;
            }
        }
    }
    true
}

/// Blocked is the union of explicit manual blocking and implicit
/// unmet-dependency blocking: explicitly marked blocked, or todo but not
/// ready. Epics are neither ready nor blocked.
pub fn is_blocked(graph: &Graph, task: &Task) -> bool {
    if task.is_epic() {
        return false;
    }
    match task.state {
        TaskState::Blocked => true,
        TaskState::Todo => !is_ready(graph, task),
        _ => false,
    }
}

/// Would adding the edge `from -> to` ("from depends on to") close a cycle?
///
/// A self-loop always does. Otherwise the edge closes a cycle exactly when
/// `from` is already reachable from `to` over existing forward edges. This
/// runs inside the write lock before the edge is appended; replay trusts an
/// already-validated log and never re-checks.
pub fn would_cycle(graph: &Graph, from: &str, to: &str) -> bool {
    from == to || graph.deps().reaches(to, from)
}

/// Ready tasks in claim order: earliest `created_at` first, ties broken by
/// ascending ID. The ordering is strict and total so concurrent claim races
/// are deterministic modulo which process wins the lock.
pub fn ready_tasks(graph: &Graph) -> Vec<&Task> {
    let mut ready: Vec<&Task> = graph
        .tasks()
        .filter(|task| is_ready(graph, task))
        .collect();
    ready.sort_by(|left, right| {
        left.created_at
            .cmp(&right.created_at)
            .then_with(|| left.id.cmp(&right.id))
    });
    ready
}

/// Ready tasks a claimant may take, optionally scoped to one epic, in claim
/// order.
pub fn claim_candidates<'graph>(
    graph: &'graph Graph,
    epic: Option<&str>,
    claimant: Worker,
) -> Vec<&'graph Task> {
    ready_tasks(graph)
        .into_iter()
        .filter(|task| epic.is_none() || task.epic_id.as_deref() == epic)
        .filter(|task| task.worker.accepts(claimant))
        .collect()
}
