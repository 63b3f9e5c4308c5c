//! Replay engine: deterministic reduction of an event sequence into a Graph.
//!
//! The reducer is pure and total over the closed event union. Two rules from
//! the log contract matter here:
//!
//! - an event referencing a task the graph does not know is skipped, so old
//!   binaries keep replaying logs written by newer ones;
//! - a second creation event for a known ID is fatal, because IDs are unique
//!   for the lifetime of a log and a duplicate means the log is damaged.
//!
//! The claim invariant is enforced during replay itself, not only at write
//! time: a transition into todo/done/canceled force-clears the claim, so
//! hand-edited or legacy logs still materialize consistently.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{Error, Result};
use crate::event::{Event, EventBody};
use crate::graph::{Graph, Task, TaskMeta};

/// Replay an ordered event sequence into a materialized graph.
///
/// O(events) for the scan plus one adjacency inversion at the end.
pub fn replay(events: &[Event]) -> Result<Graph> {
    let mut graph = Graph::default();
    for event in events {
        apply(&mut graph, event)?;
    }
    graph.finish();
    Ok(graph)
}

fn apply(graph: &mut Graph, event: &Event) -> Result<()> {
    match &event.body {
        EventBody::TaskCreated {
            id,
            uuid,
            epic_id,
            state,
            body,
            worker,
            created_at,
        } => {
            if graph.contains(id) {
                return Err(Error::DuplicateTask(id.clone()));
            }
            let task = Task {
                id: id.clone(),
                uuid: *uuid,
                epic_id: epic_id.clone(),
                state: *state,
                body: body.clone(),
                worker: *worker,
                claimed_by: None,
                created_at: *created_at,
                updated_at: *created_at,
                deps: Vec::new(),
                rdeps: Vec::new(),
            };
            let meta = TaskMeta {
                created_body: body.clone(),
                created_state: *state,
                created_worker: *worker,
                created_epic: epic_id.clone(),
                created_at: *created_at,
                last_state_event: None,
                last_claim_event: None,
            };
            graph.insert(task, meta);
        }
        EventBody::StateChanged { id, state } => {
            let Some(task) = graph.get_mut(id) else {
                debug!(%id, "state_changed for unknown task, skipping");
                return Ok(());
            };
            task.state = *state;
            if state.forbids_claim() {
                task.claimed_by = None;
            }
            task.updated_at = monotonic(task.updated_at, event.timestamp);
            if let Some(meta) = graph.meta_mut(id) {
                meta.last_state_event = Some(event.timestamp);
            }
        }
        EventBody::Claimed { id, agent_id } => {
            let Some(task) = graph.get_mut(id) else {
                debug!(%id, "claimed for unknown task, skipping");
                return Ok(());
            };
            task.claimed_by = Some(agent_id.clone());
            task.updated_at = monotonic(task.updated_at, event.timestamp);
            if let Some(meta) = graph.meta_mut(id) {
                meta.last_claim_event = Some(event.timestamp);
            }
        }
        EventBody::Unclaimed { id } => {
            let Some(task) = graph.get_mut(id) else {
                debug!(%id, "unclaimed for unknown task, skipping");
                return Ok(());
            };
            task.claimed_by = None;
            task.updated_at = monotonic(task.updated_at, event.timestamp);
            if let Some(meta) = graph.meta_mut(id) {
                meta.last_claim_event = Some(event.timestamp);
            }
        }
        EventBody::Linked {
            from_id,
            to_id,
            kind: _,
        } => {
            // Only the forward adjacency moves during the scan; the reverse
            // side is rebuilt once in Graph::finish.
            if !graph.contains(from_id) || !graph.contains(to_id) {
                debug!(%from_id, %to_id, "linked with unknown endpoint, skipping");
                return Ok(());
            }
            graph.deps_mut().add_edge(from_id, to_id);
        }
        EventBody::Unlinked {
            from_id,
            to_id,
            kind: _,
        } => {
            graph.deps_mut().remove_edge(from_id, to_id);
        }
        EventBody::WorkerChanged { id, worker } => {
            let Some(task) = graph.get_mut(id) else {
                debug!(%id, "worker_changed for unknown task, skipping");
                return Ok(());
            };
            task.worker = *worker;
            task.updated_at = monotonic(task.updated_at, event.timestamp);
        }
        EventBody::BodyChanged { id, body } => {
            let Some(task) = graph.get_mut(id) else {
                debug!(%id, "body_changed for unknown task, skipping");
                return Ok(());
            };
            task.body = body.clone();
            task.updated_at = monotonic(task.updated_at, event.timestamp);
        }
        EventBody::EpicChanged { id, epic_id } => {
            let Some(task) = graph.get_mut(id) else {
                debug!(%id, "epic_changed for unknown task, skipping");
                return Ok(());
            };
            task.epic_id = Some(epic_id.clone());
            task.updated_at = monotonic(task.updated_at, event.timestamp);
        }
    }
    Ok(())
}

/// `updated_at` never regresses under clock skew between writers.
fn monotonic(current: DateTime<Utc>, observed: DateTime<Utc>) -> DateTime<Utc> {
    current.max(observed)
}
