//! Graph operations: the write path and the read path.
//!
//! Every mutation follows the same critical section. Take the writer lock,
//! replay the full log, validate the request against the fresh graph, append
//! the resulting events, release the lock. Validation against anything older
//! than the locked replay would race with concurrent writers.
//!
//! Reads never lock. A reader replays whatever prefix of the log it sees,
//! which is always a consistent graph because appends are line-atomic.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use tracing::{debug, info};
use ulid::Ulid;
use uuid::Uuid;

use crate::compact::{compact, CompactReport};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::event::{Event, EventBody, LinkKind};
use crate::graph::{Graph, Task, Worker};
use crate::ready::{claim_candidates, would_cycle};
use crate::replay::replay;
use crate::state::{check_claim_invariant, check_transition, TaskState};
use crate::store::{EventStore, TruncationNotice};

const ID_DELIMS: [&str; 2] = ["-", "/"];
const ULID_TIME_LEN: usize = 10;
const ULID_RANDOM_LEN: usize = 16;
const ULID_CHARSET: &str = "0123456789abcdefghjkmnpqrstvwxyz";
const ULID_CHARSET_LEN: u128 = 32;

/// A consistent read of the log: the materialized graph plus any truncation
/// notice raised while decoding.
#[derive(Debug)]
pub struct Snapshot {
    pub graph: Graph,
    pub truncation: Option<TruncationNotice>,
}

/// Request to create a task (or epic, when `epic_id` is absent).
#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    pub body: String,
    pub epic_id: Option<String>,
    pub worker: Option<Worker>,
}

/// Claim mutation inside an update.
#[derive(Debug, Clone)]
pub enum ClaimChange {
    Claim(String),
    Release,
}

/// Request to update a task. Absent fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
    pub state: Option<TaskState>,
    pub claim: Option<ClaimChange>,
    pub body: Option<String>,
    pub worker: Option<Worker>,
    pub epic_id: Option<String>,
}

impl UpdateRequest {
    fn is_empty(&self) -> bool {
        self.state.is_none()
            && self.claim.is_none()
            && self.body.is_none()
            && self.worker.is_none()
            && self.epic_id.is_none()
    }
}

/// The coordination engine: an event store plus the config that shapes IDs
/// and defaults.
pub struct GraphStore {
    store: EventStore,
    config: Config,
}

impl GraphStore {
    pub fn new(store: EventStore, config: Config) -> Self {
        Self { store, config }
    }

    /// Open the store beneath `workdir`, honoring `.weft.toml` when present.
    pub fn open(workdir: &std::path::Path) -> Result<Self> {
        let config = Config::load_from_dir(workdir);
        let store = EventStore::open(workdir.join(&config.store.dir), config.store.lock_timeout_ms)?;
        Ok(Self { store, config })
    }

    /// Initialize the store beneath `workdir`. Idempotent.
    pub fn init(workdir: &std::path::Path) -> Result<Self> {
        let config = Config::load_from_dir(workdir);
        let store = EventStore::init(workdir.join(&config.store.dir), config.store.lock_timeout_ms)?;
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    /// Replay the log into a graph without taking the lock.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let (events, truncation) = self.store.read_all()?;
        let graph = replay(&events)?;
        Ok(Snapshot { graph, truncation })
    }

    /// Read the log for a mutation. Holding the lock, a torn final line is
    /// repaired in place so the coming append cannot strand it mid-file,
    /// where it would be fatal corruption on the next read.
    fn read_for_write(&self) -> Result<Vec<Event>> {
        let (events, truncation) = self.store.read_all()?;
        if truncation.is_some() {
            self.store.replace_all(&events)?;
        }
        Ok(events)
    }

    /// Resolve user input to a full task ID.
    ///
    /// Accepts the full ID, the bare suffix, or an unambiguous suffix
    /// prefix. Ambiguity and misses are both errors.
    pub fn resolve_id(&self, graph: &Graph, input: &str) -> Result<String> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidArgument("task id cannot be empty".to_string()));
        }

        let trimmed_norm = normalize_id(trimmed);
        let candidate_norm = suffix_from_id(&trimmed_norm).to_string();
        if candidate_norm.is_empty() {
            return Err(Error::InvalidArgument("task id cannot be empty".to_string()));
        }

        let mut exact: Vec<String> = Vec::new();
        let mut matches: Vec<String> = Vec::new();

        for task in graph.tasks() {
            let id_norm = normalize_id(&task.id);
            let suffix_norm = suffix_from_id(&id_norm);
            if id_norm == trimmed_norm || suffix_norm == trimmed_norm {
                exact.push(task.id.clone());
                continue;
            }
            if suffix_norm.starts_with(&candidate_norm) {
                matches.push(task.id.clone());
            }
        }

        if exact.len() == 1 {
            return Ok(exact.remove(0));
        }
        if exact.len() > 1 {
            return Err(Error::InvalidArgument(format!(
                "ambiguous task id '{}': {}",
                trimmed,
                exact.join(", ")
            )));
        }

        matches.sort();
        matches.dedup();
        if matches.is_empty() {
            return Err(Error::TaskNotFound(trimmed.to_string()));
        }
        if matches.len() > 1 {
            return Err(Error::InvalidArgument(format!(
                "ambiguous task id '{}': {}",
                trimmed,
                matches.join(", ")
            )));
        }
        Ok(matches[0].clone())
    }

    /// Create a task and return its materialized form.
    pub fn create_task(&self, request: CreateRequest) -> Result<Task> {
        let body = request.body.trim().to_string();
        if body.is_empty() {
            return Err(Error::InvalidArgument("task body cannot be empty".to_string()));
        }

        let _lock = self.store.lock()?;
        let mut events = self.read_for_write()?;
        let graph = replay(&events)?;

        let epic_id = match request.epic_id.as_deref() {
            Some(input) => {
                let resolved = self
                    .resolve_id(&graph, input)
                    .map_err(|_| Error::EpicNotFound(input.trim().to_string()))?;
                let epic = graph
                    .get(&resolved)
                    .ok_or_else(|| Error::EpicNotFound(resolved.clone()))?;
                if !epic.is_epic() {
                    return Err(Error::InvalidArgument(format!(
                        "{resolved} is not an epic"
                    )));
                }
                Some(resolved)
            }
            None => None,
        };

        let id = self.generate_task_id(&graph);
        let now = Utc::now();
        let event = Event::at(
            now,
            EventBody::TaskCreated {
                id: id.clone(),
                uuid: Uuid::new_v4(),
                epic_id,
                state: TaskState::Todo,
                body,
                worker: request.worker.unwrap_or(self.config.tasks.default_worker),
                created_at: now,
            },
        );
        self.store.append(std::slice::from_ref(&event))?;
        info!(id = %id, "task created");

        events.push(event);
        let graph = replay(&events)?;
        graph
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::TaskNotFound(id))
    }

    /// Add a dependency edge: `from` depends on `to`.
    pub fn link(&self, from_input: &str, to_input: &str) -> Result<(String, String)> {
        let _lock = self.store.lock()?;
        let events = self.read_for_write()?;
        let graph = replay(&events)?;

        let from = self.resolve_id(&graph, from_input)?;
        let to = self.resolve_id(&graph, to_input)?;

        let from_task = graph
            .get(&from)
            .ok_or_else(|| Error::TaskNotFound(from.clone()))?;
        let to_task = graph
            .get(&to)
            .ok_or_else(|| Error::TaskNotFound(to.clone()))?;

        // Edges stay within a kind: task depends on task, epic on epic.
        if from_task.is_epic() != to_task.is_epic() {
            return Err(Error::CrossKindDependency {
                from: from.clone(),
                to: to.clone(),
            });
        }
        if graph.deps().has_edge(&from, &to) {
            return Err(Error::InvalidArgument(format!(
                "{from} already depends on {to}"
            )));
        }
        if would_cycle(&graph, &from, &to) {
            return Err(Error::DependencyCycle {
                from: from.clone(),
                to: to.clone(),
            });
        }

        self.store.append(&[Event::new(EventBody::Linked {
            from_id: from.clone(),
            to_id: to.clone(),
            kind: LinkKind::Depends,
        })])?;
        debug!(%from, %to, "dependency added");
        Ok((from, to))
    }

    /// Remove a dependency edge.
    pub fn unlink(&self, from_input: &str, to_input: &str) -> Result<(String, String)> {
        let _lock = self.store.lock()?;
        let events = self.read_for_write()?;
        let graph = replay(&events)?;

        let from = self.resolve_id(&graph, from_input)?;
        let to = self.resolve_id(&graph, to_input)?;
        if !graph.deps().has_edge(&from, &to) {
            return Err(Error::InvalidArgument(format!(
                "{from} does not depend on {to}"
            )));
        }

        self.store.append(&[Event::new(EventBody::Unlinked {
            from_id: from.clone(),
            to_id: to.clone(),
            kind: LinkKind::Depends,
        })])?;
        debug!(%from, %to, "dependency removed");
        Ok((from, to))
    }

    /// Apply an update to one task and return its new materialized form.
    pub fn update(&self, id_input: &str, request: UpdateRequest) -> Result<Task> {
        if request.is_empty() {
            return Err(Error::InvalidArgument("nothing to update".to_string()));
        }

        let _lock = self.store.lock()?;
        let mut events = self.read_for_write()?;
        let graph = replay(&events)?;

        let id = self.resolve_id(&graph, id_input)?;
        let task = graph
            .get(&id)
            .ok_or_else(|| Error::TaskNotFound(id.clone()))?;

        if task.is_epic() && (request.state.is_some() || request.claim.is_some()) {
            return Err(Error::EpicStateDerived(id.clone()));
        }

        let mut pending = Vec::new();

        // Claim changes first so the state check below sees the claim that
        // will actually hold when the state lands.
        let mut claimed_by = task.claimed_by.clone();
        match &request.claim {
            Some(ClaimChange::Claim(agent)) => {
                let agent = agent.trim();
                if agent.is_empty() {
                    return Err(Error::InvalidArgument("agent cannot be empty".to_string()));
                }
                if let Some(holder) = &task.claimed_by {
                    if holder != agent {
                        return Err(Error::ClaimStateMismatch {
                            id: id.clone(),
                            detail: format!("already claimed by {holder}"),
                        });
                    }
                }
                claimed_by = Some(agent.to_string());
                pending.push(EventBody::Claimed {
                    id: id.clone(),
                    agent_id: agent.to_string(),
                });
            }
            Some(ClaimChange::Release) => {
                claimed_by = None;
                if task.claimed_by.is_some() {
                    pending.push(EventBody::Unclaimed { id: id.clone() });
                }
            }
            None => {}
        }

        if let Some(state) = request.state {
            check_transition(&id, task.state, state)?;
            if state.forbids_claim() {
                // Replay force-clears; the write path mirrors that.
                claimed_by = None;
            }
            check_claim_invariant(&id, state, claimed_by.as_deref())?;
            pending.push(EventBody::StateChanged { id: id.clone(), state });
        } else {
            check_claim_invariant(&id, task.state, claimed_by.as_deref())?;
        }

        if let Some(body) = &request.body {
            let body = body.trim();
            if body.is_empty() {
                return Err(Error::InvalidArgument("task body cannot be empty".to_string()));
            }
            pending.push(EventBody::BodyChanged {
                id: id.clone(),
                body: body.to_string(),
            });
        }

        if let Some(worker) = request.worker {
            pending.push(EventBody::WorkerChanged {
                id: id.clone(),
                worker,
            });
        }

        if let Some(epic_input) = &request.epic_id {
            if task.is_epic() {
                return Err(Error::InvalidArgument(format!(
                    "{id} is an epic and cannot be assigned to one"
                )));
            }
            let resolved = self
                .resolve_id(&graph, epic_input)
                .map_err(|_| Error::EpicNotFound(epic_input.trim().to_string()))?;
            let epic = graph
                .get(&resolved)
                .ok_or_else(|| Error::EpicNotFound(resolved.clone()))?;
            if !epic.is_epic() {
                return Err(Error::InvalidArgument(format!(
                    "{resolved} is not an epic"
                )));
            }
            pending.push(EventBody::EpicChanged {
                id: id.clone(),
                epic_id: resolved,
            });
        }

        let appended: Vec<Event> = pending.into_iter().map(Event::new).collect();
        self.store.append(&appended)?;
        debug!(%id, events = appended.len(), "task updated");

        events.extend(appended);
        let graph = replay(&events)?;
        graph
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::TaskNotFound(id))
    }

    /// Claim the next ready task for `agent`, moving it to `doing`.
    ///
    /// `epic` narrows candidates to one epic's children; `claimant` is the
    /// kind of worker claiming. Returns `Ok(None)` when nothing is ready,
    /// which is an outcome, not an error.
    pub fn claim_next(
        &self,
        agent: &str,
        epic: Option<&str>,
        claimant: Worker,
    ) -> Result<Option<Task>> {
        let agent = agent.trim();
        if agent.is_empty() {
            return Err(Error::InvalidArgument("agent cannot be empty".to_string()));
        }

        let _lock = self.store.lock()?;
        let mut events = self.read_for_write()?;
        let graph = replay(&events)?;

        let epic = match epic {
            Some(input) => {
                let resolved = self
                    .resolve_id(&graph, input)
                    .map_err(|_| Error::EpicNotFound(input.trim().to_string()))?;
                Some(resolved)
            }
            None => None,
        };

        let id = match claim_candidates(&graph, epic.as_deref(), claimant).first() {
            Some(task) => task.id.clone(),
            None => return Ok(None),
        };

        let appended = vec![
            Event::new(EventBody::Claimed {
                id: id.clone(),
                agent_id: agent.to_string(),
            }),
            Event::new(EventBody::StateChanged {
                id: id.clone(),
                state: TaskState::Doing,
            }),
        ];
        self.store.append(&appended)?;
        info!(%id, %agent, "task claimed");

        events.extend(appended);
        let graph = replay(&events)?;
        graph
            .get(&id)
            .cloned()
            .map(Some)
            .ok_or_else(|| Error::TaskNotFound(id))
    }

    /// Compact the log to the minimal event sequence for the current graph.
    pub fn compact(&self) -> Result<CompactReport> {
        let _lock = self.store.lock()?;
        let (events, truncation) = self.store.read_all()?;
        let graph = replay(&events)?;

        let compacted = compact(&graph);
        self.store.replace_all(&compacted)?;

        let before_events = events.len() + truncation.map_or(0, |_| 1);
        let report = CompactReport {
            before_events,
            after_events: compacted.len(),
            removed_events: before_events.saturating_sub(compacted.len()),
            tasks: graph.len(),
            edges: graph.deps().edge_count(),
        };
        info!(
            before = report.before_events,
            after = report.after_events,
            "log compacted"
        );
        Ok(report)
    }

    /// Mint a fresh task ID: configured prefix plus a short ULID-derived
    /// suffix, grown one character at a time as the short space fills up.
    fn generate_task_id(&self, graph: &Graph) -> String {
        let prefix = self.config.tasks.id_prefix.trim();
        let mut existing_suffixes = HashSet::new();
        let mut ulid_suffix_counts: HashMap<usize, usize> = HashMap::new();
        for task in graph.tasks() {
            let id_norm = normalize_id(&task.id);
            let suffix = suffix_from_id(&id_norm);
            if suffix.is_empty() {
                continue;
            }
            existing_suffixes.insert(suffix.to_string());
            if is_ulid_suffix(suffix) {
                *ulid_suffix_counts.entry(suffix.len()).or_insert(0) += 1;
            }
        }

        let target_len = select_suffix_len(self.config.tasks.id_min_len, &ulid_suffix_counts);

        loop {
            let base = Ulid::new().to_string();
            if let Some(suffix) = unique_suffix_from_base(&base, target_len, &existing_suffixes) {
                return format!("{prefix}-{suffix}");
            }
        }
    }
}

fn normalize_id(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}

fn suffix_from_id(id_norm: &str) -> &str {
    let mut earliest = None;
    for delim in ID_DELIMS {
        if let Some(idx) = id_norm.find(delim) {
            earliest = match earliest {
                Some(current) => Some(std::cmp::min(current, idx)),
                None => Some(idx),
            };
        }
    }
    if let Some(idx) = earliest {
        let start = idx + 1;
        if start < id_norm.len() {
            &id_norm[start..]
        } else {
            ""
        }
    } else {
        id_norm
    }
}

fn is_ulid_suffix(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|ch| ULID_CHARSET.contains(ch))
}

fn ulid_space_for_len(len: usize) -> u128 {
    let mut space = 1u128;
    for _ in 0..len {
        space *= ULID_CHARSET_LEN;
    }
    space
}

fn select_suffix_len(min_len: usize, ulid_suffix_counts: &HashMap<usize, usize>) -> usize {
    let mut len = min_len;
    loop {
        let used = ulid_suffix_counts.get(&len).copied().unwrap_or(0) as u128;
        let space = ulid_space_for_len(len);
        if used >= space && len < ULID_RANDOM_LEN {
            len += 1;
            continue;
        }
        return len;
    }
}

fn unique_suffix_from_base(
    base: &str,
    len: usize,
    existing_suffixes: &HashSet<String>,
) -> Option<String> {
    let base = base.to_lowercase();
    let random_end = ULID_TIME_LEN + ULID_RANDOM_LEN;
    if base.len() < random_end || len == 0 || len > ULID_RANDOM_LEN {
        return None;
    }
    let random_part = &base[ULID_TIME_LEN..random_end];
    let candidate = &random_part[..len];
    if existing_suffixes.contains(candidate) {
        return None;
    }
    Some(candidate.to_string())
}
