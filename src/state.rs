//! Task state machine.
//!
//! Six states with a closed transition table. done/canceled/error are
//! near-terminal: they are reachable again only through an explicit reopen
//! to todo, and error must pass back through todo/doing rather than jumping
//! to done or blocked.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Todo,
    Doing,
    Done,
    Blocked,
    Canceled,
    Error,
}

impl TaskState {
    pub const ALL: [TaskState; 6] = [
        TaskState::Todo,
        TaskState::Doing,
        TaskState::Done,
        TaskState::Blocked,
        TaskState::Canceled,
        TaskState::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Todo => "todo",
            TaskState::Doing => "doing",
            TaskState::Done => "done",
            TaskState::Blocked => "blocked",
            TaskState::Canceled => "canceled",
            TaskState::Error => "error",
        }
    }

    /// A settled task no longer gates its dependents.
    pub fn is_settled(&self) -> bool {
        matches!(self, TaskState::Done | TaskState::Canceled)
    }

    /// States that require a non-empty claim.
    pub fn requires_claim(&self) -> bool {
        matches!(self, TaskState::Doing | TaskState::Error)
    }

    /// States that force the claim empty. Blocked is unconstrained.
    pub fn forbids_claim(&self) -> bool {
        matches!(
            self,
            TaskState::Todo | TaskState::Done | TaskState::Canceled
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskState {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "todo" => Ok(TaskState::Todo),
            "doing" => Ok(TaskState::Doing),
            "done" => Ok(TaskState::Done),
            "blocked" => Ok(TaskState::Blocked),
            "canceled" | "cancelled" => Ok(TaskState::Canceled),
            "error" => Ok(TaskState::Error),
            other => Err(Error::InvalidArgument(format!(
                "unknown task state '{other}' (expected todo|doing|done|blocked|canceled|error)"
            ))),
        }
    }
}

/// Whether the transition table permits `from -> to`. No-ops are always legal.
pub fn transition_allowed(from: TaskState, to: TaskState) -> bool {
    use TaskState::*;
    if from == to {
        return true;
    }
    matches!(
        (from, to),
        (Todo, Doing | Done | Blocked | Canceled)
            | (Doing, Todo | Done | Blocked | Canceled | Error)
            | (Blocked, Todo | Doing | Done | Canceled)
            | (Done, Todo)
            | (Canceled, Todo)
            | (Error, Todo | Doing | Canceled)
    )
}

/// Reject a transition outside the table before any event is appended.
pub fn check_transition(id: &str, from: TaskState, to: TaskState) -> Result<()> {
    if transition_allowed(from, to) {
        Ok(())
    } else {
        Err(Error::InvalidTransition {
            id: id.to_string(),
            from,
            to,
        })
    }
}

/// Check the claim invariant against a post-transition state.
///
/// {doing, error} require a claiming agent; {todo, done, canceled} forbid
/// one; blocked is unconstrained either way.
pub fn check_claim_invariant(id: &str, state: TaskState, claimed_by: Option<&str>) -> Result<()> {
    let claimed = claimed_by.map(str::trim).is_some_and(|agent| !agent.is_empty());
    if state.requires_claim() && !claimed {
        return Err(Error::ClaimStateMismatch {
            id: id.to_string(),
            detail: format!("state '{state}' requires a claiming agent"),
        });
    }
    if state.forbids_claim() && claimed {
        return Err(Error::ClaimStateMismatch {
            id: id.to_string(),
            detail: format!("state '{state}' forbids a claim"),
        });
    }
    Ok(())
}
