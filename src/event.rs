//! Log events for the task graph.
//!
//! Each log line is `{"type": ..., "timestamp": ..., "payload": {...}}`.
//! The payload is a closed tagged union decoded up front: the replay engine
//! matches it exhaustively, so a new event kind that reaches the reducer
//! without a handler is a compile-time error rather than a silent no-op.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::graph::Worker;
use crate::state::TaskState;

/// One appended log record. Immutable once written; total order is append
/// order under the store lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub body: EventBody,
}

impl Event {
    /// Build an event stamped with the current time.
    pub fn new(body: EventBody) -> Self {
        Self {
            timestamp: Utc::now(),
            body,
        }
    }

    /// Build an event with an explicit timestamp (replayed fixtures,
    /// compaction output).
    pub fn at(timestamp: DateTime<Utc>, body: EventBody) -> Self {
        Self { timestamp, body }
    }
}

/// Dependency edge kind. Only `depends` exists today; the field is kept on
/// the wire so link records stay self-describing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    #[default]
    Depends,
}

/// The closed set of event payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum EventBody {
    /// Instantiates a task. `created_at` is carried in the payload so
    /// compaction can re-emit the original creation time.
    TaskCreated {
        id: String,
        uuid: Uuid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        epic_id: Option<String>,
        state: TaskState,
        body: String,
        worker: Worker,
        created_at: DateTime<Utc>,
    },
    StateChanged {
        id: String,
        state: TaskState,
    },
    Linked {
        from_id: String,
        to_id: String,
        #[serde(default)]
        kind: LinkKind,
    },
    Unlinked {
        from_id: String,
        to_id: String,
        #[serde(default)]
        kind: LinkKind,
    },
    Claimed {
        id: String,
        agent_id: String,
    },
    Unclaimed {
        id: String,
    },
    WorkerChanged {
        id: String,
        worker: Worker,
    },
    BodyChanged {
        id: String,
        body: String,
    },
    EpicChanged {
        id: String,
        epic_id: String,
    },
}

impl EventBody {
    /// The primary task this event targets, when there is a single one.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            EventBody::TaskCreated { id, .. }
            | EventBody::StateChanged { id, .. }
            | EventBody::Claimed { id, .. }
            | EventBody::Unclaimed { id }
            | EventBody::WorkerChanged { id, .. }
            | EventBody::BodyChanged { id, .. }
            | EventBody::EpicChanged { id, .. } => Some(id),
            EventBody::Linked { .. } | EventBody::Unlinked { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape_is_type_timestamp_payload() {
        let event = Event::new(EventBody::StateChanged {
            id: "wf-abc".to_string(),
            state: TaskState::Doing,
        });
        let value: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "state_changed");
        assert!(value["timestamp"].is_string());
        assert_eq!(value["payload"]["id"], "wf-abc");
        assert_eq!(value["payload"]["state"], "doing");
    }

    #[test]
    fn creation_round_trips_with_optional_epic() {
        let event = Event::new(EventBody::TaskCreated {
            id: "wf-abc".to_string(),
            uuid: Uuid::new_v4(),
            epic_id: None,
            state: TaskState::Todo,
            body: "write the parser".to_string(),
            worker: Worker::Any,
            created_at: Utc::now(),
        });
        let line = serde_json::to_string(&event).unwrap();
        assert!(!line.contains("epic_id"));
        let back: Event = serde_json::from_str(&line).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn link_defaults_to_depends() {
        let line = r#"{"type":"linked","timestamp":"2026-01-05T10:00:00Z","payload":{"from_id":"wf-a","to_id":"wf-b"}}"#;
        let event: Event = serde_json::from_str(line).unwrap();
        assert_eq!(
            event.body,
            EventBody::Linked {
                from_id: "wf-a".to_string(),
                to_id: "wf-b".to_string(),
                kind: LinkKind::Depends,
            }
        );
    }

    #[test]
    fn unknown_type_fails_to_decode() {
        let line = r#"{"type":"task_vaporized","timestamp":"2026-01-05T10:00:00Z","payload":{"id":"wf-a"}}"#;
        assert!(serde_json::from_str::<Event>(line).is_err());
    }
}
