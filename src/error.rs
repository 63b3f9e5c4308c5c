//! Error types for weft
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (unknown task, bad state name, bad arguments)
//! - 3: Invariant violation (illegal transition, claim mismatch, cycle)
//! - 4: Operation failed (lock busy, corrupt log, IO)

use std::path::PathBuf;
use thiserror::Error;

use crate::state::TaskState;

/// Exit codes for the weft CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const INVARIANT_VIOLATION: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for weft operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("epic not found: {0}")]
    EpicNotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("task graph not initialized at {0} (run `weft init`)")]
    NotInitialized(PathBuf),

    // Invariant violations (exit code 3)
    #[error("illegal transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: TaskState,
        to: TaskState,
    },

    #[error("claim mismatch for {id}: {detail}")]
    ClaimStateMismatch { id: String, detail: String },

    #[error("dependency cycle: {from} -> {to} would close a loop back to {from}")]
    DependencyCycle { from: String, to: String },

    #[error("cannot link {from} to {to}: dependencies connect tasks to tasks or epics to epics")]
    CrossKindDependency { from: String, to: String },

    #[error("{0} is an epic; epic status is derived from its child tasks")]
    EpicStateDerived(String),

    // Concurrency errors (exit code 4, retryable)
    #[error("lock busy: {0}")]
    LockBusy(PathBuf),

    // Corruption errors (exit code 4, fatal to the command)
    #[error("duplicate task id in event log: {0}")]
    DuplicateTask(String),

    #[error("corrupt event log {path}:{line}: {reason}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::TaskNotFound(_)
            | Error::EpicNotFound(_)
            | Error::InvalidArgument(_)
            | Error::InvalidConfig(_)
            | Error::NotInitialized(_) => exit_codes::USER_ERROR,

            Error::InvalidTransition { .. }
            | Error::ClaimStateMismatch { .. }
            | Error::DependencyCycle { .. }
            | Error::CrossKindDependency { .. }
            | Error::EpicStateDerived(_) => exit_codes::INVARIANT_VIOLATION,

            Error::LockBusy(_)
            | Error::DuplicateTask(_)
            | Error::Corrupt { .. }
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Whether a caller can reasonably retry after backing off.
    ///
    /// Only lock contention qualifies; everything else either needs user
    /// input or indicates a damaged log.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::LockBusy(_))
    }

    /// Stable machine-readable kind for JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::TaskNotFound(_)
            | Error::EpicNotFound(_)
            | Error::InvalidArgument(_)
            | Error::InvalidConfig(_)
            | Error::NotInitialized(_) => "validation",
            Error::InvalidTransition { .. }
            | Error::ClaimStateMismatch { .. }
            | Error::DependencyCycle { .. }
            | Error::CrossKindDependency { .. }
            | Error::EpicStateDerived(_) => "invariant",
            Error::LockBusy(_) => "lock_busy",
            Error::DuplicateTask(_) | Error::Corrupt { .. } => "corrupt",
            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_) => "operation_failed",
        }
    }
}

/// Result type alias for weft operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub kind: &'static str,
    pub code: i32,
    pub retryable: bool,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            kind: err.kind(),
            code: err.exit_code(),
            retryable: err.is_retryable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_taxonomy() {
        assert_eq!(
            Error::TaskNotFound("wf-abc".into()).exit_code(),
            exit_codes::USER_ERROR
        );
        assert_eq!(
            Error::DependencyCycle {
                from: "a".into(),
                to: "b".into()
            }
            .exit_code(),
            exit_codes::INVARIANT_VIOLATION
        );
        assert_eq!(
            Error::LockBusy(PathBuf::from("graph.lock")).exit_code(),
            exit_codes::OPERATION_FAILED
        );
        assert_eq!(
            Error::DuplicateTask("wf-abc".into()).exit_code(),
            exit_codes::OPERATION_FAILED
        );
    }

    #[test]
    fn only_lock_busy_is_retryable() {
        assert!(Error::LockBusy(PathBuf::from("graph.lock")).is_retryable());
        assert!(!Error::DuplicateTask("wf-abc".into()).is_retryable());
        assert!(!Error::TaskNotFound("wf-abc".into()).is_retryable());
    }
}
