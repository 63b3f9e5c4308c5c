//! weft - Event-Sourced Task Coordination Library
//!
//! This library provides the core functionality for the weft CLI tool,
//! coordinating a shared task graph between many parallel agents.
//!
//! # Core Concepts
//!
//! - **Event Log**: An append-only JSONL file as the single source of truth
//! - **Replay**: Deterministic materialization of the log into a task graph
//! - **Epics**: Tasks without a parent, grouping children and gating them
//! - **Claims**: Exclusive task ownership with an exactly-once winner
//! - **Compaction**: Rewriting the log to its minimal equivalent form
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `.weft.toml`
//! - `error`: Error types and result aliases
//! - `event`: The event wire format
//! - `store`: The append-only log on disk
//! - `lock`: File locking and atomic operations for concurrency safety
//! - `replay`: Pure reduction of events into a graph
//! - `graph`: The materialized task graph and dependency structure
//! - `state`: The task state machine
//! - `ready`: Readiness, blocking, and cycle queries
//! - `compact`: Log compaction
//! - `ops`: Locked mutations and consistent reads
//! - `agent`: Agent identity management

pub mod agent;
pub mod cli;
pub mod compact;
pub mod config;
pub mod error;
pub mod event;
pub mod graph;
pub mod lock;
pub mod ops;
pub mod output;
pub mod ready;
pub mod replay;
pub mod state;
pub mod store;

pub use error::{Error, Result};
