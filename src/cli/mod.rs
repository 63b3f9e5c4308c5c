//! Command-line interface for weft
//!
//! This module defines the CLI structure using clap derive macros.
//! Each subcommand is implemented in its own submodule.

use clap::{Parser, Subcommand};

use crate::error::Result;

mod agent;
mod graph;
mod init;
mod task;

/// weft - event-sourced task coordination for parallel agents
///
/// A shared task graph backed by an append-only event log, safe for many
/// agents to read and mutate concurrently.
#[derive(Parser, Debug)]
#[command(name = "weft")]
#[command(author, version, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Working directory holding the store (defaults to current directory)
    #[arg(long, global = true, env = "WEFT_DIR")]
    pub dir: Option<std::path::PathBuf>,

    /// Agent identity for claims
    #[arg(long, global = true, env = "WEFT_AGENT")]
    pub agent: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a store in the working directory
    Init,

    /// Create a task (or an epic, when --epic is omitted)
    Create {
        /// Task body; pass "-" to read from stdin
        body: String,

        /// Parent epic for the new task
        #[arg(long)]
        epic: Option<String>,

        /// Worker affinity: any, agent, human
        #[arg(long)]
        worker: Option<String>,
    },

    /// List tasks
    List {
        /// Only tasks that are ready to claim
        #[arg(long)]
        ready: bool,

        /// Only tasks that are blocked
        #[arg(long, conflicts_with = "ready")]
        blocked: bool,

        /// Only children of this epic
        #[arg(long)]
        epic: Option<String>,

        /// Only tasks in this state
        #[arg(long)]
        state: Option<String>,
    },

    /// Show one task in full
    Show {
        /// Task ID (full, suffix, or unambiguous prefix)
        id: String,
    },

    /// Add a dependency: FROM depends on TO
    Link {
        from: String,
        to: String,
    },

    /// Remove a dependency
    Unlink {
        from: String,
        to: String,
    },

    /// Update a task's state, claim, body, worker, or epic
    Update {
        /// Task ID (full, suffix, or unambiguous prefix)
        id: String,

        /// New state: todo, doing, done, blocked, canceled, error
        #[arg(long)]
        state: Option<String>,

        /// Claim the task for the current agent
        #[arg(long, conflicts_with = "release")]
        claim: bool,

        /// Release the task's claim
        #[arg(long)]
        release: bool,

        /// New body; pass "-" to read from stdin
        #[arg(long)]
        body: Option<String>,

        /// New worker affinity: any, agent, human
        #[arg(long)]
        worker: Option<String>,

        /// Reassign to this epic
        #[arg(long)]
        epic: Option<String>,
    },

    /// Claim the next ready task and move it to doing
    Claim {
        /// Only consider children of this epic
        #[arg(long)]
        epic: Option<String>,

        /// Claim as this worker kind: any, agent, human
        #[arg(long)]
        worker: Option<String>,
    },

    /// Mark a task done, releasing any claim
    Done {
        /// Task ID (full, suffix, or unambiguous prefix)
        id: String,
    },

    /// Rewrite the log to the minimal equivalent event sequence
    Compact,

    /// Agent identity management
    #[command(subcommand)]
    Agent(AgentCommands),
}

#[derive(Subcommand, Debug)]
pub enum AgentCommands {
    /// Show the resolved agent identity
    Show,

    /// Persist an agent identity in the store
    Set {
        name: String,
    },
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let common = task::CommonOptions {
            dir: self.dir,
            agent: self.agent,
            json: self.json,
            quiet: self.quiet,
        };

        match self.command {
            Commands::Init => init::run(common),
            Commands::Create { body, epic, worker } => task::run_create(task::CreateOptions {
                body,
                epic,
                worker,
                common,
            }),
            Commands::List {
                ready,
                blocked,
                epic,
                state,
            } => task::run_list(task::ListOptions {
                ready,
                blocked,
                epic,
                state,
                common,
            }),
            Commands::Show { id } => task::run_show(task::ShowOptions { id, common }),
            Commands::Link { from, to } => graph::run_link(graph::LinkOptions {
                from,
                to,
                unlink: false,
                common,
            }),
            Commands::Unlink { from, to } => graph::run_link(graph::LinkOptions {
                from,
                to,
                unlink: true,
                common,
            }),
            Commands::Update {
                id,
                state,
                claim,
                release,
                body,
                worker,
                epic,
            } => task::run_update(task::UpdateOptions {
                id,
                state,
                claim,
                release,
                body,
                worker,
                epic,
                common,
            }),
            Commands::Claim { epic, worker } => task::run_claim(task::ClaimOptions {
                epic,
                worker,
                common,
            }),
            Commands::Done { id } => task::run_done(task::DoneOptions { id, common }),
            Commands::Compact => graph::run_compact(common),
            Commands::Agent(cmd) => match cmd {
                AgentCommands::Show => agent::run_show(common),
                AgentCommands::Set { name } => agent::run_set(agent::SetOptions { name, common }),
            },
        }
    }
}
