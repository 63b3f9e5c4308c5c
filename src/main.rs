//! weft - event-sourced task coordination CLI
//!
//! A shared task graph for many parallel agents, backed by an append-only
//! event log with advisory locking, readiness analysis, and compaction.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use weft::cli::Cli;
use weft::output::emit_error;

fn main() {
    // Tracing is opt-in via RUST_LOG.
    // Keep startup robust in CI/robot envs: ignore invalid/huge filters.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| {
            let raw = raw.trim();
            if raw.is_empty() || raw.len() > 4096 {
                return None;
            }
            EnvFilter::try_new(raw).ok()
        })
        .unwrap_or_else(|| EnvFilter::new("off"));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let command = command_name_from_args();
    let cli = Cli::parse();
    let json = cli.json;
    if let Err(err) = cli.run() {
        let _ = emit_error(&command, &err, json);
        std::process::exit(err.exit_code());
    }
}

fn command_name_from_args() -> String {
    let mut args = std::env::args().skip(1);
    let mut command = None;
    for arg in args.by_ref() {
        if arg.starts_with('-') {
            continue;
        }
        command = Some(arg);
        break;
    }

    let command = match command {
        Some(cmd) => cmd,
        None => return "weft".to_string(),
    };

    if command == "agent" {
        for arg in args {
            if arg.starts_with('-') {
                continue;
            }
            return format!("{command} {arg}");
        }
    }

    command
}
