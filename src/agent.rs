//! Agent identity management.
//!
//! Agent resolution order:
//! 1) CLI --agent (explicit)
//! 2) WEFT_AGENT environment variable
//! 3) Persisted value in the store directory (`.weft/agent`)
//! 4) Config default (agent.default) or "unknown"

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Error, Result};

const AGENT_FILENAME: &str = "agent";

/// Resolve the current agent using CLI, environment, persisted value, and config.
pub fn resolve_agent(
    store_dir: Option<&Path>,
    config: &Config,
    cli_agent: Option<&str>,
) -> Result<String> {
    if let Some(agent) = non_empty(cli_agent) {
        return Ok(agent.to_string());
    }

    if let Ok(env_agent) = std::env::var("WEFT_AGENT") {
        if let Some(agent) = non_empty(Some(env_agent.as_str())) {
            return Ok(agent.to_string());
        }
    }

    if let Some(dir) = store_dir {
        if let Some(agent) = load_persisted_agent(dir)? {
            return Ok(agent);
        }
    }

    Ok(config.agent.default.clone())
}

/// Persist the agent identity in the store directory.
pub fn persist_agent(store_dir: &Path, agent: &str) -> Result<()> {
    let agent = non_empty(Some(agent))
        .ok_or_else(|| Error::InvalidArgument("agent name cannot be empty".to_string()))?;

    std::fs::create_dir_all(store_dir)?;
    std::fs::write(agent_path(store_dir), format!("{agent}\n"))?;
    Ok(())
}

/// Load the persisted agent identity, if present.
pub fn load_persisted_agent(store_dir: &Path) -> Result<Option<String>> {
    let path = agent_path(store_dir);
    if !path.exists() {
        return Ok(None);
    }

    let raw = std::fs::read_to_string(path)?;
    let agent = raw.trim();
    if agent.is_empty() {
        return Ok(None);
    }

    Ok(Some(agent.to_string()))
}

fn agent_path(store_dir: &Path) -> PathBuf {
    store_dir.join(AGENT_FILENAME)
}

fn non_empty(input: Option<&str>) -> Option<&str> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}
