//! weft agent command implementations.

use serde::Serialize;

use crate::agent::persist_agent;
use crate::error::Result;
use crate::ops::GraphStore;
use crate::output::{emit_success, HumanOutput};

use super::task::CommonOptions;

pub struct SetOptions {
    pub name: String,
    pub common: CommonOptions,
}

#[derive(Debug, Serialize)]
struct AgentOutput {
    agent: String,
}

pub fn run_show(common: CommonOptions) -> Result<()> {
    let ops = GraphStore::open(&common.workdir()?)?;
    let agent = common.resolve_agent(&ops)?;

    let output = AgentOutput {
        agent: agent.clone(),
    };
    let human = HumanOutput::new(format!("Agent: {agent}"));
    emit_success(common.output(), "agent show", &output, Some(&human))
}

pub fn run_set(options: SetOptions) -> Result<()> {
    let ops = GraphStore::open(&options.common.workdir()?)?;
    persist_agent(ops.store().dir(), &options.name)?;

    let output = AgentOutput {
        agent: options.name.trim().to_string(),
    };
    let human = HumanOutput::new(format!("Agent set to {}", output.agent));
    emit_success(options.common.output(), "agent set", &output, Some(&human))
}
