//! weft task command implementations.

use std::io::Read;
use std::path::PathBuf;

use serde::Serialize;

use crate::agent::resolve_agent;
use crate::error::{Error, Result};
use crate::graph::{Graph, Task, Worker};
use crate::ops::{ClaimChange, CreateRequest, GraphStore, Snapshot, UpdateRequest};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::ready::{is_blocked, is_epic_complete, is_ready};
use crate::state::TaskState;
use crate::store::TruncationNotice;

/// Options shared by every subcommand.
pub struct CommonOptions {
    pub dir: Option<PathBuf>,
    pub agent: Option<String>,
    pub json: bool,
    pub quiet: bool,
}

impl CommonOptions {
    pub fn workdir(&self) -> Result<PathBuf> {
        match &self.dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    pub fn output(&self) -> OutputOptions {
        OutputOptions {
            json: self.json,
            quiet: self.quiet,
        }
    }

    pub fn resolve_agent(&self, ops: &GraphStore) -> Result<String> {
        resolve_agent(
            Some(ops.store().dir()),
            ops.config(),
            self.agent.as_deref(),
        )
    }
}

pub struct CreateOptions {
    pub body: String,
    pub epic: Option<String>,
    pub worker: Option<String>,
    pub common: CommonOptions,
}

pub struct ListOptions {
    pub ready: bool,
    pub blocked: bool,
    pub epic: Option<String>,
    pub state: Option<String>,
    pub common: CommonOptions,
}

pub struct ShowOptions {
    pub id: String,
    pub common: CommonOptions,
}

pub struct UpdateOptions {
    pub id: String,
    pub state: Option<String>,
    pub claim: bool,
    pub release: bool,
    pub body: Option<String>,
    pub worker: Option<String>,
    pub epic: Option<String>,
    pub common: CommonOptions,
}

pub struct ClaimOptions {
    pub epic: Option<String>,
    pub worker: Option<String>,
    pub common: CommonOptions,
}

pub struct DoneOptions {
    pub id: String,
    pub common: CommonOptions,
}

/// One task as it appears in command output, with derived readiness.
#[derive(Debug, Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub ready: bool,
    pub blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epic_complete: Option<bool>,
}

impl TaskView {
    pub fn new(graph: &Graph, task: &Task) -> Self {
        let epic_complete = task
            .is_epic()
            .then(|| is_epic_complete(graph, &task.id));
        Self {
            ready: is_ready(graph, task),
            blocked: is_blocked(graph, task),
            epic_complete,
            task: task.clone(),
        }
    }
}

pub fn run_create(options: CreateOptions) -> Result<()> {
    let ops = GraphStore::open(&options.common.workdir()?)?;
    let body = read_body(&options.body)?;
    let worker = parse_worker(options.worker.as_deref())?;

    let task = ops.create_task(CreateRequest {
        body,
        epic_id: options.epic,
        worker,
    })?;

    let mut human = HumanOutput::new(format!(
        "Created {} {}",
        if task.is_epic() { "epic" } else { "task" },
        task.id
    ));
    human.push_summary("State", task.state.to_string());
    if let Some(epic) = &task.epic_id {
        human.push_summary("Epic", epic.clone());
    }
    human.push_summary("Worker", task.worker.to_string());

    emit_success(options.common.output(), "create", &task, Some(&human))
}

#[derive(Debug, Serialize)]
struct ListOutput {
    total: usize,
    tasks: Vec<TaskView>,
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let ops = GraphStore::open(&options.common.workdir()?)?;
    let Snapshot { graph, truncation } = ops.snapshot()?;

    let state_filter = options
        .state
        .as_deref()
        .map(str::parse::<TaskState>)
        .transpose()?;
    let epic_filter = options
        .epic
        .as_deref()
        .map(|input| ops.resolve_id(&graph, input))
        .transpose()?;

    let tasks: Vec<TaskView> = graph
        .tasks()
        .filter(|task| {
            epic_filter
                .as_deref()
                .map_or(true, |epic| task.epic_id.as_deref() == Some(epic))
        })
        .filter(|task| state_filter.map_or(true, |state| task.state == state))
        .map(|task| TaskView::new(&graph, task))
        .filter(|view| !options.ready || view.ready)
        .filter(|view| !options.blocked || view.blocked)
        .collect();

    let output = ListOutput {
        total: tasks.len(),
        tasks,
    };

    let mut human = HumanOutput::new("Tasks");
    human.push_summary("Total", output.total.to_string());
    if let Some(epic) = &epic_filter {
        human.push_summary("Epic", epic.clone());
    }
    push_truncation_warning(&mut human, truncation.as_ref());
    for view in &output.tasks {
        let mut line = format!("[{}] {} {}", view.task.state, view.task.id, first_line(&view.task.body));
        if view.ready {
            line.push_str(" (ready)");
        } else if view.blocked {
            line.push_str(" (blocked)");
        }
        human.push_summary(line, "");
    }

    emit_success(options.common.output(), "list", &output, Some(&human))
}

pub fn run_show(options: ShowOptions) -> Result<()> {
    let ops = GraphStore::open(&options.common.workdir()?)?;
    let Snapshot { graph, truncation } = ops.snapshot()?;

    let id = ops.resolve_id(&graph, &options.id)?;
    let task = graph
        .get(&id)
        .ok_or_else(|| Error::TaskNotFound(id.clone()))?;
    let view = TaskView::new(&graph, task);

    let mut human = HumanOutput::new(format!("{} {}", id, first_line(&task.body)));
    human.push_summary("State", task.state.to_string());
    human.push_summary("Worker", task.worker.to_string());
    if let Some(epic) = &task.epic_id {
        human.push_summary("Epic", epic.clone());
    }
    if let Some(agent) = &task.claimed_by {
        human.push_summary("Claimed by", agent.clone());
    }
    if !task.deps.is_empty() {
        human.push_summary("Depends on", task.deps.join(", "));
    }
    if !task.rdeps.is_empty() {
        human.push_summary("Needed by", task.rdeps.join(", "));
    }
    if let Some(complete) = view.epic_complete {
        human.push_summary("Epic complete", complete.to_string());
    } else {
        human.push_summary("Ready", view.ready.to_string());
    }
    human.push_summary("Created", task.created_at.to_rfc3339());
    human.push_summary("Updated", task.updated_at.to_rfc3339());
    push_truncation_warning(&mut human, truncation.as_ref());

    emit_success(options.common.output(), "show", &view, Some(&human))
}

pub fn run_update(options: UpdateOptions) -> Result<()> {
    let ops = GraphStore::open(&options.common.workdir()?)?;

    let claim = if options.claim {
        let agent = options.common.resolve_agent(&ops)?;
        Some(ClaimChange::Claim(agent))
    } else if options.release {
        Some(ClaimChange::Release)
    } else {
        None
    };

    let request = UpdateRequest {
        state: options.state.as_deref().map(str::parse).transpose()?,
        claim,
        body: options.body.as_deref().map(read_body).transpose()?,
        worker: parse_worker(options.worker.as_deref())?,
        epic_id: options.epic,
    };

    let task = ops.update(&options.id, request)?;

    let mut human = HumanOutput::new(format!("Updated {}", task.id));
    human.push_summary("State", task.state.to_string());
    if let Some(agent) = &task.claimed_by {
        human.push_summary("Claimed by", agent.clone());
    }

    emit_success(options.common.output(), "update", &task, Some(&human))
}

#[derive(Debug, Serialize)]
struct ClaimOutput {
    claimed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    task: Option<Task>,
}

pub fn run_claim(options: ClaimOptions) -> Result<()> {
    let ops = GraphStore::open(&options.common.workdir()?)?;
    let agent = options.common.resolve_agent(&ops)?;
    let claimant = parse_worker(options.worker.as_deref())?.unwrap_or(Worker::Agent);

    let task = ops.claim_next(&agent, options.epic.as_deref(), claimant)?;

    let human = match &task {
        Some(task) => {
            let mut human = HumanOutput::new(format!("Claimed {}", task.id));
            human.push_summary("Body", first_line(&task.body).to_string());
            human.push_summary("Agent", agent.clone());
            human
        }
        None => HumanOutput::new("No ready task to claim"),
    };

    let output = ClaimOutput {
        claimed: task.is_some(),
        task,
    };
    emit_success(options.common.output(), "claim", &output, Some(&human))
}

pub fn run_done(options: DoneOptions) -> Result<()> {
    let ops = GraphStore::open(&options.common.workdir()?)?;
    let task = ops.update(
        &options.id,
        UpdateRequest {
            state: Some(TaskState::Done),
            ..Default::default()
        },
    )?;

    let human = HumanOutput::new(format!("Done {}", task.id));
    emit_success(options.common.output(), "done", &task, Some(&human))
}

pub fn push_truncation_warning(human: &mut HumanOutput, truncation: Option<&TruncationNotice>) {
    if let Some(notice) = truncation {
        human.push_warning(format!(
            "dropped truncated final line {} of {}",
            notice.line,
            notice.path.display()
        ));
    }
}

fn read_body(input: &str) -> Result<String> {
    if input.trim() == "-" {
        let mut body = String::new();
        std::io::stdin().read_to_string(&mut body)?;
        Ok(body)
    } else {
        Ok(input.to_string())
    }
}

fn parse_worker(input: Option<&str>) -> Result<Option<Worker>> {
    input.map(str::parse).transpose()
}

fn first_line(body: &str) -> &str {
    body.lines().next().unwrap_or_default()
}
