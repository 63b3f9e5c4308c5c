//! weft dependency and maintenance command implementations.

use serde::Serialize;

use crate::error::Result;
use crate::ops::GraphStore;
use crate::output::{emit_success, HumanOutput};

use super::task::CommonOptions;

pub struct LinkOptions {
    pub from: String,
    pub to: String,
    pub unlink: bool,
    pub common: CommonOptions,
}

#[derive(Debug, Serialize)]
struct LinkOutput {
    from: String,
    to: String,
    linked: bool,
}

pub fn run_link(options: LinkOptions) -> Result<()> {
    let ops = GraphStore::open(&options.common.workdir()?)?;

    let (from, to) = if options.unlink {
        ops.unlink(&options.from, &options.to)?
    } else {
        ops.link(&options.from, &options.to)?
    };

    let (command, header) = if options.unlink {
        ("unlink", format!("{from} no longer depends on {to}"))
    } else {
        ("link", format!("{from} depends on {to}"))
    };

    let output = LinkOutput {
        from,
        to,
        linked: !options.unlink,
    };
    let human = HumanOutput::new(header);
    emit_success(options.common.output(), command, &output, Some(&human))
}

pub fn run_compact(common: CommonOptions) -> Result<()> {
    let ops = GraphStore::open(&common.workdir()?)?;
    let report = ops.compact()?;

    let mut human = HumanOutput::new("Log compacted");
    human.push_summary("Events before", report.before_events.to_string());
    human.push_summary("Events after", report.after_events.to_string());
    human.push_summary("Removed", report.removed_events.to_string());
    human.push_summary("Tasks", report.tasks.to_string());
    human.push_summary("Edges", report.edges.to_string());

    emit_success(common.output(), "compact", &report, Some(&human))
}
