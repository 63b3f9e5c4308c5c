//! weft init command implementation.

use serde::Serialize;

use crate::error::Result;
use crate::ops::GraphStore;
use crate::output::{emit_success, HumanOutput};

use super::task::CommonOptions;

#[derive(Debug, Serialize)]
struct InitOutput {
    store_dir: String,
    log_path: String,
}

pub fn run(common: CommonOptions) -> Result<()> {
    let workdir = common.workdir()?;
    let ops = GraphStore::init(&workdir)?;

    let output = InitOutput {
        store_dir: ops.store().dir().display().to_string(),
        log_path: ops.store().log_path().display().to_string(),
    };

    let mut human = HumanOutput::new("Initialized weft store");
    human.push_summary("Store", output.store_dir.clone());

    emit_success(common.output(), "init", &output, Some(&human))
}
