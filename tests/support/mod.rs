#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

pub struct TestStore {
    dir: TempDir,
}

impl TestStore {
    /// Fresh temp directory with an initialized store.
    pub fn init() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        weft_cmd(dir.path()).arg("init").assert().success();
        Self { dir }
    }

    /// Fresh temp directory without a store.
    pub fn bare() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn store_dir(&self) -> PathBuf {
        self.dir.path().join(".weft")
    }

    pub fn log_path(&self) -> PathBuf {
        self.store_dir().join("events.jsonl")
    }

    pub fn read_log(&self) -> String {
        fs::read_to_string(self.log_path()).expect("failed to read event log")
    }

    pub fn cmd(&self) -> Command {
        weft_cmd(self.dir.path())
    }

    /// Create a task via the CLI and return its assigned ID.
    pub fn create(&self, body: &str, epic: Option<&str>) -> String {
        let mut cmd = self.cmd();
        cmd.args(["create", body, "--json"]);
        if let Some(epic) = epic {
            cmd.args(["--epic", epic]);
        }
        let output = cmd.assert().success().get_output().stdout.clone();
        let value: Value = serde_json::from_slice(&output).expect("create emits JSON");
        value["data"]["id"]
            .as_str()
            .expect("created task has an id")
            .to_string()
    }
}

pub fn weft_cmd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("weft").expect("binary");
    cmd.current_dir(dir);
    // Keep tests hermetic against the invoking shell's identity.
    cmd.env_remove("WEFT_AGENT");
    cmd.env_remove("WEFT_DIR");
    cmd
}

pub fn parse_json(stdout: &[u8]) -> Value {
    serde_json::from_slice(stdout).expect("command emits JSON")
}
