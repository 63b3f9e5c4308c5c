mod support;

use predicates::str::contains;

use support::TestStore;

#[test]
fn weft_help_works() {
    TestStore::bare()
        .cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("task coordination"));
}

#[test]
fn subcommand_help_works() {
    let store = TestStore::bare();
    let subcommands = [
        "init", "create", "list", "show", "link", "unlink", "update", "claim", "done", "compact",
        "agent",
    ];

    for cmd in subcommands {
        store.cmd().arg(cmd).arg("--help").assert().success();
    }
}

#[test]
fn commands_require_an_initialized_store() {
    let store = TestStore::bare();
    store.cmd().args(["list"]).assert().failure().code(2);
}

#[test]
fn init_creates_the_log_and_is_idempotent() {
    let store = TestStore::init();
    assert!(store.log_path().is_file());

    store.cmd().arg("init").assert().success();
    store.cmd().arg("list").assert().success();
}

#[test]
fn json_envelope_carries_schema_version() {
    let store = TestStore::init();
    let output = store
        .cmd()
        .args(["list", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value = support::parse_json(&output);
    assert_eq!(value["schema_version"].as_str(), Some("weft.v1"));
    assert_eq!(value["status"].as_str(), Some("success"));
    assert_eq!(value["command"].as_str(), Some("list"));
    assert_eq!(value["data"]["total"].as_u64(), Some(0));
}

#[test]
fn errors_map_to_exit_codes_and_json() {
    let store = TestStore::init();

    // Unknown task: user error, exit 2.
    let output = store
        .cmd()
        .args(["show", "wf-nope", "--json"])
        .assert()
        .failure()
        .code(2)
        .get_output()
        .stdout
        .clone();
    let value = support::parse_json(&output);
    assert_eq!(value["status"].as_str(), Some("error"));
    assert_eq!(value["error"]["kind"].as_str(), Some("validation"));
    assert_eq!(value["error"]["code"].as_i64(), Some(2));
    assert_eq!(value["error"]["retryable"].as_bool(), Some(false));
}

#[test]
fn agent_set_and_show_round_trip() {
    let store = TestStore::init();
    store
        .cmd()
        .args(["agent", "set", "bot-42"])
        .assert()
        .success();

    let output = store
        .cmd()
        .args(["agent", "show", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value = support::parse_json(&output);
    assert_eq!(value["data"]["agent"].as_str(), Some("bot-42"));
}
