mod support;

use serde_json::Value;

use support::TestStore;

fn list_json(store: &TestStore, extra: &[&str]) -> Value {
    let mut cmd = store.cmd();
    cmd.args(["list", "--json"]);
    cmd.args(extra);
    let output = cmd.assert().success().get_output().stdout.clone();
    support::parse_json(&output)
}

fn show_json(store: &TestStore, id: &str) -> Value {
    let output = store
        .cmd()
        .args(["show", id, "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    support::parse_json(&output)
}

#[test]
fn epic_and_children_full_lifecycle() {
    let store = TestStore::init();

    let epic = store.create("Ship the importer", None);
    let parse = store.create("Write the parser", Some(&epic));
    let wire = store.create("Wire it into the pipeline", Some(&epic));

    // The pipeline work depends on the parser.
    store
        .cmd()
        .args(["link", &wire, &parse])
        .assert()
        .success();

    // Parser is ready, pipeline is blocked behind it.
    let parse_view = show_json(&store, &parse);
    assert_eq!(parse_view["data"]["ready"].as_bool(), Some(true));
    let wire_view = show_json(&store, &wire);
    assert_eq!(wire_view["data"]["ready"].as_bool(), Some(false));
    assert_eq!(wire_view["data"]["blocked"].as_bool(), Some(true));

    // The epic itself never shows as ready and reports completeness.
    let epic_view = show_json(&store, &epic);
    assert_eq!(epic_view["data"]["ready"].as_bool(), Some(false));
    assert_eq!(epic_view["data"]["epic_complete"].as_bool(), Some(false));

    // Claim picks the parser (oldest ready task), not the blocked one.
    let output = store
        .cmd()
        .args(["claim", "--json"])
        .env("WEFT_AGENT", "bot-1")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let claim = support::parse_json(&output);
    assert_eq!(claim["data"]["claimed"].as_bool(), Some(true));
    assert_eq!(claim["data"]["task"]["id"].as_str(), Some(parse.as_str()));
    assert_eq!(claim["data"]["task"]["state"].as_str(), Some("doing"));
    assert_eq!(claim["data"]["task"]["claimed_by"].as_str(), Some("bot-1"));

    // Nothing else is ready while the parser is unfinished.
    let output = store
        .cmd()
        .args(["claim", "--json"])
        .env("WEFT_AGENT", "bot-2")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let claim = support::parse_json(&output);
    assert_eq!(claim["data"]["claimed"].as_bool(), Some(false));

    // Done releases the claim and unblocks the dependent.
    store.cmd().args(["done", &parse]).assert().success();
    let parse_view = show_json(&store, &parse);
    assert_eq!(parse_view["data"]["state"].as_str(), Some("done"));
    assert!(parse_view["data"]["claimed_by"].is_null());

    let wire_view = show_json(&store, &wire);
    assert_eq!(wire_view["data"]["ready"].as_bool(), Some(true));

    store.cmd().args(["done", &wire]).assert().success();
    let epic_view = show_json(&store, &epic);
    assert_eq!(epic_view["data"]["epic_complete"].as_bool(), Some(true));
}

#[test]
fn list_filters_by_readiness_state_and_epic() {
    let store = TestStore::init();

    let epic = store.create("Epic A", None);
    let other_epic = store.create("Epic B", None);
    let a = store.create("a", Some(&epic));
    let b = store.create("b", Some(&epic));
    let c = store.create("c", Some(&other_epic));
    store.cmd().args(["link", &b, &a]).assert().success();

    let ready = list_json(&store, &["--ready"]);
    let ready_ids: Vec<&str> = ready["data"]["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|task| task["id"].as_str().unwrap())
        .collect();
    assert!(ready_ids.contains(&a.as_str()));
    assert!(ready_ids.contains(&c.as_str()));
    assert!(!ready_ids.contains(&b.as_str()));
    assert!(!ready_ids.contains(&epic.as_str()));

    let blocked = list_json(&store, &["--blocked"]);
    let blocked_ids: Vec<&str> = blocked["data"]["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|task| task["id"].as_str().unwrap())
        .collect();
    assert_eq!(blocked_ids, vec![b.as_str()]);

    let children = list_json(&store, &["--epic", &epic]);
    assert_eq!(children["data"]["total"].as_u64(), Some(2));

    store.cmd().args(["done", &a]).assert().success();
    let done = list_json(&store, &["--state", "done"]);
    assert_eq!(done["data"]["total"].as_u64(), Some(1));
}

#[test]
fn epic_dependencies_gate_child_readiness() {
    let store = TestStore::init();

    let first = store.create("Phase one", None);
    let second = store.create("Phase two", None);
    let setup = store.create("setup", Some(&first));
    let follow = store.create("follow-up", Some(&second));

    // Phase two depends on phase one at the epic level.
    store
        .cmd()
        .args(["link", &second, &first])
        .assert()
        .success();

    // No dependency edge touches the follow-up task itself, yet it is not
    // ready until phase one is complete.
    let view = show_json(&store, &follow);
    assert_eq!(view["data"]["ready"].as_bool(), Some(false));

    store.cmd().args(["done", &setup]).assert().success();
    let view = show_json(&store, &follow);
    assert_eq!(view["data"]["ready"].as_bool(), Some(true));
}

#[test]
fn cycle_and_cross_kind_links_are_rejected() {
    let store = TestStore::init();

    let epic = store.create("epic", None);
    let a = store.create("a", Some(&epic));
    let b = store.create("b", Some(&epic));

    store.cmd().args(["link", &a, &b]).assert().success();

    // Closing the loop is an invariant violation, exit 3.
    store
        .cmd()
        .args(["link", &b, &a])
        .assert()
        .failure()
        .code(3);
    store
        .cmd()
        .args(["link", &a, &a])
        .assert()
        .failure()
        .code(3);

    // Task-to-epic edges are rejected.
    store
        .cmd()
        .args(["link", &a, &epic])
        .assert()
        .failure()
        .code(3);

    // Unlink then relink in the other direction is fine.
    store.cmd().args(["unlink", &a, &b]).assert().success();
    store.cmd().args(["link", &b, &a]).assert().success();
}

#[test]
fn worker_affinity_filters_claims() {
    let store = TestStore::init();

    let epic = store.create("epic", None);
    let output = store
        .cmd()
        .args([
            "create",
            "human only",
            "--epic",
            &epic,
            "--worker",
            "human",
            "--json",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let human_task = support::parse_json(&output)["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    // An agent claimant cannot take a human task.
    let output = store
        .cmd()
        .args(["claim", "--worker", "agent", "--json"])
        .env("WEFT_AGENT", "bot-1")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(
        support::parse_json(&output)["data"]["claimed"].as_bool(),
        Some(false)
    );

    // A human claimant can.
    let output = store
        .cmd()
        .args(["claim", "--worker", "human", "--json"])
        .env("WEFT_AGENT", "pat")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let claim = support::parse_json(&output);
    assert_eq!(claim["data"]["task"]["id"].as_str(), Some(human_task.as_str()));
}

#[test]
fn update_validates_transitions_and_claims() {
    let store = TestStore::init();

    let epic = store.create("epic", None);
    let task = store.create("task", Some(&epic));

    // doing without a claim violates the claim invariant, exit 3.
    store
        .cmd()
        .args(["update", &task, "--state", "doing"])
        .assert()
        .failure()
        .code(3);

    store
        .cmd()
        .args(["update", &task, "--state", "doing", "--claim"])
        .env("WEFT_AGENT", "bot-1")
        .assert()
        .success();

    // A second agent cannot steal the claim.
    store
        .cmd()
        .args(["update", &task, "--claim"])
        .env("WEFT_AGENT", "bot-2")
        .assert()
        .failure()
        .code(3);

    // Epics have no direct state.
    store
        .cmd()
        .args(["update", &epic, "--state", "done"])
        .assert()
        .failure()
        .code(3);

    // done -> error is outside the transition table.
    store.cmd().args(["done", &task]).assert().success();
    store
        .cmd()
        .args(["update", &task, "--state", "error"])
        .assert()
        .failure()
        .code(3);

    // Reopening is allowed.
    store
        .cmd()
        .args(["update", &task, "--state", "todo"])
        .assert()
        .success();
}

#[test]
fn fuzzy_ids_work_across_commands() {
    let store = TestStore::init();

    let epic = store.create("epic", None);
    let task = store.create("task", Some(&epic));
    let suffix = task.strip_prefix("wf-").unwrap();

    let view = show_json(&store, suffix);
    assert_eq!(view["data"]["id"].as_str(), Some(task.as_str()));

    let view = show_json(&store, &task.to_uppercase());
    assert_eq!(view["data"]["id"].as_str(), Some(task.as_str()));
}
