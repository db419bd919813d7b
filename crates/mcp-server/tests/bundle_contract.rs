//! Bundle assembly contract: budgets, explanations, determinism, and
//! test-path exclusion.

use repo_mcp_server::config::{load_effective_config, CliOverrides};
use repo_mcp_server::{dispatch, ServerState};
use serde_json::{json, Value};
use tempfile::TempDir;

fn write(dir: &TempDir, rel: &str, contents: &str) {
    let path = dir.path().join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

fn call(state: &mut ServerState, id: u64, method: &str, params: Value) -> Value {
    let line = json!({"id": id, "method": method, "params": params}).to_string();
    serde_json::to_value(dispatch::handle_line(state, &line)).unwrap()
}

fn bundle_fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "src/selection.py",
        concat!(
            "\"\"\"Bundle selection engine.\"\"\"\n",
            "\n",
            "def selection(candidates):\n",
            "    \"\"\"Order bundle candidates before budgeting.\"\"\"\n",
            "    return sorted(candidates)\n",
            "\n",
            "def explain(choice):\n",
            "    return f\"selected {choice}\"\n",
        ),
    );
    write(
        &dir,
        "src/budget.py",
        concat!(
            "def enforce_budget(selection, max_lines):\n",
            "    total = 0\n",
            "    kept = []\n",
            "    for item in selection:\n",
            "        total += item.lines\n",
            "        if total > max_lines:\n",
            "            break\n",
            "        kept.append(item)\n",
            "    return kept\n",
        ),
    );
    write(
        &dir,
        "docs/bundles.md",
        "How bundle selection works\n\nSelection follows ranking and budget order.\n",
    );
    write(
        &dir,
        "tests/test_selection.py",
        "def test_selection():\n    assert selection([]) == []\n",
    );
    dir
}

fn state_for(dir: &TempDir) -> ServerState {
    let config = load_effective_config(dir.path(), &CliOverrides::default()).unwrap();
    let mut state = ServerState::new(config).unwrap();
    let refresh = call(&mut state, 900, "repo.refresh_index", json!({"force": true}));
    assert_eq!(refresh["ok"], true);
    state
}

fn bundle_params() -> Value {
    json!({
        "prompt": "explain bundle selection",
        "budget": {"max_files": 3, "max_total_lines": 120},
        "strategy": "hybrid",
        "include_tests": false,
    })
}

#[test]
fn bundle_respects_budgets_and_explains_selections() {
    let dir = bundle_fixture();
    let mut state = state_for(&dir);

    let envelope = call(&mut state, 1, "repo.build_context_bundle", bundle_params());
    assert_eq!(envelope["ok"], true, "bundle failed: {envelope}");
    let bundle = &envelope["result"];

    assert!(bundle["totals"]["files"].as_u64().unwrap() <= 3);
    assert!(bundle["totals"]["lines"].as_u64().unwrap() <= 120);
    assert!(bundle["totals"]["bytes"].as_u64().unwrap() > 0);

    let selections = bundle["selections"].as_array().unwrap();
    assert!(!selections.is_empty());
    for selection in selections {
        let signals = selection["why_selected"]["matched_signals"]
            .as_array()
            .unwrap();
        assert!(!signals.is_empty());
        let components = &selection["why_selected"]["score_components"];
        assert!(components["search_score"].as_f64().unwrap() > 0.0);
        assert!(selection["rationale"].as_str().unwrap().len() > 10);
    }

    let skipped = bundle["audit"]["selection_debug"]["why_not_selected_summary"]["top_skipped"]
        .as_array()
        .unwrap();
    assert!(skipped.len() <= 10);

    let citations = bundle["citations"].as_array().unwrap();
    assert_eq!(citations.len(), selections.len());
    for (index, citation) in citations.iter().enumerate() {
        assert_eq!(citation["selection_index"].as_u64().unwrap() as usize, index);
        assert_eq!(citation["path"], selections[index]["path"]);
    }
}

#[test]
fn bundle_is_deterministic_for_fixed_state_and_prompt() {
    let dir = bundle_fixture();
    let mut state = state_for(&dir);

    let first = call(&mut state, 1, "repo.build_context_bundle", bundle_params());
    let second = call(&mut state, 2, "repo.build_context_bundle", bundle_params());

    assert_eq!(first["result"]["bundle_id"], second["result"]["bundle_id"]);
    assert_eq!(
        first["result"]["prompt_fingerprint"],
        second["result"]["prompt_fingerprint"]
    );
    assert_eq!(first["result"]["selections"], second["result"]["selections"]);
}

#[test]
fn include_tests_false_drops_test_paths() {
    let dir = bundle_fixture();
    let mut state = state_for(&dir);

    let without_tests = call(&mut state, 1, "repo.build_context_bundle", bundle_params());
    let selected_paths: Vec<&str> = without_tests["result"]["selections"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["path"].as_str().unwrap())
        .collect();
    assert!(selected_paths
        .iter()
        .all(|path| !path.starts_with("tests/")));

    let mut with_tests_params = bundle_params();
    with_tests_params["include_tests"] = json!(true);
    let with_tests = call(&mut state, 2, "repo.build_context_bundle", with_tests_params);
    assert_eq!(with_tests["ok"], true);
}

#[test]
fn definition_matches_align_to_declarations() {
    let dir = bundle_fixture();
    let mut state = state_for(&dir);

    let envelope = call(&mut state, 1, "repo.build_context_bundle", bundle_params());
    let selections = envelope["result"]["selections"].as_array().unwrap();

    // The selection engine snaps hits in src/selection.py onto the
    // enclosing function declaration and reports the symbol.
    let aligned = selections
        .iter()
        .find(|s| s["path"] == "src/selection.py")
        .expect("expected a selection from src/selection.py");
    assert!(aligned["why_selected"]["symbol_reference"].is_string());
    assert_eq!(
        aligned["why_selected"]["score_components"]["definition_match"],
        true
    );
}

#[test]
fn bundle_rejects_malformed_budget() {
    let dir = bundle_fixture();
    let mut state = state_for(&dir);

    let missing_budget = call(
        &mut state,
        1,
        "repo.build_context_bundle",
        json!({"prompt": "explain"}),
    );
    assert_eq!(missing_budget["error"]["code"], "INVALID_PARAMS");

    let zero_files = call(
        &mut state,
        2,
        "repo.build_context_bundle",
        json!({
            "prompt": "explain",
            "budget": {"max_files": 0, "max_total_lines": 100},
        }),
    );
    assert_eq!(zero_files["error"]["code"], "INVALID_PARAMS");
    assert!(zero_files["error"]["message"]
        .as_str()
        .unwrap()
        .contains("max_files"));
}

#[test]
fn last_bundle_exports_are_written() {
    let dir = bundle_fixture();
    let mut state = state_for(&dir);
    call(&mut state, 1, "repo.build_context_bundle", bundle_params());

    let data_dir = dir.path().join(".repo_mcp");
    assert!(data_dir.join("last_bundle.json").exists());
    let markdown = std::fs::read_to_string(data_dir.join("last_bundle.md")).unwrap();
    assert!(markdown.starts_with("# Context bundle"));
}
