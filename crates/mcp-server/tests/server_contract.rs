//! End-to-end contract tests over the dispatch surface: envelope shapes,
//! sandbox blocks, determinism, and the cross-file reference flow.

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

fn state_for(dir: &TempDir) -> ServerState {
    let config = load_effective_config(dir.path(), &CliOverrides::default()).unwrap();
    ServerState::new(config).unwrap()
}

fn call(state: &mut ServerState, id: u64, method: &str, params: Value) -> Value {
    let line = json!({"id": id, "method": method, "params": params}).to_string();
    let envelope = dispatch::handle_line(state, &line);
    serde_json::to_value(&envelope).unwrap()
}

fn seeded_python_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "src/a.py",
        concat!(
            "\"\"\"Helpers.\"\"\"\n",
            "\n",
            "def foo(value):\n",
            "    \"\"\"Return value doubled.\"\"\"\n",
            "    return value * 2\n",
        ),
    );
    write(
        &dir,
        "src/b.py",
        concat!("import a\n", "\n", "result = a.foo(21)\n"),
    );
    dir
}

#[test]
fn refresh_then_references_finds_cross_file_call() {
    let dir = seeded_python_repo();
    let mut state = state_for(&dir);

    let refresh = call(&mut state, 1, "repo.refresh_index", json!({"force": true}));
    assert_eq!(refresh["ok"], true);
    assert!(refresh["result"]["added"].as_u64().unwrap() >= 2);
    assert_eq!(refresh["result"]["updated"], 0);
    assert_eq!(refresh["result"]["removed"], 0);

    let refs = call(&mut state, 2, "repo.references", json!({"symbol": "foo"}));
    assert_eq!(refs["ok"], true);
    let references = refs["result"]["references"].as_array().unwrap();
    let call_site = references
        .iter()
        .find(|r| r["path"] == "src/b.py" && r["line"] == 3)
        .expect("expected a reference at the a.foo(21) call site");
    assert_eq!(call_site["strategy"], "ast");
    assert_eq!(call_site["confidence"], "high");
    assert_eq!(refs["result"]["truncated"], false);
}

#[test]
fn path_traversal_is_blocked_with_reason() {
    let dir = seeded_python_repo();
    let mut state = state_for(&dir);

    let envelope = call(
        &mut state,
        1,
        "repo.open_file",
        json!({"path": "../etc/passwd", "start_line": 1}),
    );
    assert_eq!(envelope["ok"], false);
    assert_eq!(envelope["blocked"], true);
    assert_eq!(envelope["error"]["code"], "PATH_BLOCKED");
    assert_eq!(envelope["result"]["reason"], "PATH_TRAVERSAL");
    // Blocked responses never leak contents.
    assert!(envelope["result"].get("numbered_lines").is_none());
}

#[test]
fn denylisted_file_is_blocked_even_when_requested_directly() {
    let dir = seeded_python_repo();
    write(&dir, ".env", "TOKEN=supersecret\n");
    let mut state = state_for(&dir);

    let envelope = call(
        &mut state,
        1,
        "repo.open_file",
        json!({"path": ".env", "start_line": 1}),
    );
    assert_eq!(envelope["blocked"], true);
    assert_eq!(envelope["error"]["code"], "DENYLISTED");
    assert_eq!(envelope["result"]["reason"], "DENYLISTED");
    assert!(!envelope.to_string().contains("supersecret"));
}

#[cfg(unix)]
#[test]
fn symlink_escape_is_blocked_with_symlink_reason() {
    let outside = TempDir::new().unwrap();
    std::fs::write(outside.path().join("target.txt"), "outside").unwrap();
    let dir = seeded_python_repo();
    std::os::unix::fs::symlink(
        outside.path().join("target.txt"),
        dir.path().join("inside.txt"),
    )
    .unwrap();
    let mut state = state_for(&dir);

    let envelope = call(&mut state, 1, "repo.open_file", json!({"path": "inside.txt"}));
    assert_eq!(envelope["blocked"], true);
    assert_eq!(envelope["error"]["code"], "SYMLINK_ESCAPE");
}

#[test]
fn search_is_deterministic_across_calls() {
    let dir = seeded_python_repo();
    write(
        &dir,
        "docs/notes.md",
        "build context bundle notes\nmore about the bundle builder\n",
    );
    let mut state = state_for(&dir);
    call(&mut state, 1, "repo.refresh_index", json!({"force": true}));

    let params = json!({"query": "build context bundle", "mode": "bm25", "top_k": 3});
    let first = call(&mut state, 2, "repo.search", params.clone());
    let second = call(&mut state, 3, "repo.search", params);
    assert_eq!(first["ok"], true);
    assert!(!first["result"]["hits"].as_array().unwrap().is_empty());
    assert_eq!(first["result"], second["result"]);
}

#[test]
fn search_rejects_unknown_mode_and_oversized_top_k() {
    let dir = seeded_python_repo();
    let mut state = state_for(&dir);
    call(&mut state, 1, "repo.refresh_index", json!({}));

    let bad_mode = call(
        &mut state,
        2,
        "repo.search",
        json!({"query": "foo", "mode": "semantic"}),
    );
    assert_eq!(bad_mode["error"]["code"], "INVALID_PARAMS");

    let oversized = call(
        &mut state,
        3,
        "repo.search",
        json!({"query": "foo", "top_k": 100000}),
    );
    assert_eq!(oversized["blocked"], true);
    assert_eq!(oversized["error"]["code"], "RANGE_TOO_LARGE");
}

#[test]
fn outline_reports_conditional_declarations() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "src/types.py",
        concat!(
            "from typing import TYPE_CHECKING\n",
            "\n",
            "if TYPE_CHECKING:\n",
            "    class X:\n",
            "        pass\n",
        ),
    );
    let mut state = state_for(&dir);

    let envelope = call(&mut state, 1, "repo.outline", json!({"path": "src/types.py"}));
    assert_eq!(envelope["ok"], true);
    assert_eq!(envelope["result"]["language"], "python");
    let symbols = envelope["result"]["symbols"].as_array().unwrap();
    let class_x = symbols.iter().find(|s| s["name"] == "X").unwrap();
    assert_eq!(class_x["is_conditional"], true);
    assert_eq!(class_x["decl_context"], "if TYPE_CHECKING");
}

#[test]
fn open_file_range_boundaries_follow_max_open_lines() {
    let dir = TempDir::new().unwrap();
    let body: String = (1..=800).map(|i| format!("line {i}\n")).collect();
    write(&dir, "big.md", &body);
    let mut state = state_for(&dir);

    // Default max_open_lines is 500: an explicit range at the limit
    // reads, one line over blocks.
    let at_limit = call(
        &mut state,
        1,
        "repo.open_file",
        json!({"path": "big.md", "start_line": 1, "end_line": 500}),
    );
    assert_eq!(at_limit["ok"], true);
    assert_eq!(
        at_limit["result"]["numbered_lines"].as_array().unwrap().len(),
        500
    );

    let over = call(
        &mut state,
        2,
        "repo.open_file",
        json!({"path": "big.md", "start_line": 1, "end_line": 501}),
    );
    assert_eq!(over["blocked"], true);
    assert_eq!(over["error"]["code"], "RANGE_TOO_LARGE");

    // Unranged reads of long files are blocked, not silently truncated.
    let unranged = call(&mut state, 3, "repo.open_file", json!({"path": "big.md"}));
    assert_eq!(unranged["blocked"], true);
}

#[test]
fn unknown_tool_and_malformed_params_have_stable_codes() {
    let dir = seeded_python_repo();
    let mut state = state_for(&dir);

    let unknown = call(&mut state, 1, "repo.does_not_exist", json!({}));
    assert_eq!(unknown["error"]["code"], "UNKNOWN_TOOL");
    assert_eq!(unknown["blocked"], false);

    let missing_query = call(&mut state, 2, "repo.search", json!({}));
    assert_eq!(missing_query["error"]["code"], "INVALID_PARAMS");
    assert!(missing_query["error"]["message"]
        .as_str()
        .unwrap()
        .contains("query"));
}

#[test]
fn tools_call_form_is_accepted() {
    let dir = seeded_python_repo();
    let mut state = state_for(&dir);

    let line = json!({
        "id": "req-1",
        "method": "tools/call",
        "params": {"name": "repo.status", "arguments": {}}
    })
    .to_string();
    let envelope = serde_json::to_value(dispatch::handle_line(&mut state, &line)).unwrap();
    assert_eq!(envelope["request_id"], "req-1");
    assert_eq!(envelope["ok"], true);
    assert_eq!(envelope["result"]["index_status"], "not_indexed");
}

#[test]
fn status_reflects_index_lifecycle() {
    let dir = seeded_python_repo();
    let mut state = state_for(&dir);

    let before = call(&mut state, 1, "repo.status", json!({}));
    assert_eq!(before["result"]["index_status"], "not_indexed");

    call(&mut state, 2, "repo.refresh_index", json!({"force": true}));
    let after = call(&mut state, 3, "repo.status", json!({}));
    assert_eq!(after["result"]["index_status"], "ready");
    assert_eq!(after["result"]["indexed_file_count"], 2);
    assert!(after["result"]["enabled_adapters"]
        .as_array()
        .unwrap()
        .iter()
        .any(|name| name == "python"));
}

#[test]
fn audit_log_records_requests_without_contents() {
    let dir = seeded_python_repo();
    let mut state = state_for(&dir);

    call(&mut state, 1, "repo.refresh_index", json!({"force": true}));
    call(&mut state, 2, "repo.search", json!({"query": "foo"}));
    let log = call(&mut state, 3, "repo.audit_log", json!({}));

    assert_eq!(log["ok"], true);
    let events = log["result"]["events"].as_array().unwrap();
    assert!(events.len() >= 2);
    assert!(events.iter().any(|e| e["tool"] == "repo.search"));
    // Raw file text never lands in the audit log.
    assert!(!log.to_string().contains("Return value doubled"));
}

#[test]
fn list_files_is_sorted_and_respects_glob() {
    let dir = seeded_python_repo();
    write(&dir, "docs/readme.md", "# docs\n");
    let mut state = state_for(&dir);

    let all = call(&mut state, 1, "repo.list_files", json!({}));
    let paths: Vec<&str> = all["result"]["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["path"].as_str().unwrap())
        .collect();
    assert_eq!(paths, vec!["docs/readme.md", "src/a.py", "src/b.py"]);

    let only_python = call(&mut state, 2, "repo.list_files", json!({"glob": "*.py"}));
    let python_paths: Vec<&str> = only_python["result"]["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["path"].as_str().unwrap())
        .collect();
    assert_eq!(python_paths, vec!["src/a.py", "src/b.py"]);
}
