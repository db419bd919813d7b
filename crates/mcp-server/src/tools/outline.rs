use repo_mcp_indexer::language_hint;
use serde_json::{json, Map, Value};

use crate::tools::{require_str, ToolError};
use crate::ServerState;

const TOOL: &str = "repo.outline";

pub(crate) fn run(state: &mut ServerState, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let path = require_str(args, "path", TOOL)?;
    let resolved = state.sandbox.resolve(path)?;
    let text = state.sandbox.read_text(&resolved)?;

    let adapter = state.registry.select(resolved.rel());
    let symbols = adapter.outline(resolved.rel(), &text);

    Ok(json!({
        "path": resolved.rel(),
        "language": language_hint(resolved.rel()),
        "adapter": adapter.name(),
        "symbols": symbols,
    }))
}
