use repo_mcp_protocol::CODE_IO_ERROR;
use serde_json::{json, Map, Value};

use crate::tools::{optional_u64, optional_usize, ToolError};
use crate::ServerState;

const TOOL: &str = "repo.audit_log";

pub(crate) fn run(state: &mut ServerState, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let since = optional_u64(args, "since", TOOL)?;
    let max_hits = state.sandbox.limits().max_search_hits;
    let limit = optional_usize(args, "limit", TOOL)?
        .unwrap_or(max_hits)
        .clamp(1, max_hits);

    let events = state
        .audit
        .read_events(since, limit)
        .map_err(|e| ToolError::Internal {
            code: CODE_IO_ERROR,
            message: e.to_string(),
        })?;
    Ok(json!({ "events": events }))
}
