use serde_json::{Map, Value};

use crate::tools::{optional_bool, ToolError};
use crate::ServerState;

const TOOL: &str = "repo.refresh_index";

pub(crate) fn run(state: &mut ServerState, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let force = optional_bool(args, "force", TOOL)?.unwrap_or(false);
    let outcome = state.store.refresh(&state.sandbox, force)?;
    serde_json::to_value(&outcome).map_err(|e| ToolError::Internal {
        code: repo_mcp_protocol::CODE_IO_ERROR,
        message: e.to_string(),
    })
}
