use serde_json::{json, Map, Value};

use crate::config::public_snapshot;
use crate::tools::ToolError;
use crate::ServerState;

pub(crate) fn run(state: &mut ServerState, _args: &Map<String, Value>) -> Result<Value, ToolError> {
    let status = state.store.status();
    let params = state.store.chunking_params();
    Ok(json!({
        "repo_root": state.sandbox.root().display().to_string(),
        "index_status": status.index_status,
        "last_refresh_timestamp": status.last_refresh_timestamp,
        "indexed_file_count": status.indexed_file_count,
        "enabled_adapters": state.registry.names(),
        "limits_summary": state.sandbox.limits(),
        "chunking_summary": {
            "chunk_lines": params.window_lines,
            "overlap_lines": params.overlap_lines,
            "indexed_chunk_count": status.indexed_chunk_count,
        },
        "effective_config": public_snapshot(&state.config),
    }))
}
