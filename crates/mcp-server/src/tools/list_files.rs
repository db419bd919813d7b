use repo_mcp_indexer::discover_files;
use repo_mcp_protocol::SearchFilters;
use serde_json::{json, Map, Value};

use crate::tools::{optional_bool, optional_str, optional_usize, ToolError};
use crate::ServerState;

const TOOL: &str = "repo.list_files";

pub(crate) fn run(state: &mut ServerState, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let glob = optional_str(args, "glob", TOOL)?;
    let include_hidden = optional_bool(args, "include_hidden", TOOL)?.unwrap_or(false);
    let max_hits = state.sandbox.limits().max_search_hits;
    let max_results = optional_usize(args, "max_results", TOOL)?
        .unwrap_or(max_hits)
        .clamp(1, max_hits);

    let filters = SearchFilters::new(glob, None).map_err(ToolError::Invalid)?;
    let data_dir_prefix = state.store.data_dir_prefix().map(ToString::to_string);
    let discovered = discover_files(
        &state.sandbox,
        state.store.config(),
        data_dir_prefix.as_deref(),
        include_hidden,
    )?;

    let mut files: Vec<Value> = Vec::new();
    let mut truncated = false;
    for file in discovered {
        if !filters.matches(&file.path) {
            continue;
        }
        if files.len() >= max_results {
            truncated = true;
            break;
        }
        files.push(json!({
            "path": file.path,
            "size": file.size_bytes,
            "mtime": file.mtime_ms,
        }));
    }

    Ok(json!({ "files": files, "truncated": truncated }))
}
