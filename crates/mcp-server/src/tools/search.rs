use repo_mcp_protocol::{BlockReason, SearchFilters};
use repo_mcp_sandbox::Blocked;
use serde_json::{json, Map, Value};

use crate::tools::{optional_str, optional_usize, require_str, ToolError};
use crate::ServerState;

const TOOL: &str = "repo.search";
const DEFAULT_TOP_K: usize = 10;

pub(crate) fn run(state: &mut ServerState, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let query = require_str(args, "query", TOOL)?;
    let mode = optional_str(args, "mode", TOOL)?.unwrap_or("bm25");
    if mode != "bm25" {
        return Err(ToolError::Invalid(format!("{TOOL} mode must be 'bm25'.")));
    }

    let max_hits = state.sandbox.limits().max_search_hits;
    let top_k = optional_usize(args, "top_k", TOOL)?.unwrap_or(DEFAULT_TOP_K);
    if top_k < 1 {
        return Err(ToolError::Invalid(format!("{TOOL} top_k must be >= 1.")));
    }
    if top_k > max_hits {
        let mut blocked = Blocked::new(BlockReason::RangeTooLarge);
        blocked.hint = format!("Requested top_k exceeds max_search_hits ({max_hits}).");
        return Err(ToolError::Blocked(blocked));
    }

    let file_glob = optional_str(args, "file_glob", TOOL)?;
    let path_prefix = optional_str(args, "path_prefix", TOOL)?;
    let filters = SearchFilters::new(file_glob, path_prefix).map_err(ToolError::Invalid)?;

    let query = query.to_string();
    let hits = state.store.search(&state.sandbox, &query, top_k, &filters)?;
    Ok(json!({ "hits": hits }))
}
