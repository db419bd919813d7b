use repo_mcp_adapters::SymbolQuery;
use serde_json::{json, Map, Value};

use crate::references::find_references;
use crate::tools::{optional_str, optional_usize, require_str, ToolError};
use crate::ServerState;

const TOOL: &str = "repo.references";

pub(crate) fn run(state: &mut ServerState, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let symbol = require_str(args, "symbol", TOOL)?;
    let Some(query) = SymbolQuery::parse(symbol) else {
        return Err(ToolError::Invalid(format!(
            "{TOOL} symbol must contain an identifier."
        )));
    };
    let path = optional_str(args, "path", TOOL)?.map(ToString::to_string);

    let max_references = state.sandbox.limits().max_references;
    let top_k = optional_usize(args, "top_k", TOOL)?
        .unwrap_or(max_references)
        .clamp(1, max_references);

    let lookup = find_references(state, &query, path.as_deref(), top_k)?;
    Ok(json!({
        "symbol": query.raw,
        "references": lookup.references,
        "truncated": lookup.truncated,
        "total_candidates": lookup.total_candidates,
    }))
}
