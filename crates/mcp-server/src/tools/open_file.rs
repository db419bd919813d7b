use repo_mcp_protocol::BlockReason;
use repo_mcp_sandbox::Blocked;
use serde_json::{json, Map, Value};

use crate::tools::{optional_usize, require_str, ToolError};
use crate::ServerState;

const TOOL: &str = "repo.open_file";

/// Per-line envelope overhead charged against the response byte budget
/// (line number, separators, JSON quoting).
const LINE_OVERHEAD_BYTES: usize = 24;

pub(crate) fn run(state: &mut ServerState, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let path = require_str(args, "path", TOOL)?;
    let start_line = optional_usize(args, "start_line", TOOL)?.unwrap_or(1).max(1);
    let end_line = optional_usize(args, "end_line", TOOL)?;
    if let Some(end) = end_line {
        if end < start_line {
            return Err(ToolError::Invalid(format!(
                "{TOOL} end_line must be >= start_line."
            )));
        }
    }

    let resolved = state.sandbox.resolve(path)?;
    state.sandbox.enforce_line_range(start_line, end_line)?;
    let text = state.sandbox.read_text(&resolved)?;
    let lines: Vec<&str> = text.lines().collect();

    if end_line.is_none() && lines.len() > state.sandbox.limits().max_open_lines {
        // Whole-file reads of long files must be ranged explicitly.
        return Err(ToolError::Blocked(Blocked::new(BlockReason::RangeTooLarge)));
    }

    let first_index = start_line - 1;
    let last_index = end_line.map_or(lines.len(), |end| end.min(lines.len()));

    let mut budget = state.sandbox.response_budget();
    let mut numbered_lines: Vec<Value> = Vec::new();
    let mut truncated = false;
    for (offset, line_text) in lines
        .iter()
        .enumerate()
        .take(last_index)
        .skip(first_index.min(lines.len()))
    {
        if budget
            .charge(line_text.len() + LINE_OVERHEAD_BYTES)
            .is_err()
        {
            truncated = true;
            break;
        }
        numbered_lines.push(json!({ "line": offset + 1, "text": line_text }));
    }

    Ok(json!({
        "path": resolved.rel(),
        "numbered_lines": numbered_lines,
        "truncated": truncated,
    }))
}
