//! Pure mapping from tool name to handler, envelope construction, and
//! audit emission. Params are validated before any handler work; a
//! partial request is never executed.

use repo_mcp_protocol::{
    RawRequest, ResponseEnvelope, ToolCall, CODE_INVALID_PARAMS, CODE_UNKNOWN_TOOL,
};
use serde_json::{json, Value};

use crate::audit::AuditEvent;
use crate::tools::{self, ToolError};
use crate::{unix_now_ms, ServerState};

pub const TOOL_NAMES: &[&str] = &[
    "repo.status",
    "repo.list_files",
    "repo.open_file",
    "repo.outline",
    "repo.search",
    "repo.references",
    "repo.build_context_bundle",
    "repo.refresh_index",
    "repo.audit_log",
];

/// Serve one raw input line: parse, dispatch, audit, respond. Parse
/// failures answer with `request_id = null` and `INVALID_PARAMS`.
pub fn handle_line(state: &mut ServerState, line: &str) -> ResponseEnvelope {
    let raw: RawRequest = match serde_json::from_str(line) {
        Ok(raw) => raw,
        Err(e) => {
            return ResponseEnvelope::error(
                Value::Null,
                CODE_INVALID_PARAMS,
                format!("malformed request line: {e}"),
            )
        }
    };
    let call = match raw.into_tool_call() {
        Ok(call) => call,
        Err(parse_error) => {
            return ResponseEnvelope::error(
                parse_error.request_id,
                CODE_INVALID_PARAMS,
                parse_error.message,
            )
        }
    };
    handle_call(state, call)
}

pub fn handle_call(state: &mut ServerState, call: ToolCall) -> ResponseEnvelope {
    let ToolCall {
        request_id,
        tool,
        arguments,
    } = call;

    let outcome = match tool.as_str() {
        "repo.status" => tools::status::run(state, &arguments),
        "repo.list_files" => tools::list_files::run(state, &arguments),
        "repo.open_file" => tools::open_file::run(state, &arguments),
        "repo.outline" => tools::outline::run(state, &arguments),
        "repo.search" => tools::search::run(state, &arguments),
        "repo.references" => tools::references::run(state, &arguments),
        "repo.build_context_bundle" => tools::bundle::run(state, &arguments),
        "repo.refresh_index" => tools::refresh::run(state, &arguments),
        "repo.audit_log" => tools::audit_log::run(state, &arguments),
        unknown => {
            let envelope = ResponseEnvelope::error(
                request_id.clone(),
                CODE_UNKNOWN_TOOL,
                format!("unknown tool '{unknown}'"),
            );
            record_audit(state, request_id, &tool, &envelope);
            return envelope;
        }
    };

    let envelope = match outcome {
        Ok(result) => ResponseEnvelope::success(request_id.clone(), result),
        Err(ToolError::Invalid(message)) => {
            ResponseEnvelope::invalid_params(request_id.clone(), message)
        }
        Err(ToolError::Blocked(blocked)) => {
            ResponseEnvelope::blocked(request_id.clone(), blocked.reason, &blocked.hint)
        }
        Err(ToolError::Internal { code, message }) => {
            ResponseEnvelope::error(request_id.clone(), code, message)
        }
    };
    record_audit(state, request_id, &tool, &envelope);
    envelope
}

/// Audit records carry request metadata only: counts, never file
/// contents or prompt text.
fn record_audit(state: &ServerState, request_id: Value, tool: &str, envelope: &ResponseEnvelope) {
    let event = AuditEvent {
        timestamp: unix_now_ms(),
        request_id,
        tool: tool.to_string(),
        ok: envelope.ok,
        blocked: envelope.blocked,
        error_code: envelope.error.as_ref().map(|e| e.code.clone()),
        metadata: audit_metadata(tool, envelope),
    };
    if let Err(e) = state.audit.append(&event) {
        log::warn!("audit append failed: {e}");
    }
}

fn audit_metadata(tool: &str, envelope: &ResponseEnvelope) -> Value {
    if !envelope.ok {
        return json!({});
    }
    let result = &envelope.result;
    match tool {
        "repo.search" => json!({
            "hit_count": result.get("hits").and_then(Value::as_array).map_or(0, Vec::len),
        }),
        "repo.references" => json!({
            "reference_count": result
                .get("references")
                .and_then(Value::as_array)
                .map_or(0, Vec::len),
        }),
        "repo.list_files" => json!({
            "file_count": result.get("files").and_then(Value::as_array).map_or(0, Vec::len),
        }),
        "repo.build_context_bundle" => json!({
            "prompt_fingerprint": result.get("prompt_fingerprint").cloned().unwrap_or(Value::Null),
            "selection_count": result
                .get("selections")
                .and_then(Value::as_array)
                .map_or(0, Vec::len),
        }),
        "repo.refresh_index" => json!({
            "added": result.get("added").cloned().unwrap_or(Value::Null),
            "updated": result.get("updated").cloned().unwrap_or(Value::Null),
            "removed": result.get("removed").cloned().unwrap_or(Value::Null),
        }),
        _ => json!({}),
    }
}
