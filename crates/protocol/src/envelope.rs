use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codes::{BlockReason, CODE_INVALID_PARAMS};

/// One request line as it arrives on stdin, before tool-call normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRequest {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Normalized tool invocation: tool identifier plus argument object.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub request_id: Value,
    pub tool: String,
    pub arguments: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestParseError {
    pub request_id: Value,
    pub message: String,
}

impl RawRequest {
    /// Accepts both the direct form `{id, method, params}` and the
    /// tool-call form `{id, method: "tools/call", params: {name, arguments}}`.
    pub fn into_tool_call(self) -> Result<ToolCall, RequestParseError> {
        let request_id = self.id.clone();
        if self.method == "tools/call" {
            let Value::Object(params) = self.params else {
                return Err(RequestParseError {
                    request_id,
                    message: "tools/call params must be an object".to_string(),
                });
            };
            let Some(Value::String(name)) = params.get("name").cloned() else {
                return Err(RequestParseError {
                    request_id,
                    message: "tools/call params.name must be a string".to_string(),
                });
            };
            let arguments = match params.get("arguments").cloned() {
                None | Some(Value::Null) => Map::new(),
                Some(Value::Object(map)) => map,
                Some(_) => {
                    return Err(RequestParseError {
                        request_id,
                        message: "tools/call params.arguments must be an object".to_string(),
                    })
                }
            };
            return Ok(ToolCall {
                request_id,
                tool: name,
                arguments,
            });
        }

        let arguments = match self.params {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            _ => {
                return Err(RequestParseError {
                    request_id,
                    message: "params must be an object".to_string(),
                })
            }
        };
        Ok(ToolCall {
            request_id,
            tool: self.method,
            arguments,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// One response line. `request_id` echoes the incoming `id` verbatim
/// (string, number, or null for unparseable requests).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub request_id: Value,
    pub ok: bool,
    pub result: Value,
    pub warnings: Vec<String>,
    pub blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl ResponseEnvelope {
    #[must_use]
    pub fn success(request_id: Value, result: Value) -> Self {
        Self {
            request_id,
            ok: true,
            result,
            warnings: Vec::new(),
            blocked: false,
            error: None,
        }
    }

    /// Blocked responses carry `{reason, hint}` as the result and never
    /// any file contents.
    #[must_use]
    pub fn blocked(request_id: Value, reason: BlockReason, hint: &str) -> Self {
        let result = serde_json::json!({
            "reason": reason.code(),
            "hint": hint,
        });
        Self {
            request_id,
            ok: false,
            result,
            warnings: Vec::new(),
            blocked: true,
            error: Some(ErrorBody {
                code: reason.envelope_code().to_string(),
                message: hint.to_string(),
            }),
        }
    }

    #[must_use]
    pub fn error(request_id: Value, code: &str, message: impl Into<String>) -> Self {
        Self {
            request_id,
            ok: false,
            result: Value::Null,
            warnings: Vec::new(),
            blocked: false,
            error: Some(ErrorBody {
                code: code.to_string(),
                message: message.into(),
            }),
        }
    }

    #[must_use]
    pub fn invalid_params(request_id: Value, message: impl Into<String>) -> Self {
        Self::error(request_id, CODE_INVALID_PARAMS, message)
    }

    #[must_use]
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}
