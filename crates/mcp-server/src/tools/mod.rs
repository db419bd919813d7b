//! One module per tool, plus the shared parameter validation helpers.
//! Validation happens before any work; messages name the offending
//! field.

pub(crate) mod audit_log;
pub(crate) mod bundle;
pub(crate) mod list_files;
pub(crate) mod open_file;
pub(crate) mod outline;
pub(crate) mod references;
pub(crate) mod refresh;
pub(crate) mod search;
pub(crate) mod status;

use repo_mcp_indexer::IndexerError;
use repo_mcp_protocol::{CODE_INDEX_CORRUPT, CODE_IO_ERROR};
use repo_mcp_sandbox::{Blocked, ReadRefusal};
use serde_json::{Map, Value};

#[derive(Debug)]
pub enum ToolError {
    Invalid(String),
    Blocked(Blocked),
    Internal { code: &'static str, message: String },
}

impl From<Blocked> for ToolError {
    fn from(value: Blocked) -> Self {
        ToolError::Blocked(value)
    }
}

impl From<ReadRefusal> for ToolError {
    fn from(value: ReadRefusal) -> Self {
        match value {
            ReadRefusal::Blocked(blocked) => ToolError::Blocked(blocked),
            ReadRefusal::Io(e) => ToolError::Internal {
                code: CODE_IO_ERROR,
                message: e.to_string(),
            },
        }
    }
}

impl From<IndexerError> for ToolError {
    fn from(value: IndexerError) -> Self {
        match value {
            IndexerError::Corrupt(_) | IndexerError::SchemaMismatch { .. } => ToolError::Internal {
                code: CODE_INDEX_CORRUPT,
                message: value.to_string(),
            },
            other => ToolError::Internal {
                code: CODE_IO_ERROR,
                message: other.to_string(),
            },
        }
    }
}

pub(crate) fn require_str<'a>(
    args: &'a Map<String, Value>,
    key: &str,
    tool: &str,
) -> Result<&'a str, ToolError> {
    match args.get(key) {
        Some(Value::String(value)) if !value.trim().is_empty() => Ok(value),
        _ => Err(ToolError::Invalid(format!(
            "{tool} {key} must be a non-empty string."
        ))),
    }
}

pub(crate) fn optional_str<'a>(
    args: &'a Map<String, Value>,
    key: &str,
    tool: &str,
) -> Result<Option<&'a str>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(_) => Err(ToolError::Invalid(format!("{tool} {key} must be a string."))),
    }
}

pub(crate) fn optional_usize(
    args: &Map<String, Value>,
    key: &str,
    tool: &str,
) -> Result<Option<usize>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => match number.as_u64() {
            Some(value) => Ok(Some(usize::try_from(value).unwrap_or(usize::MAX))),
            None => Err(ToolError::Invalid(format!(
                "{tool} {key} must be a non-negative integer."
            ))),
        },
        Some(_) => Err(ToolError::Invalid(format!(
            "{tool} {key} must be an integer."
        ))),
    }
}

pub(crate) fn optional_u64(
    args: &Map<String, Value>,
    key: &str,
    tool: &str,
) -> Result<Option<u64>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number.as_u64().map(Some).ok_or_else(|| {
            ToolError::Invalid(format!("{tool} {key} must be a non-negative integer."))
        }),
        Some(_) => Err(ToolError::Invalid(format!(
            "{tool} {key} must be an integer."
        ))),
    }
}

pub(crate) fn optional_bool(
    args: &Map<String, Value>,
    key: &str,
    tool: &str,
) -> Result<Option<bool>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(value)) => Ok(Some(*value)),
        Some(_) => Err(ToolError::Invalid(format!(
            "{tool} {key} must be a boolean."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn require_str_rejects_missing_and_empty() {
        let empty = args(json!({"path": "  "}));
        let err = require_str(&empty, "path", "repo.outline").unwrap_err();
        match err {
            ToolError::Invalid(message) => assert!(message.contains("path")),
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn optional_usize_validates_type() {
        let bad = args(json!({"top_k": "ten"}));
        assert!(optional_usize(&bad, "top_k", "repo.search").is_err());

        let good = args(json!({"top_k": 10}));
        assert_eq!(optional_usize(&good, "top_k", "repo.search").unwrap(), Some(10));
    }
}
