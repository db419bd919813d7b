use serde_json::{Map, Value};

use crate::bundler::{build_context_bundle, BundleBudget};
use crate::tools::{optional_bool, optional_str, require_str, ToolError};
use crate::ServerState;

const TOOL: &str = "repo.build_context_bundle";

pub(crate) fn run(state: &mut ServerState, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let prompt = require_str(args, "prompt", TOOL)?.to_string();

    let strategy = optional_str(args, "strategy", TOOL)?.unwrap_or("hybrid");
    if strategy != "hybrid" {
        return Err(ToolError::Invalid(format!(
            "{TOOL} strategy must be 'hybrid'."
        )));
    }
    let strategy = strategy.to_string();
    let include_tests = optional_bool(args, "include_tests", TOOL)?.unwrap_or(true);

    let Some(Value::Object(budget_args)) = args.get("budget") else {
        return Err(ToolError::Invalid(format!(
            "{TOOL} budget must be an object."
        )));
    };
    let budget = BundleBudget {
        max_files: require_budget_field(budget_args, "max_files")?,
        max_total_lines: require_budget_field(budget_args, "max_total_lines")?,
    };

    build_context_bundle(state, &prompt, budget, &strategy, include_tests)
}

fn require_budget_field(budget: &Map<String, Value>, key: &str) -> Result<usize, ToolError> {
    match budget.get(key).and_then(Value::as_u64) {
        Some(value) if value >= 1 => Ok(usize::try_from(value).unwrap_or(usize::MAX)),
        _ => Err(ToolError::Invalid(format!(
            "{TOOL} budget.{key} must be >= 1."
        ))),
    }
}
