mod codes;
mod envelope;
pub mod path_filters;

pub use codes::{
    BlockReason, CODE_INDEX_CORRUPT, CODE_INVALID_PARAMS, CODE_IO_ERROR, CODE_PATH_BLOCKED,
    CODE_UNKNOWN_TOOL,
};
pub use envelope::{ErrorBody, RawRequest, RequestParseError, ResponseEnvelope, ToolCall};
pub use path_filters::SearchFilters;
