use serde::{Deserialize, Serialize};

pub const CODE_UNKNOWN_TOOL: &str = "UNKNOWN_TOOL";
pub const CODE_INVALID_PARAMS: &str = "INVALID_PARAMS";
pub const CODE_IO_ERROR: &str = "IO_ERROR";
pub const CODE_INDEX_CORRUPT: &str = "INDEX_CORRUPT";

/// Umbrella envelope code for path-shape violations. The fine-grained
/// reason is still reported in `result.reason`.
pub const CODE_PATH_BLOCKED: &str = "PATH_BLOCKED";

/// Why the sandbox refused an operation.
///
/// Reasons are ordered by the rule that fires first; callers short-circuit
/// on the first violation and never read the target afterwards.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockReason {
    PathTraversal,
    SymlinkEscape,
    AbsoluteOutsideRoot,
    Denylisted,
    FileTooLarge,
    RangeTooLarge,
    ResponseTooLarge,
}

impl BlockReason {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            BlockReason::PathTraversal => "PATH_TRAVERSAL",
            BlockReason::SymlinkEscape => "SYMLINK_ESCAPE",
            BlockReason::AbsoluteOutsideRoot => "ABSOLUTE_OUTSIDE_ROOT",
            BlockReason::Denylisted => "DENYLISTED",
            BlockReason::FileTooLarge => "FILE_TOO_LARGE",
            BlockReason::RangeTooLarge => "RANGE_TOO_LARGE",
            BlockReason::ResponseTooLarge => "RESPONSE_TOO_LARGE",
        }
    }

    /// Code surfaced in `error.code`. Traversal and absolute-path escapes
    /// collapse to `PATH_BLOCKED`; every other reason surfaces verbatim.
    #[must_use]
    pub const fn envelope_code(self) -> &'static str {
        match self {
            BlockReason::PathTraversal | BlockReason::AbsoluteOutsideRoot => CODE_PATH_BLOCKED,
            other => other.code(),
        }
    }

    /// Short remediation hint attached to every blocked response.
    #[must_use]
    pub const fn hint(self) -> &'static str {
        match self {
            BlockReason::PathTraversal => {
                "Remove `..` segments and use a path relative to repo_root."
            }
            BlockReason::SymlinkEscape => {
                "The path resolves through a symlink to a target outside repo_root."
            }
            BlockReason::AbsoluteOutsideRoot => {
                "Absolute paths must resolve to a location inside repo_root."
            }
            BlockReason::Denylisted => "Use a non-sensitive file path under repo_root.",
            BlockReason::FileTooLarge => {
                "The file exceeds max_file_bytes; request a smaller file."
            }
            BlockReason::RangeTooLarge => {
                "Reduce the requested line range to at most max_open_lines."
            }
            BlockReason::ResponseTooLarge => {
                "Narrow the request so the response fits max_total_bytes_per_response."
            }
        }
    }
}
