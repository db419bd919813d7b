//! Policy layer gating all filesystem access. Every read performed on
//! behalf of a request goes through [`Sandbox`], which either yields a
//! canonical in-root path or a typed [`Blocked`] refusal that never
//! carries file contents.

mod denylist;
mod limits;
mod paths;

use std::io::Read;
use std::path::{Path, PathBuf};

use repo_mcp_protocol::BlockReason;
use thiserror::Error;

pub use denylist::{Denylist, DEFAULT_DENYLIST};
pub use limits::{
    SecurityLimits, HARD_MAX_FILE_BYTES, HARD_MAX_OPEN_LINES, HARD_MAX_REFERENCES,
    HARD_MAX_RESPONSE_BYTES, HARD_MAX_SEARCH_HITS,
};
pub use paths::CanonicalPath;

pub type Result<T> = std::result::Result<T, SandboxError>;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid repo root '{0}': {1}")]
    InvalidRoot(String, std::io::Error),
}

/// A refused operation: the rule that fired plus a remediation hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blocked {
    pub reason: BlockReason,
    pub hint: String,
}

impl Blocked {
    #[must_use]
    pub fn new(reason: BlockReason) -> Self {
        Self {
            reason,
            hint: reason.hint().to_string(),
        }
    }
}

impl std::fmt::Display for Blocked {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.reason.code(), self.hint)
    }
}

#[derive(Debug)]
pub struct Sandbox {
    root: PathBuf,
    limits: SecurityLimits,
    denylist: Denylist,
}

impl Sandbox {
    pub fn new(root: &Path, limits: SecurityLimits) -> Result<Self> {
        let root = root
            .canonicalize()
            .map_err(|e| SandboxError::InvalidRoot(root.display().to_string(), e))?;
        Ok(Self {
            root,
            limits,
            denylist: Denylist::default(),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn limits(&self) -> &SecurityLimits {
        &self.limits
    }

    /// Rules 1..4: traversal, symlink resolution, containment, denylist.
    pub fn resolve(&self, candidate: &str) -> std::result::Result<CanonicalPath, Blocked> {
        let resolved = paths::resolve_candidate(&self.root, candidate)?;
        if self.denylist.is_denylisted(resolved.rel()) {
            return Err(Blocked::new(BlockReason::Denylisted));
        }
        Ok(resolved)
    }

    /// Used by discovery and listings, where paths are already proven
    /// in-root and only the denylist applies.
    #[must_use]
    pub fn is_denylisted_rel(&self, rel_path: &str) -> bool {
        self.denylist.is_denylisted(rel_path)
    }

    /// Rule 5 for whole-file reads: the file must exist and fit
    /// `max_file_bytes`. Returns the file size.
    pub fn authorize_read(
        &self,
        path: &CanonicalPath,
    ) -> std::result::Result<u64, ReadRefusal> {
        let meta = std::fs::metadata(path.abs()).map_err(ReadRefusal::Io)?;
        if !meta.is_file() {
            return Err(ReadRefusal::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("'{}' is not a regular file", path.rel()),
            )));
        }
        if meta.len() > self.limits.max_file_bytes {
            return Err(ReadRefusal::Blocked(Blocked::new(
                BlockReason::FileTooLarge,
            )));
        }
        Ok(meta.len())
    }

    /// Rule 5 for ranged reads: an explicit range must fit
    /// `max_open_lines`.
    pub fn enforce_line_range(
        &self,
        start_line: usize,
        end_line: Option<usize>,
    ) -> std::result::Result<(), Blocked> {
        if let Some(end) = end_line {
            let span = end.saturating_sub(start_line).saturating_add(1);
            if span > self.limits.max_open_lines {
                return Err(Blocked::new(BlockReason::RangeTooLarge));
            }
        }
        Ok(())
    }

    /// Authorized read with newline normalization and lossy UTF-8
    /// decoding (discovery already filtered real binaries out).
    pub fn read_text(&self, path: &CanonicalPath) -> std::result::Result<String, ReadRefusal> {
        self.authorize_read(path)?;
        let mut bytes = Vec::new();
        std::fs::File::open(path.abs())
            .and_then(|mut f| f.read_to_end(&mut bytes))
            .map_err(ReadRefusal::Io)?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Ok(text.replace("\r\n", "\n"))
    }

    #[must_use]
    pub fn response_budget(&self) -> ResponseBudget {
        ResponseBudget {
            remaining: self.limits.max_total_bytes_per_response,
        }
    }
}

/// Why a read was refused: policy block or plain I/O failure. The caller
/// maps the former to a blocked envelope and the latter to `IO_ERROR`.
#[derive(Debug)]
pub enum ReadRefusal {
    Blocked(Blocked),
    Io(std::io::Error),
}

impl From<Blocked> for ReadRefusal {
    fn from(value: Blocked) -> Self {
        ReadRefusal::Blocked(value)
    }
}

/// Byte meter for `max_total_bytes_per_response`. Charged with the size
/// of each payload fragment before it is added to a response.
#[derive(Debug, Clone, Copy)]
pub struct ResponseBudget {
    remaining: usize,
}

impl ResponseBudget {
    pub fn charge(&mut self, bytes: usize) -> std::result::Result<(), Blocked> {
        if bytes > self.remaining {
            return Err(Blocked::new(BlockReason::ResponseTooLarge));
        }
        self.remaining -= bytes;
        Ok(())
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sandbox(dir: &TempDir, limits: SecurityLimits) -> Sandbox {
        Sandbox::new(dir.path(), limits).unwrap()
    }

    #[test]
    fn denylisted_file_blocked_even_inside_root() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".env"), "TOKEN=abc").unwrap();
        let sb = sandbox(&dir, SecurityLimits::default());

        let err = sb.resolve(".env").unwrap_err();
        assert_eq!(err.reason, BlockReason::Denylisted);
    }

    #[test]
    fn file_at_limit_reads_one_over_blocks() {
        let dir = TempDir::new().unwrap();
        let mut limits = SecurityLimits::default();
        limits.max_file_bytes = 8;
        std::fs::write(dir.path().join("at.txt"), b"12345678").unwrap();
        std::fs::write(dir.path().join("over.txt"), b"123456789").unwrap();
        let sb = sandbox(&dir, limits);

        let at = sb.resolve("at.txt").unwrap();
        assert_eq!(sb.authorize_read(&at).unwrap(), 8);

        let over = sb.resolve("over.txt").unwrap();
        match sb.authorize_read(&over) {
            Err(ReadRefusal::Blocked(b)) => assert_eq!(b.reason, BlockReason::FileTooLarge),
            other => panic!("expected FileTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn line_range_at_limit_passes_one_over_blocks() {
        let dir = TempDir::new().unwrap();
        let mut limits = SecurityLimits::default();
        limits.max_open_lines = 10;
        let sb = sandbox(&dir, limits);

        assert!(sb.enforce_line_range(1, Some(10)).is_ok());
        let err = sb.enforce_line_range(1, Some(11)).unwrap_err();
        assert_eq!(err.reason, BlockReason::RangeTooLarge);
    }

    #[test]
    fn read_text_normalizes_crlf() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "one\r\ntwo\r\n").unwrap();
        let sb = sandbox(&dir, SecurityLimits::default());
        let path = sb.resolve("a.txt").unwrap();
        assert_eq!(sb.read_text(&path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn response_budget_is_a_hard_cap() {
        let mut budget = ResponseBudget { remaining: 10 };
        assert!(budget.charge(6).is_ok());
        assert!(budget.charge(4).is_ok());
        let err = budget.charge(1).unwrap_err();
        assert_eq!(err.reason, BlockReason::ResponseTooLarge);
    }
}
