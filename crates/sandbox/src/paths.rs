use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use repo_mcp_protocol::BlockReason;

use crate::Blocked;

/// A path that has been proven to resolve inside the repo root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPath {
    abs: PathBuf,
    rel: String,
}

impl CanonicalPath {
    #[must_use]
    pub fn abs(&self) -> &Path {
        &self.abs
    }

    /// Repo-relative, forward-slash normalized. The empty string is the
    /// root itself.
    #[must_use]
    pub fn rel(&self) -> &str {
        &self.rel
    }
}

/// Apply rules 1..3 of the access policy: lexical `..`/empty rejection,
/// symlink resolution, and root containment. Denylist and size caps are
/// layered on by the `Sandbox` facade.
pub(crate) fn resolve_candidate(
    root_canonical: &Path,
    candidate: &str,
) -> Result<CanonicalPath, Blocked> {
    let normalized = candidate.trim().replace('\\', "/");
    if normalized.is_empty() {
        return Err(Blocked::new(BlockReason::PathTraversal));
    }

    let absolute = is_absolute_input(&normalized);
    let mut segments: Vec<&str> = Vec::new();
    let body = if absolute {
        strip_root_prefix(&normalized)
    } else {
        normalized.as_str()
    };
    for segment in body.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(Blocked::new(BlockReason::PathTraversal)),
            other => segments.push(other),
        }
    }

    let joined = if absolute {
        let mut base = absolute_base(&normalized);
        for segment in &segments {
            base.push(segment);
        }
        base
    } else {
        let mut base = root_canonical.to_path_buf();
        for segment in &segments {
            base.push(segment);
        }
        base
    };

    let resolved = resolve_symlinks_best_effort(&joined);
    let Ok(stripped) = resolved.strip_prefix(root_canonical) else {
        let reason = if absolute {
            BlockReason::AbsoluteOutsideRoot
        } else {
            BlockReason::SymlinkEscape
        };
        return Err(Blocked::new(reason));
    };

    let rel = stripped
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");

    Ok(CanonicalPath { abs: resolved, rel })
}

fn is_absolute_input(normalized: &str) -> bool {
    if normalized.starts_with('/') {
        return true;
    }
    // Windows drive prefix, honored even in forward-slash form.
    let bytes = normalized.as_bytes();
    bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'/'
}

fn strip_root_prefix(normalized: &str) -> &str {
    if let Some(rest) = normalized.strip_prefix('/') {
        return rest;
    }
    // "C:/rest" -> "rest"
    normalized.get(3..).unwrap_or("")
}

fn absolute_base(normalized: &str) -> PathBuf {
    if normalized.starts_with('/') {
        return PathBuf::from("/");
    }
    PathBuf::from(&normalized[..3])
}

/// Canonicalize the deepest existing ancestor and re-append the rest, so
/// symlink checks work for both existing and not-yet-existing targets.
fn resolve_symlinks_best_effort(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }

    let mut remainder: Vec<OsString> = Vec::new();
    let mut cursor = path.to_path_buf();
    loop {
        if let Ok(base) = cursor.canonicalize() {
            let mut out = base;
            for part in remainder.iter().rev() {
                out.push(part);
            }
            return out;
        }
        let Some(name) = cursor.file_name().map(OsString::from) else {
            return path.to_path_buf();
        };
        remainder.push(name);
        if !cursor.pop() {
            return path.to_path_buf();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn canonical_root(dir: &TempDir) -> PathBuf {
        dir.path().canonicalize().unwrap()
    }

    #[test]
    fn resolves_relative_paths_inside_root() {
        let dir = TempDir::new().unwrap();
        let root = canonical_root(&dir);
        std::fs::create_dir(root.join("src")).unwrap();
        std::fs::write(root.join("src/lib.rs"), "fn main() {}\n").unwrap();

        let resolved = resolve_candidate(&root, "src/lib.rs").unwrap();
        assert_eq!(resolved.rel(), "src/lib.rs");
        assert!(resolved.abs().starts_with(&root));
    }

    #[test]
    fn rejects_parent_segments() {
        let dir = TempDir::new().unwrap();
        let root = canonical_root(&dir);
        let err = resolve_candidate(&root, "../etc/passwd").unwrap_err();
        assert_eq!(err.reason, BlockReason::PathTraversal);

        let err = resolve_candidate(&root, "src/../../escape").unwrap_err();
        assert_eq!(err.reason, BlockReason::PathTraversal);
    }

    #[test]
    fn rejects_absolute_outside_root() {
        let dir = TempDir::new().unwrap();
        let root = canonical_root(&dir);
        let err = resolve_candidate(&root, "/etc/passwd").unwrap_err();
        assert_eq!(err.reason, BlockReason::AbsoluteOutsideRoot);
    }

    #[test]
    fn accepts_absolute_inside_root() {
        let dir = TempDir::new().unwrap();
        let root = canonical_root(&dir);
        std::fs::write(root.join("a.txt"), "x").unwrap();
        let candidate = root.join("a.txt").to_string_lossy().into_owned();
        let resolved = resolve_candidate(&root, &candidate).unwrap();
        assert_eq!(resolved.rel(), "a.txt");
    }

    #[cfg(unix)]
    #[test]
    fn rejects_symlink_escape() {
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("target.txt"), "secret").unwrap();

        let dir = TempDir::new().unwrap();
        let root = canonical_root(&dir);
        std::os::unix::fs::symlink(
            outside.path().join("target.txt"),
            root.join("innocent.txt"),
        )
        .unwrap();

        let err = resolve_candidate(&root, "innocent.txt").unwrap_err();
        assert_eq!(err.reason, BlockReason::SymlinkEscape);
    }

    #[test]
    fn missing_files_still_resolve_inside_root() {
        let dir = TempDir::new().unwrap();
        let root = canonical_root(&dir);
        let resolved = resolve_candidate(&root, "does/not/exist.rs").unwrap();
        assert_eq!(resolved.rel(), "does/not/exist.rs");
    }

    #[test]
    fn normalizes_backslashes_and_dot_segments() {
        let dir = TempDir::new().unwrap();
        let root = canonical_root(&dir);
        let resolved = resolve_candidate(&root, "./src\\.\\mod.rs").unwrap();
        assert_eq!(resolved.rel(), "src/mod.rs");
    }
}
