use std::io::Read;
use std::path::Path;
use std::time::UNIX_EPOCH;

use ignore::WalkBuilder;
use repo_mcp_sandbox::Sandbox;
use sha2::{Digest, Sha256};

use crate::chunking::hex_lower;
use crate::config::{extension_of, IndexConfig};
use crate::error::Result;

const BINARY_SNIFF_BYTES: usize = 8 * 1024;
const HASH_READ_BYTES: usize = 128 * 1024;

/// Candidate produced by discovery: cheap metadata only. Hashing and
/// chunking are deferred to the refresh loop so unchanged files stay
/// cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: String,
    pub size_bytes: u64,
    pub mtime_ms: u64,
}

/// Walk the repo root and produce the deterministic, sorted set of
/// indexable files. A file is included iff its extension is allowed, no
/// exclude glob matches, it is not denylisted, it fits the file size
/// limit, and it is not binary. Symlinks are resolved through the
/// sandbox, so links escaping the root are skipped rather than followed.
pub fn discover_files(
    sandbox: &Sandbox,
    config: &IndexConfig,
    data_dir_prefix: Option<&str>,
    include_hidden: bool,
) -> Result<Vec<DiscoveredFile>> {
    let root = sandbox.root().to_path_buf();
    let mut rel_paths: Vec<String> = Vec::new();

    let mut builder = WalkBuilder::new(&root);
    builder
        .standard_filters(false)
        .hidden(!include_hidden)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b));

    for entry in builder.build() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("discovery: failed to read entry: {e}");
                continue;
            }
        };
        let is_file = entry.file_type().is_some_and(|ft| ft.is_file());
        let is_symlink = entry.path_is_symlink();
        if !is_file && !is_symlink {
            continue;
        }
        let Some(rel) = relative_display(&root, entry.path()) else {
            continue;
        };
        if rel.is_empty() {
            continue;
        }
        if let Some(prefix) = data_dir_prefix {
            if rel == prefix || rel.starts_with(&format!("{prefix}/")) {
                continue;
            }
        }
        if !config.has_allowed_extension(&rel) {
            continue;
        }
        if config.is_excluded(&rel) {
            continue;
        }
        if sandbox.is_denylisted_rel(&rel) {
            continue;
        }
        if is_symlink {
            // Only keep links whose resolved target stays inside the root
            // and is a regular file.
            match sandbox.resolve(&rel) {
                Ok(resolved) if resolved.abs().is_file() => {}
                _ => continue,
            }
        }
        rel_paths.push(rel);
    }

    rel_paths.sort();
    rel_paths.dedup();

    let mut out = Vec::with_capacity(rel_paths.len());
    for rel in rel_paths {
        let abs = root.join(&rel);
        let meta = match std::fs::metadata(&abs) {
            Ok(meta) => meta,
            Err(e) => {
                log::warn!("discovery: failed to stat '{rel}': {e}");
                continue;
            }
        };
        if meta.len() > sandbox.limits().max_file_bytes {
            log::warn!("discovery: skipping '{rel}': exceeds max_file_bytes");
            continue;
        }
        match is_binary_file(&abs) {
            Ok(true) => continue,
            Ok(false) => {}
            Err(e) => {
                log::warn!("discovery: failed to sniff '{rel}': {e}");
                continue;
            }
        }
        out.push(DiscoveredFile {
            path: rel,
            size_bytes: meta.len(),
            mtime_ms: mtime_ms(&meta),
        });
    }
    Ok(out)
}

/// SHA-256 of the file bytes in bounded reads.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut digest = Sha256::new();
    let mut buf = vec![0u8; HASH_READ_BYTES];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        digest.update(&buf[..read]);
    }
    Ok(hex_lower(&digest.finalize()))
}

/// A file is binary when its first 8 KiB contain a zero byte or are not
/// valid UTF-8 (a multibyte sequence cut at the sniff boundary does not
/// count).
fn is_binary_file(path: &Path) -> Result<bool> {
    let mut file = std::fs::File::open(path)?;
    let mut buf = vec![0u8; BINARY_SNIFF_BYTES];
    let read = file.read(&mut buf)?;
    let sample = &buf[..read];
    if sample.contains(&0) {
        return Ok(true);
    }
    match std::str::from_utf8(sample) {
        Ok(_) => Ok(false),
        Err(e) => Ok(e.error_len().is_some()),
    }
}

pub(crate) fn mtime_ms(meta: &std::fs::Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

fn relative_display(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Some(parts.join("/"))
}

/// Coarse per-extension language label carried on file records and
/// outline responses.
#[must_use]
pub fn language_hint(rel_path: &str) -> String {
    let ext = extension_of(rel_path).unwrap_or_default();
    let hint = match ext.as_str() {
        ".py" => "python",
        ".rs" => "rust",
        ".ts" | ".tsx" | ".mts" | ".cts" => "typescript",
        ".js" | ".jsx" | ".mjs" | ".cjs" => "javascript",
        ".go" => "go",
        ".java" => "java",
        ".cpp" | ".cc" | ".cxx" | ".hpp" | ".hh" | ".h" => "cpp",
        ".cs" => "csharp",
        ".md" | ".rst" => "markup",
        ".toml" | ".yaml" | ".yml" | ".json" | ".ini" | ".cfg" => "config",
        _ => "text",
    };
    hint.to_string()
}
