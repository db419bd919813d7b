//! Effective server configuration: built-in defaults, then the optional
//! `repo_mcp.toml` at the repo root, then CLI overrides, in that order.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use repo_mcp_indexer::{ChunkingParams, IndexConfig, DEFAULT_MAX_REFRESH_WALL_MS};
use repo_mcp_sandbox::SecurityLimits;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "repo_mcp.toml";
pub const DEFAULT_DATA_DIR_NAME: &str = ".repo_mcp";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdaptersConfig {
    pub python_enabled: bool,
    pub lexical_enabled: bool,
}

impl Default for AdaptersConfig {
    fn default() -> Self {
        Self {
            python_enabled: true,
            lexical_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub repo_root: PathBuf,
    pub data_dir: PathBuf,
    pub limits: SecurityLimits,
    pub index: IndexConfig,
    pub adapters: AdaptersConfig,
    pub chunking: ChunkingParams,
    pub refresh_budget_ms: u64,
}

/// Startup overrides applied at highest precedence. Flags map 1:1 to
/// config values.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub data_dir: Option<PathBuf>,
    pub max_file_bytes: Option<u64>,
    pub max_open_lines: Option<usize>,
    pub max_total_bytes_per_response: Option<usize>,
    pub max_search_hits: Option<usize>,
    pub max_references: Option<usize>,
    pub python_enabled: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfigFile {
    #[serde(default)]
    limits: RawLimits,
    #[serde(default)]
    index: RawIndex,
    #[serde(default)]
    adapters: RawAdapters,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLimits {
    max_file_bytes: Option<u64>,
    max_open_lines: Option<usize>,
    max_total_bytes_per_response: Option<usize>,
    max_search_hits: Option<usize>,
    max_references: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawIndex {
    include_extensions: Option<Vec<String>>,
    exclude_globs: Option<Vec<String>>,
    test_globs: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAdapters {
    python_enabled: Option<bool>,
    lexical_enabled: Option<bool>,
}

pub fn default_config(repo_root: &Path) -> Result<ServerConfig> {
    let repo_root = repo_root
        .canonicalize()
        .with_context(|| format!("invalid repo root '{}'", repo_root.display()))?;
    let data_dir = repo_root.join(DEFAULT_DATA_DIR_NAME);
    Ok(ServerConfig {
        repo_root,
        data_dir,
        limits: SecurityLimits::default(),
        index: IndexConfig::default(),
        adapters: AdaptersConfig::default(),
        chunking: ChunkingParams::default(),
        refresh_budget_ms: DEFAULT_MAX_REFRESH_WALL_MS,
    })
}

/// Merge order: defaults, then `repo_mcp.toml`, then CLI overrides.
pub fn load_effective_config(repo_root: &Path, overrides: &CliOverrides) -> Result<ServerConfig> {
    let mut config = default_config(repo_root)?;

    let config_path = config.repo_root.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        let raw_text = std::fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let raw: RawConfigFile = toml::from_str(&raw_text)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;
        apply_file(&mut config, raw);
    }

    apply_overrides(&mut config, overrides);
    validate(&config)?;
    Ok(config)
}

fn apply_file(config: &mut ServerConfig, raw: RawConfigFile) {
    if let Some(value) = raw.limits.max_file_bytes {
        config.limits.max_file_bytes = value;
    }
    if let Some(value) = raw.limits.max_open_lines {
        config.limits.max_open_lines = value;
    }
    if let Some(value) = raw.limits.max_total_bytes_per_response {
        config.limits.max_total_bytes_per_response = value;
    }
    if let Some(value) = raw.limits.max_search_hits {
        config.limits.max_search_hits = value;
    }
    if let Some(value) = raw.limits.max_references {
        config.limits.max_references = value;
    }
    if let Some(value) = raw.index.include_extensions {
        config.index.include_extensions = value;
    }
    if let Some(value) = raw.index.exclude_globs {
        config.index.exclude_globs = value;
    }
    if let Some(value) = raw.index.test_globs {
        config.index.test_globs = value;
    }
    if let Some(value) = raw.adapters.python_enabled {
        config.adapters.python_enabled = value;
    }
    if let Some(value) = raw.adapters.lexical_enabled {
        config.adapters.lexical_enabled = value;
    }
}

fn apply_overrides(config: &mut ServerConfig, overrides: &CliOverrides) {
    if let Some(data_dir) = &overrides.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(value) = overrides.max_file_bytes {
        config.limits.max_file_bytes = value;
    }
    if let Some(value) = overrides.max_open_lines {
        config.limits.max_open_lines = value;
    }
    if let Some(value) = overrides.max_total_bytes_per_response {
        config.limits.max_total_bytes_per_response = value;
    }
    if let Some(value) = overrides.max_search_hits {
        config.limits.max_search_hits = value;
    }
    if let Some(value) = overrides.max_references {
        config.limits.max_references = value;
    }
    if let Some(value) = overrides.python_enabled {
        config.adapters.python_enabled = value;
    }
}

fn validate(config: &ServerConfig) -> Result<()> {
    if let Err(message) = config.limits.validate() {
        bail!("{message}");
    }
    if let Err(message) = config.chunking.validate() {
        bail!("{message}");
    }
    if config.index.include_extensions.is_empty() {
        bail!("index.include_extensions must not be empty");
    }
    Ok(())
}

/// Serializable snapshot returned by `repo.status.effective_config`.
#[must_use]
pub fn public_snapshot(config: &ServerConfig) -> serde_json::Value {
    serde_json::json!({
        "repo_root": config.repo_root.display().to_string(),
        "data_dir": config.data_dir.display().to_string(),
        "limits": config.limits,
        "index": config.index,
        "adapters": config.adapters,
        "chunking": {
            "chunk_lines": config.chunking.window_lines,
            "overlap_lines": config.chunking.overlap_lines,
        },
        "refresh_budget_ms": config.refresh_budget_ms,
    })
}
