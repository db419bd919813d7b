use std::io::{stdin, stdout};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use repo_mcp_server::config::{load_effective_config, CliOverrides};
use repo_mcp_server::{stdio, ServerState};

/// Repository interrogation server over newline-delimited JSON on
/// stdin/stdout. All file access is sandboxed under `--repo-root`.
#[derive(Debug, Parser)]
#[command(name = "repo-mcp", version, about)]
struct Args {
    /// Repository root; the only directory the server may read.
    #[arg(long, default_value = ".")]
    repo_root: PathBuf,

    /// Data directory for the index and audit log (default:
    /// <repo_root>/.repo_mcp).
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[arg(long)]
    max_file_bytes: Option<u64>,

    #[arg(long)]
    max_open_lines: Option<usize>,

    #[arg(long)]
    max_response_bytes: Option<usize>,

    #[arg(long)]
    max_search_hits: Option<usize>,

    #[arg(long)]
    max_references: Option<usize>,

    /// Disable the Python AST adapter (lexical fallback still applies).
    #[arg(long)]
    no_python_adapter: bool,

    /// Log filter when RUST_LOG is unset.
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // stdout carries the protocol stream; logs go to stderr only.
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(args.log_level.clone()),
    )
    .target(env_logger::Target::Stderr)
    .init();

    let overrides = CliOverrides {
        data_dir: args.data_dir,
        max_file_bytes: args.max_file_bytes,
        max_open_lines: args.max_open_lines,
        max_total_bytes_per_response: args.max_response_bytes,
        max_search_hits: args.max_search_hits,
        max_references: args.max_references,
        python_enabled: args.no_python_adapter.then_some(false),
    };

    let config = load_effective_config(&args.repo_root, &overrides)?;
    log::info!(
        "repo-mcp serving '{}' (data dir '{}')",
        config.repo_root.display(),
        config.data_dir.display()
    );

    let mut state = ServerState::new(config)?;
    let stdin = stdin();
    let stdout = stdout();
    stdio::serve(&mut state, stdin.lock(), stdout.lock())
}
