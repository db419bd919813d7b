//! repo-mcp server: a local, single-process service that answers
//! structured repository questions over newline-delimited JSON on
//! stdin/stdout. All filesystem access is mediated by the sandbox; the
//! index store is the only persistent mutable state.

pub mod audit;
pub mod bundler;
pub mod config;
pub mod dispatch;
pub mod references;
pub mod stdio;
pub mod tools;

use std::time::{SystemTime, UNIX_EPOCH};

use repo_mcp_adapters::{build_registry, AdapterRegistry};
use repo_mcp_indexer::IndexStore;
use repo_mcp_sandbox::Sandbox;

use crate::audit::AuditLog;
use crate::config::ServerConfig;

/// Explicit collaborators handed to every tool handler; no hidden
/// singletons.
pub struct ServerState {
    pub config: ServerConfig,
    pub sandbox: Sandbox,
    pub store: IndexStore,
    pub registry: AdapterRegistry,
    pub audit: AuditLog,
}

impl ServerState {
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let sandbox = Sandbox::new(&config.repo_root, config.limits)?;
        let store = IndexStore::new(
            sandbox.root(),
            &config.data_dir,
            config.index.clone(),
            config.chunking,
        )
        .with_refresh_budget_ms(config.refresh_budget_ms);
        let registry = build_registry(
            config.adapters.python_enabled,
            config.adapters.lexical_enabled,
        );
        let audit = AuditLog::new(&config.data_dir);
        Ok(Self {
            config,
            sandbox,
            store,
            registry,
            audit,
        })
    }
}

pub(crate) fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
