mod chunking;
mod config;
mod discovery;
mod error;
mod lock;
mod models;
mod store;

pub use chunking::{
    chunk_text, ChunkingParams, CHUNKING_VERSION, DEFAULT_CHUNK_LINES, DEFAULT_CHUNK_OVERLAP_LINES,
};
pub use config::IndexConfig;
pub use discovery::{discover_files, language_hint, DiscoveredFile};
pub use error::{IndexerError, Result};
pub use models::{ChunkRecord, FileRecord, IndexStatus, IndexStatusReport, RefreshOutcome};
pub use store::{IndexStore, Manifest, DEFAULT_MAX_REFRESH_WALL_MS, INDEX_SCHEMA_VERSION};
