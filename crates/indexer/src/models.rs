use serde::{Deserialize, Serialize};

/// One file tracked by the index. `path` is repo-relative and
/// forward-slash normalized; `content_hash` fully determines the chunk
/// set under fixed chunking parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRecord {
    pub path: String,
    pub size_bytes: u64,
    pub mtime_ms: u64,
    pub content_hash: String,
    pub extension: String,
    pub language_hint: String,
    pub chunk_ids: Vec<String>,
}

/// One line-window chunk. Text is recomputable from the file and range
/// and is not persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkRecord {
    pub chunk_id: String,
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub duration_ms: u64,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IndexStatus {
    NotIndexed,
    Ready,
    SchemaMismatch,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStatusReport {
    pub index_status: IndexStatus,
    pub last_refresh_timestamp: Option<u64>,
    pub indexed_file_count: usize,
    pub indexed_chunk_count: usize,
}

impl IndexStatusReport {
    #[must_use]
    pub fn not_indexed() -> Self {
        Self {
            index_status: IndexStatus::NotIndexed,
            last_refresh_timestamp: None,
            indexed_file_count: 0,
            indexed_chunk_count: 0,
        }
    }

    #[must_use]
    pub fn schema_mismatch() -> Self {
        Self {
            index_status: IndexStatus::SchemaMismatch,
            last_refresh_timestamp: None,
            indexed_file_count: 0,
            indexed_chunk_count: 0,
        }
    }
}
