use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index data corrupt: {0}")]
    Corrupt(String),

    #[error("index schema version {found} is not supported (expected {expected})")]
    SchemaMismatch { found: i64, expected: u32 },

    #[error(
        "index refresh exceeded {budget_ms} ms after {processed}/{total} files; no index mutation"
    )]
    RefreshTimeout {
        budget_ms: u64,
        processed: usize,
        total: usize,
    },

    #[error("failed to acquire index write lock: {0}")]
    Lock(String),
}
