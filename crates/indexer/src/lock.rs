use std::fs::OpenOptions;
use std::path::Path;

use fs2::FileExt;

use crate::error::{IndexerError, Result};

const LOCK_FILE_NAME: &str = "index.lock";

/// Exclusive advisory lock held for the duration of a refresh. Readers
/// never lock; they observe either the old or the new index thanks to
/// the atomic rename discipline in the store.
pub(crate) struct IndexWriteLock {
    file: std::fs::File,
}

impl Drop for IndexWriteLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

pub(crate) fn acquire_index_write_lock(data_dir: &Path) -> Result<IndexWriteLock> {
    std::fs::create_dir_all(data_dir)?;
    let path = data_dir.join(LOCK_FILE_NAME);
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&path)?;
    file.lock_exclusive()
        .map_err(|e| IndexerError::Lock(format!("{}: {e}", path.display())))?;
    Ok(IndexWriteLock { file })
}
