use sha2::{Digest, Sha256};

use crate::models::ChunkRecord;

pub const DEFAULT_CHUNK_LINES: usize = 200;
pub const DEFAULT_CHUNK_OVERLAP_LINES: usize = 30;

/// Bumped whenever the windowing rules change; part of every chunk id so
/// ids from older schemes can never collide with current ones.
pub const CHUNKING_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingParams {
    pub window_lines: usize,
    pub overlap_lines: usize,
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self {
            window_lines: DEFAULT_CHUNK_LINES,
            overlap_lines: DEFAULT_CHUNK_OVERLAP_LINES,
        }
    }
}

impl ChunkingParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.window_lines < 1 {
            return Err("chunking.window_lines must be >= 1".to_string());
        }
        if self.overlap_lines >= self.window_lines {
            return Err("chunking.overlap_lines must be less than window_lines".to_string());
        }
        Ok(())
    }
}

/// Fixed overlapping line windows over newline-normalized text. The last
/// window may be shorter; consecutive windows overlap by exactly
/// `overlap_lines`. Adapters never influence these boundaries.
#[must_use]
pub fn chunk_text(path: &str, text: &str, params: ChunkingParams) -> Vec<ChunkRecord> {
    let line_count = text.lines().count();
    if line_count == 0 {
        return Vec::new();
    }

    let step = params.window_lines - params.overlap_lines;
    let mut chunks = Vec::new();
    let mut start_index = 0usize;
    loop {
        let end_exclusive = (start_index + params.window_lines).min(line_count);
        let start_line = start_index + 1;
        let end_line = end_exclusive;
        chunks.push(ChunkRecord {
            chunk_id: chunk_id(path, start_line, end_line, params),
            path: path.to_string(),
            start_line,
            end_line,
        });
        if end_exclusive == line_count {
            break;
        }
        start_index += step;
    }
    chunks
}

/// Stable id derived from the chunking inputs alone, so an unchanged file
/// re-chunks to identical ids on every refresh.
#[must_use]
pub fn chunk_id(path: &str, start_line: usize, end_line: usize, params: ChunkingParams) -> String {
    let mut digest = Sha256::new();
    digest.update(path.as_bytes());
    for value in [
        start_line as u64,
        end_line as u64,
        params.window_lines as u64,
        params.overlap_lines as u64,
        u64::from(CHUNKING_VERSION),
    ] {
        digest.update(b"|");
        digest.update(value.to_be_bytes());
    }
    hex_lower(&digest.finalize())
}

pub(crate) fn hex_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn params(window: usize, overlap: usize) -> ChunkingParams {
        ChunkingParams {
            window_lines: window,
            overlap_lines: overlap,
        }
    }

    fn text_of(lines: usize) -> String {
        (1..=lines).map(|i| format!("line {i}\n")).collect()
    }

    #[test]
    fn covers_every_line_with_exact_overlap() {
        let text = text_of(450);
        let chunks = chunk_text("src/a.rs", &text, params(200, 30));

        assert_eq!(chunks.len(), 3);
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 200));
        assert_eq!((chunks[1].start_line, chunks[1].end_line), (171, 370));
        assert_eq!((chunks[2].start_line, chunks[2].end_line), (341, 450));

        // Consecutive chunks overlap by exactly the configured overlap.
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end_line - pair[1].start_line + 1, 30);
        }
    }

    #[test]
    fn short_file_is_one_chunk() {
        let chunks = chunk_text("a.py", &text_of(5), params(200, 30));
        assert_eq!(chunks.len(), 1);
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 5));
    }

    #[test]
    fn empty_file_has_no_chunks() {
        assert!(chunk_text("a.py", "", params(200, 30)).is_empty());
    }

    #[test]
    fn chunk_ids_are_stable_and_parameter_sensitive() {
        let text = text_of(400);
        let first = chunk_text("a.py", &text, params(200, 30));
        let second = chunk_text("a.py", &text, params(200, 30));
        assert_eq!(first, second);

        let other_params = chunk_text("a.py", &text, params(200, 50));
        assert_ne!(first[0].chunk_id, other_params[0].chunk_id);

        let other_path = chunk_text("b.py", &text, params(200, 30));
        assert_ne!(first[0].chunk_id, other_path[0].chunk_id);
    }

    #[test]
    fn params_validate() {
        assert!(ChunkingParams::default().validate().is_ok());
        assert!(params(0, 0).validate().is_err());
        assert!(params(10, 10).validate().is_err());
    }
}
