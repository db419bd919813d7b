use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use repo_mcp_protocol::SearchFilters;
use repo_mcp_sandbox::Sandbox;
use repo_mcp_search::{bm25_search, CorpusStats, SearchDocument, SearchHit};
use serde::{Deserialize, Serialize};

use crate::chunking::{chunk_text, ChunkingParams, CHUNKING_VERSION};
use crate::config::IndexConfig;
use crate::discovery::{discover_files, language_hint, sha256_file};
use crate::error::{IndexerError, Result};
use crate::lock::acquire_index_write_lock;
use crate::models::{ChunkRecord, FileRecord, IndexStatus, IndexStatusReport, RefreshOutcome};

pub const INDEX_SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_MAX_REFRESH_WALL_MS: u64 = 120_000;

const MANIFEST_FILE: &str = "manifest.json";
const FILES_FILE: &str = "files.jsonl";
const CHUNKS_FILE: &str = "chunks.jsonl";
const BM25_FILE: &str = "bm25.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    pub schema_version: u32,
    pub chunk_lines: usize,
    pub overlap_lines: usize,
    pub chunking_version: u32,
    pub last_refresh_timestamp: u64,
    pub indexed_file_count: usize,
    pub indexed_chunk_count: usize,
}

/// The only persistent mutable state in the process. `refresh` is the
/// single writer (serialized by an exclusive file lock); every other
/// entry point reads a consistent snapshot thanks to the write-to-temp +
/// rename discipline, manifest last.
pub struct IndexStore {
    data_dir: PathBuf,
    index_dir: PathBuf,
    data_dir_prefix: Option<String>,
    config: IndexConfig,
    params: ChunkingParams,
    max_refresh_wall_ms: u64,
    docs_cache: Option<(String, Vec<SearchDocument>)>,
}

impl IndexStore {
    pub fn new(
        repo_root: &Path,
        data_dir: &Path,
        config: IndexConfig,
        params: ChunkingParams,
    ) -> Self {
        let data_dir_prefix = data_dir
            .strip_prefix(repo_root)
            .ok()
            .map(|rel| {
                rel.components()
                    .filter_map(|c| match c {
                        std::path::Component::Normal(p) => {
                            Some(p.to_string_lossy().into_owned())
                        }
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .filter(|p| !p.is_empty());
        Self {
            data_dir: data_dir.to_path_buf(),
            index_dir: data_dir.join("index"),
            data_dir_prefix,
            config,
            params,
            max_refresh_wall_ms: DEFAULT_MAX_REFRESH_WALL_MS,
            docs_cache: None,
        }
    }

    #[must_use]
    pub fn with_refresh_budget_ms(mut self, budget_ms: u64) -> Self {
        self.max_refresh_wall_ms = budget_ms;
        self
    }

    #[must_use]
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    #[must_use]
    pub fn chunking_params(&self) -> ChunkingParams {
        self.params
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    #[must_use]
    pub fn data_dir_prefix(&self) -> Option<&str> {
        self.data_dir_prefix.as_deref()
    }

    pub fn status(&self) -> IndexStatusReport {
        match self.read_manifest() {
            Ok(None) => IndexStatusReport::not_indexed(),
            Err(_) => IndexStatusReport::schema_mismatch(),
            Ok(Some(manifest)) => {
                if manifest.schema_version != INDEX_SCHEMA_VERSION
                    || manifest.chunking_version != CHUNKING_VERSION
                {
                    IndexStatusReport::schema_mismatch()
                } else {
                    IndexStatusReport {
                        index_status: IndexStatus::Ready,
                        last_refresh_timestamp: Some(manifest.last_refresh_timestamp),
                        indexed_file_count: manifest.indexed_file_count,
                        indexed_chunk_count: manifest.indexed_chunk_count,
                    }
                }
            }
        }
    }

    /// Incremental refresh: `(mtime, size)` fast path, hash confirmation
    /// for touched files, delete-and-add for renames. `force` reindexes
    /// everything; a corrupt or schema-mismatched previous index degrades
    /// to a full rebuild instead of failing.
    pub fn refresh(&mut self, sandbox: &Sandbox, force: bool) -> Result<RefreshOutcome> {
        let started = Instant::now();
        let _lock = acquire_index_write_lock(&self.data_dir)?;

        let previous = match self.load_file_records() {
            Ok(map) => map,
            Err(e) => {
                log::warn!("refresh: previous index unreadable ({e}); rebuilding from scratch");
                BTreeMap::new()
            }
        };

        let discovered =
            discover_files(sandbox, &self.config, self.data_dir_prefix.as_deref(), false)?;
        let total = discovered.len();

        let mut added = 0usize;
        let mut updated = 0usize;
        let mut records: Vec<FileRecord> = Vec::with_capacity(total);
        let mut chunks: Vec<ChunkRecord> = Vec::with_capacity(total);
        let mut chunk_texts: Vec<String> = Vec::new();

        for (processed, file) in discovered.iter().enumerate() {
            let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            if elapsed_ms > self.max_refresh_wall_ms {
                return Err(IndexerError::RefreshTimeout {
                    budget_ms: self.max_refresh_wall_ms,
                    processed,
                    total,
                });
            }

            let resolved = match sandbox.resolve(&file.path) {
                Ok(resolved) => resolved,
                Err(blocked) => {
                    log::warn!("refresh: skipping '{}': {blocked}", file.path);
                    continue;
                }
            };

            let prev = previous.get(&file.path);
            let content_hash = match prev {
                Some(p)
                    if !force
                        && p.mtime_ms == file.mtime_ms
                        && p.size_bytes == file.size_bytes =>
                {
                    p.content_hash.clone()
                }
                _ => match sha256_file(resolved.abs()) {
                    Ok(hash) => hash,
                    Err(e) => {
                        log::warn!("refresh: failed to hash '{}': {e}", file.path);
                        continue;
                    }
                },
            };

            let text = match sandbox.read_text(&resolved) {
                Ok(text) => text,
                Err(refusal) => {
                    log::warn!("refresh: failed to read '{}': {refusal:?}", file.path);
                    continue;
                }
            };
            match prev {
                None => added += 1,
                Some(p) if force || p.content_hash != content_hash => updated += 1,
                Some(_) => {}
            }
            let file_chunks = chunk_text(&file.path, &text, self.params);
            let lines: Vec<&str> = text.lines().collect();
            for chunk in &file_chunks {
                let start = chunk.start_line.saturating_sub(1);
                let end = chunk.end_line.min(lines.len());
                chunk_texts.push(lines[start..end].join("\n"));
            }

            records.push(FileRecord {
                path: file.path.clone(),
                size_bytes: file.size_bytes,
                mtime_ms: file.mtime_ms,
                content_hash,
                extension: crate::config::extension_of(&file.path).unwrap_or_default(),
                language_hint: language_hint(&file.path),
                chunk_ids: file_chunks.iter().map(|c| c.chunk_id.clone()).collect(),
            });
            chunks.extend(file_chunks);
        }

        let current_paths: std::collections::BTreeSet<&str> =
            records.iter().map(|r| r.path.as_str()).collect();
        let removed = previous
            .keys()
            .filter(|path| !current_paths.contains(path.as_str()))
            .count();

        let stats = CorpusStats::from_documents(chunk_texts.iter().map(String::as_str));
        let timestamp = unix_now_ms();
        let manifest = Manifest {
            schema_version: INDEX_SCHEMA_VERSION,
            chunk_lines: self.params.window_lines,
            overlap_lines: self.params.overlap_lines,
            chunking_version: CHUNKING_VERSION,
            last_refresh_timestamp: timestamp,
            indexed_file_count: records.len(),
            indexed_chunk_count: chunks.len(),
        };

        std::fs::create_dir_all(&self.index_dir)?;
        atomic_write_jsonl(&self.index_dir.join(FILES_FILE), &records)?;
        atomic_write_jsonl(&self.index_dir.join(CHUNKS_FILE), &chunks)?;
        atomic_write_json(&self.index_dir.join(BM25_FILE), &stats)?;
        // Manifest last: a crash before this point leaves the previous
        // index fully readable.
        atomic_write_json(&self.index_dir.join(MANIFEST_FILE), &manifest)?;

        self.docs_cache = None;
        Ok(RefreshOutcome {
            added,
            updated,
            removed,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            timestamp,
        })
    }

    /// Deterministic BM25 search over the indexed chunks. Filters narrow
    /// the candidate set before ranking; IDF and length normalization use
    /// the persisted corpus statistics.
    pub fn search(
        &mut self,
        sandbox: &Sandbox,
        query: &str,
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let stats = self.corpus_stats()?;
        let docs = self.search_documents(sandbox)?;
        let filtered: Vec<SearchDocument> = if filters.is_empty() {
            docs.to_vec()
        } else {
            docs.iter()
                .filter(|d| filters.matches(&d.path))
                .cloned()
                .collect()
        };
        Ok(bm25_search(&filtered, &stats, query, top_k))
    }

    pub fn corpus_stats(&self) -> Result<CorpusStats> {
        let path = self.index_dir.join(BM25_FILE);
        if !path.exists() {
            return Ok(CorpusStats {
                document_count: 0,
                total_token_count: 0,
                doc_frequencies: BTreeMap::new(),
            });
        }
        let bytes = std::fs::read(&path)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| IndexerError::Corrupt(format!("{BM25_FILE}: {e}")))
    }

    pub fn file_records(&self) -> Result<Vec<FileRecord>> {
        Ok(self.load_file_records()?.into_values().collect())
    }

    pub fn chunk_records(&self) -> Result<Vec<ChunkRecord>> {
        let path = self.index_dir.join(CHUNKS_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut out: Vec<ChunkRecord> = read_jsonl(&path)?;
        out.sort_by(|a, b| {
            a.path
                .cmp(&b.path)
                .then_with(|| a.start_line.cmp(&b.start_line))
        });
        Ok(out)
    }

    /// Chunk documents with their current text, cached per manifest
    /// snapshot. Files that vanished or became unreadable since the last
    /// refresh are skipped.
    pub fn search_documents(&mut self, sandbox: &Sandbox) -> Result<&[SearchDocument]> {
        let marker = self.cache_marker();
        let cache_is_fresh = self
            .docs_cache
            .as_ref()
            .is_some_and(|(cached, _)| *cached == marker);
        if !cache_is_fresh {
            let chunks = self.chunk_records()?;
            let mut line_cache: BTreeMap<String, Vec<String>> = BTreeMap::new();
            let mut docs: Vec<SearchDocument> = Vec::with_capacity(chunks.len());
            for chunk in chunks {
                if !line_cache.contains_key(&chunk.path) {
                    let lines = match sandbox
                        .resolve(&chunk.path)
                        .ok()
                        .and_then(|resolved| sandbox.read_text(&resolved).ok())
                    {
                        Some(text) => text.lines().map(ToString::to_string).collect(),
                        None => {
                            log::warn!("search: skipping unreadable '{}'", chunk.path);
                            Vec::new()
                        }
                    };
                    line_cache.insert(chunk.path.clone(), lines);
                }
                let lines = &line_cache[&chunk.path];
                if lines.is_empty() {
                    continue;
                }
                let start = chunk.start_line.saturating_sub(1);
                let end = chunk.end_line.min(lines.len());
                if start >= end {
                    continue;
                }
                docs.push(SearchDocument {
                    chunk_id: chunk.chunk_id,
                    path: chunk.path,
                    start_line: chunk.start_line,
                    end_line: chunk.end_line,
                    text: lines[start..end].join("\n"),
                });
            }
            self.docs_cache = Some((marker, docs));
        }
        Ok(self
            .docs_cache
            .as_ref()
            .map(|(_, docs)| docs.as_slice())
            .unwrap_or(&[]))
    }

    fn cache_marker(&self) -> String {
        match self.read_manifest() {
            Ok(Some(m)) => format!(
                "{}:{}:{}:{}",
                m.schema_version, m.indexed_file_count, m.indexed_chunk_count,
                m.last_refresh_timestamp
            ),
            Ok(None) => "not_indexed".to_string(),
            Err(_) => "corrupt".to_string(),
        }
    }

    fn read_manifest(&self) -> Result<Option<Manifest>> {
        let path = self.index_dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path)?;
        let manifest = serde_json::from_slice(&bytes)
            .map_err(|e| IndexerError::Corrupt(format!("{MANIFEST_FILE}: {e}")))?;
        Ok(Some(manifest))
    }

    fn load_file_records(&self) -> Result<BTreeMap<String, FileRecord>> {
        let Some(manifest) = self.read_manifest()? else {
            return Ok(BTreeMap::new());
        };
        if manifest.schema_version != INDEX_SCHEMA_VERSION {
            return Err(IndexerError::SchemaMismatch {
                found: i64::from(manifest.schema_version),
                expected: INDEX_SCHEMA_VERSION,
            });
        }
        let path = self.index_dir.join(FILES_FILE);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let records: Vec<FileRecord> = read_jsonl(&path)?;
        Ok(records.into_iter().map(|r| (r.path.clone(), r)).collect())
    }
}

fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

fn tmp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "index".to_string());
    path.with_file_name(format!("{name}.tmp"))
}

fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = tmp_path(path);
    let mut bytes = serde_json::to_vec(value)
        .map_err(|e| IndexerError::Corrupt(format!("serialize {}: {e}", path.display())))?;
    bytes.push(b'\n');
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn atomic_write_jsonl<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let tmp = tmp_path(path);
    let mut out = std::fs::File::create(&tmp)?;
    for row in rows {
        let line = serde_json::to_string(row)
            .map_err(|e| IndexerError::Corrupt(format!("serialize {}: {e}", path.display())))?;
        out.write_all(line.as_bytes())?;
        out.write_all(b"\n")?;
    }
    out.sync_all()?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn read_jsonl<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str(trimmed) {
            Ok(row) => out.push(row),
            Err(e) => log::warn!("skipping corrupt index row in {}: {e}", path.display()),
        }
    }
    Ok(out)
}
