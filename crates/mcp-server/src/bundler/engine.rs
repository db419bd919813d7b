use std::collections::{BTreeMap, BTreeSet};

use repo_mcp_adapters::{Symbol, SymbolQuery};
use repo_mcp_protocol::SearchFilters;
use repo_mcp_search::{BM25_B, BM25_K1};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use super::keywords::{extract_keywords, KEYWORD_CAP};
use super::rank::{compare_candidates, Candidate};
use crate::tools::ToolError;
use crate::ServerState;

const PER_QUERY_TOP_K: usize = 20;
/// Candidates ranked below this cut are reported as
/// `below_rank_threshold` instead of being budget-checked.
const MAX_RANKED_CANDIDATES: usize = 50;
const TOP_SKIPPED: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleBudget {
    pub max_files: usize,
    pub max_total_lines: usize,
}

struct FileData {
    lines: Vec<String>,
    outline: Vec<Symbol>,
}

struct FileCache {
    files: BTreeMap<String, Option<FileData>>,
    reference_lines: BTreeMap<(String, String), Vec<usize>>,
}

impl FileCache {
    fn new() -> Self {
        Self {
            files: BTreeMap::new(),
            reference_lines: BTreeMap::new(),
        }
    }

    fn load<'c>(&'c mut self, state: &ServerState, path: &str) -> Option<&'c FileData> {
        if !self.files.contains_key(path) {
            let loaded = state
                .sandbox
                .resolve(path)
                .ok()
                .and_then(|resolved| state.sandbox.read_text(&resolved).ok())
                .map(|text| {
                    let outline = state.registry.select(path).outline(path, &text);
                    FileData {
                        lines: text.lines().map(ToString::to_string).collect(),
                        outline,
                    }
                });
            self.files.insert(path.to_string(), loaded);
        }
        self.files.get(path).and_then(Option::as_ref)
    }

    /// Lines holding references to `keyword` in `path`, via the file's
    /// adapter.
    fn reference_lines(&mut self, state: &ServerState, path: &str, keyword: &str) -> Vec<usize> {
        let key = (path.to_string(), keyword.to_string());
        if let Some(cached) = self.reference_lines.get(&key) {
            return cached.clone();
        }
        let lines = match (self.load(state, path), SymbolQuery::parse(keyword)) {
            (Some(data), Some(query)) => {
                let text = data.lines.join("\n");
                state
                    .registry
                    .select(path)
                    .extract_references(path, &text, &query)
                    .into_iter()
                    .map(|reference| reference.line)
                    .collect()
            }
            _ => Vec::new(),
        };
        self.reference_lines.insert(key, lines.clone());
        lines
    }
}

/// Assemble a deterministic, cited context bundle for `prompt` within
/// `budget`. A blocked read drops the candidate with a recorded skip
/// reason; it never aborts the bundle.
pub fn build_context_bundle(
    state: &mut ServerState,
    prompt: &str,
    budget: BundleBudget,
    strategy: &str,
    include_tests: bool,
) -> Result<Value, ToolError> {
    let keywords = extract_keywords(prompt);
    let mut queries: Vec<String> = vec![prompt.to_string()];
    queries.extend(keywords.iter().cloned());

    let index_config = state.store.config().clone();
    let filters = SearchFilters::default();

    // Multi-query retrieval, unioned and deduplicated by range with the
    // best score winning.
    #[derive(Debug)]
    struct RawHit {
        score: f64,
        matched_terms: BTreeSet<String>,
        source_query: String,
    }
    let per_query_top_k = PER_QUERY_TOP_K.min(state.sandbox.limits().max_search_hits);
    let mut union: BTreeMap<(String, usize, usize), RawHit> = BTreeMap::new();
    for query in &queries {
        let hits = state
            .store
            .search(&state.sandbox, query, per_query_top_k, &filters)?;
        for hit in hits {
            if !include_tests && index_config.is_test_path(&hit.path) {
                continue;
            }
            let key = (hit.path.clone(), hit.start_line, hit.end_line);
            let entry = union.entry(key).or_insert_with(|| RawHit {
                score: hit.score,
                matched_terms: BTreeSet::new(),
                source_query: query.clone(),
            });
            if hit.score > entry.score {
                entry.score = hit.score;
                entry.source_query = query.clone();
            }
            entry.matched_terms.extend(hit.matched_terms.iter().cloned());
        }
    }
    let retrieved_count = union.len();

    // Symbol alignment: snap each hit to the smallest enclosing
    // declaration that stays within max_open_lines, then re-deduplicate
    // ranges that collapsed onto the same declaration.
    let max_open_lines = state.sandbox.limits().max_open_lines;
    let mut cache = FileCache::new();
    let mut aligned: BTreeMap<(String, usize, usize), (RawHit, Option<String>)> = BTreeMap::new();
    for ((path, start_line, end_line), hit) in union {
        let (start_line, end_line, symbol_reference) =
            match cache.load(state, &path).map(|data| &data.outline) {
                Some(outline) => align_to_declaration(outline, start_line, end_line, max_open_lines),
                None => (start_line, end_line, None),
            };
        let key = (path.clone(), start_line, end_line);
        match aligned.entry(key) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert((hit, symbol_reference));
            }
            std::collections::btree_map::Entry::Occupied(mut slot) => {
                let (existing, _) = slot.get_mut();
                if hit.score > existing.score {
                    existing.score = hit.score;
                    existing.source_query = hit.source_query;
                }
                existing.matched_terms.extend(hit.matched_terms);
            }
        }
    }

    // Score vector per candidate.
    let mut candidates: Vec<Candidate> = Vec::new();
    for ((path, start_line, end_line), (hit, symbol_reference)) in aligned {
        let signals = candidate_signals(state, &mut cache, &keywords, &path, start_line, end_line);
        let symbol_reference = symbol_reference.or(signals.matched_declaration);
        let basename = path.rsplit('/').next().unwrap_or(&path).to_lowercase();
        let path_name_relevance = keywords
            .iter()
            .filter(|keyword| basename.contains(keyword.as_str()))
            .count();
        let line_count = end_line - start_line + 1;
        candidates.push(Candidate {
            path,
            start_line,
            end_line,
            search_score: hit.score,
            matched_terms: hit.matched_terms.into_iter().collect(),
            source_query: hit.source_query,
            definition_match: signals.definition_match,
            reference_count_in_range: signals.reference_count,
            min_definition_distance: signals.min_distance,
            path_name_relevance,
            range_size_penalty: Candidate::compute_range_size_penalty(line_count),
            symbol_reference,
        });
    }
    candidates.sort_by(compare_candidates);

    // Budget enforcement in rank order.
    let selection = select_within_budget(state, &mut cache, &candidates, budget, max_open_lines);

    let prompt_fingerprint = fingerprint_prompt(prompt);
    let bundle_id = derive_bundle_id(&prompt_fingerprint, &selection);

    let selections_json: Vec<Value> = selection
        .selected
        .iter()
        .map(|selected| {
            let candidate = &selected.candidate;
            json!({
                "path": candidate.path,
                "start_line": candidate.start_line,
                "end_line": candidate.end_line,
                "rationale": rationale_for(candidate),
                "why_selected": {
                    "matched_signals": matched_signals(candidate),
                    "score_components": {
                        "search_score": candidate.search_score,
                        "matched_terms_count": candidate.matched_terms.len(),
                        "definition_match": candidate.definition_match,
                        "reference_count_in_range": candidate.reference_count_in_range,
                        "min_definition_distance": candidate.min_definition_distance,
                        "path_name_relevance": candidate.path_name_relevance,
                        "range_size_penalty": candidate.range_size_penalty,
                    },
                    "source_query": candidate.source_query,
                    "matched_terms": candidate.matched_terms,
                    "symbol_reference": candidate.symbol_reference,
                },
            })
        })
        .collect();

    let citations: Vec<Value> = selection
        .selected
        .iter()
        .enumerate()
        .map(|(index, selected)| {
            json!({
                "path": selected.candidate.path,
                "start_line": selected.candidate.start_line,
                "end_line": selected.candidate.end_line,
                "selection_index": index,
            })
        })
        .collect();

    let top_skipped: Vec<Value> = selection
        .skipped
        .iter()
        .take(TOP_SKIPPED)
        .map(|(candidate, reason)| {
            json!({
                "path": candidate.path,
                "start_line": candidate.start_line,
                "end_line": candidate.end_line,
                "reason": reason,
            })
        })
        .collect();

    let bundle = json!({
        "bundle_id": bundle_id,
        "prompt_fingerprint": prompt_fingerprint,
        "strategy": strategy,
        "budget": {
            "max_files": budget.max_files,
            "max_total_lines": budget.max_total_lines,
        },
        "totals": {
            "files": selection.file_count,
            "lines": selection.total_lines,
            "bytes": selection.total_bytes,
        },
        "selections": selections_json,
        "citations": citations,
        "audit": {
            "selection_debug": {
                "why_not_selected_summary": { "top_skipped": top_skipped },
            },
            "ranking_debug": {
                "queries": queries,
                "keyword_cap": KEYWORD_CAP,
                "retrieved": retrieved_count,
                "ranked": candidates.len(),
            },
        },
    });

    export_last_bundle(state, &bundle, &selection);
    Ok(bundle)
}

/// Smallest declaration fully enclosing the hit range and fitting
/// within `max_open_lines`; otherwise the chunk range is kept.
fn align_to_declaration(
    outline: &[Symbol],
    start_line: usize,
    end_line: usize,
    max_open_lines: usize,
) -> (usize, usize, Option<String>) {
    let best = outline
        .iter()
        .filter(|symbol| {
            symbol.start_line <= start_line
                && end_line <= symbol.end_line
                && symbol.line_count() <= max_open_lines
        })
        .min_by_key(|symbol| (symbol.line_count(), symbol.start_line));
    match best {
        Some(symbol) => (symbol.start_line, symbol.end_line, Some(symbol.name.clone())),
        None => (start_line, end_line, None),
    }
}

fn name_matches_keyword(name: &str, keyword: &str) -> bool {
    let lowered = name.to_lowercase();
    lowered == keyword
        || lowered
            .rsplit('.')
            .next()
            .is_some_and(|last| last == keyword)
}

struct RangeSignals {
    definition_match: bool,
    reference_count: usize,
    min_distance: Option<usize>,
    matched_declaration: Option<String>,
}

fn candidate_signals(
    state: &ServerState,
    cache: &mut FileCache,
    keywords: &[String],
    path: &str,
    start_line: usize,
    end_line: usize,
) -> RangeSignals {
    let outline: Vec<Symbol> = match cache.load(state, path) {
        Some(data) => data.outline.clone(),
        None => {
            return RangeSignals {
                definition_match: false,
                reference_count: 0,
                min_distance: None,
                matched_declaration: None,
            }
        }
    };

    let mut definition_match = false;
    let mut matched_declaration: Option<String> = None;
    let mut min_distance: Option<usize> = None;
    for symbol in &outline {
        if !keywords
            .iter()
            .any(|keyword| name_matches_keyword(&symbol.name, keyword))
        {
            continue;
        }
        let distance = if symbol.start_line <= end_line && start_line <= symbol.end_line {
            0
        } else if symbol.start_line > end_line {
            symbol.start_line - end_line
        } else {
            start_line - symbol.end_line
        };
        // Enclosed definitions flip the dominant ranking signal.
        if symbol.start_line >= start_line && symbol.end_line <= end_line {
            definition_match = true;
            if matched_declaration.is_none() {
                matched_declaration = Some(symbol.name.clone());
            }
        }
        min_distance = Some(min_distance.map_or(distance, |d| d.min(distance)));
    }

    let mut reference_count = 0usize;
    for keyword in keywords {
        let lines = cache.reference_lines(state, path, keyword);
        reference_count += lines
            .iter()
            .filter(|line| **line >= start_line && **line <= end_line)
            .count();
    }

    RangeSignals {
        definition_match,
        reference_count,
        min_distance,
        matched_declaration,
    }
}

struct Selected {
    candidate: Candidate,
    excerpt: String,
}

struct SelectionOutcome {
    selected: Vec<Selected>,
    skipped: Vec<(Candidate, &'static str)>,
    file_count: usize,
    total_lines: usize,
    total_bytes: usize,
}

fn select_within_budget(
    state: &ServerState,
    cache: &mut FileCache,
    candidates: &[Candidate],
    budget: BundleBudget,
    max_open_lines: usize,
) -> SelectionOutcome {
    let mut selected: Vec<Selected> = Vec::new();
    let mut skipped: Vec<(Candidate, &'static str)> = Vec::new();
    let mut files: BTreeSet<String> = BTreeSet::new();
    let mut total_lines = 0usize;
    let mut total_bytes = 0usize;
    let mut response_budget = state.sandbox.response_budget();

    for (rank_index, candidate) in candidates.iter().enumerate() {
        if rank_index >= MAX_RANKED_CANDIDATES {
            skipped.push((candidate.clone(), "below_rank_threshold"));
            continue;
        }
        if candidate.line_count() > max_open_lines {
            skipped.push((candidate.clone(), "range_too_large"));
            continue;
        }
        let Some(data) = cache.load(state, &candidate.path) else {
            skipped.push((candidate.clone(), "blocked_by_sandbox"));
            continue;
        };

        // Overlapping ranges from the same path merge when the union
        // stays within per-open limits; fully covered ranges are
        // duplicates.
        if let Some(existing) = selected
            .iter_mut()
            .find(|s| s.candidate.path == candidate.path && ranges_touch(&s.candidate, candidate))
        {
            if candidate.start_line >= existing.candidate.start_line
                && candidate.end_line <= existing.candidate.end_line
            {
                skipped.push((candidate.clone(), "duplicate_of_selected"));
                continue;
            }
            let union_start = existing.candidate.start_line.min(candidate.start_line);
            let union_end = existing.candidate.end_line.max(candidate.end_line);
            let union_lines = union_end - union_start + 1;
            let existing_lines = existing.candidate.line_count();
            if union_lines <= max_open_lines
                && total_lines - existing_lines + union_lines <= budget.max_total_lines
            {
                let excerpt = excerpt_of(data, union_start, union_end);
                let grown_bytes = excerpt.len().saturating_sub(existing.excerpt.len());
                if response_budget.charge(grown_bytes).is_ok() {
                    total_lines = total_lines - existing_lines + union_lines;
                    total_bytes = total_bytes - existing.excerpt.len() + excerpt.len();
                    existing.candidate.start_line = union_start;
                    existing.candidate.end_line = union_end;
                    let mut terms: BTreeSet<String> =
                        existing.candidate.matched_terms.iter().cloned().collect();
                    terms.extend(candidate.matched_terms.iter().cloned());
                    existing.candidate.matched_terms = terms.into_iter().collect();
                    existing.excerpt = excerpt;
                    continue;
                }
            }
            skipped.push((candidate.clone(), "budget_exhausted"));
            continue;
        }

        let next_file_count = files.len() + usize::from(!files.contains(&candidate.path));
        if next_file_count > budget.max_files {
            skipped.push((candidate.clone(), "budget_exhausted"));
            continue;
        }
        if total_lines + candidate.line_count() > budget.max_total_lines {
            skipped.push((candidate.clone(), "budget_exhausted"));
            continue;
        }
        let excerpt = excerpt_of(data, candidate.start_line, candidate.end_line);
        if response_budget.charge(excerpt.len()).is_err() {
            skipped.push((candidate.clone(), "budget_exhausted"));
            continue;
        }

        files.insert(candidate.path.clone());
        total_lines += candidate.line_count();
        total_bytes += excerpt.len();
        selected.push(Selected {
            candidate: candidate.clone(),
            excerpt,
        });
    }

    SelectionOutcome {
        selected,
        skipped,
        file_count: files.len(),
        total_lines,
        total_bytes,
    }
}

fn ranges_touch(a: &Candidate, b: &Candidate) -> bool {
    b.start_line <= a.end_line + 1 && a.start_line <= b.end_line + 1
}

fn excerpt_of(data: &FileData, start_line: usize, end_line: usize) -> String {
    let start = start_line.saturating_sub(1).min(data.lines.len());
    let end = end_line.min(data.lines.len());
    data.lines[start..end].join("\n")
}

fn matched_signals(candidate: &Candidate) -> Vec<&'static str> {
    let mut signals = vec!["search_score"];
    if candidate.definition_match {
        signals.push("definition_match");
    }
    if candidate.reference_count_in_range > 0 || candidate.min_definition_distance.is_some() {
        signals.push("reference_proximity");
    }
    if candidate.path_name_relevance > 0 {
        signals.push("path_name_relevance");
    }
    if !candidate.matched_terms.is_empty() {
        signals.push("matched_terms");
    }
    signals
}

fn rationale_for(candidate: &Candidate) -> String {
    let terms = if candidate.matched_terms.is_empty() {
        "none".to_string()
    } else {
        candidate.matched_terms.join(", ")
    };
    match &candidate.symbol_reference {
        Some(symbol) => format!(
            "Selected from query '{}' (score {:.6}) aligned to declaration '{symbol}'; matched_terms={terms}.",
            candidate.source_query, candidate.search_score
        ),
        None => format!(
            "Selected from query '{}' (score {:.6}); matched_terms={terms}.",
            candidate.source_query, candidate.search_score
        ),
    }
}

fn fingerprint_prompt(prompt: &str) -> String {
    let mut digest = Sha256::new();
    digest.update(prompt.as_bytes());
    for parameter in [
        format!("{BM25_K1}"),
        format!("{BM25_B}"),
        format!("{KEYWORD_CAP}"),
        format!("{}", super::rank::RANKING_VERSION),
    ] {
        digest.update(b"|");
        digest.update(parameter.as_bytes());
    }
    hex_lower(&digest.finalize())
}

fn derive_bundle_id(prompt_fingerprint: &str, selection: &SelectionOutcome) -> String {
    let mut digest = Sha256::new();
    digest.update(prompt_fingerprint.as_bytes());
    for selected in &selection.selected {
        let candidate = &selected.candidate;
        digest.update(b"|");
        digest.update(
            format!(
                "{}:{}:{}:{:.6}",
                candidate.path, candidate.start_line, candidate.end_line, candidate.search_score
            )
            .as_bytes(),
        );
    }
    digest.update(
        format!(
            "|{}:{}:{}",
            selection.file_count, selection.total_lines, selection.total_bytes
        )
        .as_bytes(),
    );
    hex_lower(&digest.finalize())
}

fn hex_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Best-effort export of the last bundle to the data directory; export
/// failures are logged, never surfaced.
fn export_last_bundle(state: &ServerState, bundle: &Value, selection: &SelectionOutcome) {
    let data_dir = state.store.data_dir();
    if let Err(e) = std::fs::create_dir_all(data_dir) {
        log::warn!("bundle export: failed to create data dir: {e}");
        return;
    }

    let json_path = data_dir.join("last_bundle.json");
    match serde_json::to_vec_pretty(bundle) {
        Ok(mut bytes) => {
            bytes.push(b'\n');
            if let Err(e) = std::fs::write(&json_path, bytes) {
                log::warn!("bundle export: failed to write {}: {e}", json_path.display());
            }
        }
        Err(e) => log::warn!("bundle export: failed to serialize: {e}"),
    }

    let mut rendered = String::new();
    rendered.push_str("# Context bundle\n\n");
    if let Some(id) = bundle.get("bundle_id").and_then(Value::as_str) {
        rendered.push_str(&format!("- bundle_id: `{id}`\n"));
    }
    if let Some(totals) = bundle.get("totals") {
        rendered.push_str(&format!("- totals: {totals}\n"));
    }
    rendered.push('\n');
    for selected in &selection.selected {
        let candidate = &selected.candidate;
        rendered.push_str(&format!(
            "## {}:{}-{}\n\n{}\n\n```\n{}\n```\n\n",
            candidate.path,
            candidate.start_line,
            candidate.end_line,
            rationale_for(candidate),
            selected.excerpt,
        ));
    }
    let md_path = data_dir.join("last_bundle.md");
    if let Err(e) = std::fs::write(&md_path, rendered) {
        log::warn!("bundle export: failed to write {}: {e}", md_path.display());
    }
}
