use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::tokenizer::tokenize;

pub const BM25_K1: f64 = 1.5;
pub const BM25_B: f64 = 0.75;
pub const SNIPPET_MAX_CHARS: usize = 300;

/// One chunk scored as a document.
#[derive(Debug, Clone)]
pub struct SearchDocument {
    pub chunk_id: String,
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub snippet: String,
    pub score: f64,
    pub matched_terms: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,
}

/// Corpus-wide statistics persisted alongside the index and recomputed
/// on every refresh. IDF and length normalization come from here, so a
/// `file_glob` filter narrows the candidate set without changing term
/// weights.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorpusStats {
    pub document_count: usize,
    pub total_token_count: u64,
    pub doc_frequencies: BTreeMap<String, u32>,
}

impl CorpusStats {
    #[must_use]
    pub fn from_documents<'a>(texts: impl Iterator<Item = &'a str>) -> Self {
        let mut document_count = 0usize;
        let mut total_token_count = 0u64;
        let mut doc_frequencies: BTreeMap<String, u32> = BTreeMap::new();
        for text in texts {
            document_count += 1;
            let tokens = tokenize(text);
            total_token_count += tokens.len() as u64;
            let unique: BTreeSet<String> = tokens.into_iter().collect();
            for term in unique {
                *doc_frequencies.entry(term).or_insert(0) += 1;
            }
        }
        Self {
            document_count,
            total_token_count,
            doc_frequencies,
        }
    }

    #[must_use]
    pub fn avg_doc_len(&self) -> f64 {
        if self.document_count == 0 {
            return 0.0;
        }
        self.total_token_count as f64 / self.document_count as f64
    }

    fn idf(&self, term: &str) -> f64 {
        let n = f64::from(self.doc_frequencies.get(term).copied().unwrap_or(0));
        let total = self.document_count as f64;
        (1.0 + ((total - n + 0.5) / (n + 0.5))).ln()
    }
}

/// Classical Okapi BM25 with the fixed constants above. The returned
/// order is total (score desc, path asc, start_line asc, chunk_id asc),
/// so repeated calls on an unchanged index are bit-identical.
#[must_use]
pub fn bm25_search(
    documents: &[SearchDocument],
    stats: &CorpusStats,
    query: &str,
    top_k: usize,
) -> Vec<SearchHit> {
    let terms: BTreeSet<String> = tokenize(query).into_iter().collect();
    if terms.is_empty() || documents.is_empty() || top_k == 0 {
        return Vec::new();
    }
    let avgdl = stats.avg_doc_len();
    if avgdl <= 0.0 {
        return Vec::new();
    }

    let mut hits: Vec<SearchHit> = Vec::new();
    for doc in documents {
        let tokens = tokenize(&doc.text);
        let doc_len = tokens.len() as f64;
        let mut counts: HashMap<&str, u32> = HashMap::new();
        for token in &tokens {
            *counts.entry(token.as_str()).or_insert(0) += 1;
        }

        let mut score = 0.0f64;
        let mut matched_terms: Vec<String> = Vec::new();
        for term in &terms {
            let tf = f64::from(counts.get(term.as_str()).copied().unwrap_or(0));
            if tf == 0.0 {
                continue;
            }
            matched_terms.push(term.clone());
            let denom = tf + BM25_K1 * (1.0 - BM25_B + BM25_B * (doc_len / avgdl));
            score += stats.idf(term) * ((tf * (BM25_K1 + 1.0)) / denom);
        }
        if score <= 0.0 {
            continue;
        }
        hits.push(SearchHit {
            path: doc.path.clone(),
            start_line: doc.start_line,
            end_line: doc.end_line,
            snippet: build_snippet(&doc.text, &matched_terms),
            score,
            matched_terms,
            chunk_id: Some(doc.chunk_id.clone()),
        });
    }

    hits.sort_by(compare_hits);
    hits.truncate(top_k);
    hits
}

fn compare_hits(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.path.cmp(&b.path))
        .then_with(|| a.start_line.cmp(&b.start_line))
        .then_with(|| a.chunk_id.cmp(&b.chunk_id))
}

/// First up-to-3 lines that contain a matched term, falling back to the
/// first 3 lines; bounded to [`SNIPPET_MAX_CHARS`].
#[must_use]
pub fn build_snippet(text: &str, matched_terms: &[String]) -> String {
    let mut picked: Vec<&str> = Vec::new();
    if !matched_terms.is_empty() {
        for line in text.lines() {
            if picked.len() >= 3 {
                break;
            }
            let line_tokens = tokenize(line);
            if matched_terms.iter().any(|t| line_tokens.contains(t)) {
                picked.push(line);
            }
        }
    }
    if picked.is_empty() {
        picked = text.lines().take(3).collect();
    }
    let snippet = picked.join("\n");
    if snippet.chars().count() > SNIPPET_MAX_CHARS {
        snippet.chars().take(SNIPPET_MAX_CHARS).collect()
    } else {
        snippet
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn doc(chunk_id: &str, path: &str, start: usize, text: &str) -> SearchDocument {
        SearchDocument {
            chunk_id: chunk_id.to_string(),
            path: path.to_string(),
            start_line: start,
            end_line: start + text.lines().count().saturating_sub(1),
            text: text.to_string(),
        }
    }

    fn stats_of(docs: &[SearchDocument]) -> CorpusStats {
        CorpusStats::from_documents(docs.iter().map(|d| d.text.as_str()))
    }

    #[test]
    fn ranks_term_dense_documents_first() {
        let docs = vec![
            doc("c1", "a.rs", 1, "fn refresh_index() { refresh(); }"),
            doc("c2", "b.rs", 1, "fn unrelated() {}"),
            doc("c3", "c.rs", 1, "refresh the index and refresh again"),
        ];
        let stats = stats_of(&docs);
        let hits = bm25_search(&docs, &stats, "refresh", 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].path, "c.rs");
        assert_eq!(hits[0].matched_terms, vec!["refresh".to_string()]);
    }

    #[test]
    fn tie_breaks_by_path_then_start_line_then_chunk_id() {
        let docs = vec![
            doc("c2", "b.rs", 1, "needle"),
            doc("c1", "a.rs", 1, "needle"),
            doc("c3", "a.rs", 10, "needle"),
        ];
        let stats = stats_of(&docs);
        let hits = bm25_search(&docs, &stats, "needle", 10);
        let order: Vec<(&str, usize)> = hits
            .iter()
            .map(|h| (h.path.as_str(), h.start_line))
            .collect();
        assert_eq!(order, vec![("a.rs", 1), ("a.rs", 10), ("b.rs", 1)]);
    }

    #[test]
    fn repeated_calls_are_bit_identical() {
        let docs = vec![
            doc("c1", "x.py", 1, "def build_bundle(prompt): pass"),
            doc("c2", "y.py", 1, "bundle = build_bundle('p')"),
        ];
        let stats = stats_of(&docs);
        let first = bm25_search(&docs, &stats, "build bundle", 5);
        let second = bm25_search(&docs, &stats, "build bundle", 5);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn top_k_truncates_after_ordering() {
        let docs = vec![
            doc("c1", "a.rs", 1, "needle"),
            doc("c2", "b.rs", 1, "needle"),
            doc("c3", "c.rs", 1, "needle"),
        ];
        let stats = stats_of(&docs);
        let hits = bm25_search(&docs, &stats, "needle", 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].path, "a.rs");
        assert_eq!(hits[1].path, "b.rs");
    }

    #[test]
    fn snippet_prefers_matching_lines() {
        let text = "// header\n// more header\nlet needle = 1;\nlet other = 2;";
        let snippet = build_snippet(text, &["needle".to_string()]);
        assert_eq!(snippet, "let needle = 1;");

        let fallback = build_snippet(text, &[]);
        assert_eq!(fallback, "// header\n// more header\nlet needle = 1;");
    }

    #[test]
    fn empty_query_or_corpus_yields_nothing() {
        let docs = vec![doc("c1", "a.rs", 1, "text")];
        let stats = stats_of(&docs);
        assert!(bm25_search(&docs, &stats, "??", 5).is_empty());
        assert!(bm25_search(&[], &stats, "text", 5).is_empty());
    }
}
