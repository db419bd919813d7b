//! Shared deterministic scanner for the lexical adapter family: comment
//! and string masking that preserves line structure and character
//! offsets, brace-depth accounting, and whole-word reference scanning.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::symbol::{
    evidence_from_line, sort_references, Confidence, RefKind, Reference, Strategy, SymbolQuery,
};

/// Markers recognized while masking non-code text. The defaults cover
/// the whole lexical family; longer markers win over shorter ones.
#[derive(Debug, Clone)]
pub struct LexicalRules {
    pub line_comment_prefixes: &'static [&'static str],
    pub block_comment_pairs: &'static [(&'static str, &'static str)],
    pub string_delimiters: &'static [&'static str],
    pub escape_char: char,
}

impl Default for LexicalRules {
    fn default() -> Self {
        Self {
            line_comment_prefixes: &["//", "#"],
            block_comment_pairs: &[("/*", "*/")],
            string_delimiters: &["'''", "\"\"\"", "'", "\"", "`"],
            escape_char: '\\',
        }
    }
}

enum MaskState {
    Code,
    LineComment,
    BlockComment(&'static str),
    Str(&'static str),
}

/// Replace comment and string contents with spaces while keeping every
/// newline, so line numbers and column offsets in the masked text line up
/// with the original.
#[must_use]
pub fn mask_comments_and_strings(text: &str, rules: &LexicalRules) -> String {
    let bytes: Vec<char> = text.chars().collect();
    let mut out: Vec<char> = bytes.clone();
    let mut state = MaskState::Code;
    let mut index = 0usize;

    while index < bytes.len() {
        match state {
            MaskState::Code => {
                if let Some(marker) = match_any(&bytes, index, rules.line_comment_prefixes) {
                    blank(&mut out, index, marker.len());
                    index += marker.chars().count();
                    state = MaskState::LineComment;
                    continue;
                }
                if let Some((open, close)) = rules
                    .block_comment_pairs
                    .iter()
                    .find(|(open, _)| starts_with_at(&bytes, index, open))
                {
                    blank(&mut out, index, open.len());
                    index += open.chars().count();
                    state = MaskState::BlockComment(close);
                    continue;
                }
                if let Some(marker) = match_any(&bytes, index, rules.string_delimiters) {
                    blank(&mut out, index, marker.len());
                    index += marker.chars().count();
                    state = MaskState::Str(marker);
                    continue;
                }
                index += 1;
            }
            MaskState::LineComment => {
                if bytes[index] == '\n' {
                    state = MaskState::Code;
                } else {
                    out[index] = ' ';
                }
                index += 1;
            }
            MaskState::BlockComment(close) => {
                if starts_with_at(&bytes, index, close) {
                    blank(&mut out, index, close.len());
                    index += close.chars().count();
                    state = MaskState::Code;
                } else {
                    if bytes[index] != '\n' {
                        out[index] = ' ';
                    }
                    index += 1;
                }
            }
            MaskState::Str(marker) => {
                if starts_with_at(&bytes, index, marker)
                    && !is_escaped(&bytes, index, marker, rules.escape_char)
                {
                    blank(&mut out, index, marker.len());
                    index += marker.chars().count();
                    state = MaskState::Code;
                } else {
                    if bytes[index] != '\n' {
                        out[index] = ' ';
                    }
                    index += 1;
                }
            }
        }
    }

    out.into_iter().collect()
}

/// Marker lists are ordered longest-first, so `'''` wins over `'`.
fn match_any(
    chars: &[char],
    index: usize,
    markers: &'static [&'static str],
) -> Option<&'static str> {
    markers
        .iter()
        .copied()
        .find(|marker| starts_with_at(chars, index, marker))
}

fn starts_with_at(chars: &[char], index: usize, marker: &str) -> bool {
    let marker_chars: Vec<char> = marker.chars().collect();
    chars.len() >= index + marker_chars.len()
        && chars[index..index + marker_chars.len()] == marker_chars[..]
}

fn blank(out: &mut [char], index: usize, marker_byte_len: usize) {
    // Markers are ASCII, so byte length equals char length.
    for slot in out.iter_mut().skip(index).take(marker_byte_len) {
        *slot = ' ';
    }
}

fn is_escaped(chars: &[char], index: usize, marker: &str, escape_char: char) -> bool {
    if marker.chars().count() > 1 {
        return false;
    }
    let mut backslashes = 0usize;
    let mut cursor = index;
    while cursor > 0 && chars[cursor - 1] == escape_char {
        backslashes += 1;
        cursor -= 1;
    }
    backslashes % 2 == 1
}

/// Brace depth at the start of each line.
#[must_use]
pub fn line_depths(masked: &str) -> Vec<usize> {
    let mut depths = Vec::new();
    let mut depth = 0usize;
    for line in masked.lines() {
        depths.push(depth);
        for ch in line.chars() {
            match ch {
                '{' => depth += 1,
                '}' => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
    }
    depths
}

/// For each line that opens a brace block, the line where its widest
/// block closes.
#[must_use]
pub fn block_end_by_start_line(masked: &str) -> BTreeMap<usize, usize> {
    let mut stack: Vec<usize> = Vec::new();
    let mut mapping: BTreeMap<usize, usize> = BTreeMap::new();
    let mut line = 1usize;
    for ch in masked.chars() {
        match ch {
            '{' => stack.push(line),
            '}' => {
                if let Some(start) = stack.pop() {
                    let entry = mapping.entry(start).or_insert(line);
                    if line > *entry {
                        *entry = line;
                    }
                }
            }
            '\n' => line += 1,
            _ => {}
        }
    }
    mapping
}

/// End line for a declaration starting at `start_line`: the block opened
/// on (or after) that line, else the line itself.
#[must_use]
pub fn block_end(start_line: usize, block_ends: &BTreeMap<usize, usize>) -> usize {
    block_ends
        .range(start_line..)
        .next()
        .map(|(_, end)| *end)
        .unwrap_or(start_line)
        .max(start_line)
}

/// Paren-group end line for Go-style `const (...)` groups.
#[must_use]
pub fn paren_group_end(lines: &[&str], start_index: usize) -> usize {
    let mut depth = 0i64;
    for (idx, line) in lines.iter().enumerate().skip(start_index) {
        for ch in line.chars() {
            match ch {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return idx;
                    }
                }
                _ => {}
            }
        }
    }
    lines.len().saturating_sub(1)
}

/// Whole-word occurrence test: the surrounding characters must not be
/// identifier characters (`[A-Za-z0-9_$]`).
#[must_use]
pub fn contains_whole_word(line: &str, word: &str) -> bool {
    find_whole_word(line, word).is_some()
}

fn find_whole_word(line: &str, word: &str) -> Option<usize> {
    if word.is_empty() {
        return None;
    }
    for (pos, _) in line.match_indices(word) {
        let before_ok = line[..pos]
            .chars()
            .next_back()
            .map_or(true, |c| !is_ident_char(c));
        let after = line[pos + word.len()..].chars().next();
        let after_ok = after.map_or(true, |c| !is_ident_char(c));
        if before_ok && after_ok {
            return Some(pos);
        }
    }
    None
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

static IMPORT_HINT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(import|from|using|use|require|include)\b").expect("import hint"));
static DECLARATION_HINT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(class|struct|interface|enum|record|trait|type|namespace|package|module|impl|func|fn|def)\b",
    )
    .expect("declaration hint")
});

/// Whole-word usage sites of `query` in one file, outside strings and
/// comments, with the declaration line itself excluded. Lexical evidence
/// is always low-confidence.
#[must_use]
pub fn lexical_references(
    query: &SymbolQuery,
    path: &str,
    text: &str,
    rules: &LexicalRules,
) -> Vec<Reference> {
    let masked = mask_comments_and_strings(text, rules);
    let word = query.last();
    let mut out = Vec::new();

    for (index, (masked_line, original_line)) in masked.lines().zip(text.lines()).enumerate() {
        let line_number = index + 1;
        if !contains_whole_word(masked_line, word) {
            continue;
        }
        if is_probable_declaration(masked_line, word) {
            continue;
        }
        if query.is_qualified() && !mentions_qualified(masked_line, query) {
            continue;
        }
        let evidence = evidence_from_line(original_line);
        if evidence.is_empty() {
            continue;
        }
        out.push(Reference {
            symbol: query.raw.clone(),
            path: path.to_string(),
            line: line_number,
            kind: classify_line(masked_line, word),
            evidence,
            strategy: Strategy::Lexical,
            confidence: Confidence::Low,
        });
    }

    sort_references(&mut out);
    out
}

fn is_probable_declaration(masked_line: &str, word: &str) -> bool {
    DECLARATION_HINT_RE.is_match(masked_line) && contains_whole_word(masked_line, word)
}

/// Qualified queries require either the full dotted/scoped sequence or
/// the trailing pair on the line.
fn mentions_qualified(masked_line: &str, query: &SymbolQuery) -> bool {
    let dotted = query.parts.join(".");
    let scoped = query.parts.join("::");
    if masked_line.contains(&dotted) || masked_line.contains(&scoped) {
        return true;
    }
    if query.parts.len() >= 2 {
        let tail = &query.parts[query.parts.len() - 2..];
        let tail_dotted = tail.join(".");
        let tail_scoped = tail.join("::");
        return masked_line.contains(&tail_dotted) || masked_line.contains(&tail_scoped);
    }
    false
}

fn classify_line(masked_line: &str, word: &str) -> RefKind {
    if IMPORT_HINT_RE.is_match(masked_line) {
        return RefKind::Import;
    }
    if let Some(pos) = find_whole_word(masked_line, word) {
        let rest = masked_line[pos + word.len()..].trim_start();
        if rest.starts_with('(') {
            return RefKind::Call;
        }
        let before = masked_line[..pos].trim_end();
        if before.ends_with('.') || before.ends_with("::") || before.ends_with("->") {
            return RefKind::Attribute;
        }
    }
    RefKind::Reference
}
