use once_cell::sync::Lazy;
use regex::Regex;

use crate::lexical::{
    block_end, block_end_by_start_line, lexical_references, line_depths,
    mask_comments_and_strings, LexicalRules,
};
use crate::symbol::{sort_symbols, Reference, Symbol, SymbolKind, SymbolQuery};
use crate::Adapter;

static NAMESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*namespace\s+([A-Za-z_][A-Za-z0-9_.]*)").expect("namespace"));
static TYPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:(?:public|private|protected|internal|abstract|sealed|static|partial)\s+)*(class|struct|interface|enum|record)\s+([A-Za-z_][A-Za-z0-9_]*)",
    )
    .expect("type")
});
static METHOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:(?:public|private|protected|internal|static|virtual|override|abstract|async|sealed|new|extern)\s+)*(?:[A-Za-z_][A-Za-z0-9_<>\[\],?.]*\s+)?([A-Za-z_][A-Za-z0-9_]*)\s*\(([^)]*)\)\s*(=>|[;{])?",
    )
    .expect("method")
});
static PROPERTY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:(?:public|private|protected|internal|static|virtual|override|abstract)\s+)*[A-Za-z_][A-Za-z0-9_<>\[\],?.]*\s+([A-Za-z_][A-Za-z0-9_]*)\s*\{\s*(?:get|set|init)\b",
    )
    .expect("property")
});
static EVENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:(?:public|private|protected|internal|static)\s+)*event\s+[A-Za-z_][A-Za-z0-9_<>\[\],?.]*\s+([A-Za-z_][A-Za-z0-9_]*)\s*;",
    )
    .expect("event")
});

const METHOD_SKIP: &[&str] = &["if", "for", "while", "switch", "catch", "return", "new"];

const CSHARP_RULES: LexicalRules = LexicalRules {
    line_comment_prefixes: &["//"],
    block_comment_pairs: &[("/*", "*/")],
    string_delimiters: &["\"", "'"],
    escape_char: '\\',
};

/// Deterministic lexical adapter for C#: namespaces, types, methods,
/// properties, and events.
pub struct CSharpLexicalAdapter;

impl Adapter for CSharpLexicalAdapter {
    fn name(&self) -> &'static str {
        "csharp_lexical"
    }

    fn supports_path(&self, path: &str) -> bool {
        path.to_lowercase().ends_with(".cs")
    }

    fn outline(&self, _path: &str, text: &str) -> Vec<Symbol> {
        let masked = mask_comments_and_strings(text, &CSHARP_RULES);
        let lines: Vec<&str> = masked.lines().collect();
        let depths = line_depths(&masked);
        let block_ends = block_end_by_start_line(&masked);

        let mut symbols: Vec<Symbol> = Vec::new();
        let mut type_blocks: Vec<(String, usize, usize, usize)> = Vec::new();
        let mut namespace: Option<String> = None;
        let mut namespace_depth = 0usize;

        for (index, line) in lines.iter().enumerate() {
            let line_number = index + 1;
            let depth = depths[index];

            if let Some(captures) = NAMESPACE_RE.captures(line) {
                if depth == 0 {
                    namespace = Some(captures[1].to_string());
                    // File-scoped namespaces (`namespace X;`) do not open
                    // a block.
                    namespace_depth = usize::from(!line.contains(';'));
                    symbols.push(Symbol::new(
                        SymbolKind::Namespace,
                        &captures[1],
                        line_number,
                        block_end(line_number, &block_ends),
                    ));
                    continue;
                }
            }
            if depth != namespace_depth {
                continue;
            }

            if let Some(captures) = TYPE_RE.captures(line) {
                let kind = match &captures[1] {
                    "class" => SymbolKind::Class,
                    "struct" => SymbolKind::Struct,
                    "interface" => SymbolKind::Interface,
                    "enum" => SymbolKind::Enum,
                    _ => SymbolKind::Record,
                };
                let qualified = match &namespace {
                    Some(ns) => format!("{ns}.{}", &captures[2]),
                    None => captures[2].to_string(),
                };
                let end = block_end(line_number, &block_ends);
                symbols
                    .push(Symbol::new(kind, qualified.clone(), line_number, end).with_signature("()"));
                type_blocks.push((qualified, line_number, end, depth + 1));
            }
        }

        for (qualified, type_start, type_end, member_depth) in type_blocks {
            extract_type_members(
                &qualified,
                &lines,
                &depths,
                &block_ends,
                type_start,
                type_end,
                member_depth,
                &mut symbols,
            );
        }

        sort_symbols(&mut symbols);
        symbols
    }

    fn extract_references(&self, path: &str, text: &str, query: &SymbolQuery) -> Vec<Reference> {
        lexical_references(query, path, text, &CSHARP_RULES)
    }
}

#[allow(clippy::too_many_arguments)]
fn extract_type_members(
    qualified: &str,
    lines: &[&str],
    depths: &[usize],
    block_ends: &std::collections::BTreeMap<usize, usize>,
    type_start: usize,
    type_end: usize,
    member_depth: usize,
    symbols: &mut Vec<Symbol>,
) {
    let end = type_end.min(lines.len());
    for line_number in (type_start + 1)..=end {
        if depths[line_number - 1] != member_depth {
            continue;
        }
        let line = lines[line_number - 1];

        if let Some(captures) = EVENT_RE.captures(line) {
            let mut symbol = Symbol::new(
                SymbolKind::Event,
                format!("{qualified}.{}", &captures[1]),
                line_number,
                line_number,
            );
            symbol.parent_symbol = Some(qualified.to_string());
            symbols.push(symbol);
            continue;
        }
        if let Some(captures) = PROPERTY_RE.captures(line) {
            let mut symbol = Symbol::new(
                SymbolKind::Property,
                format!("{qualified}.{}", &captures[1]),
                line_number,
                block_end(line_number, block_ends).min(type_end),
            );
            symbol.parent_symbol = Some(qualified.to_string());
            symbols.push(symbol);
            continue;
        }
        if let Some(captures) = METHOD_RE.captures(line) {
            let name = &captures[1];
            if METHOD_SKIP.contains(&name) {
                continue;
            }
            let terminator = captures.get(3).map(|m| m.as_str());
            let member_end = match terminator {
                Some("{") => block_end(line_number, block_ends).min(type_end),
                // Allman style: the opening brace sits on the next line.
                None if block_ends.contains_key(&(line_number + 1)) => {
                    block_end(line_number + 1, block_ends).min(type_end)
                }
                _ => line_number,
            };
            let mut symbol = Symbol::new(
                SymbolKind::Method,
                format!("{qualified}.{name}"),
                line_number,
                member_end,
            )
            .with_signature(format!("({})", captures[2].trim()));
            symbol.parent_symbol = Some(qualified.to_string());
            symbols.push(symbol);
        }
    }
}
