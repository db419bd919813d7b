use once_cell::sync::Lazy;
use regex::Regex;

use crate::lexical::{
    block_end, block_end_by_start_line, lexical_references, line_depths,
    mask_comments_and_strings, LexicalRules,
};
use crate::symbol::{sort_symbols, Reference, Symbol, SymbolKind, SymbolQuery};
use crate::Adapter;

static PACKAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*package\s+([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)\s*;")
        .expect("package")
});
static TYPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:(?:public|protected|private|abstract|final|static|sealed|strictfp)\s+)*(class|interface|enum|record)\s+([A-Za-z_][A-Za-z0-9_]*)",
    )
    .expect("type")
});
static METHOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:@[A-Za-z_][A-Za-z0-9_]*(?:\([^)]*\))?\s*)*(?:(?:public|protected|private|abstract|final|static|synchronized|native|strictfp|default)\s+)*(?:(?:<[^>]+>\s*)?([A-Za-z_][A-Za-z0-9_<>\[\], ?.]*?)\s+)?([A-Za-z_][A-Za-z0-9_]*)\s*\(([^)]*)\)\s*(?:throws\s+[A-Za-z0-9_.,\s]+)?\s*([;{])",
    )
    .expect("method")
});

const METHOD_SKIP: &[&str] = &["if", "for", "while", "switch", "catch", "return", "new"];

const JAVA_RULES: LexicalRules = LexicalRules {
    line_comment_prefixes: &["//"],
    block_comment_pairs: &[("/*", "*/")],
    string_delimiters: &["\"", "'"],
    escape_char: '\\',
};

/// Deterministic lexical adapter for Java: package-qualified top-level
/// types plus their direct members.
pub struct JavaLexicalAdapter;

impl Adapter for JavaLexicalAdapter {
    fn name(&self) -> &'static str {
        "java_lexical"
    }

    fn supports_path(&self, path: &str) -> bool {
        path.to_lowercase().ends_with(".java")
    }

    fn outline(&self, _path: &str, text: &str) -> Vec<Symbol> {
        let masked = mask_comments_and_strings(text, &JAVA_RULES);
        let lines: Vec<&str> = masked.lines().collect();
        let depths = line_depths(&masked);
        let block_ends = block_end_by_start_line(&masked);
        let package = lines
            .iter()
            .find_map(|line| PACKAGE_RE.captures(line))
            .map(|captures| captures[1].to_string());

        let mut symbols: Vec<Symbol> = Vec::new();
        let mut type_blocks: Vec<(String, String, usize, usize)> = Vec::new();

        for (index, line) in lines.iter().enumerate() {
            let line_number = index + 1;
            if depths[index] != 0 {
                continue;
            }
            let Some(captures) = TYPE_RE.captures(line) else {
                continue;
            };
            let kind = match &captures[1] {
                "class" => SymbolKind::Class,
                "interface" => SymbolKind::Interface,
                "enum" => SymbolKind::Enum,
                _ => SymbolKind::Record,
            };
            let type_name = captures[2].to_string();
            let qualified = match &package {
                Some(pkg) => format!("{pkg}.{type_name}"),
                None => type_name.clone(),
            };
            let end = block_end(line_number, &block_ends);
            symbols.push(
                Symbol::new(kind, qualified.clone(), line_number, end).with_signature("()"),
            );
            type_blocks.push((type_name, qualified, line_number, end));
        }

        for (type_name, qualified, start, end) in type_blocks {
            extract_type_members(
                &type_name,
                &qualified,
                &lines,
                &depths,
                &block_ends,
                start,
                end,
                &mut symbols,
            );
        }

        sort_symbols(&mut symbols);
        symbols
    }

    fn extract_references(&self, path: &str, text: &str, query: &SymbolQuery) -> Vec<Reference> {
        lexical_references(query, path, text, &JAVA_RULES)
    }
}

#[allow(clippy::too_many_arguments)]
fn extract_type_members(
    type_name: &str,
    qualified: &str,
    lines: &[&str],
    depths: &[usize],
    block_ends: &std::collections::BTreeMap<usize, usize>,
    type_start: usize,
    type_end: usize,
    symbols: &mut Vec<Symbol>,
) {
    let end = type_end.min(lines.len());
    for line_number in (type_start + 1)..=end {
        if depths[line_number - 1] != 1 {
            continue;
        }
        let Some(captures) = METHOD_RE.captures(lines[line_number - 1]) else {
            continue;
        };
        let return_type = captures.get(1);
        let member_name = &captures[2];
        if METHOD_SKIP.contains(&member_name) {
            continue;
        }
        // Constructors have no return type but share the type's name;
        // anything else without a return type is a control-flow false
        // positive.
        if member_name != type_name && return_type.is_none() {
            continue;
        }
        let terminator = &captures[4];
        let member_end = if terminator == ";" {
            line_number
        } else {
            block_end(line_number, block_ends).min(type_end)
        };
        let mut symbol = Symbol::new(
            SymbolKind::Method,
            format!("{qualified}.{member_name}"),
            line_number,
            member_end,
        )
        .with_signature(format!("({})", captures[3].trim()));
        symbol.parent_symbol = Some(qualified.to_string());
        symbols.push(symbol);
    }
}
