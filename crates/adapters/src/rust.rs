use once_cell::sync::Lazy;
use regex::Regex;

use crate::lexical::{
    block_end, block_end_by_start_line, lexical_references, line_depths,
    mask_comments_and_strings, LexicalRules,
};
use crate::symbol::{sort_symbols, Reference, Symbol, SymbolKind, SymbolQuery};
use crate::Adapter;

static MOD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?mod\s+([A-Za-z_][A-Za-z0-9_]*)").expect("mod"));
static STRUCT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?struct\s+([A-Za-z_][A-Za-z0-9_]*)").expect("struct")
});
static ENUM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?enum\s+([A-Za-z_][A-Za-z0-9_]*)").expect("enum")
});
static TRAIT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:unsafe\s+)?trait\s+([A-Za-z_][A-Za-z0-9_]*)")
        .expect("trait")
});
static CONST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:const|static)\s+([A-Za-z_][A-Za-z0-9_]*)")
        .expect("const")
});
static TYPE_ALIAS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?type\s+([A-Za-z_][A-Za-z0-9_]*)").expect("type")
});
static FN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:unsafe\s+)?fn\s+([A-Za-z_][A-Za-z0-9_]*)\s*(?:<[^>]*>)?\s*\(([^)]*)",
    )
    .expect("fn")
});
static IMPL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*impl(?:<[^>]+>)?\s+(.+?)\s*\{").expect("impl"));
static IMPL_TARGET_TAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\s*$").expect("impl target"));

const RUST_RULES: LexicalRules = LexicalRules {
    line_comment_prefixes: &["//"],
    block_comment_pairs: &[("/*", "*/")],
    string_delimiters: &["\""],
    escape_char: '\\',
};

/// Deterministic lexical adapter for Rust source files. `const fn` and
/// macro-generated items degrade to fewer symbols, never to errors.
pub struct RustLexicalAdapter;

impl Adapter for RustLexicalAdapter {
    fn name(&self) -> &'static str {
        "rust_lexical"
    }

    fn supports_path(&self, path: &str) -> bool {
        path.to_lowercase().ends_with(".rs")
    }

    fn outline(&self, _path: &str, text: &str) -> Vec<Symbol> {
        let masked = mask_comments_and_strings(text, &RUST_RULES);
        let lines: Vec<&str> = masked.lines().collect();
        let depths = line_depths(&masked);
        let block_ends = block_end_by_start_line(&masked);

        let mut symbols: Vec<Symbol> = Vec::new();
        let mut impl_blocks: Vec<(Option<String>, usize, usize)> = Vec::new();

        for (index, line) in lines.iter().enumerate() {
            let line_number = index + 1;
            if depths[index] != 0 {
                continue;
            }

            if let Some(captures) = MOD_RE.captures(line) {
                symbols.push(Symbol::new(
                    SymbolKind::Module,
                    &captures[1],
                    line_number,
                    block_end(line_number, &block_ends),
                ));
                continue;
            }
            if let Some(captures) = STRUCT_RE.captures(line) {
                symbols.push(Symbol::new(
                    SymbolKind::Struct,
                    &captures[1],
                    line_number,
                    block_end(line_number, &block_ends),
                ));
                continue;
            }
            if let Some(captures) = ENUM_RE.captures(line) {
                symbols.push(Symbol::new(
                    SymbolKind::Enum,
                    &captures[1],
                    line_number,
                    block_end(line_number, &block_ends),
                ));
                continue;
            }
            if let Some(captures) = TRAIT_RE.captures(line) {
                symbols.push(Symbol::new(
                    SymbolKind::Trait,
                    &captures[1],
                    line_number,
                    block_end(line_number, &block_ends),
                ));
                continue;
            }
            if let Some(captures) = IMPL_RE.captures(line) {
                let target = parse_impl_target(&captures[1]);
                let end = block_end(line_number, &block_ends);
                symbols.push(Symbol::new(
                    SymbolKind::Impl,
                    target.clone().unwrap_or_else(|| "impl".to_string()),
                    line_number,
                    end,
                ));
                impl_blocks.push((target, line_number, end));
                continue;
            }
            if let Some(captures) = FN_RE.captures(line) {
                symbols.push(
                    Symbol::new(
                        SymbolKind::Function,
                        &captures[1],
                        line_number,
                        block_end(line_number, &block_ends),
                    )
                    .with_signature(format!("({})", captures[2].trim())),
                );
                continue;
            }
            if let Some(captures) = CONST_RE.captures(line) {
                // `const fn` is a function, already matched above.
                if !captures[0].contains("fn") {
                    symbols.push(Symbol::new(
                        SymbolKind::Const,
                        &captures[1],
                        line_number,
                        line_number,
                    ));
                }
                continue;
            }
            if let Some(captures) = TYPE_ALIAS_RE.captures(line) {
                symbols.push(Symbol::new(
                    SymbolKind::Type,
                    &captures[1],
                    line_number,
                    line_number,
                ));
            }
        }

        for (target, impl_start, impl_end) in impl_blocks {
            extract_impl_methods(
                target.as_deref(),
                &lines,
                &depths,
                &block_ends,
                impl_start,
                impl_end,
                &mut symbols,
            );
        }

        sort_symbols(&mut symbols);
        symbols
    }

    fn extract_references(&self, path: &str, text: &str, query: &SymbolQuery) -> Vec<Reference> {
        lexical_references(query, path, text, &RUST_RULES)
    }
}

/// `impl<T> Display for Wrapper<T> where ...` resolves to `Wrapper`.
fn parse_impl_target(head: &str) -> Option<String> {
    let mut part = head.split(" where ").next().unwrap_or(head).trim();
    if let Some((_, target)) = part.split_once(" for ") {
        part = target.trim();
    }
    let without_generics = strip_generics(part);
    let cleaned = without_generics
        .trim_start_matches('&')
        .trim_start_matches("mut ")
        .trim();
    IMPL_TARGET_TAIL_RE
        .captures(cleaned)
        .map(|captures| captures[1].to_string())
}

fn strip_generics(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    let mut depth = 0usize;
    for ch in part.chars() {
        match ch {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out
}

fn extract_impl_methods(
    target: Option<&str>,
    lines: &[&str],
    depths: &[usize],
    block_ends: &std::collections::BTreeMap<usize, usize>,
    impl_start: usize,
    impl_end: usize,
    symbols: &mut Vec<Symbol>,
) {
    let end = impl_end.min(lines.len());
    for line_number in (impl_start + 1)..=end {
        if depths[line_number - 1] != 1 {
            continue;
        }
        let Some(captures) = FN_RE.captures(lines[line_number - 1]) else {
            continue;
        };
        let owner = target.unwrap_or("impl");
        let mut symbol = Symbol::new(
            SymbolKind::Method,
            format!("{owner}.{}", &captures[1]),
            line_number,
            block_end(line_number, block_ends).min(impl_end),
        )
        .with_signature(format!("({})", captures[2].trim()));
        symbol.parent_symbol = Some(owner.to_string());
        symbols.push(symbol);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn outline(text: &str) -> Vec<Symbol> {
        RustLexicalAdapter.outline("lib.rs", text)
    }

    #[test]
    fn extracts_items_and_impl_methods() {
        let text = concat!(
            "pub mod inner {\n",
            "}\n",
            "pub struct Store {\n",
            "    path: PathBuf,\n",
            "}\n",
            "impl Store {\n",
            "    pub fn open(path: &Path) -> Self {\n",
            "        todo!()\n",
            "    }\n",
            "}\n",
            "impl<T> Display for Wrapper<T> {\n",
            "    fn fmt(&self, f: &mut Formatter) -> Result {\n",
            "        todo!()\n",
            "    }\n",
            "}\n",
            "pub async fn run(query: &str) -> Result<()> {\n",
            "    Ok(())\n",
            "}\n",
            "pub const LIMIT: usize = 10;\n",
            "pub type Alias = Vec<String>;\n",
        );
        let symbols = outline(text);
        let summary: Vec<(&str, &str)> = symbols
            .iter()
            .map(|s| (s.kind.as_str(), s.name.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("module", "inner"),
                ("struct", "Store"),
                ("impl", "Store"),
                ("method", "Store.open"),
                ("impl", "Wrapper"),
                ("method", "Wrapper.fmt"),
                ("function", "run"),
                ("const", "LIMIT"),
                ("type", "Alias"),
            ]
        );
    }

    #[test]
    fn impl_target_parsing_handles_generics_and_trait_impls() {
        assert_eq!(parse_impl_target("Store"), Some("Store".to_string()));
        assert_eq!(
            parse_impl_target("Display for Wrapper<T>"),
            Some("Wrapper".to_string())
        );
        assert_eq!(
            parse_impl_target("Iterator for std::vec::IntoIter"),
            Some("IntoIter".to_string())
        );
    }

    #[test]
    fn comments_do_not_produce_symbols() {
        let text = "// struct Phantom {\n/* enum Ghost { */\nstruct Real;\n";
        let symbols = outline(text);
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, "Real");
    }
}
