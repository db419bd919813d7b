use once_cell::sync::Lazy;
use regex::Regex;

use crate::lexical::{
    block_end, block_end_by_start_line, lexical_references, line_depths,
    mask_comments_and_strings, LexicalRules,
};
use crate::symbol::{sort_symbols, Reference, Symbol, SymbolKind, SymbolQuery};
use crate::Adapter;

static NAMESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*namespace\s+([A-Za-z_][A-Za-z0-9_:]*)").expect("namespace"));
static CLASS_STRUCT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:template\s*<[^>]*>\s*)?(class|struct)\s+([A-Za-z_][A-Za-z0-9_]*)")
        .expect("class/struct")
});
static ENUM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*enum(?:\s+class)?\s+([A-Za-z_][A-Za-z0-9_]*)").expect("enum")
});
static FUNCTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:(?:inline|constexpr|static|virtual|friend|extern|explicit)\s+)*(?:[A-Za-z_~][A-Za-z0-9_:<>\s*&]*?\s+)?([A-Za-z_~][A-Za-z0-9_]*)\s*\(([^;{}()]*)\)\s*(?:const\s*)?(?:noexcept(?:\([^)]*\))?\s*)?(?:->\s*[^;{]+)?\s*([;{])",
    )
    .expect("function")
});

const SKIP_NAMES: &[&str] = &["if", "for", "while", "switch", "catch", "return", "sizeof"];

const CPP_RULES: LexicalRules = LexicalRules {
    line_comment_prefixes: &["//"],
    block_comment_pairs: &[("/*", "*/")],
    string_delimiters: &["\"", "'"],
    escape_char: '\\',
};

/// Deterministic lexical adapter for C/C++ sources and headers.
/// Template-heavy code degrades to fewer symbols, never to errors.
pub struct CppLexicalAdapter;

const EXTENSIONS: &[&str] = &[".cpp", ".cc", ".cxx", ".hpp", ".hh", ".hxx", ".h"];

impl Adapter for CppLexicalAdapter {
    fn name(&self) -> &'static str {
        "cpp_lexical"
    }

    fn supports_path(&self, path: &str) -> bool {
        let lowered = path.to_lowercase();
        EXTENSIONS.iter().any(|ext| lowered.ends_with(ext))
    }

    fn outline(&self, _path: &str, text: &str) -> Vec<Symbol> {
        let masked = mask_comments_and_strings(text, &CPP_RULES);
        let lines: Vec<&str> = masked.lines().collect();
        let depths = line_depths(&masked);
        let block_ends = block_end_by_start_line(&masked);

        let mut symbols: Vec<Symbol> = Vec::new();
        let mut type_blocks: Vec<(String, usize, usize, usize)> = Vec::new();
        let mut namespace_depth = 0usize;

        for (index, line) in lines.iter().enumerate() {
            let line_number = index + 1;
            let depth = depths[index];

            if depth == 0 || depth == namespace_depth {
                if let Some(captures) = NAMESPACE_RE.captures(line) {
                    symbols.push(Symbol::new(
                        SymbolKind::Namespace,
                        &captures[1],
                        line_number,
                        block_end(line_number, &block_ends),
                    ));
                    namespace_depth = depth + 1;
                    continue;
                }
            }
            if depth > namespace_depth {
                continue;
            }

            if let Some(captures) = CLASS_STRUCT_RE.captures(line) {
                let kind = if &captures[1] == "class" {
                    SymbolKind::Class
                } else {
                    SymbolKind::Struct
                };
                let name = captures[2].to_string();
                let end = block_end(line_number, &block_ends);
                symbols.push(Symbol::new(kind, name.clone(), line_number, end));
                type_blocks.push((name, line_number, end, depth + 1));
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
            if let Some(captures) = FUNCTION_RE.captures(line) {
                let name = captures[1].trim_start_matches('~').to_string();
                if SKIP_NAMES.contains(&name.as_str()) || name.is_empty() {
                    continue;
                }
                let end = if &captures[3] == ";" {
                    line_number
                } else {
                    block_end(line_number, &block_ends)
                };
                symbols.push(
                    Symbol::new(SymbolKind::Function, &captures[1], line_number, end)
                        .with_signature(format!("({})", captures[2].trim())),
                );
            }
        }

        for (type_name, type_start, type_end, member_depth) in type_blocks {
            extract_type_members(
                &type_name,
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
        lexical_references(query, path, text, &CPP_RULES)
    }
}

#[allow(clippy::too_many_arguments)]
fn extract_type_members(
    type_name: &str,
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
        let line = lines[line_number - 1]
            .trim_start()
            .trim_start_matches("public:")
            .trim_start_matches("protected:")
            .trim_start_matches("private:");
        let Some(captures) = FUNCTION_RE.captures(line) else {
            continue;
        };
        let raw_name = &captures[1];
        let name = raw_name.trim_start_matches('~');
        if SKIP_NAMES.contains(&name) || name.is_empty() {
            continue;
        }
        let member_end = if &captures[3] == ";" {
            line_number
        } else {
            block_end(line_number, block_ends).min(type_end)
        };
        let mut symbol = Symbol::new(
            SymbolKind::Method,
            format!("{type_name}.{raw_name}"),
            line_number,
            member_end,
        )
        .with_signature(format!("({})", captures[2].trim()));
        symbol.parent_symbol = Some(type_name.to_string());
        symbols.push(symbol);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn extracts_namespaces_types_and_members() {
        let text = concat!(
            "namespace store {\n",
            "\n",
            "class Index {\n",
            "public:\n",
            "    explicit Index(std::string root);\n",
            "    int refresh(bool force) {\n",
            "        return 0;\n",
            "    }\n",
            "};\n",
            "\n",
            "int open_index(const char* path) {\n",
            "    return 1;\n",
            "}\n",
            "\n",
            "}  // namespace store\n",
        );
        let symbols = CppLexicalAdapter.outline("index.cpp", text);
        let summary: Vec<(&str, &str)> = symbols
            .iter()
            .map(|s| (s.kind.as_str(), s.name.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("namespace", "store"),
                ("class", "Index"),
                ("method", "Index.Index"),
                ("method", "Index.refresh"),
                ("function", "open_index"),
            ]
        );
    }

    #[test]
    fn prototypes_span_one_line() {
        let text = "int probe(int fd);\nint probe(int fd) {\n    return 0;\n}\n";
        let symbols = CppLexicalAdapter.outline("probe.h", text);
        assert_eq!(symbols.len(), 2);
        assert_eq!((symbols[0].start_line, symbols[0].end_line), (1, 1));
        assert_eq!((symbols[1].start_line, symbols[1].end_line), (2, 4));
    }
}
