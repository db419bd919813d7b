use once_cell::sync::Lazy;
use regex::Regex;

use crate::lexical::{
    block_end, block_end_by_start_line, lexical_references, line_depths,
    mask_comments_and_strings, paren_group_end, LexicalRules,
};
use crate::symbol::{sort_symbols, Reference, Symbol, SymbolKind, SymbolQuery};
use crate::Adapter;

static PACKAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*package\s+([A-Za-z_][A-Za-z0-9_]*)").expect("package"));
static TYPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*type\s+([A-Za-z_][A-Za-z0-9_]*)").expect("type"));
static FUNC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*func\s*(?:\(([^)]*)\)\s*)?([A-Za-z_][A-Za-z0-9_]*)\s*\(([^)]*)")
        .expect("func")
});
static CONST_VAR_SINGLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(const|var)\s+([A-Za-z_][A-Za-z0-9_]*)").expect("const/var"));
static CONST_VAR_GROUP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(const|var)\s*\(").expect("group"));
static GROUP_ENTRY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)").expect("entry"));

const GO_RULES: LexicalRules = LexicalRules {
    line_comment_prefixes: &["//"],
    block_comment_pairs: &[("/*", "*/")],
    string_delimiters: &["\"", "`"],
    escape_char: '\\',
};

/// Deterministic lexical adapter for Go: package-qualified types, funcs,
/// methods, and const/var declarations including grouped forms.
pub struct GoLexicalAdapter;

impl Adapter for GoLexicalAdapter {
    fn name(&self) -> &'static str {
        "go_lexical"
    }

    fn supports_path(&self, path: &str) -> bool {
        path.to_lowercase().ends_with(".go")
    }

    fn outline(&self, _path: &str, text: &str) -> Vec<Symbol> {
        let masked = mask_comments_and_strings(text, &GO_RULES);
        let lines: Vec<&str> = masked.lines().collect();
        let depths = line_depths(&masked);
        let block_ends = block_end_by_start_line(&masked);
        let package = lines
            .iter()
            .find_map(|line| PACKAGE_RE.captures(line))
            .map(|captures| captures[1].to_string());

        let mut symbols: Vec<Symbol> = Vec::new();
        let mut index = 0usize;
        while index < lines.len() {
            let line_number = index + 1;
            let line = lines[index];
            if depths[index] != 0 {
                index += 1;
                continue;
            }

            if let Some(captures) = TYPE_RE.captures(line) {
                symbols.push(Symbol::new(
                    SymbolKind::Type,
                    qualify(package.as_deref(), &captures[1]),
                    line_number,
                    block_end(line_number, &block_ends),
                ));
                index += 1;
                continue;
            }

            if let Some(captures) = FUNC_RE.captures(line) {
                let receiver = captures.get(1).map(|m| m.as_str());
                let name = &captures[2];
                let params = captures.get(3).map(|m| m.as_str().trim()).unwrap_or("");
                let (kind, symbol_name) = match receiver.and_then(parse_receiver_type) {
                    Some(receiver_type) => (
                        SymbolKind::Method,
                        qualify(package.as_deref(), &format!("{receiver_type}.{name}")),
                    ),
                    None if receiver.is_some() => {
                        (SymbolKind::Method, qualify(package.as_deref(), name))
                    }
                    None => (SymbolKind::Function, qualify(package.as_deref(), name)),
                };
                symbols.push(
                    Symbol::new(
                        kind,
                        symbol_name,
                        line_number,
                        block_end(line_number, &block_ends),
                    )
                    .with_signature(format!("({params})")),
                );
                index += 1;
                continue;
            }

            if CONST_VAR_GROUP_RE.is_match(line) {
                let kind = if line.trim_start().starts_with("const") {
                    SymbolKind::Const
                } else {
                    SymbolKind::Variable
                };
                let group_end = paren_group_end(&lines, index);
                for entry_index in (index + 1)..group_end {
                    if depths[entry_index] != 0 {
                        continue;
                    }
                    if let Some(captures) = GROUP_ENTRY_RE.captures(lines[entry_index]) {
                        symbols.push(Symbol::new(
                            kind,
                            qualify(package.as_deref(), &captures[1]),
                            entry_index + 1,
                            entry_index + 1,
                        ));
                    }
                }
                index = group_end + 1;
                continue;
            }

            if let Some(captures) = CONST_VAR_SINGLE_RE.captures(line) {
                let kind = if &captures[1] == "const" {
                    SymbolKind::Const
                } else {
                    SymbolKind::Variable
                };
                symbols.push(Symbol::new(
                    kind,
                    qualify(package.as_deref(), &captures[2]),
                    line_number,
                    line_number,
                ));
                index += 1;
                continue;
            }

            index += 1;
        }

        sort_symbols(&mut symbols);
        symbols
    }

    fn extract_references(&self, path: &str, text: &str, query: &SymbolQuery) -> Vec<Reference> {
        lexical_references(query, path, text, &GO_RULES)
    }
}

fn qualify(package: Option<&str>, name: &str) -> String {
    match package {
        Some(pkg) => format!("{pkg}.{name}"),
        None => name.to_string(),
    }
}

fn parse_receiver_type(receiver: &str) -> Option<String> {
    let trimmed = receiver.trim();
    if trimmed.is_empty() {
        return None;
    }
    let type_part = trimmed.split_whitespace().last()?;
    let cleaned = type_part.trim_start_matches('*');
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn extracts_package_qualified_symbols() {
        let text = concat!(
            "package store\n",
            "\n",
            "type Index struct {\n",
            "    path string\n",
            "}\n",
            "\n",
            "func (s *Index) Refresh(force bool) error {\n",
            "    return nil\n",
            "}\n",
            "\n",
            "func Open(path string) (*Index, error) {\n",
            "    return nil, nil\n",
            "}\n",
            "\n",
            "const (\n",
            "    WindowLines  = 200\n",
            "    OverlapLines = 30\n",
            ")\n",
            "\n",
            "var debug = false\n",
        );
        let symbols = GoLexicalAdapter.outline("store.go", text);
        let summary: Vec<(&str, &str)> = symbols
            .iter()
            .map(|s| (s.kind.as_str(), s.name.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("type", "store.Index"),
                ("method", "store.Index.Refresh"),
                ("function", "store.Open"),
                ("const", "store.WindowLines"),
                ("const", "store.OverlapLines"),
                ("variable", "store.debug"),
            ]
        );
    }

    #[test]
    fn receiver_types_strip_pointers() {
        assert_eq!(parse_receiver_type("s *Index"), Some("Index".to_string()));
        assert_eq!(parse_receiver_type("idx Index"), Some("Index".to_string()));
        assert_eq!(parse_receiver_type("  "), None);
    }
}
