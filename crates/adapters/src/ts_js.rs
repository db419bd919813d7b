use once_cell::sync::Lazy;
use regex::Regex;

use crate::lexical::{
    block_end, block_end_by_start_line, lexical_references, line_depths,
    mask_comments_and_strings, LexicalRules,
};
use crate::symbol::{sort_symbols, Reference, Symbol, SymbolKind, SymbolQuery};
use crate::Adapter;

static CLASS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+([A-Za-z_$][A-Za-z0-9_$]*)")
        .expect("class pattern")
});
static INTERFACE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:export\s+)?interface\s+([A-Za-z_$][A-Za-z0-9_$]*)").expect("interface")
});
static ENUM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:export\s+)?(?:const\s+)?enum\s+([A-Za-z_$][A-Za-z0-9_$]*)").expect("enum")
});
static TYPE_ALIAS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:export\s+)?type\s+([A-Za-z_$][A-Za-z0-9_$]*)").expect("type alias")
});
static FUNCTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][A-Za-z0-9_$]*)\s*\(([^)]*)",
    )
    .expect("function")
});
static EXPORT_BINDING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*export\s+(?:const|let|var)\s+([A-Za-z_$][A-Za-z0-9_$]*)").expect("binding")
});
static COMMONJS_EXPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:module\.)?exports\.([A-Za-z_$][A-Za-z0-9_$]*)\s*=").expect("commonjs")
});
static METHOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:(?:public|private|protected|static|readonly|override|abstract|get|set|async)\s+)*([A-Za-z_$][A-Za-z0-9_$]*)\s*\(([^)]*)\)\s*\{?",
    )
    .expect("method")
});

const METHOD_SKIP: &[&str] = &["if", "for", "while", "switch", "catch", "function", "return"];

/// Deterministic lexical adapter for TypeScript and JavaScript.
pub struct TsJsLexicalAdapter;

const EXTENSIONS: &[&str] = &[".ts", ".tsx", ".mts", ".cts", ".js", ".jsx", ".mjs", ".cjs"];

impl Adapter for TsJsLexicalAdapter {
    fn name(&self) -> &'static str {
        "ts_js_lexical"
    }

    fn supports_path(&self, path: &str) -> bool {
        let lowered = path.to_lowercase();
        EXTENSIONS.iter().any(|ext| lowered.ends_with(ext))
    }

    fn outline(&self, _path: &str, text: &str) -> Vec<Symbol> {
        let masked = mask_comments_and_strings(text, &LexicalRules::default());
        let lines: Vec<&str> = masked.lines().collect();
        let depths = line_depths(&masked);
        let block_ends = block_end_by_start_line(&masked);

        let mut symbols: Vec<Symbol> = Vec::new();
        let mut class_blocks: Vec<(String, usize, usize)> = Vec::new();

        for (index, line) in lines.iter().enumerate() {
            let line_number = index + 1;
            if depths[index] != 0 {
                continue;
            }

            if let Some(captures) = CLASS_RE.captures(line) {
                let name = captures[1].to_string();
                let end = block_end(line_number, &block_ends);
                symbols.push(
                    Symbol::new(SymbolKind::Class, name.clone(), line_number, end)
                        .with_signature("()"),
                );
                class_blocks.push((name, line_number, end));
                continue;
            }
            if let Some(captures) = INTERFACE_RE.captures(line) {
                symbols.push(
                    Symbol::new(
                        SymbolKind::Interface,
                        &captures[1],
                        line_number,
                        block_end(line_number, &block_ends),
                    )
                    .with_signature("()"),
                );
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
            if let Some(captures) = TYPE_ALIAS_RE.captures(line) {
                symbols.push(Symbol::new(
                    SymbolKind::Type,
                    &captures[1],
                    line_number,
                    line_number,
                ));
                continue;
            }
            if let Some(captures) = FUNCTION_RE.captures(line) {
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
            if let Some(captures) = EXPORT_BINDING_RE.captures(line) {
                symbols.push(Symbol::new(
                    SymbolKind::Variable,
                    &captures[1],
                    line_number,
                    line_number,
                ));
                continue;
            }
            if let Some(captures) = COMMONJS_EXPORT_RE.captures(line) {
                symbols.push(Symbol::new(
                    SymbolKind::Variable,
                    &captures[1],
                    line_number,
                    line_number,
                ));
            }
        }

        for (class_name, class_start, class_end) in class_blocks {
            extract_class_methods(
                &class_name,
                &lines,
                &depths,
                class_start,
                class_end,
                &block_ends,
                &mut symbols,
            );
        }

        sort_symbols(&mut symbols);
        symbols
    }

    fn extract_references(&self, path: &str, text: &str, query: &SymbolQuery) -> Vec<Reference> {
        lexical_references(query, path, text, &LexicalRules::default())
    }
}

fn extract_class_methods(
    class_name: &str,
    lines: &[&str],
    depths: &[usize],
    class_start: usize,
    class_end: usize,
    block_ends: &std::collections::BTreeMap<usize, usize>,
    symbols: &mut Vec<Symbol>,
) {
    let end = class_end.min(lines.len());
    for line_number in (class_start + 1)..=end {
        if depths[line_number - 1] != 1 {
            continue;
        }
        let line = lines[line_number - 1];
        let Some(captures) = METHOD_RE.captures(line) else {
            continue;
        };
        let method_name = &captures[1];
        if METHOD_SKIP.contains(&method_name) {
            continue;
        }
        let mut symbol = Symbol::new(
            SymbolKind::Method,
            format!("{class_name}.{method_name}"),
            line_number,
            block_end(line_number, block_ends).min(class_end),
        )
        .with_signature(format!("({})", captures[2].trim()));
        symbol.parent_symbol = Some(class_name.to_string());
        symbols.push(symbol);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn outline(text: &str) -> Vec<Symbol> {
        TsJsLexicalAdapter.outline("app.ts", text)
    }

    #[test]
    fn extracts_top_level_declarations() {
        let text = concat!(
            "export interface Options {\n",
            "  depth: number;\n",
            "}\n",
            "export type Mode = 'fast' | 'slow';\n",
            "export class Runner {\n",
            "  async run(prompt: string): Promise<void> {\n",
            "    await this.step();\n",
            "  }\n",
            "}\n",
            "export async function main(argv: string[]) {\n",
            "  return new Runner();\n",
            "}\n",
            "export const LIMIT = 10;\n",
        );
        let symbols = outline(text);
        let summary: Vec<(&str, &str)> = symbols
            .iter()
            .map(|s| (s.kind.as_str(), s.name.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("interface", "Options"),
                ("type", "Mode"),
                ("class", "Runner"),
                ("method", "Runner.run"),
                ("function", "main"),
                ("variable", "LIMIT"),
            ]
        );

        let class = symbols.iter().find(|s| s.name == "Runner").unwrap();
        assert_eq!((class.start_line, class.end_line), (5, 9));
        let method = symbols.iter().find(|s| s.name == "Runner.run").unwrap();
        assert_eq!(method.signature.as_deref(), Some("(prompt: string)"));
    }

    #[test]
    fn keywords_inside_strings_and_comments_are_ignored() {
        let text = concat!(
            "// class NotReal {\n",
            "export const s = \"class AlsoNotReal {\";\n",
            "class Real {}\n",
        );
        let symbols = outline(text);
        assert_eq!(symbols.len(), 2);
        assert!(symbols.iter().any(|s| s.name == "Real"));
        assert!(symbols.iter().any(|s| s.name == "s"));
    }

    #[test]
    fn commonjs_exports_surface_as_variables() {
        let symbols = TsJsLexicalAdapter.outline("a.js", "module.exports.load = () => 1;\n");
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].kind, SymbolKind::Variable);
        assert_eq!(symbols[0].name, "load");
    }
}
