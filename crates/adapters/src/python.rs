//! Python adapter: tree-sitter backed declaration outlines and direct
//! reference extraction. Everything here is syntactic; conditional
//! declarations are reported as declarations with a context label, never
//! evaluated.

use std::collections::BTreeSet;

use tree_sitter::{Node, Parser};

use crate::symbol::{
    evidence_from_line, sort_references, sort_symbols, Confidence, RefKind, Reference, ScopeKind,
    Strategy, Symbol, SymbolKind, SymbolQuery,
};
use crate::Adapter;

const DECL_CONTEXT_MAX_CHARS: usize = 40;

pub struct PythonAstAdapter;

impl Adapter for PythonAstAdapter {
    fn name(&self) -> &'static str {
        "python"
    }

    fn supports_path(&self, path: &str) -> bool {
        path.to_lowercase().ends_with(".py")
    }

    fn outline(&self, _path: &str, text: &str) -> Vec<Symbol> {
        let Some(tree) = parse(text) else {
            return Vec::new();
        };
        let root = tree.root_node();
        if root.has_error() {
            // Unparseable files produce an empty outline, not an error.
            return Vec::new();
        }

        let mut walker = Walker {
            src: text.as_bytes(),
            symbols: Vec::new(),
        };
        let ctx = Ctx {
            scope_kind: ScopeKind::Module,
            parent: None,
            class_name: None,
            decl_context: None,
        };
        walker.walk_block(root, &ctx);
        sort_symbols(&mut walker.symbols);
        walker.symbols
    }

    fn extract_references(&self, path: &str, text: &str, query: &SymbolQuery) -> Vec<Reference> {
        let Some(tree) = parse(text) else {
            return Vec::new();
        };
        let lines: Vec<&str> = text.lines().collect();
        let mut collector = RefCollector {
            src: text.as_bytes(),
            lines,
            path,
            query,
            seen: BTreeSet::new(),
            out: Vec::new(),
        };
        collector.visit(tree.root_node());
        sort_references(&mut collector.out);
        collector.out
    }

    fn reference_strategy(&self) -> Strategy {
        Strategy::Ast
    }
}

fn parse(text: &str) -> Option<tree_sitter::Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .ok()?;
    parser.parse(text, None)
}

fn node_text<'a>(node: Node<'_>, src: &'a [u8]) -> &'a str {
    node.utf8_text(src).unwrap_or("")
}

fn compact(text: &str, max_chars: usize) -> String {
    let joined = text.split_whitespace().collect::<Vec<_>>().join(" ");
    joined.chars().take(max_chars).collect()
}

#[derive(Clone)]
struct Ctx {
    scope_kind: ScopeKind,
    parent: Option<String>,
    class_name: Option<String>,
    decl_context: Option<String>,
}

impl Ctx {
    fn conditional(&self, label: String) -> Self {
        let mut next = self.clone();
        next.decl_context = Some(label);
        next
    }
}

struct Walker<'a> {
    src: &'a [u8],
    symbols: Vec<Symbol>,
}

impl<'a> Walker<'a> {
    /// Walk the statements of a module or block node, descending into
    /// every lexical scope and every conditional container.
    fn walk_block(&mut self, block: Node<'_>, ctx: &Ctx) {
        let mut cursor = block.walk();
        let children: Vec<Node<'_>> = block.named_children(&mut cursor).collect();
        for child in children {
            self.walk_statement(child, ctx);
        }
    }

    fn walk_statement(&mut self, node: Node<'_>, ctx: &Ctx) {
        match node.kind() {
            "function_definition" => self.emit_function(node, ctx),
            "class_definition" => self.emit_class(node, ctx),
            "decorated_definition" => {
                if let Some(inner) = node.child_by_field_name("definition") {
                    self.walk_statement(inner, ctx);
                }
            }
            "expression_statement" => self.maybe_emit_constant(node, ctx),
            "type_alias_statement" => self.emit_type_alias(node, ctx),
            "if_statement" => self.walk_if(node, ctx),
            "try_statement" => self.walk_try(node, ctx),
            "match_statement" => self.walk_match(node, ctx),
            "with_statement" | "for_statement" | "while_statement" => {
                let keyword = node.kind().split('_').next().unwrap_or("block");
                if let Some(body) = node.child_by_field_name("body") {
                    self.walk_block(body, &ctx.conditional(keyword.to_string()));
                }
                let mut cursor = node.walk();
                let clauses: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
                for clause in clauses {
                    if clause.kind() == "else_clause" {
                        if let Some(body) = clause.child_by_field_name("body") {
                            self.walk_block(body, &ctx.conditional("else".to_string()));
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn walk_if(&mut self, node: Node<'_>, ctx: &Ctx) {
        let condition = node
            .child_by_field_name("condition")
            .map(|cond| compact(node_text(cond, self.src), DECL_CONTEXT_MAX_CHARS))
            .unwrap_or_default();
        if let Some(body) = node.child_by_field_name("consequence") {
            self.walk_block(body, &ctx.conditional(format!("if {condition}")));
        }
        let mut cursor = node.walk();
        let clauses: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        for clause in clauses {
            match clause.kind() {
                "elif_clause" => {
                    let elif_cond = clause
                        .child_by_field_name("condition")
                        .map(|cond| compact(node_text(cond, self.src), DECL_CONTEXT_MAX_CHARS))
                        .unwrap_or_default();
                    if let Some(body) = clause.child_by_field_name("consequence") {
                        self.walk_block(body, &ctx.conditional(format!("elif {elif_cond}")));
                    }
                }
                "else_clause" => {
                    if let Some(body) = clause.child_by_field_name("body") {
                        self.walk_block(body, &ctx.conditional("else".to_string()));
                    }
                }
                _ => {}
            }
        }
    }

    fn walk_try(&mut self, node: Node<'_>, ctx: &Ctx) {
        if let Some(body) = node.child_by_field_name("body") {
            self.walk_block(body, &ctx.conditional("try".to_string()));
        }
        let mut cursor = node.walk();
        let clauses: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        for clause in clauses {
            let label = match clause.kind() {
                "except_clause" | "except_group_clause" => "except",
                "finally_clause" => "finally",
                "else_clause" => "else",
                _ => continue,
            };
            // Clause bodies are their last block child.
            let mut inner = clause.walk();
            let blocks: Vec<Node<'_>> = clause
                .named_children(&mut inner)
                .filter(|n| n.kind() == "block")
                .collect();
            for block in blocks {
                self.walk_block(block, &ctx.conditional(label.to_string()));
            }
        }
    }

    fn walk_match(&mut self, node: Node<'_>, ctx: &Ctx) {
        let mut cursor = node.walk();
        let cases: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        for case in cases {
            if case.kind() != "case_clause" {
                continue;
            }
            let mut inner = case.walk();
            let blocks: Vec<Node<'_>> = case
                .named_children(&mut inner)
                .filter(|n| n.kind() == "block")
                .collect();
            for block in blocks {
                self.walk_block(block, &ctx.conditional("match".to_string()));
            }
        }
    }

    fn emit_function(&mut self, node: Node<'_>, ctx: &Ctx) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let bare_name = node_text(name_node, self.src).to_string();
        let (kind, display_name) = match (&ctx.scope_kind, &ctx.class_name) {
            (ScopeKind::Class, Some(class)) => {
                (SymbolKind::Method, format!("{class}.{bare_name}"))
            }
            _ => (SymbolKind::Function, bare_name.clone()),
        };

        let mut symbol = Symbol::new(
            kind,
            display_name,
            node.start_position().row + 1,
            node.end_position().row + 1,
        );
        symbol.signature = node
            .child_by_field_name("parameters")
            .map(|params| self.render_parameters(params));
        symbol.doc = node
            .child_by_field_name("body")
            .and_then(|body| self.leading_doc(body));
        symbol.parent_symbol = ctx.parent.clone();
        symbol.scope_kind = Some(ctx.scope_kind);
        symbol.is_conditional = ctx.decl_context.is_some();
        symbol.decl_context = ctx.decl_context.clone();
        self.symbols.push(symbol);

        if let Some(body) = node.child_by_field_name("body") {
            let inner = Ctx {
                scope_kind: ScopeKind::Function,
                parent: Some(bare_name),
                class_name: None,
                decl_context: ctx.decl_context.clone(),
            };
            self.walk_block(body, &inner);
        }
    }

    fn emit_class(&mut self, node: Node<'_>, ctx: &Ctx) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.src).to_string();

        let mut symbol = Symbol::new(
            SymbolKind::Class,
            name.clone(),
            node.start_position().row + 1,
            node.end_position().row + 1,
        );
        symbol.signature = Some(
            node.child_by_field_name("superclasses")
                .map(|supers| compact(node_text(supers, self.src), 120))
                .unwrap_or_else(|| "()".to_string()),
        );
        symbol.doc = node
            .child_by_field_name("body")
            .and_then(|body| self.leading_doc(body));
        symbol.parent_symbol = ctx.parent.clone();
        symbol.scope_kind = Some(ctx.scope_kind);
        symbol.is_conditional = ctx.decl_context.is_some();
        symbol.decl_context = ctx.decl_context.clone();
        self.symbols.push(symbol);

        if let Some(body) = node.child_by_field_name("body") {
            let inner = Ctx {
                scope_kind: ScopeKind::Class,
                parent: Some(name.clone()),
                class_name: Some(name),
                decl_context: ctx.decl_context.clone(),
            };
            self.walk_block(body, &inner);
        }
    }

    /// `NAME = value` at module scope becomes a `const` symbol when the
    /// target is SCREAMING_CASE. Values are rendered as written, never
    /// evaluated.
    fn maybe_emit_constant(&mut self, node: Node<'_>, ctx: &Ctx) {
        if ctx.scope_kind != ScopeKind::Module {
            return;
        }
        let Some(assignment) = node.named_child(0).filter(|n| n.kind() == "assignment") else {
            return;
        };
        let Some(left) = assignment.child_by_field_name("left") else {
            return;
        };
        if left.kind() != "identifier" {
            return;
        }
        let name = node_text(left, self.src);
        let is_const_name = name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
            && name.chars().any(|c| c.is_ascii_uppercase());
        if !is_const_name {
            return;
        }

        let mut symbol = Symbol::new(
            SymbolKind::Const,
            name,
            node.start_position().row + 1,
            node.end_position().row + 1,
        );
        symbol.scope_kind = Some(ScopeKind::Module);
        symbol.parent_symbol = ctx.parent.clone();
        symbol.is_conditional = ctx.decl_context.is_some();
        symbol.decl_context = ctx.decl_context.clone();
        self.symbols.push(symbol);
    }

    fn emit_type_alias(&mut self, node: Node<'_>, ctx: &Ctx) {
        // `type Alias = ...`: the first named child is the alias target.
        let Some(alias) = node.named_child(0) else {
            return;
        };
        let name = compact(node_text(alias, self.src), 80);
        if name.is_empty() {
            return;
        }
        let mut symbol = Symbol::new(
            SymbolKind::Type,
            name,
            node.start_position().row + 1,
            node.end_position().row + 1,
        );
        symbol.scope_kind = Some(ctx.scope_kind);
        symbol.parent_symbol = ctx.parent.clone();
        symbol.is_conditional = ctx.decl_context.is_some();
        symbol.decl_context = ctx.decl_context.clone();
        self.symbols.push(symbol);
    }

    /// Parameter names with default markers, no evaluation:
    /// `(a, b=…, *args, **kwargs)`.
    fn render_parameters(&self, params: Node<'_>) -> String {
        let mut rendered: Vec<String> = Vec::new();
        let mut cursor = params.walk();
        for child in params.named_children(&mut cursor) {
            let piece = match child.kind() {
                "identifier" => node_text(child, self.src).to_string(),
                "typed_parameter" => child
                    .named_child(0)
                    .map(|n| node_text(n, self.src).to_string())
                    .unwrap_or_default(),
                "default_parameter" | "typed_default_parameter" => child
                    .child_by_field_name("name")
                    .map(|n| format!("{}=…", node_text(n, self.src)))
                    .unwrap_or_default(),
                "list_splat_pattern" => format!(
                    "*{}",
                    child
                        .named_child(0)
                        .map(|n| node_text(n, self.src))
                        .unwrap_or("")
                ),
                "dictionary_splat_pattern" => format!(
                    "**{}",
                    child
                        .named_child(0)
                        .map(|n| node_text(n, self.src))
                        .unwrap_or("")
                ),
                "keyword_separator" => "*".to_string(),
                "positional_separator" => "/".to_string(),
                _ => compact(node_text(child, self.src), 40),
            };
            if !piece.is_empty() {
                rendered.push(piece);
            }
        }
        format!("({})", rendered.join(", "))
    }

    /// First line of a leading string literal in a block.
    fn leading_doc(&self, body: Node<'_>) -> Option<String> {
        let first = body.named_child(0)?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let string = first.named_child(0).filter(|n| n.kind() == "string")?;
        let mut cursor = string.walk();
        let content = string
            .named_children(&mut cursor)
            .find(|n| n.kind() == "string_content")
            .map(|n| node_text(n, self.src).to_string())
            .unwrap_or_else(|| {
                node_text(string, self.src)
                    .trim_matches(|c| c == '"' || c == '\'')
                    .to_string()
            });
        let first_line = content.trim().lines().next()?.trim().to_string();
        if first_line.is_empty() {
            None
        } else {
            Some(first_line)
        }
    }
}

struct RefCollector<'a, 'q> {
    src: &'a [u8],
    lines: Vec<&'a str>,
    path: &'a str,
    query: &'q SymbolQuery,
    seen: BTreeSet<(usize, &'static str)>,
    out: Vec<Reference>,
}

impl<'a, 'q> RefCollector<'a, 'q> {
    fn visit<'t>(&mut self, node: Node<'t>) {
        match node.kind() {
            "import_statement" | "import_from_statement" => {
                if self.import_mentions_query(node) {
                    self.push(node.start_position().row + 1, RefKind::Import);
                }
                // Identifiers inside the import are covered by the
                // import record itself.
                return;
            }
            "identifier" => self.visit_identifier(node),
            _ => {}
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
        for child in children {
            self.visit(child);
        }
    }

    fn import_mentions_query(&self, node: Node<'_>) -> bool {
        let text = node_text(node, self.src);
        text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .any(|token| token == self.query.last())
    }

    fn visit_identifier(&mut self, node: Node<'_>) {
        if node_text(node, self.src) != self.query.last() {
            return;
        }
        if is_definition_name(node) {
            return;
        }
        let line = node.start_position().row + 1;
        let Some(parent) = node.parent() else {
            self.push(line, RefKind::Reference);
            return;
        };

        match parent.kind() {
            "call" if parent.child_by_field_name("function") == Some(node) => {
                self.push(line, RefKind::Call);
            }
            "attribute" if parent.child_by_field_name("attribute") == Some(node) => {
                if self.query.is_qualified() && !self.attribute_chain_matches(parent) {
                    return;
                }
                let grandparent = parent.parent();
                let is_call = grandparent
                    .is_some_and(|g| g.kind() == "call" && g.child_by_field_name("function") == Some(parent));
                self.push(line, if is_call { RefKind::Call } else { RefKind::Attribute });
            }
            "attribute" => {
                // Object position: `foo.bar` counts as a bare use of foo
                // only for unqualified queries.
                if !self.query.is_qualified() {
                    self.push(line, RefKind::Reference);
                }
            }
            "keyword_argument" if parent.child_by_field_name("name") == Some(node) => {}
            _ => {
                if !self.query.is_qualified() {
                    self.push(line, RefKind::Reference);
                }
            }
        }
    }

    /// For `Owner.name` queries, the attribute chain text must end with
    /// the queried components.
    fn attribute_chain_matches(&self, attribute: Node<'_>) -> bool {
        let chain = node_text(attribute, self.src);
        let components: Vec<&str> = chain
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|part| !part.is_empty())
            .collect();
        let parts = &self.query.parts;
        if components.len() < parts.len() {
            return false;
        }
        components[components.len() - parts.len()..]
            .iter()
            .zip(parts.iter())
            .all(|(got, want)| got == want)
    }

    fn push(&mut self, line: usize, kind: RefKind) {
        if !self.seen.insert((line, kind.as_str())) {
            return;
        }
        let evidence = self
            .lines
            .get(line - 1)
            .map(|l| evidence_from_line(l))
            .unwrap_or_default();
        if evidence.is_empty() {
            return;
        }
        self.out.push(Reference {
            symbol: self.query.raw.clone(),
            path: self.path.to_string(),
            line,
            kind,
            evidence,
            strategy: Strategy::Ast,
            // The engine upgrades to High when the definition resolves
            // uniquely across the index.
            confidence: Confidence::Medium,
        });
    }
}

fn is_definition_name(node: Node<'_>) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    matches!(parent.kind(), "function_definition" | "class_definition")
        && parent.child_by_field_name("name") == Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn outline(text: &str) -> Vec<Symbol> {
        PythonAstAdapter.outline("sample.py", text)
    }

    #[test]
    fn extracts_classes_methods_and_functions() {
        let text = concat!(
            "\"\"\"Module doc.\"\"\"\n",
            "\n",
            "class Engine(Base, metaclass=Meta):\n",
            "    \"\"\"Engine doc line.\n",
            "    more\n",
            "    \"\"\"\n",
            "\n",
            "    def run(self, prompt, top_k=10, *args, **kwargs):\n",
            "        return prompt\n",
            "\n",
            "async def main():\n",
            "    pass\n",
        );
        let symbols = outline(text);
        let names: Vec<(&str, &str)> = symbols
            .iter()
            .map(|s| (s.kind.as_str(), s.name.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("class", "Engine"),
                ("method", "Engine.run"),
                ("function", "main"),
            ]
        );

        let class = &symbols[0];
        assert_eq!(class.signature.as_deref(), Some("(Base, metaclass=Meta)"));
        assert_eq!(class.doc.as_deref(), Some("Engine doc line."));

        let method = &symbols[1];
        assert_eq!(
            method.signature.as_deref(),
            Some("(self, prompt, top_k=…, *args, **kwargs)")
        );
        assert_eq!(method.parent_symbol.as_deref(), Some("Engine"));
        assert_eq!(method.scope_kind, Some(ScopeKind::Class));
        assert!(method.start_line < method.end_line);
    }

    #[test]
    fn conditional_declarations_carry_context() {
        let text = concat!(
            "from typing import TYPE_CHECKING\n",
            "\n",
            "if TYPE_CHECKING:\n",
            "    class OnlyForTypes:\n",
            "        pass\n",
            "\n",
            "try:\n",
            "    def fallback():\n",
            "        pass\n",
            "except ImportError:\n",
            "    def fallback():\n",
            "        pass\n",
        );
        let symbols = outline(text);
        let class = symbols.iter().find(|s| s.name == "OnlyForTypes").unwrap();
        assert!(class.is_conditional);
        assert_eq!(class.decl_context.as_deref(), Some("if TYPE_CHECKING"));

        let contexts: Vec<&str> = symbols
            .iter()
            .filter(|s| s.name == "fallback")
            .filter_map(|s| s.decl_context.as_deref())
            .collect();
        assert_eq!(contexts, vec!["try", "except"]);
    }

    #[test]
    fn nested_functions_and_module_constants_are_emitted() {
        let text = concat!(
            "LIMIT = 10\n",
            "not_const = 1\n",
            "\n",
            "def outer():\n",
            "    def inner():\n",
            "        pass\n",
            "    return inner\n",
        );
        let symbols = outline(text);
        let names: Vec<&str> = symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["LIMIT", "outer", "inner"]);

        let inner = symbols.iter().find(|s| s.name == "inner").unwrap();
        assert_eq!(inner.scope_kind, Some(ScopeKind::Function));
        assert_eq!(inner.parent_symbol.as_deref(), Some("outer"));
    }

    #[test]
    fn unparseable_source_yields_empty_outline() {
        assert!(outline("def broken(:\n").is_empty());
    }

    #[test]
    fn outlining_twice_is_identical() {
        let text = "class A:\n    def m(self):\n        pass\n";
        assert_eq!(outline(text), outline(text));
    }

    #[test]
    fn references_cover_imports_calls_and_attributes() {
        let query = SymbolQuery::parse("foo").unwrap();
        let text = concat!(
            "from a import foo\n",
            "\n",
            "def use():\n",
            "    foo()\n",
            "    value = mod.foo\n",
            "    other = foo\n",
        );
        let refs = PythonAstAdapter.extract_references("b.py", text, &query);
        let kinds: Vec<(usize, RefKind)> = refs.iter().map(|r| (r.line, r.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (1, RefKind::Import),
                (4, RefKind::Call),
                (5, RefKind::Attribute),
                (6, RefKind::Reference),
            ]
        );
        assert!(refs.iter().all(|r| r.strategy == Strategy::Ast));
    }

    #[test]
    fn qualified_references_match_trailing_chain() {
        let query = SymbolQuery::parse("Engine.run").unwrap();
        let text = concat!(
            "engine = Engine()\n",
            "a.b.Engine.run(x)\n",
            "other.run(x)\n",
        );
        let refs = PythonAstAdapter.extract_references("b.py", text, &query);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].line, 2);
        assert_eq!(refs[0].kind, RefKind::Call);
    }

    #[test]
    fn definition_sites_are_not_references() {
        let query = SymbolQuery::parse("foo").unwrap();
        let text = "def foo():\n    return 1\n\nfoo()\n";
        let refs = PythonAstAdapter.extract_references("a.py", text, &query);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].line, 4);
    }
}
