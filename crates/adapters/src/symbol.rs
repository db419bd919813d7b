use serde::{Deserialize, Serialize};

/// Closed set of declaration kinds across all adapters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Interface,
    Enum,
    Struct,
    Trait,
    Impl,
    Type,
    Const,
    Namespace,
    Record,
    Property,
    Event,
    Module,
    Variable,
}

impl SymbolKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Enum => "enum",
            SymbolKind::Struct => "struct",
            SymbolKind::Trait => "trait",
            SymbolKind::Impl => "impl",
            SymbolKind::Type => "type",
            SymbolKind::Const => "const",
            SymbolKind::Namespace => "namespace",
            SymbolKind::Record => "record",
            SymbolKind::Property => "property",
            SymbolKind::Event => "event",
            SymbolKind::Module => "module",
            SymbolKind::Variable => "variable",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Module,
    Class,
    Function,
}

/// One syntactic declaration. Ordering is deterministic by
/// `(start_line, end_line, name, kind)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub start_line: usize,
    pub end_line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_kind: Option<ScopeKind>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_conditional: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decl_context: Option<String>,
}

impl Symbol {
    #[must_use]
    pub fn new(kind: SymbolKind, name: impl Into<String>, start_line: usize, end_line: usize) -> Self {
        Self {
            kind,
            name: name.into(),
            signature: None,
            start_line,
            end_line: end_line.max(start_line),
            doc: None,
            parent_symbol: None,
            scope_kind: None,
            is_conditional: false,
            decl_context: None,
        }
    }

    #[must_use]
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    #[must_use]
    pub fn encloses(&self, line: usize) -> bool {
        self.start_line <= line && line <= self.end_line
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.end_line - self.start_line + 1
    }
}

pub fn sort_symbols(symbols: &mut [Symbol]) {
    symbols.sort_by(|a, b| {
        a.start_line
            .cmp(&b.start_line)
            .then_with(|| a.end_line.cmp(&b.end_line))
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.kind.as_str().cmp(b.kind.as_str()))
    });
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    Call,
    Attribute,
    Import,
    Reference,
}

impl RefKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RefKind::Call => "call",
            RefKind::Attribute => "attribute",
            RefKind::Import => "import",
            RefKind::Reference => "reference",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Ast,
    Lexical,
}

impl Strategy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Strategy::Ast => "ast",
            Strategy::Lexical => "lexical",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// One recorded usage site of a symbol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reference {
    pub symbol: String,
    pub path: String,
    pub line: usize,
    pub kind: RefKind,
    pub evidence: String,
    pub strategy: Strategy,
    pub confidence: Confidence,
}

pub fn sort_references(references: &mut [Reference]) {
    references.sort_by(|a, b| {
        a.path
            .cmp(&b.path)
            .then_with(|| a.line.cmp(&b.line))
            .then_with(|| a.kind.as_str().cmp(b.kind.as_str()))
            .then_with(|| a.strategy.as_str().cmp(b.strategy.as_str()))
    });
}

/// Parsed reference query: `foo`, `Owner.name`, or `a::b::c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolQuery {
    pub raw: String,
    pub parts: Vec<String>,
}

impl SymbolQuery {
    /// Returns `None` for queries with no identifier content.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let parts: Vec<String> = trimmed
            .split(|c| c == '.' || c == ':')
            .filter(|part| !part.is_empty())
            .map(ToString::to_string)
            .collect();
        if parts.is_empty() {
            return None;
        }
        Some(Self {
            raw: trimmed.to_string(),
            parts,
        })
    }

    /// Trailing component, the one matched against identifiers.
    #[must_use]
    pub fn last(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or("")
    }

    #[must_use]
    pub fn is_qualified(&self) -> bool {
        self.parts.len() > 1
    }
}

/// Compact single-line evidence excerpt, capped at 160 chars.
#[must_use]
pub fn evidence_from_line(line: &str) -> String {
    let compact = line.split_whitespace().collect::<Vec<_>>().join(" ");
    compact.chars().take(160).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn symbols_sort_by_position_then_name_then_kind() {
        let mut symbols = vec![
            Symbol::new(SymbolKind::Function, "beta", 5, 10),
            Symbol::new(SymbolKind::Class, "alpha", 1, 20),
            Symbol::new(SymbolKind::Method, "alpha.run", 5, 10),
        ];
        sort_symbols(&mut symbols);
        let names: Vec<&str> = symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "alpha.run", "beta"]);
    }

    #[test]
    fn references_sort_by_path_line_kind_strategy() {
        let reference = |path: &str, line: usize, kind: RefKind| Reference {
            symbol: "foo".to_string(),
            path: path.to_string(),
            line,
            kind,
            evidence: String::new(),
            strategy: Strategy::Lexical,
            confidence: Confidence::Low,
        };
        let mut refs = vec![
            reference("b.py", 1, RefKind::Call),
            reference("a.py", 9, RefKind::Reference),
            reference("a.py", 9, RefKind::Call),
        ];
        sort_references(&mut refs);
        assert_eq!(refs[0].path, "a.py");
        assert_eq!(refs[0].kind, RefKind::Call);
        assert_eq!(refs[2].path, "b.py");
    }

    #[test]
    fn symbol_query_parses_qualified_forms() {
        let query = SymbolQuery::parse("Engine.build").unwrap();
        assert_eq!(query.parts, vec!["Engine", "build"]);
        assert_eq!(query.last(), "build");
        assert!(query.is_qualified());

        let rusty = SymbolQuery::parse("store::refresh").unwrap();
        assert_eq!(rusty.parts, vec!["store", "refresh"]);

        assert!(SymbolQuery::parse("   ").is_none());
        assert!(SymbolQuery::parse("..").is_none());
    }

    #[test]
    fn conditional_flag_is_omitted_when_false() {
        let symbol = Symbol::new(SymbolKind::Class, "X", 1, 2);
        let json = serde_json::to_string(&symbol).unwrap();
        assert!(!json.contains("is_conditional"));
    }
}
