use crate::lexical::{lexical_references, LexicalRules};
use crate::symbol::{Reference, Symbol, SymbolQuery};
use crate::Adapter;

/// Default adapter for everything without a language adapter: no
/// structural outline, lexical-only references.
pub struct LexicalFallbackAdapter;

impl Adapter for LexicalFallbackAdapter {
    fn name(&self) -> &'static str {
        "lexical"
    }

    fn supports_path(&self, _path: &str) -> bool {
        true
    }

    fn outline(&self, _path: &str, _text: &str) -> Vec<Symbol> {
        Vec::new()
    }

    fn extract_references(&self, path: &str, text: &str, query: &SymbolQuery) -> Vec<Reference> {
        lexical_references(query, path, text, &LexicalRules::default())
    }
}
