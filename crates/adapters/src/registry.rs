use crate::{
    Adapter, CSharpLexicalAdapter, CppLexicalAdapter, GoLexicalAdapter, JavaLexicalAdapter,
    LexicalFallbackAdapter, PythonAstAdapter, RustLexicalAdapter, TsJsLexicalAdapter,
};

/// Insertion-ordered registry: the first adapter that supports a path
/// wins, the fallback always matches last. Selection is a pure function
/// of the extension.
pub struct AdapterRegistry {
    adapters: Vec<Box<dyn Adapter>>,
    fallback: Box<dyn Adapter>,
}

impl AdapterRegistry {
    #[must_use]
    pub fn new(fallback: Box<dyn Adapter>) -> Self {
        Self {
            adapters: Vec::new(),
            fallback,
        }
    }

    pub fn register(&mut self, adapter: Box<dyn Adapter>) {
        self.adapters.push(adapter);
    }

    #[must_use]
    pub fn select(&self, path: &str) -> &dyn Adapter {
        self.adapters
            .iter()
            .find(|adapter| adapter.supports_path(path))
            .map(Box::as_ref)
            .unwrap_or(self.fallback.as_ref())
    }

    /// Registered adapter names in selection order, fallback last.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> =
            self.adapters.iter().map(|adapter| adapter.name()).collect();
        names.push(self.fallback.name());
        names
    }
}

/// Registry wired from the effective adapter toggles.
#[must_use]
pub fn build_registry(python_enabled: bool, lexical_enabled: bool) -> AdapterRegistry {
    let mut registry = AdapterRegistry::new(Box::new(LexicalFallbackAdapter));
    if python_enabled {
        registry.register(Box::new(PythonAstAdapter));
    }
    if lexical_enabled {
        registry.register(Box::new(TsJsLexicalAdapter));
        registry.register(Box::new(GoLexicalAdapter));
        registry.register(Box::new(JavaLexicalAdapter));
        registry.register(Box::new(RustLexicalAdapter));
        registry.register(Box::new(CppLexicalAdapter));
        registry.register(Box::new(CSharpLexicalAdapter));
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_is_extension_based_with_fallback() {
        let registry = build_registry(true, true);
        assert_eq!(registry.select("src/a.py").name(), "python");
        assert_eq!(registry.select("src/a.rs").name(), "rust_lexical");
        assert_eq!(registry.select("src/App.TSX").name(), "ts_js_lexical");
        assert_eq!(registry.select("pkg/x.go").name(), "go_lexical");
        assert_eq!(registry.select("A.java").name(), "java_lexical");
        assert_eq!(registry.select("a.hpp").name(), "cpp_lexical");
        assert_eq!(registry.select("A.cs").name(), "csharp_lexical");
        assert_eq!(registry.select("notes.txt").name(), "lexical");
    }

    #[test]
    fn disabled_python_falls_through() {
        let registry = build_registry(false, true);
        assert_eq!(registry.select("src/a.py").name(), "lexical");
    }

    #[test]
    fn names_list_ends_with_fallback() {
        let registry = build_registry(true, true);
        let names = registry.names();
        assert_eq!(names.first(), Some(&"python"));
        assert_eq!(names.last(), Some(&"lexical"));
        assert_eq!(names.len(), 8);
    }
}
