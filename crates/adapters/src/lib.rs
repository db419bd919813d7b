//! Language adapters. Each adapter is pure: it sees only the
//! `(path, text)` it is handed, performs no I/O, and returns syntactic
//! declarations only. Unparseable input yields an empty outline, never an
//! error.

mod cpp;
mod csharp;
mod fallback;
mod go;
mod java;
mod lexical;
mod python;
mod registry;
mod rust;
mod symbol;
mod ts_js;

pub use cpp::CppLexicalAdapter;
pub use csharp::CSharpLexicalAdapter;
pub use fallback::LexicalFallbackAdapter;
pub use go::GoLexicalAdapter;
pub use java::JavaLexicalAdapter;
pub use python::PythonAstAdapter;
pub use registry::{build_registry, AdapterRegistry};
pub use rust::RustLexicalAdapter;
pub use symbol::{
    sort_references, sort_symbols, Confidence, RefKind, Reference, ScopeKind, Strategy, Symbol,
    SymbolKind, SymbolQuery,
};
pub use ts_js::TsJsLexicalAdapter;

/// Capability interface every adapter satisfies. Selection is pure
/// (extension-based); `outline` and `extract_references` never touch the
/// filesystem.
pub trait Adapter: Send + Sync {
    fn name(&self) -> &'static str;

    fn supports_path(&self, path: &str) -> bool;

    fn outline(&self, path: &str, text: &str) -> Vec<Symbol>;

    /// Direct references to `query` inside this one file. The default is
    /// empty; lexical adapters share one scanner, the Python adapter
    /// walks the AST.
    fn extract_references(&self, path: &str, text: &str, query: &SymbolQuery) -> Vec<Reference> {
        let _ = (path, text, query);
        Vec::new()
    }

    /// Whether `extract_references` is AST-backed for this adapter.
    fn reference_strategy(&self) -> Strategy {
        Strategy::Lexical
    }
}
