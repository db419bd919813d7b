//! Cross-file reference engine. Resolves per file using the selected
//! adapter's strategy (`ast` for Python, `lexical` elsewhere) and never
//! walks a dependency graph, so import cycles cannot occur in the
//! output.

use repo_mcp_adapters::{sort_references, Confidence, Reference, Strategy, SymbolQuery};
use repo_mcp_indexer::discover_files;

use crate::tools::ToolError;
use crate::ServerState;

pub struct ReferenceLookup {
    pub references: Vec<Reference>,
    pub truncated: bool,
    pub total_candidates: usize,
}

/// Collect references to `query` over the candidate file set: a single
/// resolved file when `path_scope` is given, else the discovery set
/// under the same filters as indexing. Reads go through the sandbox;
/// unreadable files are skipped.
pub fn find_references(
    state: &mut ServerState,
    query: &SymbolQuery,
    path_scope: Option<&str>,
    top_k: usize,
) -> Result<ReferenceLookup, ToolError> {
    let candidate_paths: Vec<String> = match path_scope {
        Some(path) => vec![state.sandbox.resolve(path)?.rel().to_string()],
        None => {
            let data_dir_prefix = state.store.data_dir_prefix().map(ToString::to_string);
            discover_files(
                &state.sandbox,
                state.store.config(),
                data_dir_prefix.as_deref(),
                false,
            )?
            .into_iter()
            .map(|file| file.path)
            .collect()
        }
    };

    let mut references: Vec<Reference> = Vec::new();
    let mut ast_definition_count = 0usize;

    for rel_path in &candidate_paths {
        let Ok(resolved) = state.sandbox.resolve(rel_path) else {
            continue;
        };
        let text = match state.sandbox.read_text(&resolved) {
            Ok(text) => text,
            Err(refusal) => {
                log::warn!("references: skipping '{rel_path}': {refusal:?}");
                continue;
            }
        };
        let adapter = state.registry.select(rel_path);
        references.extend(adapter.extract_references(rel_path, &text, query));

        // Definition sites feed the confidence contract: an `ast` match
        // that resolves to exactly one definition is high-confidence.
        if adapter.reference_strategy() == Strategy::Ast {
            ast_definition_count += adapter
                .outline(rel_path, &text)
                .iter()
                .filter(|symbol| {
                    symbol.name == query.last()
                        || symbol.name.ends_with(&format!(".{}", query.last()))
                })
                .count();
        }
    }

    if ast_definition_count == 1 {
        for reference in &mut references {
            if reference.strategy == Strategy::Ast {
                reference.confidence = Confidence::High;
            }
        }
    }

    sort_references(&mut references);
    let total_candidates = references.len();
    let truncated = total_candidates > top_k;
    references.truncate(top_k);

    Ok(ReferenceLookup {
        references,
        truncated,
        total_candidates,
    })
}
