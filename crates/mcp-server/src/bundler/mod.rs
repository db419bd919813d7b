//! Deterministic context-bundle assembly: keyword extraction,
//! multi-query retrieval, symbol alignment, lexicographic ranking,
//! budget enforcement, and per-selection explanations.

mod engine;
mod keywords;
mod rank;

pub use engine::{build_context_bundle, BundleBudget};
pub use keywords::{extract_keywords, KEYWORD_CAP, MIN_KEYWORD_CHARS, STOP_WORDS};
pub use rank::{compare_candidates, Candidate, RANGE_SOFT_THRESHOLD_LINES, RANKING_VERSION};
