use repo_mcp_search::tokenize;

/// Fixed stop-word list. Changing it changes prompt fingerprints, so it
/// is a committed constant, not configuration.
pub const STOP_WORDS: &[&str] = &[
    "about", "after", "all", "and", "any", "are", "because", "been", "before", "being",
    "between", "both", "but", "can", "could", "did", "does", "down", "during", "each", "few",
    "for", "from", "had", "has", "have", "her", "here", "him", "his", "how", "into", "its",
    "just", "more", "most", "not", "now", "off", "once", "only", "other", "our", "out", "over",
    "own", "same", "should", "some", "such", "than", "that", "the", "their", "them", "then",
    "there", "these", "they", "this", "those", "through", "under", "until", "very", "was",
    "were", "what", "when", "where", "which", "while", "who", "why", "will", "with", "would",
    "you", "your",
];

pub const KEYWORD_CAP: usize = 12;
pub const MIN_KEYWORD_CHARS: usize = 3;

/// Lowercased prompt tokens, stop words and short tokens dropped, first
/// [`KEYWORD_CAP`] unique tokens kept in order of appearance.
#[must_use]
pub fn extract_keywords(prompt: &str) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for token in tokenize(prompt) {
        if token.chars().count() < MIN_KEYWORD_CHARS {
            continue;
        }
        if STOP_WORDS.contains(&token.as_str()) {
            continue;
        }
        if seen.contains(&token) {
            continue;
        }
        seen.push(token);
        if seen.len() >= KEYWORD_CAP {
            break;
        }
    }
    seen
}
