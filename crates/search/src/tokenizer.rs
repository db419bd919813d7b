/// Lowercase alphanumeric tokens. Underscores act as separators, so
/// `build_context_bundle` and `buildContextBundle` both surface `bundle`
/// only when it stands alone; no stemming. Tokens shorter than 2 chars
/// are noise and dropped.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            for lowered in ch.to_lowercase() {
                current.push(lowered);
            }
        } else if !current.is_empty() {
            if current.chars().count() >= 2 {
                tokens.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
    }
    if current.chars().count() >= 2 {
        tokens.push(current);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_non_alphanumeric_and_underscore() {
        assert_eq!(
            tokenize("build_context_bundle(prompt)"),
            vec!["build", "context", "bundle", "prompt"]
        );
    }

    #[test]
    fn lowercases_and_drops_short_tokens() {
        assert_eq!(tokenize("A Repo X1 b"), vec!["repo", "x1"]);
    }

    #[test]
    fn empty_input_yields_no_tokens() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("_ _ _").is_empty());
    }
}
