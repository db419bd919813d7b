//! Search-scope filters shared by `repo.search` and the bundler.

/// Compiled `file_glob` / `path_prefix` filter pair.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    glob: Option<glob::Pattern>,
    prefix: Option<String>,
}

impl SearchFilters {
    /// Compile the optional filters. An unparseable glob is a caller
    /// error (INVALID_PARAMS at the tool layer).
    pub fn new(file_glob: Option<&str>, path_prefix: Option<&str>) -> Result<Self, String> {
        let glob = match file_glob.map(str::trim).filter(|g| !g.is_empty()) {
            None => None,
            Some(raw) => Some(
                glob::Pattern::new(raw)
                    .map_err(|e| format!("invalid file_glob '{raw}': {e}"))?,
            ),
        };
        let prefix = path_prefix
            .map(normalize_path_prefix)
            .filter(|p| !p.is_empty());
        Ok(Self { glob, prefix })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.glob.is_none() && self.prefix.is_none()
    }

    /// `rel_path` must already be forward-slash normalized.
    #[must_use]
    pub fn matches(&self, rel_path: &str) -> bool {
        if let Some(prefix) = &self.prefix {
            if !path_prefix_matches(prefix, rel_path) {
                return false;
            }
        }
        match &self.glob {
            None => true,
            Some(pattern) => {
                // Anchored and unanchored form, so `*.rs` matches nested
                // files and `src/**/*.rs` still works as written.
                pattern.matches(rel_path)
                    || rel_path
                        .rsplit('/')
                        .next()
                        .is_some_and(|base| pattern.matches(base))
            }
        }
    }
}

pub fn normalize_path_prefix(raw: &str) -> String {
    let mut value = raw.trim().replace('\\', "/");
    while value.contains("//") {
        value = value.replace("//", "/");
    }
    while let Some(stripped) = value.strip_prefix("./") {
        value = stripped.to_string();
    }
    value.trim_matches('/').to_string()
}

fn path_prefix_matches(prefix: &str, path: &str) -> bool {
    if path == prefix {
        return true;
    }
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('/'))
}
