use serde::{Deserialize, Serialize};

/// Deterministic indexing settings: which files enter the index and
/// which path shapes count as tests for `include_tests = false`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexConfig {
    pub include_extensions: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub test_globs: Vec<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            include_extensions: [
                ".py", ".rs", ".ts", ".tsx", ".js", ".jsx", ".go", ".java", ".cpp", ".cc", ".hpp",
                ".h", ".cs", ".md", ".rst", ".toml", ".yaml", ".yml", ".json", ".ini", ".cfg",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            exclude_globs: [
                "**/.git/**",
                "**/target/**",
                "**/node_modules/**",
                "**/__pycache__/**",
                "**/.venv/**",
                "**/dist/**",
                "**/build/**",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            test_globs: [
                "**/tests/**",
                "**/test/**",
                "**/*_test.*",
                "**/test_*.*",
                "**/*.spec.*",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
        }
    }
}

impl IndexConfig {
    #[must_use]
    pub fn has_allowed_extension(&self, rel_path: &str) -> bool {
        let Some(ext) = extension_of(rel_path) else {
            return false;
        };
        self.include_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&ext))
    }

    #[must_use]
    pub fn is_excluded(&self, rel_path: &str) -> bool {
        matches_any_glob(rel_path, &self.exclude_globs)
    }

    #[must_use]
    pub fn is_test_path(&self, rel_path: &str) -> bool {
        matches_any_glob(rel_path, &self.test_globs)
    }
}

/// Lowercased extension with the leading dot, or `None`.
#[must_use]
pub(crate) fn extension_of(rel_path: &str) -> Option<String> {
    let basename = rel_path.rsplit('/').next()?;
    let dot = basename.rfind('.')?;
    if dot == 0 && !basename[1..].contains('.') {
        // Dotfiles like `.gitignore` have no extension.
        return None;
    }
    Some(basename[dot..].to_lowercase())
}

/// Globs match the relative path directly and in `/`-anchored form so
/// `**/target/**` also fires on `target/debug/x`.
fn matches_any_glob(rel_path: &str, globs: &[String]) -> bool {
    let anchored = format!("/{rel_path}");
    globs.iter().any(|raw| {
        glob::Pattern::new(raw)
            .map(|p| p.matches(rel_path) || p.matches(&anchored))
            .unwrap_or(false)
    })
}
