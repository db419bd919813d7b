//! Conservative path denylist to keep secret material out of every
//! agent-facing read, including explicit requests for files inside the
//! repo. Applies to the resolved path and cannot be relaxed at runtime.

/// Default patterns: bare names and `*.ext` forms match the basename,
/// slash-bearing globs match the whole repo-relative path.
pub const DEFAULT_DENYLIST: &[&str] = &[
    ".env",
    "*.pem",
    "*.key",
    "*.pfx",
    "*.p12",
    "id_rsa*",
    "**/secrets.*",
    "**/.git/**",
];

#[derive(Debug, Clone)]
pub struct Denylist {
    basename_patterns: Vec<glob::Pattern>,
    path_patterns: Vec<glob::Pattern>,
}

impl Default for Denylist {
    fn default() -> Self {
        Self::from_globs(DEFAULT_DENYLIST)
    }
}

impl Denylist {
    /// The default set is compiled from literals and must parse.
    #[must_use]
    pub fn from_globs(globs: &[&str]) -> Self {
        let mut basename_patterns = Vec::new();
        let mut path_patterns = Vec::new();
        for raw in globs {
            let pattern = glob::Pattern::new(&raw.to_lowercase())
                .unwrap_or_else(|e| panic!("invalid denylist glob '{raw}': {e}"));
            if raw.contains('/') {
                path_patterns.push(pattern);
            } else {
                basename_patterns.push(pattern);
            }
        }
        Self {
            basename_patterns,
            path_patterns,
        }
    }

    /// `rel_path` is the resolved repo-relative path, forward-slash
    /// normalized. Matching is case-insensitive.
    #[must_use]
    pub fn is_denylisted(&self, rel_path: &str) -> bool {
        let lowered = rel_path.to_lowercase();
        let basename = lowered.rsplit('/').next().unwrap_or(&lowered);

        if self
            .basename_patterns
            .iter()
            .any(|p| p.matches(basename))
        {
            return true;
        }

        // Anchor so `**/.git/**` also matches at the repo root.
        let anchored = format!("/{lowered}");
        self.path_patterns
            .iter()
            .any(|p| p.matches(&lowered) || p.matches(&anchored))
            || lowered == ".git"
            || lowered.starts_with(".git/")
            || lowered.contains("/.git/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_common_secret_files() {
        let deny = Denylist::default();
        for path in [
            ".env",
            "config/.ENV",
            "certs/server.pem",
            "deploy/ssh/id_rsa",
            "deploy/ssh/id_rsa.pub",
            "app/secrets.yaml",
            "secrets.json",
            ".git/config",
            "vendor/dep/.git/HEAD",
            "keys/signing.key",
            "win/export.pfx",
            "legacy/bundle.p12",
        ] {
            assert!(deny.is_denylisted(path), "expected denylisted: {path}");
        }
    }

    #[test]
    fn allows_ordinary_sources() {
        let deny = Denylist::default();
        for path in [
            "src/lib.rs",
            "README.md",
            "env/setup.md",
            "docs/environment.md",
            "src/keyring.rs",
            "gitignore_parser.py",
        ] {
            assert!(!deny.is_denylisted(path), "expected allowed: {path}");
        }
    }
}
