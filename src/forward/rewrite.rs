//! Path rewriting applied before forwarding

use serde::{Deserialize, Serialize};

/// Replace a leading path prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRewriteRule {
    /// Prefix to match at the start of the path
    pub pattern: String,
    /// What the matched prefix is replaced with
    #[serde(default)]
    pub replacement: String,
}

impl PathRewriteRule {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }

    /// Rewrite `path` if it starts with the pattern on a segment boundary
    ///
    /// `/api` matches `/api` and `/api/users` but not `/apinot`.
    pub fn apply(&self, path: &str) -> Option<String> {
        let rest = path.strip_prefix(self.pattern.as_str())?;
        let on_boundary = self.pattern.ends_with('/') || rest.is_empty() || rest.starts_with('/');
        if !on_boundary {
            return None;
        }
        Some(format!("{}{}", self.replacement, rest))
    }
}

/// Ordered list of rewrite rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathRewriter {
    rules: Vec<PathRewriteRule>,
}

impl PathRewriter {
    pub fn new(rules: Vec<PathRewriteRule>) -> Self {
        Self { rules }
    }

    /// Strip `/api` from the front of every path
    pub fn strip_api_prefix() -> Self {
        Self::new(vec![PathRewriteRule::new("/api", "")])
    }

    pub fn rules(&self) -> &[PathRewriteRule] {
        &self.rules
    }

    /// Apply each rule in order to the output of the previous one
    pub fn rewrite(&self, path: &str) -> String {
        let mut current = path.to_string();
        for rule in &self.rules {
            if let Some(rewritten) = rule.apply(&current) {
                current = rewritten;
            }
        }

        if current.is_empty() {
            "/".to_string()
        } else if !current.starts_with('/') {
            format!("/{}", current)
        } else {
            current
        }
    }
}
