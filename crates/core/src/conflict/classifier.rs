//! Path-pattern classification of conflicted files.
//!
//! # Decision model
//!
//! | Condition | Rule |
//! |-----------|------|
//! | Path matches a union pattern | `Union` |
//! | Path matches a local pattern | `KeepLocal` |
//! | None of the above | `KeepRemote` |
//!
//! Rules are tried in that order and the first match wins, so a path that
//! matches both a union and a local pattern is union-merged.

use tracing::debug;

use crate::config::ConflictRulesConfig;

/// How a conflicted path gets resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictRule {
    /// Keep both sides' content.
    Union,
    /// Keep the local version, discard the remote one.
    KeepLocal,
    /// Keep the remote version, discard the local one.
    KeepRemote,
}

impl ConflictRule {
    /// Short human-readable label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Union => "union",
            Self::KeepLocal => "keep-local",
            Self::KeepRemote => "keep-remote",
        }
    }
}

impl std::fmt::Display for ConflictRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Classifies conflicted paths against the configured glob patterns.
#[derive(Debug, Clone)]
pub struct ConflictClassifier {
    union_patterns: Vec<String>,
    local_patterns: Vec<String>,
}

impl ConflictClassifier {
    pub fn new(union_patterns: Vec<String>, local_patterns: Vec<String>) -> Self {
        Self {
            union_patterns,
            local_patterns,
        }
    }

    /// Decide the rule for `rel_path` (relative to the vault root).
    pub fn classify(&self, rel_path: &str) -> ConflictRule {
        let path = rel_path.replace('\\', "/");
        if let Some(p) = first_match(&self.union_patterns, &path) {
            debug!(path = %path, pattern = p, "union pattern matched");
            return ConflictRule::Union;
        }
        if let Some(p) = first_match(&self.local_patterns, &path) {
            debug!(path = %path, pattern = p, "local pattern matched");
            return ConflictRule::KeepLocal;
        }
        ConflictRule::KeepRemote
    }
}

impl From<&ConflictRulesConfig> for ConflictClassifier {
    fn from(cfg: &ConflictRulesConfig) -> Self {
        Self::new(cfg.union_patterns.clone(), cfg.local_patterns.clone())
    }
}

fn first_match<'p>(patterns: &'p [String], path: &str) -> Option<&'p str> {
    patterns
        .iter()
        .map(String::as_str)
        .find(|p| matches_pattern(path, p))
}

/// Glob match; a pattern without `/` also matches the final path
/// component, the way `.gitignore` patterns do.
fn matches_pattern(path: &str, pattern: &str) -> bool {
    let pat = pattern.replace('\\', "/");
    if glob_match::glob_match(&pat, path) {
        return true;
    }
    if !pat.contains('/') {
        if let Some(name) = path.rsplit('/').next() {
            return glob_match::glob_match(&pat, name);
        }
    }
    false
}
