//! Named delegations of authority (see DATA MODEL / Rule).

use globset::{Glob, GlobMatcher};

use refward_crypto::principal::PrincipalId;

use crate::vcs::RefName;

/// The namespace a [`Rule`]'s pattern constrains: a reference name glob, or
/// a file path glob evaluated against paths a commit touches.
#[derive(Debug, Clone)]
pub enum Pattern {
    Git(GlobMatcher),
    File(GlobMatcher),
}

impl Pattern {
    /// Parse a pattern string using the `git:` / `file:` prefix convention.
    pub fn parse(raw: &str) -> Result<Self, globset::Error> {
        if let Some(glob) = raw.strip_prefix("git:") {
            Ok(Self::Git(Glob::new(glob)?.compile_matcher()))
        } else if let Some(glob) = raw.strip_prefix("file:") {
            Ok(Self::File(Glob::new(glob)?.compile_matcher()))
        } else {
            // Unprefixed patterns are treated as git-namespace, matching
            // the bare reference globs most rule files write in practice.
            Ok(Self::Git(Glob::new(raw)?.compile_matcher()))
        }
    }

    pub fn matches_ref(&self, name: &RefName) -> bool {
        matches!(self, Self::Git(m) if m.is_match(name.as_str()))
    }

    pub fn matches_path(&self, path: &str) -> bool {
        matches!(self, Self::File(m) if m.is_match(path))
    }

    pub fn is_file_pattern(&self) -> bool {
        matches!(self, Self::File(_))
    }
}

/// A named delegation: `patterns` it governs, the `principals` trusted to
/// satisfy it, and the `threshold` of distinct principals required.
///
/// A rule may delegate evaluation to a nested rule file by name; when it
/// does, its own principals/threshold are ignored and the named rule file
/// is walked in its place.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub patterns: Vec<Pattern>,
    pub principal_ids: Vec<PrincipalId>,
    pub threshold: usize,
    pub delegate: Option<String>,
}

impl Rule {
    /// The terminal allow-rule: matches every pattern but grants no
    /// authority (an empty principal set can never meet its threshold).
    pub fn is_terminal_allow(&self) -> bool {
        self.name == "allow-rule"
    }

    pub fn matches_ref(&self, name: &RefName) -> bool {
        self.patterns.iter().any(|p| p.matches_ref(name))
    }

    pub fn matches_path(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches_path(path))
    }

    pub fn has_file_pattern(&self) -> bool {
        self.patterns.iter().any(Pattern::is_file_pattern)
    }
}
