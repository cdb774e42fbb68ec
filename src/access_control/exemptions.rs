//! Paths exempt from authorization
//!
//! Health checks, login endpoints and public assets bypass every other
//! check. Any matching pattern exempts; list order only decides which
//! pattern gets reported.

use crate::access_control::patterns::PatternMatcher;

#[derive(Debug, Clone, Default)]
pub struct ExemptionList {
    matcher: PatternMatcher,
}

impl ExemptionList {
    /// Build from configured patterns. Malformed entries are dropped with a
    /// warning and therefore never exempt anything.
    pub fn new(patterns: &[String]) -> Self {
        Self {
            matcher: PatternMatcher::lenient(patterns),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        self.matcher.matches(path)
    }

    /// First exemption pattern covering `path`
    pub fn find_match(&self, path: &str) -> Option<&str> {
        self.matcher.find_match(path)
    }

    pub fn len(&self) -> usize {
        self.matcher.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matcher.is_empty()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.matcher.iter()
    }
}
