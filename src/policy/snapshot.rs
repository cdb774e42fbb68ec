//! Point-in-time copy of the pattern-to-roles mapping

use crate::access_control::patterns::PatternCache;
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// The mapping as read from the backing store for a single decision
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySnapshot {
    mapping: HashMap<String, HashSet<String>>,
}

/// Union of the roles of every pattern matching a path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredRoles {
    pub roles: HashSet<String>,
    /// Matching patterns, sorted
    pub matched_patterns: Vec<String>,
}

impl RequiredRoles {
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

impl PolicySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I, P, R, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (P, R)>,
        P: Into<String>,
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut snapshot = Self::new();
        for (pattern, roles) in entries {
            snapshot.insert(pattern, roles);
        }
        snapshot
    }

    /// Add roles to a pattern, merging with any already present
    pub fn insert<P, R, S>(&mut self, pattern: P, roles: R)
    where
        P: Into<String>,
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mapping
            .entry(pattern.into())
            .or_default()
            .extend(roles.into_iter().map(Into::into));
    }

    pub fn remove(&mut self, pattern: &str) -> Option<HashSet<String>> {
        self.mapping.remove(pattern)
    }

    pub fn get(&self, pattern: &str) -> Option<&HashSet<String>> {
        self.mapping.get(pattern)
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HashSet<String>)> {
        self.mapping.iter().map(|(p, r)| (p.as_str(), r))
    }

    /// Roles required to access `path`.
    ///
    /// Malformed patterns are skipped; they can only ever remove roles from
    /// the union, never grant access.
    pub fn required_roles(&self, path: &str) -> RequiredRoles {
        self.required_roles_cached(path, &PatternCache::new())
    }

    /// [`required_roles`](Self::required_roles) with compiled patterns
    /// taken from `cache`
    pub fn required_roles_cached(&self, path: &str, cache: &PatternCache) -> RequiredRoles {
        let mut required = RequiredRoles::default();

        for (pattern, roles) in &self.mapping {
            let Some(compiled) = cache.get(pattern) else {
                continue;
            };

            if compiled.matches(path) {
                trace!(pattern = %pattern, roles = ?roles, "Policy pattern matched");
                required.roles.extend(roles.iter().cloned());
                required.matched_patterns.push(pattern.clone());
            }
        }

        required.matched_patterns.sort_unstable();
        required
    }
}

impl From<HashMap<String, HashSet<String>>> for PolicySnapshot {
    fn from(mapping: HashMap<String, HashSet<String>>) -> Self {
        Self { mapping }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_patterns_are_unioned() {
        let snapshot = PolicySnapshot::from_entries([
            ("/api/**", vec!["ADMIN"]),
            ("/api/orders/**", vec!["OPS"]),
            ("/admin/**", vec!["ROOT"]),
        ]);

        let required = snapshot.required_roles("/api/orders/5");
        assert_eq!(required.roles.len(), 2);
        assert!(required.roles.contains("ADMIN"));
        assert!(required.roles.contains("OPS"));
        assert_eq!(required.matched_patterns, vec!["/api/**", "/api/orders/**"]);
    }

    #[test]
    fn test_no_match_is_empty() {
        let snapshot = PolicySnapshot::from_entries([("/api/orders/**", vec!["ADMIN"])]);
        assert!(snapshot.required_roles("/api/unlisted").is_empty());
    }

    #[test]
    fn test_empty_role_set_contributes_nothing() {
        let snapshot = PolicySnapshot::from_entries([("/api/**", Vec::<String>::new())]);
        let required = snapshot.required_roles("/api/orders");
        assert!(required.is_empty());
        assert_eq!(required.matched_patterns, vec!["/api/**"]);
    }

    #[test]
    fn test_malformed_pattern_skipped() {
        let snapshot = PolicySnapshot::from_entries([
            ("/api/{broken", vec!["ANY"]),
            ("/api/**", vec!["ADMIN"]),
        ]);
        let required = snapshot.required_roles("/api/x");
        assert_eq!(required.roles, HashSet::from(["ADMIN".to_string()]));
    }

    #[test]
    fn test_cached_lookup_agrees_with_fresh() {
        let snapshot = PolicySnapshot::from_entries([
            ("/api/**", vec!["USER"]),
            ("/api/{id:\\d+}/admin", vec!["ADMIN"]),
            ("/api/{broken", vec!["ANY"]),
        ]);
        let cache = PatternCache::new();

        for path in ["/api/7/admin", "/api/x/admin", "/other"] {
            assert_eq!(
                snapshot.required_roles_cached(path, &cache),
                snapshot.required_roles(path)
            );
        }
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_insert_merges_roles() {
        let mut snapshot = PolicySnapshot::new();
        snapshot.insert("/a/**", ["X"]);
        snapshot.insert("/a/**", ["Y"]);
        assert_eq!(snapshot.get("/a/**").map(HashSet::len), Some(2));
    }
}
