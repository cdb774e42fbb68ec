//! In-process policy source
//!
//! Holds the mapping in shared memory. Writers (an admin endpoint, a sync
//! task, tests) mutate it through the same handle the decider reads from.

use crate::config::PolicyEntryConfig;
use crate::error::PolicyResult;
use crate::policy::snapshot::PolicySnapshot;
use crate::policy::source::PolicySource;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
pub struct MemoryPolicySource {
    mapping: RwLock<PolicySnapshot>,
}

impl MemoryPolicySource {
    pub fn new(snapshot: PolicySnapshot) -> Self {
        Self {
            mapping: RwLock::new(snapshot),
        }
    }

    pub fn from_config(entries: &[PolicyEntryConfig]) -> Self {
        Self::new(PolicySnapshot::from_entries(
            entries.iter().map(|e| (e.pattern.clone(), e.roles.clone())),
        ))
    }

    fn write(&self) -> RwLockWriteGuard<'_, PolicySnapshot> {
        self.mapping.write().unwrap_or_else(|poisoned| {
            tracing::warn!("policy mapping lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, PolicySnapshot> {
        self.mapping.read().unwrap_or_else(|poisoned| {
            tracing::warn!("policy mapping lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Replace the whole mapping
    pub fn replace(&self, snapshot: PolicySnapshot) {
        *self.write() = snapshot;
    }

    /// Set the roles of one pattern, overwriting what was there
    pub fn upsert<R, S>(&self, pattern: impl Into<String>, roles: R)
    where
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pattern = pattern.into();
        let mut mapping = self.write();
        mapping.remove(&pattern);
        mapping.insert(pattern, roles);
    }

    pub fn remove(&self, pattern: &str) -> Option<HashSet<String>> {
        self.write().remove(pattern)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[async_trait]
impl PolicySource for MemoryPolicySource {
    async fn fetch(&self) -> PolicyResult<PolicySnapshot> {
        Ok(self.read().clone())
    }

    fn source_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_reflects_updates() {
        let source = MemoryPolicySource::default();
        assert!(source.fetch().await.unwrap().is_empty());

        source.upsert("/api/**", ["ADMIN"]);
        let snapshot = source.fetch().await.unwrap();
        assert!(snapshot.get("/api/**").unwrap().contains("ADMIN"));

        source.upsert("/api/**", ["OPS"]);
        let snapshot = source.fetch().await.unwrap();
        let roles = snapshot.get("/api/**").unwrap();
        assert_eq!(roles.len(), 1);
        assert!(roles.contains("OPS"));

        source.remove("/api/**");
        assert!(source.is_empty());
    }

    #[tokio::test]
    async fn test_from_config() {
        let entries = vec![PolicyEntryConfig {
            pattern: "/api/orders/**".to_string(),
            roles: vec!["ADMIN".to_string(), "OPS".to_string()],
        }];
        let source = MemoryPolicySource::from_config(&entries);
        let snapshot = source.fetch().await.unwrap();
        assert_eq!(snapshot.get("/api/orders/**").map(HashSet::len), Some(2));
    }

    #[tokio::test]
    async fn test_snapshot_is_detached() {
        let source = MemoryPolicySource::default();
        source.upsert("/a/**", ["X"]);
        let before = source.fetch().await.unwrap();
        source.replace(PolicySnapshot::new());
        assert_eq!(before.len(), 1);
        assert!(source.fetch().await.unwrap().is_empty());
    }
}
