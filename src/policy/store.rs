//! Policy store
//!
//! Wraps a [`PolicySource`] and turns read failures into an empty role set.
//! An empty set means "no role grants access", so a broken store denies.

use crate::access_control::patterns::PatternCache;
use crate::dashboard::metrics::DecisionMetrics;
use crate::error::PolicyResult;
use crate::policy::snapshot::{PolicySnapshot, RequiredRoles};
use crate::policy::source::SharedPolicySource;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error};

#[derive(Clone)]
pub struct PolicyStore {
    source: SharedPolicySource,
    metrics: Option<Arc<DecisionMetrics>>,
    /// Compiled patterns only; the mapping itself is read on every call
    patterns: Arc<PatternCache>,
}

impl std::fmt::Debug for PolicyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyStore")
            .field("source", &self.source.source_type())
            .finish_non_exhaustive()
    }
}

impl PolicyStore {
    pub fn new(source: SharedPolicySource) -> Self {
        Self {
            source,
            metrics: None,
            patterns: Arc::new(PatternCache::new()),
        }
    }

    /// Count read failures in `metrics`
    pub fn with_metrics(mut self, metrics: Arc<DecisionMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn source_type(&self) -> &'static str {
        self.source.source_type()
    }

    /// Read the current mapping, surfacing errors
    pub async fn snapshot(&self) -> PolicyResult<PolicySnapshot> {
        self.source.fetch().await
    }

    /// Roles required for `path`, read fresh from the source.
    ///
    /// Never fails: a source error is logged and yields no roles.
    pub async fn required_roles(&self, path: &str) -> RequiredRoles {
        match self.source.fetch().await {
            Ok(snapshot) => {
                let required = snapshot.required_roles_cached(path, &self.patterns);
                debug!(
                    path = %path,
                    patterns = ?required.matched_patterns,
                    roles = required.roles.len(),
                    "Resolved required roles"
                );
                required
            }
            Err(e) => {
                error!(
                    source = self.source.source_type(),
                    path = %path,
                    error = %e,
                    "Policy store read failed, treating path as requiring no roles"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_store_failure();
                }
                RequiredRoles::default()
            }
        }
    }

    pub async fn roles_required_for(&self, path: &str) -> HashSet<String> {
        self.required_roles(path).await.roles
    }
}
