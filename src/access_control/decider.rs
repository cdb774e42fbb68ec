//! Authorization decider
//!
//! Evaluated strictly in order, first match wins:
//! 1. Exempt path: allow without looking at credentials
//! 2. `OPTIONS` preflight: allow
//! 3. Missing or malformed token: deny
//! 4. Role check: allow iff the caller holds at least one role required by
//!    some policy pattern matching the path
//!
//! Steps 1-3 never suspend. Step 4 reads the policy store and resolves the
//! identity concurrently, bounded by the decision timeout and an optional
//! cancellation token. Every failure on the way denies.

use crate::access_control::exemptions::ExemptionList;
use crate::access_control::types::{AccessDecision, AllowReason, DenyReason, RequestContext};
use crate::auth::{Identity, extract_token};
use crate::config::AppConfig;
use crate::dashboard::metrics::DecisionMetrics;
use crate::policy::{PolicyStore, RequiredRoles, SharedPolicySource};
use axum::http::Method;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Default bound on the policy read plus identity resolution
pub const DEFAULT_DECISION_TIMEOUT: Duration = Duration::from_millis(500);

pub struct AuthorizationDecider {
    exemptions: RwLock<Arc<ExemptionList>>,
    policy: PolicyStore,
    timeout: Duration,
    metrics: Option<Arc<DecisionMetrics>>,
}

impl std::fmt::Debug for AuthorizationDecider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationDecider")
            .field("exemptions", &self.exemptions().len())
            .field("policy", &self.policy)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl AuthorizationDecider {
    pub fn new(exemptions: ExemptionList, policy: PolicyStore) -> Self {
        Self {
            exemptions: RwLock::new(Arc::new(exemptions)),
            policy,
            timeout: DEFAULT_DECISION_TIMEOUT,
            metrics: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Record every decision (and store failures) in `metrics`
    pub fn with_metrics(mut self, metrics: Arc<DecisionMetrics>) -> Self {
        self.policy = self.policy.with_metrics(Arc::clone(&metrics));
        self.metrics = Some(metrics);
        self
    }

    /// Build from loaded configuration and an already constructed source
    pub fn from_config(config: &AppConfig, source: SharedPolicySource) -> Self {
        Self::new(
            ExemptionList::new(&config.authorization.exempt_paths),
            PolicyStore::new(source),
        )
        .with_timeout(Duration::from_millis(
            config.authorization.decision_timeout_ms,
        ))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn policy(&self) -> &PolicyStore {
        &self.policy
    }

    /// Current exemption list
    pub fn exemptions(&self) -> Arc<ExemptionList> {
        let guard = self.exemptions.read().unwrap_or_else(|poisoned| {
            tracing::warn!("exemption list lock poisoned, recovering");
            poisoned.into_inner()
        });
        Arc::clone(&guard)
    }

    /// Swap the exemption list. Decisions already running keep the old one.
    pub fn reload_exemptions(&self, exemptions: ExemptionList) {
        let mut guard = self.exemptions.write().unwrap_or_else(|poisoned| {
            tracing::warn!("exemption list lock poisoned, recovering");
            poisoned.into_inner()
        });
        *guard = Arc::new(exemptions);
    }

    /// Decide a request.
    ///
    /// `identity` is only polled if the request reaches the role check.
    pub async fn decide<F>(
        &self,
        request: &RequestContext,
        identity: F,
        cancel: Option<&CancellationToken>,
    ) -> AccessDecision
    where
        F: Future<Output = Identity> + Send,
    {
        let started = Instant::now();
        let decision = self.evaluate(request, identity, cancel).await;
        let elapsed = started.elapsed();

        debug!(
            path = %request.path,
            method = %request.method,
            decision = decision.label(),
            allowed = decision.is_allowed(),
            elapsed_us = elapsed.as_micros() as u64,
            "Authorization decided"
        );

        if let Some(metrics) = &self.metrics {
            metrics.record_decision(&request.path, request.method.as_str(), &decision, elapsed);
        }

        decision
    }

    /// Decide with an identity that is already known
    pub async fn decide_with(&self, request: &RequestContext, identity: Identity) -> AccessDecision {
        self.decide(request, std::future::ready(identity), None).await
    }

    async fn evaluate<F>(
        &self,
        request: &RequestContext,
        identity: F,
        cancel: Option<&CancellationToken>,
    ) -> AccessDecision
    where
        F: Future<Output = Identity> + Send,
    {
        if let Some(pattern) = self.exemptions().find_match(&request.path) {
            trace!(pattern = %pattern, "Path is exempt");
            return AccessDecision::Allowed(AllowReason::Exempt {
                pattern: pattern.to_string(),
            });
        }

        if request.method == Method::OPTIONS {
            return AccessDecision::Allowed(AllowReason::Preflight);
        }

        if extract_token(request.raw_token.as_deref()).is_none() {
            return AccessDecision::Denied(DenyReason::MissingToken);
        }

        let lookup = async { tokio::join!(self.policy.required_roles(&request.path), identity) };
        let bounded = tokio::time::timeout(self.timeout, lookup);

        let joined = match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(DenyReason::Cancelled),
                result = bounded => result.map_err(|_| DenyReason::TimedOut),
            },
            None => bounded.await.map_err(|_| DenyReason::TimedOut),
        };

        match joined {
            Ok((required, identity)) => check_roles(&identity, &required),
            Err(reason) => {
                debug!(path = %request.path, reason = %reason, "Role check abandoned");
                AccessDecision::Denied(reason)
            }
        }
    }
}

/// Any-match of the caller's roles against the required roles
fn check_roles(identity: &Identity, required: &RequiredRoles) -> AccessDecision {
    if !identity.authenticated {
        return AccessDecision::Denied(DenyReason::Unauthenticated);
    }

    if required.is_empty() {
        return AccessDecision::Denied(DenyReason::NoMatchingPolicy);
    }

    match identity.first_role_in(&required.roles) {
        Some(role) => AccessDecision::Allowed(AllowReason::RoleGranted {
            role: role.to_string(),
        }),
        None => AccessDecision::Denied(DenyReason::InsufficientRole),
    }
}
