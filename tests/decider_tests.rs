//! Authorization decider integration tests
//!
//! Decision order:
//! 1. Exempt paths allow without credentials
//! 2. OPTIONS preflight allows
//! 3. Missing token denies
//! 4. Roles: any-match against the union of matching policy patterns,
//!    deny when nothing matches

use async_trait::async_trait;
use axum::http::Method;
use route_warden::access_control::{
    AccessDecision, AllowReason, AuthorizationDecider, DenyReason, ExemptionList, RequestContext,
};
use route_warden::auth::Identity;
use route_warden::dashboard::DecisionMetrics;
use route_warden::error::{PolicyResult, PolicyStoreError};
use route_warden::policy::{MemoryPolicySource, PolicySnapshot, PolicySource, PolicyStore};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Test Helpers
// =============================================================================

fn exemptions(patterns: &[&str]) -> ExemptionList {
    let owned: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
    ExemptionList::new(&owned)
}

fn memory(entries: &[(&str, &[&str])]) -> Arc<MemoryPolicySource> {
    let source = Arc::new(MemoryPolicySource::default());
    for (pattern, roles) in entries {
        source.upsert(*pattern, roles.iter().copied());
    }
    source
}

fn decider_with(exempt: &[&str], source: Arc<dyn PolicySource>) -> AuthorizationDecider {
    AuthorizationDecider::new(exemptions(exempt), PolicyStore::new(source))
}

fn orders_decider() -> AuthorizationDecider {
    decider_with(
        &["/public/**"],
        memory(&[("/api/orders/**", &["ADMIN", "OPS"])]),
    )
}

fn request(method: Method, path: &str, token: Option<&str>) -> RequestContext {
    let request = RequestContext::new(method, path);
    match token {
        Some(token) => request.with_token(token),
        None => request,
    }
}

fn get(path: &str) -> RequestContext {
    request(Method::GET, path, Some("Bearer eyJhbGciOi.payload.sig"))
}

/// Source that always fails
struct UnreachableSource;

#[async_trait]
impl PolicySource for UnreachableSource {
    async fn fetch(&self) -> PolicyResult<PolicySnapshot> {
        Err(PolicyStoreError::Unavailable("connection refused".into()))
    }

    fn source_type(&self) -> &'static str {
        "unreachable"
    }
}

/// Source that answers after a delay
struct SlowSource {
    delay: Duration,
    inner: Arc<MemoryPolicySource>,
}

#[async_trait]
impl PolicySource for SlowSource {
    async fn fetch(&self) -> PolicyResult<PolicySnapshot> {
        tokio::time::sleep(self.delay).await;
        self.inner.fetch().await
    }

    fn source_type(&self) -> &'static str {
        "slow"
    }
}

/// Source counting how often it is read
struct CountingSource {
    reads: AtomicUsize,
    inner: Arc<MemoryPolicySource>,
}

#[async_trait]
impl PolicySource for CountingSource {
    async fn fetch(&self) -> PolicyResult<PolicySnapshot> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch().await
    }

    fn source_type(&self) -> &'static str {
        "counting"
    }
}

// =============================================================================
// 1. Worked examples
// =============================================================================

mod examples {
    use super::*;

    #[tokio::test]
    async fn test_exempt_path_allows_without_token() {
        let decider = orders_decider();
        let decision = decider
            .decide_with(
                &request(Method::GET, "/public/health", None),
                Identity::anonymous(),
            )
            .await;
        assert_eq!(
            decision,
            AccessDecision::Allowed(AllowReason::Exempt {
                pattern: "/public/**".into()
            })
        );
    }

    #[tokio::test]
    async fn test_options_preflight_allows() {
        let decider = orders_decider();
        let decision = decider
            .decide_with(
                &request(Method::OPTIONS, "/api/secret", None),
                Identity::anonymous(),
            )
            .await;
        assert_eq!(decision, AccessDecision::Allowed(AllowReason::Preflight));
    }

    #[tokio::test]
    async fn test_empty_token_denies() {
        let decider = orders_decider();
        let decision = decider
            .decide_with(
                &request(Method::GET, "/api/orders", Some("")),
                Identity::authenticated(["ADMIN"]),
            )
            .await;
        assert_eq!(decision, AccessDecision::Denied(DenyReason::MissingToken));
    }

    #[tokio::test]
    async fn test_matching_role_allows() {
        let decider = orders_decider();
        let decision = decider
            .decide_with(&get("/api/orders/5"), Identity::authenticated(["OPS"]))
            .await;
        assert!(decision.is_allowed());
    }

    #[tokio::test]
    async fn test_other_role_denies() {
        let decider = orders_decider();
        let decision = decider
            .decide_with(&get("/api/orders/5"), Identity::authenticated(["VIEWER"]))
            .await;
        assert_eq!(decision, AccessDecision::Denied(DenyReason::InsufficientRole));
    }

    #[tokio::test]
    async fn test_unlisted_path_denies() {
        let decider = orders_decider();
        let decision = decider
            .decide_with(&get("/api/unlisted"), Identity::authenticated(["ADMIN"]))
            .await;
        assert_eq!(decision, AccessDecision::Denied(DenyReason::NoMatchingPolicy));
    }
}

// =============================================================================
// 2. Ordering of the checks
// =============================================================================

mod ordering {
    use super::*;

    #[tokio::test]
    async fn test_exempt_ignores_identity_and_token() {
        let decider = orders_decider();
        for token in [None, Some(""), Some("Bearer x")] {
            for identity in [Identity::anonymous(), Identity::authenticated(["VIEWER"])] {
                let decision = decider
                    .decide_with(&request(Method::DELETE, "/public/x", token), identity)
                    .await;
                assert!(decision.is_allowed());
            }
        }
    }

    #[tokio::test]
    async fn test_options_ignores_identity_and_token() {
        let decider = orders_decider();
        for path in ["/api/orders/1", "/anything", "/"] {
            let decision = decider
                .decide_with(&request(Method::OPTIONS, path, None), Identity::anonymous())
                .await;
            assert_eq!(decision, AccessDecision::Allowed(AllowReason::Preflight));
        }
    }

    #[tokio::test]
    async fn test_malformed_tokens_deny() {
        let decider = orders_decider();
        for token in [None, Some("   "), Some("\t"), Some("Bearer"), Some("Bearer   ")] {
            let decision = decider
                .decide_with(
                    &request(Method::GET, "/api/orders/1", token),
                    Identity::authenticated(["ADMIN"]),
                )
                .await;
            assert_eq!(
                decision,
                AccessDecision::Denied(DenyReason::MissingToken),
                "token {token:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_no_policy_read_before_token_check() {
        let source = Arc::new(CountingSource {
            reads: AtomicUsize::new(0),
            inner: memory(&[("/**", &["ADMIN"])]),
        });
        let decider = decider_with(&["/public/**"], source.clone());

        decider
            .decide_with(&request(Method::GET, "/public/a", None), Identity::anonymous())
            .await;
        decider
            .decide_with(&request(Method::OPTIONS, "/api", None), Identity::anonymous())
            .await;
        decider
            .decide_with(&request(Method::GET, "/api", None), Identity::anonymous())
            .await;
        assert_eq!(source.reads.load(Ordering::SeqCst), 0);

        decider
            .decide_with(&get("/api"), Identity::authenticated(["ADMIN"]))
            .await;
        assert_eq!(source.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unauthenticated_with_token_denies() {
        let decider = orders_decider();
        let decision = decider
            .decide_with(&get("/api/orders/1"), Identity::anonymous())
            .await;
        assert_eq!(decision, AccessDecision::Denied(DenyReason::Unauthenticated));
    }
}

// =============================================================================
// 3. Role semantics
// =============================================================================

mod roles {
    use super::*;

    #[tokio::test]
    async fn test_union_across_matching_patterns() {
        let decider = decider_with(
            &[],
            memory(&[("/api/**", &["USER"]), ("/api/admin/**", &["ADMIN"])]),
        );

        for roles in [["USER"], ["ADMIN"]] {
            let decision = decider
                .decide_with(&get("/api/admin/users"), Identity::authenticated(roles))
                .await;
            assert!(decision.is_allowed(), "roles {roles:?}");
        }

        let decision = decider
            .decide_with(&get("/api/admin/users"), Identity::authenticated(["GUEST"]))
            .await;
        assert!(decision.is_denied());
    }

    #[tokio::test]
    async fn test_authenticated_without_roles_denies() {
        let decider = orders_decider();
        let decision = decider
            .decide_with(
                &get("/api/orders/1"),
                Identity::authenticated(Vec::<String>::new()),
            )
            .await;
        assert_eq!(decision, AccessDecision::Denied(DenyReason::InsufficientRole));
    }

    #[tokio::test]
    async fn test_pattern_with_empty_role_set_denies() {
        let decider = decider_with(&[], memory(&[("/api/**", &[])]));
        let decision = decider
            .decide_with(&get("/api/x"), Identity::authenticated(["ADMIN"]))
            .await;
        assert_eq!(decision, AccessDecision::Denied(DenyReason::NoMatchingPolicy));
    }

    #[tokio::test]
    async fn test_malformed_policy_pattern_skipped() {
        let decider = decider_with(
            &[],
            memory(&[("/api/{broken", &["ANYONE"]), ("/api/**", &["ADMIN"])]),
        );

        let decision = decider
            .decide_with(&get("/api/x"), Identity::authenticated(["ANYONE"]))
            .await;
        assert!(decision.is_denied());

        let decision = decider
            .decide_with(&get("/api/x"), Identity::authenticated(["ADMIN"]))
            .await;
        assert!(decision.is_allowed());
    }

    #[tokio::test]
    async fn test_roles_are_case_sensitive() {
        let decider = orders_decider();
        let decision = decider
            .decide_with(&get("/api/orders/1"), Identity::authenticated(["admin"]))
            .await;
        assert!(decision.is_denied());
    }

    #[tokio::test]
    async fn test_decisions_are_idempotent() {
        let decider = orders_decider();
        let request = get("/api/orders/7");
        let first = decider
            .decide_with(&request, Identity::authenticated(["OPS"]))
            .await;
        let second = decider
            .decide_with(&request, Identity::authenticated(["OPS"]))
            .await;
        assert_eq!(first, second);
    }
}

// =============================================================================
// 4. Live store, failures, timeouts and cancellation
// =============================================================================

mod store_behaviour {
    use super::*;

    #[tokio::test]
    async fn test_store_update_visible_on_next_decision() {
        let source = memory(&[]);
        let decider = decider_with(&[], source.clone());
        let request = get("/api/reports/q3");

        let decision = decider
            .decide_with(&request, Identity::authenticated(["AUDITOR"]))
            .await;
        assert!(decision.is_denied());

        source.upsert("/api/reports/**", ["AUDITOR"]);
        let decision = decider
            .decide_with(&request, Identity::authenticated(["AUDITOR"]))
            .await;
        assert!(decision.is_allowed());

        source.remove("/api/reports/**");
        let decision = decider
            .decide_with(&request, Identity::authenticated(["AUDITOR"]))
            .await;
        assert!(decision.is_denied());
    }

    #[tokio::test]
    async fn test_store_failure_denies_and_is_counted() {
        let metrics = Arc::new(DecisionMetrics::new());
        let decider = decider_with(&[], Arc::new(UnreachableSource))
            .with_metrics(Arc::clone(&metrics));

        let decision = decider
            .decide_with(&get("/api/orders/1"), Identity::authenticated(["ADMIN"]))
            .await;
        assert_eq!(decision, AccessDecision::Denied(DenyReason::NoMatchingPolicy));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.store_failures, 1);
        assert_eq!(snapshot.total_denied, 1);
    }

    #[tokio::test]
    async fn test_store_failure_does_not_affect_exemptions() {
        let decider = decider_with(&["/health"], Arc::new(UnreachableSource));
        let decision = decider
            .decide_with(&request(Method::GET, "/health", None), Identity::anonymous())
            .await;
        assert!(decision.is_allowed());
    }

    #[tokio::test]
    async fn test_slow_store_times_out() {
        let source = Arc::new(SlowSource {
            delay: Duration::from_secs(5),
            inner: memory(&[("/api/**", &["ADMIN"])]),
        });
        let decider = decider_with(&[], source).with_timeout(Duration::from_millis(50));

        let decision = decider
            .decide_with(&get("/api/orders"), Identity::authenticated(["ADMIN"]))
            .await;
        assert_eq!(decision, AccessDecision::Denied(DenyReason::TimedOut));
    }

    #[tokio::test]
    async fn test_slow_identity_times_out() {
        let decider = decider_with(&[], memory(&[("/api/**", &["ADMIN"])]))
            .with_timeout(Duration::from_millis(50));

        let identity = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Identity::authenticated(["ADMIN"])
        };
        let decision = decider.decide(&get("/api/orders"), identity, None).await;
        assert_eq!(decision, AccessDecision::Denied(DenyReason::TimedOut));
    }

    #[tokio::test]
    async fn test_policy_read_and_identity_run_concurrently() {
        let source = Arc::new(SlowSource {
            delay: Duration::from_millis(200),
            inner: memory(&[("/api/**", &["ADMIN"])]),
        });
        let decider = decider_with(&[], source).with_timeout(Duration::from_millis(350));

        let identity = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Identity::authenticated(["ADMIN"])
        };
        let decision = decider.decide(&get("/api/orders"), identity, None).await;
        assert!(decision.is_allowed());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_denies() {
        let decider = orders_decider();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let decision = decider
            .decide(
                &get("/api/orders/1"),
                std::future::ready(Identity::authenticated(["ADMIN"])),
                Some(&cancel),
            )
            .await;
        assert_eq!(decision, AccessDecision::Denied(DenyReason::Cancelled));
    }

    #[tokio::test]
    async fn test_cancelled_while_waiting_denies() {
        let source = Arc::new(SlowSource {
            delay: Duration::from_secs(5),
            inner: memory(&[("/api/**", &["ADMIN"])]),
        });
        let decider = decider_with(&[], source).with_timeout(Duration::from_secs(10));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let decision = decider
            .decide(
                &get("/api/orders/1"),
                std::future::ready(Identity::authenticated(["ADMIN"])),
                Some(&cancel),
            )
            .await;
        assert_eq!(decision, AccessDecision::Denied(DenyReason::Cancelled));
    }

    #[tokio::test]
    async fn test_cancellation_irrelevant_for_exempt_paths() {
        let decider = orders_decider();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let decision = decider
            .decide(
                &request(Method::GET, "/public/x", None),
                std::future::ready(Identity::anonymous()),
                Some(&cancel),
            )
            .await;
        assert!(decision.is_allowed());
    }

    #[tokio::test]
    async fn test_shared_across_tasks() {
        let decider = Arc::new(orders_decider());
        let mut handles = Vec::new();
        for i in 0..16 {
            let decider = Arc::clone(&decider);
            handles.push(tokio::spawn(async move {
                let role = if i % 2 == 0 { "OPS" } else { "VIEWER" };
                decider
                    .decide_with(
                        &get(&format!("/api/orders/{i}")),
                        Identity::authenticated([role]),
                    )
                    .await
                    .is_allowed()
            }));
        }

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap(), i % 2 == 0);
        }
    }
}
