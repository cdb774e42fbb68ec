//! HTTP transport
//!
//! Exposes the decider to reverse proxies:
//! - `ANY /authorize` for forward-auth (nginx `auth_request`, Traefik
//!   `forwardAuth`, Envoy `ext_authz` in HTTP mode)
//! - `GET /healthz` for liveness probes
//! - [`authorize_request`] to guard an axum router in-process

use crate::access_control::{AccessDecision, AuthorizationDecider, RequestContext};
use crate::auth::{SharedIdentityResolver, token_header_value};
use crate::error::TransportError;
use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, header},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{any, get},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Default port for the authorization endpoint
pub const DEFAULT_HTTP_PORT: u16 = 20390;

/// Original request URI as seen by the proxy
pub const FORWARDED_URI: HeaderName = HeaderName::from_static("x-forwarded-uri");

/// Original request method as seen by the proxy
pub const FORWARDED_METHOD: HeaderName = HeaderName::from_static("x-forwarded-method");

/// Response header carrying the decision label
pub const DECISION_HEADER: HeaderName = HeaderName::from_static("x-authz-decision");

/// Configuration for the HTTP server
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Address to bind to (e.g., "127.0.0.1:20390")
    pub bind: SocketAddr,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], DEFAULT_HTTP_PORT)),
        }
    }
}

impl HttpConfig {
    pub fn new(bind: SocketAddr) -> Self {
        Self { bind }
    }

    /// Create config from host and port strings
    pub fn from_host_port(host: &str, port: u16) -> Result<Self, TransportError> {
        let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
        Ok(Self::new(addr))
    }
}

/// Shared state for the authorization handlers
#[derive(Clone)]
pub struct AppState {
    pub decider: Arc<AuthorizationDecider>,
    pub identity: SharedIdentityResolver,
    pub token_header: HeaderName,
    /// Cancelled on shutdown; in-flight role checks then deny
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        decider: Arc<AuthorizationDecider>,
        identity: SharedIdentityResolver,
        token_header: HeaderName,
    ) -> Self {
        Self {
            decider,
            identity,
            token_header,
            shutdown: CancellationToken::new(),
        }
    }

    async fn decide(&self, method: Method, path: String, headers: &HeaderMap) -> AccessDecision {
        let mut request = RequestContext::new(method, path);
        request.raw_token = token_header_value(headers, &self.token_header);

        let cancel = self.shutdown.child_token();
        self.decider
            .decide(&request, self.identity.resolve(headers), Some(&cancel))
            .await
    }
}

/// Build the authorization router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/authorize", any(authorize))
        .route("/healthz", get(healthz))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Guard every route of `inner` with the decider
pub fn protect(inner: Router, state: AppState) -> Router {
    inner.layer(axum::middleware::from_fn_with_state(state, authorize_request))
}

/// Forward-auth handler
async fn authorize(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let (method, raw_path) = forwarded_target(&method, &uri, &headers);

    let path = match decode_path(&raw_path) {
        Some(path) => path,
        None => {
            warn!(path = %raw_path, "Rejecting undecodable or dot-segment path");
            return (StatusCode::BAD_REQUEST, "malformed path").into_response();
        }
    };

    let decision = state.decide(method, path, &headers).await;
    decision_response(&decision)
}

async fn healthz() -> &'static str {
    "ok"
}

/// Middleware applying the decision to the request's own path and method
pub async fn authorize_request(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(path) = decode_path(request.uri().path()) else {
        return (StatusCode::BAD_REQUEST, "malformed path").into_response();
    };
    let method = request.method().clone();
    let headers = request.headers().clone();

    let decision = state.decide(method, path, &headers).await;
    if decision.is_allowed() {
        next.run(request).await
    } else {
        decision_response(&decision)
    }
}

/// Method and path of the request being authorized.
///
/// Proxies pass the original request in `X-Forwarded-Method` and
/// `X-Forwarded-Uri`; without them the request itself is the target.
fn forwarded_target(method: &Method, uri: &Uri, headers: &HeaderMap) -> (Method, String) {
    let method = headers
        .get(&FORWARDED_METHOD)
        .and_then(|v| Method::from_bytes(v.as_bytes()).ok())
        .unwrap_or_else(|| method.clone());

    let path = headers
        .get(&FORWARDED_URI)
        .and_then(|v| v.to_str().ok())
        .map(strip_query)
        .unwrap_or_else(|| uri.path())
        .to_string();

    (method, path)
}

fn strip_query(uri: &str) -> &str {
    uri.split(['?', '#']).next().unwrap_or(uri)
}

/// Percent-decode a path.
///
/// `None` if it does not decode to UTF-8 or if any decoded segment is `.`
/// or `..`. The upstream resolves those before routing, so the path the
/// decider sees would not be the one the request reaches.
pub fn decode_path(raw: &str) -> Option<String> {
    let decoded = urlencoding::decode(raw).ok()?;
    if decoded.is_empty() {
        return Some("/".to_string());
    }
    if decoded
        .split(['/', '\\'])
        .any(|segment| segment == "." || segment == "..")
    {
        return None;
    }
    Some(decoded.into_owned())
}

/// HTTP status for a decision
pub fn decision_status(decision: &AccessDecision) -> StatusCode {
    match decision {
        AccessDecision::Allowed(_) => StatusCode::OK,
        AccessDecision::Denied(reason) if reason.is_unauthenticated() => StatusCode::UNAUTHORIZED,
        AccessDecision::Denied(_) => StatusCode::FORBIDDEN,
    }
}

fn decision_response(decision: &AccessDecision) -> Response {
    let status = decision_status(decision);
    let mut response = (status, decision.label()).into_response();
    let headers = response.headers_mut();
    headers.insert(DECISION_HEADER, HeaderValue::from_static(decision.label()));
    if status == StatusCode::UNAUTHORIZED {
        headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    response
}

/// Start serving `app`.
///
/// The listener binds the configured address exactly: proxies are
/// configured with it. Cancelling the returned token shuts the server down
/// gracefully.
pub async fn run_http(app: Router, config: HttpConfig) -> Result<CancellationToken, TransportError> {
    let listener = TcpListener::bind(config.bind).await?;
    let local = listener.local_addr()?;

    info!("Authorization endpoint listening on http://{}/authorize", local);

    let ct = CancellationToken::new();
    let shutdown = ct.clone();
    let graceful = ct.clone();

    tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { graceful.cancelled().await })
            .await;
        if let Err(e) = result {
            error!(error = %e, "HTTP server failed");
        }
        shutdown.cancel();
    });

    Ok(ct)
}
