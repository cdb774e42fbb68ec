//! Dashboard HTTP server
//!
//! Serves the monitoring API endpoints.

use crate::access_control::AuthorizationDecider;
use crate::config::{AppConfig, PolicyBackend};
use crate::dashboard::metrics::{DecisionMetrics, MetricsSnapshot};
use crate::util::find_available_port;
use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Default port for the dashboard server
pub const DEFAULT_DASHBOARD_PORT: u16 = 19893;

/// Dashboard configuration
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Address to bind the dashboard server
    pub bind: SocketAddr,
    /// Enable dashboard (default: true)
    pub enabled: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], DEFAULT_DASHBOARD_PORT)),
            enabled: true,
        }
    }
}

impl DashboardConfig {
    /// Create config from host and port
    pub fn new(host: &str, port: u16) -> Result<Self, std::net::AddrParseError> {
        let bind: SocketAddr = format!("{}:{}", host, port).parse()?;
        Ok(Self {
            bind,
            enabled: true,
        })
    }
}

/// Shared state for dashboard handlers
#[derive(Clone)]
pub struct DashboardState {
    pub metrics: Arc<DecisionMetrics>,
    pub config: Arc<AppConfig>,
    pub decider: Arc<AuthorizationDecider>,
}

/// Running configuration, without secrets
#[derive(Debug, Serialize)]
pub struct ConfigInfo {
    pub server_name: String,
    pub server_version: String,
    pub listen: String,
    pub token_header: String,
    pub decision_timeout_ms: u64,
    pub exempt_paths: Vec<String>,
    pub policy_backend: PolicyBackend,
    pub policy_source: String,
}

/// Build the dashboard router
pub fn dashboard_router(state: DashboardState) -> Router {
    Router::new()
        .route("/api/metrics", get(api_metrics))
        .route("/api/config", get(api_config))
        .with_state(state)
}

/// Run the dashboard server
///
/// Port discovery is used to find an available port if the configured port is taken.
pub async fn run_dashboard(config: DashboardConfig, state: DashboardState) -> anyhow::Result<()> {
    if !config.enabled {
        info!("Dashboard is disabled");
        return Ok(());
    }

    let host = config.bind.ip().to_string();
    let actual_port = find_available_port(&host, config.bind.port()).await?;
    let bind_addr = SocketAddr::new(config.bind.ip(), actual_port);

    let listener = TcpListener::bind(bind_addr).await?;
    info!("Dashboard API running at http://{}/api/metrics", bind_addr);

    axum::serve(listener, dashboard_router(state)).await?;

    Ok(())
}

/// API endpoint for metrics
async fn api_metrics(State(state): State<DashboardState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

/// API endpoint for configuration
async fn api_config(State(state): State<DashboardState>) -> Json<ConfigInfo> {
    let config = &state.config;
    Json(ConfigInfo {
        server_name: config.server.name.clone(),
        server_version: env!("CARGO_PKG_VERSION").to_string(),
        listen: format!("{}:{}", config.server.host, config.server.port),
        token_header: config.authorization.token_header.clone(),
        decision_timeout_ms: u64::try_from(state.decider.timeout().as_millis())
            .unwrap_or(u64::MAX),
        exempt_paths: state.decider.exemptions().patterns().map(String::from).collect(),
        policy_backend: config.policy_store.backend,
        policy_source: state.decider.policy().source_type().to_string(),
    })
}
