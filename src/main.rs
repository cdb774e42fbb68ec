//! route-warden
//!
//! Authorization decision point for reverse proxies.

use axum::http::HeaderName;
use clap::Parser;
use route_warden::{
    access_control::{AuthorizationDecider, ExemptionList},
    auth::{HeaderIdentityResolver, IdentityResolver},
    config::{LogFormat, LoggingConfig, load_config},
    dashboard::{DashboardConfig, DashboardState, DecisionMetrics, run_dashboard},
    policy::create_policy_source,
    transport::{AppState, HttpConfig, router, run_http},
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// route-warden - path and role based authorization for API gateways
#[derive(Parser, Debug)]
#[command(name = "route-warden")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "ROUTE_WARDEN_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error); overrides logging.level
    #[arg(long, env = "ROUTE_WARDEN_LOG_LEVEL")]
    log_level: Option<String>,

    /// Listen host; overrides server.host
    #[arg(long, env = "ROUTE_WARDEN_HOST")]
    host: Option<String>,

    /// Listen port; overrides server.port
    #[arg(long, env = "ROUTE_WARDEN_PORT")]
    port: Option<u16>,

    /// Disable the dashboard
    #[arg(long, env = "ROUTE_WARDEN_NO_DASHBOARD")]
    no_dashboard: bool,
}

fn init_tracing(logging: &LoggingConfig, level_override: Option<&str>) {
    let level = level_override.unwrap_or(&logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (pretty, json) = match logging.format {
        LogFormat::Pretty => (Some(fmt::layer().with_writer(std::io::stderr)), None),
        LogFormat::Json => (
            None,
            Some(fmt::layer().json().with_writer(std::io::stderr)),
        ),
    };

    tracing_subscriber::registry()
        .with(pretty)
        .with(json)
        .with(filter)
        .init();
}

/// Re-read the exemption list from configuration
fn reload_exemptions(config_path: Option<&str>, decider: &AuthorizationDecider) {
    match load_config(config_path) {
        Ok(config) => {
            let exemptions = ExemptionList::new(&config.authorization.exempt_paths);
            info!(count = exemptions.len(), "Reloaded exemption list");
            decider.reload_exemptions(exemptions);
        }
        Err(e) => warn!(error = %e, "Keeping previous exemption list"),
    }
}

/// SIGHUP listener; never fires where the signal does not exist
struct Hangup {
    #[cfg(unix)]
    signal: Option<tokio::signal::unix::Signal>,
}

impl Hangup {
    fn install() -> Self {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            let signal = signal(SignalKind::hangup())
                .inspect_err(|e| warn!(error = %e, "SIGHUP reload unavailable"))
                .ok();
            Self { signal }
        }
        #[cfg(not(unix))]
        {
            Self {}
        }
    }

    async fn recv(&mut self) {
        #[cfg(unix)]
        if let Some(signal) = self.signal.as_mut()
            && signal.recv().await.is_some()
        {
            return;
        }
        std::future::pending::<()>().await
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    init_tracing(&config.logging, args.log_level.as_deref());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        name = %config.server.name,
        "Starting route-warden"
    );

    let source = create_policy_source(&config.policy_store)
        .inspect_err(|e| error!(error = %e, "Failed to create policy source"))?;
    info!(backend = source.source_type(), "Policy source ready");

    let metrics = Arc::new(DecisionMetrics::new());

    let decider = Arc::new(
        AuthorizationDecider::from_config(&config, source).with_metrics(Arc::clone(&metrics)),
    );
    info!(
        exemptions = decider.exemptions().len(),
        timeout_ms = config.authorization.decision_timeout_ms,
        "Decider ready"
    );

    let identity = Arc::new(
        HeaderIdentityResolver::from_config(&config.identity)
            .inspect_err(|e| error!(error = %e, "Failed to create identity resolver"))?,
    );
    info!(resolver = identity.resolver_type(), "Identity resolver ready");
    let token_header = HeaderName::try_from(config.authorization.token_header.as_str())?;

    let state = AppState::new(Arc::clone(&decider), identity, token_header);
    let shutdown = state.shutdown.clone();

    let config = Arc::new(config);

    let dashboard_handle = if !args.no_dashboard && config.dashboard.enabled {
        let dashboard_config = DashboardConfig::new(&config.dashboard.host, config.dashboard.port)?;
        let dashboard_state = DashboardState {
            metrics: Arc::clone(&metrics),
            config: Arc::clone(&config),
            decider: Arc::clone(&decider),
        };

        Some(tokio::spawn(async move {
            if let Err(e) = run_dashboard(dashboard_config, dashboard_state).await {
                error!(error = %e, "Dashboard server error");
            }
        }))
    } else {
        info!("Dashboard is disabled");
        None
    };

    let http_config = HttpConfig::from_host_port(&config.server.host, config.server.port)?;
    let server_ct = run_http(router(state), http_config).await?;

    let mut hangup = Hangup::install();

    info!("Press Ctrl+C to stop the server");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
            _ = server_ct.cancelled() => {
                info!("Server cancelled");
                break;
            }
            _ = hangup.recv() => {
                reload_exemptions(args.config.as_deref(), &decider);
            }
        }
    }

    shutdown.cancel();
    server_ct.cancel();

    if let Some(handle) = dashboard_handle {
        handle.abort();
    }

    info!("route-warden stopped");
    Ok(())
}
