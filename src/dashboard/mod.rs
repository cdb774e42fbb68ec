//! Dashboard module
//!
//! JSON endpoints for monitoring the running decider: decision counters,
//! recent decisions and a redacted view of the configuration.

pub mod metrics;
pub mod server;

pub use metrics::{DecisionMetrics, DecisionRecord, MetricsSnapshot, OutcomeStats};
pub use server::{
    DEFAULT_DASHBOARD_PORT, DashboardConfig, DashboardState, dashboard_router, run_dashboard,
};
