//! route-warden
//!
//! Authorization decision point for a reverse proxy or API gateway.
//!
//! ## Features
//!
//! - **Ant-style path patterns** (`?`, `*`, `**`, `{var}`) for exemptions and policies
//! - **Live policy** re-read from memory, a file or Redis on every decision
//! - **Deny by default** - store failures, timeouts and unmatched paths all deny
//! - **Forward-auth endpoint** and axum middleware
//!
//! ## Decision Order
//!
//! ```text
//! exempt path → OPTIONS preflight → token present → role check
//! ```
//!
//! ## Example Configuration
//!
//! ```toml
//! [authorization]
//! exempt_paths = ["/oauth/token", "/public/**"]
//!
//! [policy_store]
//! backend = "redis"
//! url = "redis://127.0.0.1:6379"
//! key = "auth:resource-roles"
//! ```

pub mod access_control;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod policy;
pub mod transport;
pub mod util;

// Re-export main types
pub use access_control::{AccessDecision, AuthorizationDecider, RequestContext};
pub use config::{AppConfig, load_config};
pub use dashboard::{DashboardConfig, DecisionMetrics};
pub use error::{AppError, Result};
pub use policy::{PolicyStore, create_policy_source};
