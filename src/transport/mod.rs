//! Transport module
//!
//! HTTP surface of the decider.

pub mod http;

pub use http::{
    AppState, DEFAULT_HTTP_PORT, HttpConfig, authorize_request, decision_status, protect, router,
    run_http,
};
