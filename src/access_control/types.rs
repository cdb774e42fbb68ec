//! Access control types
//!
//! Core types used by the authorization decider.

use axum::http::Method;
use serde::Serialize;
use std::fmt;

/// What the decider sees of an inbound request
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Request path, already decoded and normalized by the pipeline
    pub path: String,
    /// HTTP method
    pub method: Method,
    /// Raw value of the designated token header, if present
    pub raw_token: Option<String>,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            raw_token: None,
        }
    }

    /// Attach the raw token header value
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.raw_token = Some(token.into());
        self
    }
}

/// Why a request was let through
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AllowReason {
    /// Path matched an exemption pattern
    Exempt { pattern: String },
    /// CORS preflight
    Preflight,
    /// Caller holds one of the required roles
    RoleGranted { role: String },
}

impl AllowReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllowReason::Exempt { .. } => "exempt",
            AllowReason::Preflight => "preflight",
            AllowReason::RoleGranted { .. } => "role_granted",
        }
    }
}

/// Why a request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Token header absent, blank or malformed
    MissingToken,
    /// Token present but no authenticated identity behind it
    Unauthenticated,
    /// No policy pattern requires any role for this path
    NoMatchingPolicy,
    /// Caller holds none of the required roles
    InsufficientRole,
    /// Policy read or identity resolution exceeded the decision timeout
    TimedOut,
    /// Caller cancelled the decision
    Cancelled,
}

impl DenyReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DenyReason::MissingToken => "missing_token",
            DenyReason::Unauthenticated => "unauthenticated",
            DenyReason::NoMatchingPolicy => "no_matching_policy",
            DenyReason::InsufficientRole => "insufficient_role",
            DenyReason::TimedOut => "timed_out",
            DenyReason::Cancelled => "cancelled",
        }
    }

    /// Whether the caller failed to present credentials at all, as opposed
    /// to presenting credentials that are not good enough
    pub const fn is_unauthenticated(&self) -> bool {
        matches!(self, DenyReason::MissingToken | DenyReason::Unauthenticated)
    }

    pub fn all() -> &'static [DenyReason] {
        &[
            DenyReason::MissingToken,
            DenyReason::Unauthenticated,
            DenyReason::NoMatchingPolicy,
            DenyReason::InsufficientRole,
            DenyReason::TimedOut,
            DenyReason::Cancelled,
        ]
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of an authorization check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed(AllowReason),
    Denied(DenyReason),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allowed(_))
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, AccessDecision::Denied(_))
    }

    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            AccessDecision::Allowed(_) => None,
            AccessDecision::Denied(reason) => Some(*reason),
        }
    }

    /// Short label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            AccessDecision::Allowed(reason) => reason.as_str(),
            AccessDecision::Denied(reason) => reason.as_str(),
        }
    }
}

impl From<AccessDecision> for bool {
    fn from(decision: AccessDecision) -> Self {
        decision.is_allowed()
    }
}

impl fmt::Display for AccessDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessDecision::Allowed(reason) => write!(f, "allow ({})", reason.as_str()),
            AccessDecision::Denied(reason) => write!(f, "deny ({})", reason),
        }
    }
}
