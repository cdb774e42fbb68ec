//! Access control module
//!
//! Path-based authorization for requests passing through the gateway.
//!
//! ## Decision Model
//!
//! 1. **Exemptions** - Ant-style patterns that bypass authorization entirely
//! 2. **Preflight** - `OPTIONS` requests are always let through
//! 3. **Token presence** - a bearer token must be present and well formed
//! 4. **Roles** - the union of roles of every policy pattern matching the
//!    path; the caller needs at least one of them. No matching pattern denies.
//!
//! ## Pattern Syntax
//!
//! - `?` matches one character within a segment
//! - `*` matches zero or more characters within a segment
//! - `**` matches zero or more whole segments
//! - `{name}` / `{name:regex}` match a segment (or part of one)
//!
//! ```toml
//! [authorization]
//! exempt_paths = ["/oauth/token", "/public/**", "/*/v2/api-docs"]
//! ```

pub mod decider;
pub mod exemptions;
pub mod patterns;
pub mod types;

pub use decider::{AuthorizationDecider, DEFAULT_DECISION_TIMEOUT};
pub use exemptions::ExemptionList;
pub use patterns::{PathPattern, PatternCache, PatternMatcher, match_path};
pub use types::{AccessDecision, AllowReason, DenyReason, RequestContext};
