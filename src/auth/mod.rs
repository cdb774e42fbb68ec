//! Authentication boundary
//!
//! Tokens are issued and validated upstream. This module covers what the
//! decider needs from that boundary: whether a token is present, and the
//! identity (with its roles) the upstream authenticator produced.

pub mod identity;
pub mod provider;
pub mod token;

pub use identity::Identity;
pub use provider::{HeaderIdentityResolver, IdentityResolver, SharedIdentityResolver};
pub use token::{extract_token, has_token, token_header_value};
