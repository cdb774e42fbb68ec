//! Identity resolution
//!
//! Authentication happens upstream. The gateway only needs to learn who the
//! caller is and which roles it holds, so resolution sits behind a trait
//! that deployments can swap for their own authenticator.

use crate::auth::identity::Identity;
use crate::config::IdentityConfig;
use crate::error::ConfigError;
// async_trait required for dyn-compatibility with Arc<dyn IdentityResolver>
use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName};
use std::sync::Arc;

/// Source of the caller's identity for a request
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve the identity behind a request's headers.
    ///
    /// Resolution never fails: anything that cannot be resolved is an
    /// anonymous identity.
    async fn resolve(&self, headers: &HeaderMap) -> Identity;

    /// Get a description of the resolver (for logging)
    fn resolver_type(&self) -> &'static str;
}

/// Shared resolver handle
pub type SharedIdentityResolver = Arc<dyn IdentityResolver>;

/// Trusts identity headers injected by the upstream authenticator.
///
/// The caller is authenticated iff the user header is present and non-blank;
/// roles are read from the roles header.
#[derive(Debug, Clone)]
pub struct HeaderIdentityResolver {
    user_header: HeaderName,
    roles_header: HeaderName,
    delimiter: String,
}

impl HeaderIdentityResolver {
    pub fn new(user_header: HeaderName, roles_header: HeaderName, delimiter: impl Into<String>) -> Self {
        Self {
            user_header,
            roles_header,
            delimiter: delimiter.into(),
        }
    }

    pub fn from_config(config: &IdentityConfig) -> Result<Self, ConfigError> {
        let parse = |field: &str, value: &str| {
            HeaderName::try_from(value).map_err(|e| ConfigError::Invalid {
                message: format!("identity.{field} '{value}' is not a valid header name: {e}"),
            })
        };

        Ok(Self::new(
            parse("user_header", &config.user_header)?,
            parse("roles_header", &config.roles_header)?,
            config.role_delimiter.clone(),
        ))
    }

    fn header<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

#[async_trait]
impl IdentityResolver for HeaderIdentityResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Identity {
        if Self::header(headers, &self.user_header).is_none() {
            return Identity::anonymous();
        }

        let roles = Self::header(headers, &self.roles_header)
            .map(|raw| {
                raw.split(self.delimiter.as_str())
                    .map(str::trim)
                    .filter(|role| !role.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Identity {
            authenticated: true,
            roles,
        }
    }

    fn resolver_type(&self) -> &'static str {
        "trusted headers"
    }
}
