//! Configuration types for route-warden
//!
//! This module defines the configuration structure that can be loaded from
//! TOML files and/or environment variables.

use crate::util::SecretString;
use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener settings
    pub server: ServerConfig,

    /// Exemptions and decision behaviour
    pub authorization: AuthorizationConfig,

    /// How the upstream authenticator hands over identities
    pub identity: IdentityConfig,

    /// Where the pattern-to-roles mapping lives
    pub policy_store: PolicyStoreConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Dashboard configuration
    pub dashboard: DashboardConfigToml,
}

/// Dashboard configuration (TOML format)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardConfigToml {
    /// Enable the dashboard server
    pub enabled: bool,

    /// Dashboard host
    pub host: String,

    /// Dashboard port
    pub port: u16,
}

impl Default for DashboardConfigToml {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 19893,
        }
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Service name reported in logs and `/api/config`
    pub name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 20390,
            name: "route-warden".to_string(),
        }
    }
}

/// Authorization behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthorizationConfig {
    /// Header carrying the bearer token
    pub token_header: String,

    /// Ant-style patterns that bypass authorization entirely
    #[serde(default)]
    pub exempt_paths: Vec<String>,

    /// Upper bound on the policy read plus identity resolution
    pub decision_timeout_ms: u64,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            token_header: "authorization".to_string(),
            exempt_paths: Vec::new(),
            decision_timeout_ms: 500,
        }
    }
}

/// Identity hand-over from the upstream authenticator
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Header naming the authenticated principal; absent means anonymous
    pub user_header: String,

    /// Header listing the principal's roles
    pub roles_header: String,

    /// Separator between roles in `roles_header`
    pub role_delimiter: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            user_header: "x-auth-user".to_string(),
            roles_header: "x-auth-roles".to_string(),
            role_delimiter: ",".to_string(),
        }
    }
}

/// Policy store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyBackend {
    /// In-process map seeded from `policy_store.entries`
    #[default]
    Memory,
    /// TOML or JSON document re-read on every decision
    File,
    /// Redis hash shared with the admin service
    Redis,
}

/// Policy store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyStoreConfig {
    /// Backend holding the mapping
    pub backend: PolicyBackend,

    /// Well-known key of the mapping (redis backend)
    pub key: String,

    /// Connection URL (redis backend)
    #[serde(default)]
    pub url: Option<SecretString>,

    /// Policy document path (file backend)
    #[serde(default)]
    pub path: Option<String>,

    /// Separator used when a role list is stored as a plain string
    pub role_delimiter: String,

    /// Initial mapping (memory backend)
    #[serde(default)]
    pub entries: Vec<PolicyEntryConfig>,
}

/// One seeded pattern-to-roles entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PolicyEntryConfig {
    /// Ant-style path pattern
    pub pattern: String,

    /// Roles any one of which grants access
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Default for PolicyStoreConfig {
    fn default() -> Self {
        Self {
            backend: PolicyBackend::Memory,
            key: "auth:resource-roles".to_string(),
            url: None,
            path: None,
            role_delimiter: ",".to_string(),
            entries: Vec::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format (pretty, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// JSON structured output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 20390);
        assert_eq!(config.authorization.token_header, "authorization");
        assert_eq!(config.authorization.decision_timeout_ms, 500);
        assert!(config.authorization.exempt_paths.is_empty());
        assert_eq!(config.policy_store.backend, PolicyBackend::Memory);
        assert_eq!(config.identity.role_delimiter, ",");
    }

    #[test]
    fn test_deserialize_backend() {
        let backend: PolicyBackend = serde_json::from_str(r#""redis""#).unwrap();
        assert_eq!(backend, PolicyBackend::Redis);

        let backend: PolicyBackend = serde_json::from_str(r#""file""#).unwrap();
        assert_eq!(backend, PolicyBackend::File);

        assert!(serde_json::from_str::<PolicyBackend>(r#""etcd""#).is_err());
    }

    #[test]
    fn test_deserialize_log_format() {
        let format: LogFormat = serde_json::from_str(r#""json""#).unwrap();
        assert_eq!(format, LogFormat::Json);
    }

    #[test]
    fn test_redis_url_is_redacted() {
        let json = r#"{"backend": "redis", "url": "redis://:hunter2@cache:6379"}"#;
        let config: PolicyStoreConfig = serde_json::from_str(json).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
    }
}
