//! Configuration loader with layered sources
//!
//! Loads configuration from multiple sources with the following precedence
//! (highest to lowest):
//! 1. Environment variables (ROUTE_WARDEN__*)
//! 2. Configuration file (TOML)
//! 3. Default values

use crate::access_control::patterns::PatternMatcher;
use crate::config::types::{AppConfig, PolicyBackend};
use crate::error::ConfigError;
use axum::http::HeaderName;
use config::{Config, Environment, File, FileFormat};
use std::path::Path;

/// Default configuration file paths to check (in order)
const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "route-warden.toml",
    ".route-warden.toml",
    "~/.config/route-warden/config.toml",
    "/etc/route-warden/config.toml",
];

/// Environment variable prefix; `__` separates nested keys
const ENV_PREFIX: &str = "ROUTE_WARDEN";

/// Load configuration from a TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from_str(toml_str, FileFormat::Toml))
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Load configuration from files and environment
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. Start with defaults (handled by serde defaults on AppConfig)

    // 2. Add configuration file
    if let Some(path) = config_path {
        // Explicit path provided - must exist
        if !Path::new(path).exists() {
            return Err(ConfigError::Load(format!(
                "Configuration file not found: {}",
                path
            )));
        }
        builder = builder.add_source(File::new(path, FileFormat::Toml));
    } else {
        // Try default paths (first existing one wins)
        for path in DEFAULT_CONFIG_PATHS {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                builder = builder.add_source(File::new(&expanded, FileFormat::Toml));
                break;
            }
        }
    }

    // 3. Add environment variables with ROUTE_WARDEN__ prefix
    // e.g., ROUTE_WARDEN__SERVER__PORT, ROUTE_WARDEN__POLICY_STORE__URL
    // Exemptions are a comma separated list:
    // ROUTE_WARDEN__AUTHORIZATION__EXEMPT_PATHS="/public/**,/oauth/token"
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("authorization.exempt_paths")
            .try_parsing(true),
    );

    // Build and deserialize
    let config = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    // Validate the configuration
    validate_config(&app_config)?;

    Ok(app_config)
}

/// Validate configuration values
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::Invalid {
            message: "server.port must be greater than 0".to_string(),
        });
    }

    if config.dashboard.enabled && config.dashboard.port == 0 {
        return Err(ConfigError::Invalid {
            message: "dashboard.port must be greater than 0".to_string(),
        });
    }

    if config.authorization.decision_timeout_ms == 0 {
        return Err(ConfigError::Invalid {
            message: "authorization.decision_timeout_ms must be greater than 0".to_string(),
        });
    }

    validate_header_name(&config.authorization.token_header, "authorization.token_header")?;
    validate_header_name(&config.identity.user_header, "identity.user_header")?;
    validate_header_name(&config.identity.roles_header, "identity.roles_header")?;

    if config.identity.role_delimiter.is_empty() {
        return Err(ConfigError::Invalid {
            message: "identity.role_delimiter must not be empty".to_string(),
        });
    }
    if config.policy_store.role_delimiter.is_empty() {
        return Err(ConfigError::Invalid {
            message: "policy_store.role_delimiter must not be empty".to_string(),
        });
    }

    // Malformed exemptions are fatal here; at runtime they would never match
    PatternMatcher::new(&config.authorization.exempt_paths).map_err(|e| {
        ConfigError::InvalidPattern {
            pattern: e.pattern,
            reason: format!("in authorization.exempt_paths: {}", e.reason),
        }
    })?;

    validate_backend(config)?;

    Ok(())
}

fn validate_backend(config: &AppConfig) -> Result<(), ConfigError> {
    let store = &config.policy_store;
    match store.backend {
        PolicyBackend::Memory => Ok(()),
        PolicyBackend::File => match store.path.as_deref() {
            Some(path) if !path.trim().is_empty() => Ok(()),
            _ => Err(ConfigError::Missing {
                field: "policy_store.path (required for the file backend)".to_string(),
            }),
        },
        PolicyBackend::Redis => {
            if store.url.is_none() {
                return Err(ConfigError::Missing {
                    field: "policy_store.url (required for the redis backend)".to_string(),
                });
            }
            if store.key.trim().is_empty() {
                return Err(ConfigError::Missing {
                    field: "policy_store.key".to_string(),
                });
            }
            Ok(())
        }
    }
}

fn validate_header_name(value: &str, field: &str) -> Result<(), ConfigError> {
    HeaderName::try_from(value)
        .map(|_| ())
        .map_err(|e| ConfigError::Invalid {
            message: format!("{} '{}' is not a valid header name: {}", field, value, e),
        })
}
