//! Pattern-to-roles policy
//!
//! The mapping is owned by an external system and may change at any time.
//! Every decision reads it afresh through a [`PolicySource`].

pub mod file;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;
pub mod snapshot;
pub mod source;
pub mod store;

pub use file::FilePolicySource;
pub use memory::MemoryPolicySource;
#[cfg(feature = "redis")]
pub use redis::RedisPolicySource;
pub use snapshot::{PolicySnapshot, RequiredRoles};
pub use source::{PolicySource, SharedPolicySource, decode_mapping, decode_role_list};
pub use store::PolicyStore;

use crate::config::{PolicyBackend, PolicyStoreConfig};
use crate::error::{AppError, ConfigError};
use std::sync::Arc;

/// Build the configured policy source
pub fn create_policy_source(config: &PolicyStoreConfig) -> Result<SharedPolicySource, AppError> {
    match config.backend {
        PolicyBackend::Memory => Ok(Arc::new(MemoryPolicySource::from_config(&config.entries))),
        PolicyBackend::File => {
            let path = config.path.as_deref().ok_or_else(|| ConfigError::Missing {
                field: "policy_store.path".to_string(),
            })?;
            let expanded = shellexpand::tilde(path);
            Ok(Arc::new(FilePolicySource::new(
                expanded.as_ref(),
                config.role_delimiter.clone(),
            )))
        }
        PolicyBackend::Redis => create_redis_source(config),
    }
}

#[cfg(feature = "redis")]
fn create_redis_source(config: &PolicyStoreConfig) -> Result<SharedPolicySource, AppError> {
    let url = config.url.as_ref().ok_or_else(|| ConfigError::Missing {
        field: "policy_store.url".to_string(),
    })?;
    tracing::info!(url = %url.redacted_url(), key = %config.key, "Using redis policy source");
    let source = RedisPolicySource::new(
        url.expose_secret(),
        config.key.clone(),
        config.role_delimiter.clone(),
    )?;
    Ok(Arc::new(source))
}

#[cfg(not(feature = "redis"))]
fn create_redis_source(_config: &PolicyStoreConfig) -> Result<SharedPolicySource, AppError> {
    Err(ConfigError::Invalid {
        message: "policy_store.backend = \"redis\" requires the `redis` feature".to_string(),
    }
    .into())
}
