//! Error types for route-warden
//!
//! This module defines the error hierarchy used throughout the service.
//! None of these errors ever surface as an ALLOW: the decision path maps
//! every failure to a denial or a degraded (empty) policy read.

use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Policy store error: {0}")]
    PolicyStore(#[from] PolicyStoreError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {field}")]
    Missing { field: String },

    #[error("Invalid path pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A glob that cannot be compiled into a path pattern
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed path pattern '{pattern}': {reason}")]
pub struct PatternError {
    pub pattern: String,
    pub reason: String,
}

impl PatternError {
    pub fn new(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }
}

impl From<PatternError> for ConfigError {
    fn from(err: PatternError) -> Self {
        ConfigError::InvalidPattern {
            pattern: err.pattern,
            reason: err.reason,
        }
    }
}

/// Errors reading the shared policy mapping
#[derive(Error, Debug)]
pub enum PolicyStoreError {
    #[error("Policy store unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed policy entry for '{pattern}': {reason}")]
    Parse { pattern: String, reason: String },

    #[error("Malformed policy document: {0}")]
    Document(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Transport layer errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid bind address: {0}")]
    Bind(#[from] std::net::AddrParseError),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias for policy store reads
pub type PolicyResult<T> = std::result::Result<T, PolicyStoreError>;
