//! Error types for the captive portal.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Main error type for portal operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to bind {service} listener on {addr}: {source}")]
    Bind {
        service: &'static str,
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("portal is already running")]
    AlreadyRunning,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[source] io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
}

/// Validation errors for configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("target_url cannot be empty")]
    EmptyTargetUrl,

    #[error("target_url must start with http:// or https://: {url:?}")]
    InvalidTargetUrl { url: String },

    #[error("target_url cannot contain line breaks")]
    TargetUrlLineBreak,

    #[error("whitelist entry cannot be empty")]
    EmptyWhitelistEntry,

    #[error("forward_timeout_ms must be greater than 0")]
    ZeroForwardTimeout,
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;
