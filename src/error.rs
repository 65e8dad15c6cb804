//! Error types for rangeguard.

use thiserror::Error;

/// Error type for rangeguard operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid CIDR range specification
    #[error("invalid CIDR: {0}")]
    InvalidCidr(String),

    /// Allow-list literal that is not a single IP address
    #[error("invalid allow-list entry: {0}")]
    InvalidAllowlistEntry(String),

    /// Client address that cannot be normalized
    #[error("invalid IP address: {0}")]
    InvalidAddress(String),

    /// Range spec that is neither a known group nor a CIDR
    #[error("unknown range group: {0}")]
    UnknownRangeGroup(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for rangeguard operations.
pub type Result<T> = std::result::Result<T, Error>;
