//! Error types for spool

use thiserror::Error;

/// The main error type for spool operations
#[derive(Debug, Error)]
pub enum SpoolError {
    #[error("Invalid profile '{name}': {reason}")]
    InvalidProfile { name: String, reason: String },

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Chain needs at least 2 particles, got {0}")]
    ChainTooShort(usize),

    #[error("Bridge error: {0}")]
    BridgeError(String),

    #[error("Wire format error: {0}")]
    WireError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),

    #[error("Value out of range: {field} must be between {min} and {max}, got {value}")]
    ValueOutOfRange {
        field: String,
        min: f64,
        max: f64,
        value: f64,
    },
}

/// Result type alias for spool operations
pub type Result<T> = std::result::Result<T, SpoolError>;

impl From<toml::de::Error> for SpoolError {
    fn from(err: toml::de::Error) -> Self {
        SpoolError::TomlParseError(err.to_string())
    }
}

impl From<serde_json::Error> for SpoolError {
    fn from(err: serde_json::Error) -> Self {
        SpoolError::WireError(err.to_string())
    }
}
