//! Domain error types

use thiserror::Error;

/// Error when parsing a duration string
#[derive(Debug, Clone, Error)]
#[error("Invalid duration format: \"{input}\". Expected format: <number>ms, <number>s, <number>m, or <number>m<number>s (e.g., 500ms, 10s, 1m, 2m30s)")]
pub struct DurationParseError {
    pub input: String,
}

/// Error when a chunk is built from an empty payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Chunk {sequence_index} has an empty payload")]
pub struct EmptyPayloadError {
    pub sequence_index: u64,
}

/// Error when configuration fails
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Invalid config value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    #[error("Config file already exists at: {0}")]
    AlreadyExists(String),
}
