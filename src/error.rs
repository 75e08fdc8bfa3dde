//! Error types for mesh-control
//!
//! This module defines the error types used throughout the crate.
//! We use `thiserror` for ergonomic error definitions and `anyhow` for
//! error propagation in the binary.

use thiserror::Error;

/// Main error type for mesh-control operations
#[derive(Error, Debug)]
pub enum MeshError {
    /// Malformed subnet, out-of-range block number or host index
    #[error("Validation error: {0}")]
    Validation(String),

    /// No free address block remains
    #[error("Address space exhausted: {0}")]
    Exhausted(String),

    /// Requested node or record is absent from the fleet snapshot
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Fleet store errors
    #[error("Store error: {0}")]
    Store(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias using MeshError
pub type Result<T> = std::result::Result<T, MeshError>;

impl From<serde_json::Error> for MeshError {
    fn from(err: serde_json::Error) -> Self {
        MeshError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for MeshError {
    fn from(err: toml::de::Error) -> Self {
        MeshError::Config(err.to_string())
    }
}
