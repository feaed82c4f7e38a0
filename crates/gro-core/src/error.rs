//! Unified error types for the gro ecosystem
//!
//! This module provides a common error type [`GroError`] that can represent
//! errors from any part of the system. Domain-specific error types can be
//! converted to `GroError` for uniform error handling at API boundaries.
//!
//! Infeasibility of an optimization problem is deliberately NOT an error:
//! it travels as a first-class result variant in `gro-engine`. `GroError`
//! covers the cases where the machinery itself failed.

use thiserror::Error;

/// Unified error type for all gro operations.
#[derive(Error, Debug)]
pub enum GroError {
    /// I/O errors (pipes, process spawning, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Solver/pool errors
    #[error("Solver error: {0}")]
    Solver(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using GroError.
pub type GroResult<T> = Result<T, GroError>;

impl From<anyhow::Error> for GroError {
    fn from(err: anyhow::Error) -> Self {
        GroError::Other(err.to_string())
    }
}

impl From<String> for GroError {
    fn from(s: String) -> Self {
        GroError::Other(s)
    }
}

impl From<&str> for GroError {
    fn from(s: &str) -> Self {
        GroError::Other(s.to_string())
    }
}

// JSON parsing errors
impl From<serde_json::Error> for GroError {
    fn from(err: serde_json::Error) -> Self {
        GroError::Parse(err.to_string())
    }
}
