//! services/desk/src/error.rs
//!
//! Defines the primary error type for the coordinator service.

use crate::config::ConfigError;

/// The primary error type for the `desk` service.
#[derive(Debug, thiserror::Error)]
pub enum DeskServiceError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The HTTP client for the repository could not be built.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}
