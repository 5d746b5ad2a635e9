//! Runtime error types.

use telewire_core::{ApiError, TransportError};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP transport could not be created.
    #[error("Failed to create transport: {0}")]
    Transport(#[from] TransportError),

    /// A remote call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// No session is registered for the credential (shown masked).
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Installing a shutdown signal handler failed.
    #[error("Failed to listen for shutdown signal: {0}")]
    Signal(#[from] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
