//! Poller startup errors.

use chronicle_core::error::DomainError;
use thiserror::Error;

/// Startup and runtime errors for the poller binary.
#[derive(Debug, Error)]
pub enum AppError {
    /// A configuration value is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The event store client could not be built.
    #[error("store error: {0}")]
    Store(#[from] DomainError),

    /// Signal handling or other I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
