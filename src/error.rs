//! Error types for the owned-series service.

use thiserror::Error;

/// Result type alias for owned-series operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the owned-series service.
///
/// The reconciliation driver itself never surfaces these to its caller; they
/// show up in logs and counters. The ring source and service constructors
/// return them directly.
#[derive(Error, Debug)]
pub enum Error {
    /// Ring layer errors.
    #[error("ring error: {0}")]
    Ring(#[from] RingError),

    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
}

/// Errors from the ring layer.
#[derive(Error, Debug)]
pub enum RingError {
    /// The ring backend could not be read. Transient; the caller retries on
    /// the next pass.
    #[error("ring read failed: {0}")]
    ReadFailed(String),
}
