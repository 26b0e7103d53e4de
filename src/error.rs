//! Error types for Gator.

use thiserror::Error;

/// Common error type for Gator.
#[derive(Error, Debug)]
pub enum GatorError {
    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Feed retrieval error.
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for GatorError {
    fn from(e: sqlx::Error) -> Self {
        GatorError::Database(e.to_string())
    }
}

/// Failure while retrieving or decoding a single feed.
///
/// Every variant is non-fatal to the poll loop: the cycle for the affected
/// feed is abandoned and the feed is retried on a later tick.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The feed address is not a usable http(s) URL.
    #[error("invalid feed URL: {0}")]
    InvalidUrl(String),

    /// Upstream answered with a non-success status.
    #[error("unexpected HTTP status: {0}")]
    Status(u16),

    /// Network unreachable, connection reset, deadline exceeded, etc.
    #[error("transport error: {0}")]
    Transport(String),

    /// Body is not a valid RSS document.
    #[error("failed to parse feed: {0}")]
    Parse(String),

    /// Body exceeded the configured payload limit.
    #[error("feed too large: {size} bytes (max {limit} bytes)")]
    TooLarge { size: u64, limit: u64 },
}

/// Result type alias for Gator operations.
pub type Result<T> = std::result::Result<T, GatorError>;
