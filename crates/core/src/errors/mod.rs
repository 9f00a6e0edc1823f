//! Error types and Result alias for the Prizebox platform

use thiserror::Error;

/// Main error type for the Prizebox platform
#[derive(Error, Debug)]
pub enum Error {
    #[error("Event not found: {0}")]
    EventNotFound(i64),

    #[error("Reward not found: {0}")]
    RewardNotFound(i64),

    #[error("Reward request not found: {0}")]
    RequestNotFound(i64),

    #[error("Request {id} is already {status}; only pending requests can transition")]
    InvalidTransition { id: i64, status: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Delivery failed: {0}")]
    DeliveryError(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Storage failures are transient: the caller may retry the whole call.
    /// Everything else is a final answer.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::DatabaseError(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::DeliveryError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidData(err.to_string())
    }
}
