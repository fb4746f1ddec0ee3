//! Alert error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Threshold {0} out of range (allowed 1-20)")]
    InvalidThreshold(f64),

    #[error("Already subscribed: {0}")]
    AlreadySubscribed(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

pub type AlertResult<T> = Result<T, AlertError>;
