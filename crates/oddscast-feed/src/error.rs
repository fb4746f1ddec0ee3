//! Feed error types.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum FeedError {
    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Malformed feed payload: {0}")]
    Payload(String),
}

pub type FeedResult<T> = Result<T, FeedError>;
