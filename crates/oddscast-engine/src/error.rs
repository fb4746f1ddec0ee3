//! Engine error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Store error: {0}")]
    Store(#[from] oddscast_store::StoreError),
}

pub type EngineResult<T> = Result<T, EngineError>;
