//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(#[from] oddscast_store::StoreError),

    #[error("Feed error: {0}")]
    Feed(#[from] oddscast_feed::FeedError),

    #[error("Engine error: {0}")]
    Engine(#[from] oddscast_engine::EngineError),

    #[error("Alert error: {0}")]
    Alert(#[from] oddscast_alert::AlertError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
