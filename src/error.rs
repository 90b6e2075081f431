//! Application-wide error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("query execution failed: {0}")]
    Query(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
