use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrafsiftError {
    #[error("parse failure: {0}")]
    ParseFailure(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("computation failure: {0}")]
    ComputationFailure(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TrafsiftError>;
