//! Error types for hypebot-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid pair symbol: {0}")]
    InvalidPair(String),

    #[error("Invalid bot id: {0}")]
    InvalidBotId(String),

    #[error("Invalid bot field: {0}")]
    InvalidBotField(String),

    #[error("Invalid order side: {0}")]
    InvalidSide(String),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
