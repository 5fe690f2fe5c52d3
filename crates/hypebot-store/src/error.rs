//! Store error types.

use hypebot_core::{BotId, CoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Bot not found: {0}")]
    NotFound(BotId),

    #[error("Invalid bot: {0}")]
    Invalid(#[from] CoreError),

    #[error("Store configuration error: {0}")]
    Configuration(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Store returned HTTP {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        Self::HttpClient(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
