//! Exchange error types.

use hypebot_core::{OrderSide, Pair};
use thiserror::Error;

use crate::signer::{KeyError, SignerError};

#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Missing or invalid credentials. Fatal at construction.
    #[error("Exchange configuration error: {0}")]
    Configuration(String),

    #[error("Market not found: {0}")]
    MarketNotFound(Pair),

    #[error("No {side} price available for {pair}")]
    PriceUnavailable { pair: Pair, side: OrderSide },

    #[error("Market data error: {0}")]
    MarketData(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Order rejected: {0}")]
    OrderRejected(String),

    #[error("Signing error: {0}")]
    Signer(#[from] SignerError),

    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Decimal parse error: {0}")]
    Decimal(#[from] rust_decimal::Error),
}

impl ExchangeError {
    /// Construction-time failures that must abort startup.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Key(_))
    }

    /// The exchange refused a mutation (order, cancel, leverage change).
    pub fn is_order_rejection(&self) -> bool {
        matches!(self, Self::OrderRejected(_) | Self::Signer(_))
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(e: reqwest::Error) -> Self {
        Self::HttpClient(e.to_string())
    }
}

pub type ExchangeResult<T> = Result<T, ExchangeError>;
