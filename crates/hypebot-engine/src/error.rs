//! Engine error types.

use hypebot_core::CoreError;
use hypebot_exchange::ExchangeError;
use hypebot_store::StoreError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Invalid input: {0}")]
    Invalid(#[from] CoreError),
}

/// How a failed reconciliation attempt is reported and counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Price, market, position or balance could not be resolved.
    MarketData,
    /// The exchange refused an order or cancel.
    OrderRejection,
    /// The bot record could not be read.
    Store,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MarketData => "market_data",
            Self::OrderRejection => "order_rejected",
            Self::Store => "store",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EngineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Store(_) | Self::Invalid(_) => FailureKind::Store,
            Self::Exchange(e) if e.is_order_rejection() => FailureKind::OrderRejection,
            Self::Exchange(_) => FailureKind::MarketData,
        }
    }

    /// The bot no longer exists in the store.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_not_found())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
