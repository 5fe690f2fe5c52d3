//! Read-only views of exchange state.
//!
//! Everything here is owned by the exchange: the engine fetches these
//! values through the cached facade and never mutates them.

use crate::market::{Pair, SETTLEMENT_ASSET};
use crate::order::{ClientOrderId, OrderId, OrderSide, PositionSide};
use crate::{Price, Size};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top of book for one pair. Either side may be missing on a thin book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticker {
    pub pair: Pair,
    pub bid: Option<Price>,
    pub ask: Option<Price>,
    pub timestamp: DateTime<Utc>,
}

impl Ticker {
    /// Reference price for an order: the bid for buys, the ask for sells.
    pub fn price_for(&self, side: OrderSide) -> Option<Price> {
        let price = match side {
            OrderSide::Buy => self.bid,
            OrderSide::Sell => self.ask,
        };
        price.filter(Price::is_positive)
    }
}

/// An open position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub pair: Pair,
    pub side: PositionSide,
    /// Absolute position size in contracts.
    pub contracts: Size,
    /// Tokens per contract.
    pub contract_size: Decimal,
    /// Absolute USD value of the position.
    pub notional: Decimal,
    pub entry_price: Option<Price>,
}

impl Position {
    /// Notional signed by side: positive long, negative short.
    pub fn signed_notional(&self) -> Decimal {
        self.notional * self.side.sign()
    }

    /// Token amount that fully closes this position.
    pub fn close_amount(&self) -> Size {
        self.contracts * self.contract_size
    }

    pub fn is_open(&self) -> bool {
        self.contracts.is_positive() && !self.contract_size.is_zero()
    }
}

/// Balance of one currency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyBalance {
    pub free: Decimal,
    pub used: Decimal,
    pub total: Decimal,
}

/// Account balances keyed by currency code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub currencies: BTreeMap<String, CurrencyBalance>,
}

impl Balance {
    pub fn with_currency(mut self, code: &str, balance: CurrencyBalance) -> Self {
        self.currencies.insert(code.to_string(), balance);
        self
    }

    /// Total of `code`, zero when the currency is absent.
    pub fn total(&self, code: &str) -> Decimal {
        self.currencies
            .get(code)
            .map(|b| b.total)
            .unwrap_or(Decimal::ZERO)
    }

    /// Total of the settlement asset, used as collateral.
    pub fn collateral(&self) -> Decimal {
        self.total(SETTLEMENT_ASSET)
    }
}

/// A resting order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenOrder {
    pub id: OrderId,
    pub pair: Pair,
    pub side: OrderSide,
    pub price: Price,
    pub amount: Size,
    pub timestamp: DateTime<Utc>,
}

/// Status reported for a submitted order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "status")]
pub enum OrderStatus {
    /// Accepted and resting on the book.
    Resting,
    /// Filled immediately.
    Filled { avg_price: Price },
}

/// Acknowledgement of an accepted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    pub id: OrderId,
    pub client_id: ClientOrderId,
    pub pair: Pair,
    pub side: OrderSide,
    pub amount: Size,
    pub price: Price,
    pub status: OrderStatus,
}
