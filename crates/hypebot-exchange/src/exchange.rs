//! Raw exchange operations.
//!
//! The trait is the seam between the cached facade and a concrete venue.
//! Nothing here caches: every call goes to the venue.

use std::pin::Pin;

use hypebot_core::{
    Balance, ClientOrderId, Market, OpenOrder, OrderAck, OrderId, OrderSide, Pair, Position,
    Price, Size, Ticker,
};

use crate::error::ExchangeResult;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// A fully priced limit order ready for submission.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub market: Market,
    pub side: OrderSide,
    /// Amount in base-asset tokens, already rounded to the lot size.
    pub amount: Size,
    /// Limit price, already on the tick grid.
    pub price: Price,
    /// Leverage applied to the asset before the order is sent.
    pub leverage: u32,
    pub client_id: ClientOrderId,
}

/// Operations a venue must support.
pub trait Exchange: Send + Sync {
    /// All tradable markets.
    fn fetch_markets(&self) -> BoxFuture<'_, ExchangeResult<Vec<Market>>>;

    /// Top of book for one pair.
    fn fetch_ticker<'a>(&'a self, pair: &'a Pair) -> BoxFuture<'a, ExchangeResult<Ticker>>;

    fn fetch_balance(&self) -> BoxFuture<'_, ExchangeResult<Balance>>;

    /// Every open position on the account.
    fn fetch_positions(&self) -> BoxFuture<'_, ExchangeResult<Vec<Position>>>;

    /// Resting orders for one pair.
    fn fetch_open_orders<'a>(&'a self, pair: &'a Pair)
        -> BoxFuture<'a, ExchangeResult<Vec<OpenOrder>>>;

    /// Submit a limit order.
    fn create_order(&self, request: OrderRequest) -> BoxFuture<'_, ExchangeResult<OrderAck>>;

    /// Cancel a resting order.
    fn cancel_order<'a>(&'a self, id: OrderId, pair: &'a Pair)
        -> BoxFuture<'a, ExchangeResult<()>>;
}
