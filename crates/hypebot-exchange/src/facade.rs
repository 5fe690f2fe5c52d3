//! Cached exchange facade.
//!
//! Every read goes through one shared-TTL cache, except the open-order list
//! that `cancel_all_orders` acts on. Any successful mutation
//! (order placement, cancellation) drops the whole cache, since fills move
//! balance and every position.

use std::sync::Arc;
use std::time::Duration;

use hypebot_core::{
    Balance, ClientOrderId, Market, OpenOrder, OrderAck, OrderId, OrderSide, Pair, Position,
    Price, Size, Ticker,
};
use hypebot_telemetry::Metrics;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::cache::CacheGeneration;
use crate::error::{ExchangeError, ExchangeResult};
use crate::exchange::{Exchange, OrderRequest};

/// Facade tuning.
#[derive(Debug, Clone)]
pub struct FacadeConfig {
    /// Freshness window shared by every cached read.
    pub cache_ttl: Duration,
    /// Ticks between the reference price and the limit price.
    pub limit_offset_ticks: u32,
}

impl Default for FacadeConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(60),
            limit_offset_ticks: 5,
        }
    }
}

pub struct ExchangeFacade {
    exchange: Arc<dyn Exchange>,
    cache: RwLock<Arc<CacheGeneration>>,
    config: FacadeConfig,
}

impl ExchangeFacade {
    pub fn new(exchange: Arc<dyn Exchange>, config: FacadeConfig) -> Self {
        Self {
            cache: RwLock::new(Arc::new(CacheGeneration::new(config.cache_ttl))),
            exchange,
            config,
        }
    }

    pub fn config(&self) -> &FacadeConfig {
        &self.config
    }

    fn cache(&self) -> Arc<CacheGeneration> {
        Arc::clone(&self.cache.read())
    }

    /// Replace every cached value with an empty generation.
    pub fn invalidate_all(&self) {
        *self.cache.write() = Arc::new(CacheGeneration::new(self.config.cache_ttl));
        Metrics::cache_invalidated();
        debug!("Exchange cache invalidated");
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    pub async fn markets(&self) -> ExchangeResult<Vec<Market>> {
        let cache = self.cache();
        cache
            .markets
            .get_or_refresh((), "markets", || self.exchange.fetch_markets())
            .await
    }

    pub async fn market(&self, pair: &Pair) -> ExchangeResult<Market> {
        self.markets()
            .await?
            .into_iter()
            .find(|m| &m.pair == pair)
            .ok_or_else(|| ExchangeError::MarketNotFound(pair.clone()))
    }

    pub async fn ticker(&self, pair: &Pair) -> ExchangeResult<Ticker> {
        let cache = self.cache();
        cache
            .tickers
            .get_or_refresh(pair.clone(), "ticker", || self.exchange.fetch_ticker(pair))
            .await
    }

    /// Reference price for `side`: bid for buys, ask for sells.
    pub async fn price(&self, pair: &Pair, side: OrderSide) -> ExchangeResult<Price> {
        self.ticker(pair)
            .await?
            .price_for(side)
            .ok_or_else(|| ExchangeError::PriceUnavailable {
                pair: pair.clone(),
                side,
            })
    }

    pub async fn balance(&self) -> ExchangeResult<Balance> {
        let cache = self.cache();
        cache
            .balance
            .get_or_refresh((), "balance", || self.exchange.fetch_balance())
            .await
    }

    pub async fn positions(&self) -> ExchangeResult<Vec<Position>> {
        let cache = self.cache();
        cache
            .positions
            .get_or_refresh((), "positions", || self.exchange.fetch_positions())
            .await
    }

    /// Open position on `pair`, if any.
    pub async fn position(&self, pair: &Pair) -> ExchangeResult<Option<Position>> {
        Ok(self
            .positions()
            .await?
            .into_iter()
            .find(|p| &p.pair == pair && p.is_open()))
    }

    /// Settlement-asset total.
    pub async fn account_collateral(&self) -> ExchangeResult<rust_decimal::Decimal> {
        Ok(self.balance().await?.collateral())
    }

    pub async fn open_orders(&self, pair: &Pair) -> ExchangeResult<Vec<OpenOrder>> {
        let cache = self.cache();
        cache
            .open_orders
            .get_or_refresh(pair.clone(), "open_orders", || {
                self.exchange.fetch_open_orders(pair)
            })
            .await
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Submit a limit order `limit_offset_ticks` away from the side's
    /// reference price.
    ///
    /// The amount is rounded down to the market's lot size; an amount that
    /// rounds to zero is rejected before anything is sent.
    pub async fn place_order(
        &self,
        pair: &Pair,
        side: OrderSide,
        amount: Size,
        leverage: u32,
    ) -> ExchangeResult<OrderAck> {
        let market = self.market(pair).await?;
        let reference = self.price(pair, side).await?;
        let price = market.limit_price(reference, side, self.config.limit_offset_ticks);
        let amount = market.round_size(amount);

        if !amount.is_positive() {
            return Err(ExchangeError::OrderRejected(format!(
                "order size rounds to zero for {pair} (lot {})",
                market.lot_size()
            )));
        }
        if !price.is_positive() {
            return Err(ExchangeError::PriceUnavailable {
                pair: pair.clone(),
                side,
            });
        }

        let request = OrderRequest {
            market,
            side,
            amount,
            price,
            leverage,
            client_id: ClientOrderId::new(),
        };
        let ack = self.exchange.create_order(request).await?;
        self.invalidate_all();

        Metrics::order_placed(pair.as_str(), &side.to_string());
        info!(
            pair = %pair,
            side = %side,
            amount = %ack.amount,
            price = %ack.price,
            reference = %reference,
            order_id = %ack.id,
            "Order placed"
        );
        Ok(ack)
    }

    /// Cancel every resting order on `pair`. Returns how many were cancelled.
    ///
    /// The order list is always read live, never from the cache. If a cancel
    /// fails after earlier ones succeeded, the cache is still invalidated
    /// before the error is returned.
    pub async fn cancel_all_orders(&self, pair: &Pair) -> ExchangeResult<usize> {
        let orders = self.exchange.fetch_open_orders(pair).await?;
        if orders.is_empty() {
            return Ok(0);
        }

        let mut cancelled = 0;
        let mut failure = None;
        for order in &orders {
            match self.exchange.cancel_order(order.id, pair).await {
                Ok(()) => cancelled += 1,
                Err(e) => {
                    warn!(pair = %pair, order_id = %order.id, error = %e, "Cancel failed");
                    failure = Some(e);
                    break;
                }
            }
        }

        if cancelled > 0 {
            self.invalidate_all();
            Metrics::orders_cancelled(pair.as_str(), cancelled);
            info!(pair = %pair, count = cancelled, "Cancelled open orders");
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(cancelled),
        }
    }

    pub async fn cancel_order(&self, id: OrderId, pair: &Pair) -> ExchangeResult<()> {
        self.exchange.cancel_order(id, pair).await?;
        self.invalidate_all();
        Metrics::orders_cancelled(pair.as_str(), 1);
        Ok(())
    }
}
