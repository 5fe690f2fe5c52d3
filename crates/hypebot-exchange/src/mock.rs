//! In-memory exchange for tests and dry runs.
//!
//! Orders rest until cancelled; positions only change through
//! `set_position`/`clear_position`. Reads and writes can be made to fail.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::Utc;
use hypebot_core::{
    Balance, CurrencyBalance, Market, OpenOrder, OrderAck, OrderId, OrderStatus, Pair, Position,
    Price, Ticker, SETTLEMENT_ASSET,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::error::{ExchangeError, ExchangeResult};
use crate::exchange::{BoxFuture, Exchange, OrderRequest};

#[derive(Debug, Default)]
struct State {
    markets: Vec<Market>,
    tickers: HashMap<Pair, Ticker>,
    balance: Balance,
    positions: Vec<Position>,
    open_orders: Vec<OpenOrder>,
    placed: Vec<OrderRequest>,
    cancelled: Vec<OrderId>,
    fill_before_cancel: Vec<OrderId>,
    calls: HashMap<&'static str, usize>,
}

#[derive(Debug)]
pub struct MockExchange {
    state: Mutex<State>,
    next_order_id: AtomicU64,
    fail_reads: AtomicBool,
    reject_orders: Mutex<Option<String>>,
}

impl Default for MockExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExchange {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            next_order_id: AtomicU64::new(1),
            fail_reads: AtomicBool::new(false),
            reject_orders: Mutex::new(None),
        }
    }

    pub fn add_market(&self, pair: Pair, sz_decimals: u32, tick: Option<Decimal>) {
        let mut state = self.state.lock();
        let asset = state.markets.len() as u32;
        state.markets.push(Market {
            coin: pair.base().to_string(),
            pair,
            asset,
            sz_decimals,
            max_leverage: 50,
            price_tick: tick.map(Price::new),
        });
    }

    pub fn set_ticker(&self, pair: &Pair, bid: Option<Decimal>, ask: Option<Decimal>) {
        self.state.lock().tickers.insert(
            pair.clone(),
            Ticker {
                pair: pair.clone(),
                bid: bid.map(Price::new),
                ask: ask.map(Price::new),
                timestamp: Utc::now(),
            },
        );
    }

    /// Settlement-asset balance, fully free.
    pub fn set_collateral(&self, total: Decimal) {
        self.state.lock().balance = Balance::default().with_currency(
            SETTLEMENT_ASSET,
            CurrencyBalance {
                free: total,
                used: Decimal::ZERO,
                total,
            },
        );
    }

    /// Insert or replace the position on `position.pair`.
    pub fn set_position(&self, position: Position) {
        let mut state = self.state.lock();
        state.positions.retain(|p| p.pair != position.pair);
        state.positions.push(position);
    }

    pub fn clear_position(&self, pair: &Pair) {
        self.state.lock().positions.retain(|p| &p.pair != pair);
    }

    /// Make every read fail until reset.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Reject every order with `reason`, or accept again with `None`.
    pub fn reject_orders(&self, reason: Option<&str>) {
        *self.reject_orders.lock() = reason.map(str::to_string);
    }

    /// Fill `id` the moment a cancel for it arrives, so the cancel fails.
    pub fn fill_before_cancel(&self, id: OrderId) {
        self.state.lock().fill_before_cancel.push(id);
    }

    pub fn placed_orders(&self) -> Vec<OrderRequest> {
        self.state.lock().placed.clone()
    }

    pub fn cancelled_orders(&self) -> Vec<OrderId> {
        self.state.lock().cancelled.clone()
    }

    pub fn resting_orders(&self) -> Vec<OpenOrder> {
        self.state.lock().open_orders.clone()
    }

    /// How many times `operation` (a trait method name) was invoked.
    pub fn calls(&self, operation: &str) -> usize {
        self.state.lock().calls.get(operation).copied().unwrap_or(0)
    }

    fn record(&self, operation: &'static str) -> ExchangeResult<()> {
        *self.state.lock().calls.entry(operation).or_default() += 1;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ExchangeError::MarketData(format!("{operation}: venue unavailable")));
        }
        Ok(())
    }
}

impl Exchange for MockExchange {
    fn fetch_markets(&self) -> BoxFuture<'_, ExchangeResult<Vec<Market>>> {
        Box::pin(async move {
            self.record("fetch_markets")?;
            Ok(self.state.lock().markets.clone())
        })
    }

    fn fetch_ticker<'a>(&'a self, pair: &'a Pair) -> BoxFuture<'a, ExchangeResult<Ticker>> {
        Box::pin(async move {
            self.record("fetch_ticker")?;
            self.state
                .lock()
                .tickers
                .get(pair)
                .cloned()
                .ok_or_else(|| ExchangeError::MarketData(format!("no book for {pair}")))
        })
    }

    fn fetch_balance(&self) -> BoxFuture<'_, ExchangeResult<Balance>> {
        Box::pin(async move {
            self.record("fetch_balance")?;
            Ok(self.state.lock().balance.clone())
        })
    }

    fn fetch_positions(&self) -> BoxFuture<'_, ExchangeResult<Vec<Position>>> {
        Box::pin(async move {
            self.record("fetch_positions")?;
            Ok(self.state.lock().positions.clone())
        })
    }

    fn fetch_open_orders<'a>(
        &'a self,
        pair: &'a Pair,
    ) -> BoxFuture<'a, ExchangeResult<Vec<OpenOrder>>> {
        Box::pin(async move {
            self.record("fetch_open_orders")?;
            Ok(self
                .state
                .lock()
                .open_orders
                .iter()
                .filter(|o| &o.pair == pair)
                .cloned()
                .collect())
        })
    }

    fn create_order(&self, request: OrderRequest) -> BoxFuture<'_, ExchangeResult<OrderAck>> {
        Box::pin(async move {
            *self.state.lock().calls.entry("create_order").or_default() += 1;
            if let Some(reason) = self.reject_orders.lock().clone() {
                return Err(ExchangeError::OrderRejected(reason));
            }

            let id = OrderId(self.next_order_id.fetch_add(1, Ordering::SeqCst));
            let mut state = self.state.lock();
            state.open_orders.push(OpenOrder {
                id,
                pair: request.market.pair.clone(),
                side: request.side,
                price: request.price,
                amount: request.amount,
                timestamp: Utc::now(),
            });
            state.placed.push(request.clone());

            Ok(OrderAck {
                id,
                client_id: request.client_id,
                pair: request.market.pair,
                side: request.side,
                amount: request.amount,
                price: request.price,
                status: OrderStatus::Resting,
            })
        })
    }

    fn cancel_order<'a>(&'a self, id: OrderId, pair: &'a Pair) -> BoxFuture<'a, ExchangeResult<()>> {
        Box::pin(async move {
            let mut state = self.state.lock();
            *state.calls.entry("cancel_order").or_default() += 1;
            if state.fill_before_cancel.contains(&id) {
                state.open_orders.retain(|o| o.id != id);
            }
            let before = state.open_orders.len();
            state.open_orders.retain(|o| o.id != id);
            if state.open_orders.len() == before {
                return Err(ExchangeError::OrderRejected(format!(
                    "order {id} on {pair} is not open"
                )));
            }
            state.cancelled.push(id);
            Ok(())
        })
    }
}
