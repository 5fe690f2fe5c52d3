//! Hyperliquid REST payloads and their conversion into domain types.
//!
//! Info endpoint: `POST /info` with `{"type": ...}`.
//! Exchange endpoint: `POST /exchange` with a signed action, answered by
//! `{"status": "ok" | "err", "response": ...}`.

use chrono::{DateTime, TimeZone, Utc};
use hypebot_core::{
    Balance, CurrencyBalance, Market, OpenOrder, OrderId, OrderSide, Pair, Position, PositionSide,
    Price, Size, SETTLEMENT_ASSET,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ExchangeError, ExchangeResult};

/// Maximum price decimals for perpetuals before subtracting `szDecimals`.
const MAX_PERP_DECIMALS: u32 = 6;

/// Significant figures the exchange accepts for prices.
const PRICE_SIG_FIGS: i64 = 5;

// =============================================================================
// Requests
// =============================================================================

/// Body of a `POST /info` request.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InfoRequest {
    MetaAndAssetCtxs,
    L2Book { coin: String },
    ClearinghouseState { user: String },
    OpenOrders { user: String },
}

// =============================================================================
// metaAndAssetCtxs
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub universe: Vec<AssetMeta>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetMeta {
    pub name: String,
    pub sz_decimals: u32,
    #[serde(default)]
    pub max_leverage: u32,
    #[serde(default)]
    pub is_delisted: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetCtx {
    #[serde(default)]
    pub mark_px: Option<Decimal>,
}

/// `[meta, [assetCtx...]]`
#[derive(Debug, Clone, Deserialize)]
pub struct MetaAndAssetCtxs(pub Meta, pub Vec<AssetCtx>);

impl MetaAndAssetCtxs {
    /// Listed markets. The asset index is the position in the universe.
    pub fn into_markets(self) -> Vec<Market> {
        let MetaAndAssetCtxs(meta, ctxs) = self;
        meta.universe
            .into_iter()
            .enumerate()
            .filter(|(_, asset)| !asset.is_delisted)
            .map(|(index, asset)| {
                let mark = ctxs.get(index).and_then(|ctx| ctx.mark_px);
                Market {
                    pair: Pair::perp(&asset.name),
                    price_tick: mark.map(|px| Price::new(price_tick(px, asset.sz_decimals))),
                    coin: asset.name,
                    asset: index as u32,
                    sz_decimals: asset.sz_decimals,
                    max_leverage: asset.max_leverage,
                }
            })
            .collect()
    }
}

/// Smallest valid price increment near `reference`.
///
/// The coarser of the decimal limit (`6 - szDecimals`) and the
/// five-significant-figure limit at the reference magnitude.
pub fn price_tick(reference: Decimal, sz_decimals: u32) -> Decimal {
    let decimal_tick = Decimal::new(1, MAX_PERP_DECIMALS.saturating_sub(sz_decimals));
    if reference <= Decimal::ZERO {
        return decimal_tick;
    }
    let exponent = magnitude(reference) - (PRICE_SIG_FIGS - 1);
    let sig_fig_tick = if exponent >= 0 {
        Decimal::from(10i64.pow(exponent as u32))
    } else {
        Decimal::new(1, (-exponent) as u32)
    };
    decimal_tick.max(sig_fig_tick)
}

fn magnitude(value: Decimal) -> i64 {
    let mut v = value.abs();
    let mut m = 0i64;
    while v >= Decimal::TEN {
        v /= Decimal::TEN;
        m += 1;
    }
    while v < Decimal::ONE && !v.is_zero() {
        v *= Decimal::TEN;
        m -= 1;
    }
    m
}

// =============================================================================
// l2Book
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct BookLevel {
    pub px: Decimal,
    pub sz: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct L2Book {
    pub coin: String,
    pub time: i64,
    /// `[bids, asks]`, best first.
    pub levels: (Vec<BookLevel>, Vec<BookLevel>),
}

impl L2Book {
    pub fn best_bid(&self) -> Option<Price> {
        self.levels.0.first().map(|l| Price::new(l.px))
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.levels.1.first().map(|l| Price::new(l.px))
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        millis_to_datetime(self.time)
    }
}

// =============================================================================
// clearinghouseState
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginSummary {
    pub account_value: Decimal,
    pub total_margin_used: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearinghouseState {
    pub margin_summary: MarginSummary,
    pub withdrawable: Decimal,
    #[serde(default)]
    pub asset_positions: Vec<AssetPosition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetPosition {
    pub position: PositionData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionData {
    pub coin: String,
    /// Signed size: positive long, negative short.
    pub szi: Decimal,
    #[serde(default)]
    pub entry_px: Option<Decimal>,
    pub position_value: Decimal,
}

impl ClearinghouseState {
    /// Settlement-asset balance: total is account value, free is withdrawable.
    pub fn balance(&self) -> Balance {
        Balance::default().with_currency(
            SETTLEMENT_ASSET,
            CurrencyBalance {
                free: self.withdrawable,
                used: self.margin_summary.total_margin_used,
                total: self.margin_summary.account_value,
            },
        )
    }

    /// Open positions. Zero-size entries are dropped.
    pub fn positions(&self) -> Vec<Position> {
        self.asset_positions
            .iter()
            .filter(|ap| !ap.position.szi.is_zero())
            .map(|ap| {
                let p = &ap.position;
                Position {
                    pair: Pair::perp(&p.coin),
                    side: if p.szi > Decimal::ZERO {
                        PositionSide::Long
                    } else {
                        PositionSide::Short
                    },
                    contracts: Size::new(p.szi.abs()),
                    contract_size: Decimal::ONE,
                    notional: p.position_value.abs(),
                    entry_price: p.entry_px.map(Price::new),
                }
            })
            .collect()
    }
}

// =============================================================================
// openOrders
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOrderData {
    pub coin: String,
    /// `"B"` (bid) or `"A"` (ask).
    pub side: String,
    pub limit_px: Decimal,
    pub sz: Decimal,
    pub oid: u64,
    pub timestamp: i64,
}

impl OpenOrderData {
    pub fn into_open_order(self) -> ExchangeResult<OpenOrder> {
        let side: OrderSide = self
            .side
            .parse()
            .map_err(|_| ExchangeError::MarketData(format!("unknown order side {}", self.side)))?;
        Ok(OpenOrder {
            id: OrderId(self.oid),
            pair: Pair::perp(&self.coin),
            side,
            price: Price::new(self.limit_px),
            amount: Size::new(self.sz),
            timestamp: millis_to_datetime(self.timestamp),
        })
    }
}

// =============================================================================
// Exchange endpoint responses
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "status", content = "response", rename_all = "lowercase")]
pub enum ExchangeResponse {
    Ok(serde_json::Value),
    Err(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusesData {
    pub statuses: Vec<ActionStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponsePayload {
    #[serde(default)]
    pub data: Option<StatusesData>,
}

/// Per-item status of an order or cancel action.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ActionStatus {
    Resting { resting: RestingStatus },
    Filled { filled: FilledStatus },
    Error { error: String },
    /// Plain `"success"` returned for cancels.
    Success(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RestingStatus {
    pub oid: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilledStatus {
    pub oid: u64,
    pub total_sz: Decimal,
    pub avg_px: Decimal,
}

impl ExchangeResponse {
    /// Statuses of an `ok` response, or the rejection message.
    pub fn into_statuses(self) -> ExchangeResult<Vec<ActionStatus>> {
        match self {
            Self::Err(message) => Err(ExchangeError::OrderRejected(message)),
            Self::Ok(value) => {
                let payload: ResponsePayload = serde_json::from_value(value)?;
                Ok(payload.data.map(|d| d.statuses).unwrap_or_default())
            }
        }
    }

    /// Succeeds on `ok`, ignoring any payload.
    pub fn into_ok(self) -> ExchangeResult<()> {
        match self {
            Self::Err(message) => Err(ExchangeError::OrderRejected(message)),
            Self::Ok(_) => Ok(()),
        }
    }
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now)
}
