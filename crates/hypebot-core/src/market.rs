//! Trading pair symbols and market precision rules.
//!
//! Pairs use unified symbols (`BTC/USDC:USDC` for the BTC perpetual settled
//! in USDC). A `Market` carries the exchange metadata needed to turn a
//! reference price and a token amount into a valid limit order.

use crate::error::CoreError;
use crate::order::OrderSide;
use crate::{Price, Size};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Asset whose balance is the account collateral.
pub const SETTLEMENT_ASSET: &str = "USDC";

/// Tick size used when the market does not report one.
pub const DEFAULT_TICK_SIZE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Maximum significant figures accepted for non-integer prices.
pub const MAX_SIG_FIGS: u32 = 5;

/// Maximum price decimals for perpetuals before subtracting `sz_decimals`.
const MAX_PERP_DECIMALS: u32 = 6;

/// Unified trading pair symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pair(String);

impl Pair {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    /// Perpetual pair for `coin` settled in the settlement asset.
    pub fn perp(coin: &str) -> Self {
        Self(format!("{coin}/{SETTLEMENT_ASSET}:{SETTLEMENT_ASSET}"))
    }

    /// Base asset (the exchange coin name): `BTC` for `BTC/USDC:USDC`.
    pub fn base(&self) -> &str {
        self.0.split('/').next().unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.0.trim().is_empty()
            || self.base().is_empty()
            || self.0.chars().any(char::is_whitespace)
        {
            return Err(CoreError::InvalidPair(self.0.clone()));
        }
        Ok(())
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Pair {
    type Err = CoreError;

    /// Accepts a unified symbol or a bare coin (`ETH` becomes `ETH/USDC:USDC`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let pair = if s.contains('/') {
            Self::new(s)
        } else {
            Self::perp(s)
        };
        pair.validate()?;
        Ok(pair)
    }
}

/// Exchange market metadata for one pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    pub pair: Pair,
    /// Exchange coin name.
    pub coin: String,
    /// Exchange asset index used in order actions.
    pub asset: u32,
    /// Size decimals: amounts are multiples of `10^-sz_decimals`.
    pub sz_decimals: u32,
    pub max_leverage: u32,
    /// Price precision reported by the exchange, if known.
    pub price_tick: Option<Price>,
}

impl Market {
    /// Tick size, falling back to [`DEFAULT_TICK_SIZE`].
    pub fn tick_size(&self) -> Price {
        self.price_tick
            .filter(Price::is_positive)
            .unwrap_or(Price::new(DEFAULT_TICK_SIZE))
    }

    /// Minimum amount increment.
    pub fn lot_size(&self) -> Size {
        Size::new(Decimal::new(1, self.sz_decimals))
    }

    pub fn max_price_decimals(&self) -> u32 {
        MAX_PERP_DECIMALS.saturating_sub(self.sz_decimals)
    }

    /// Limit price `offset_ticks` away from `reference`, on the passive side.
    ///
    /// Buys sit below the reference, sells above it.
    pub fn limit_price(&self, reference: Price, side: OrderSide, offset_ticks: u32) -> Price {
        let tick = self.tick_size();
        let adjustment = tick * Decimal::from(offset_ticks);
        match side {
            OrderSide::Buy => (reference - adjustment).floor_to_tick(tick),
            OrderSide::Sell => (reference + adjustment).ceil_to_tick(tick),
        }
    }

    /// Format a price for order submission.
    ///
    /// Integer prices are always accepted. Otherwise the value is truncated to
    /// [`MAX_SIG_FIGS`] significant figures and `max_price_decimals` decimals.
    pub fn format_price(&self, price: Price) -> String {
        let value = price.inner();
        if value.fract().is_zero() {
            return strip_trailing_zeros(value.trunc());
        }
        let truncated = truncate_sig_figs(value, MAX_SIG_FIGS)
            .trunc_with_scale(self.max_price_decimals());
        strip_trailing_zeros(truncated)
    }

    /// Format an amount for order submission, always rounding down to the lot.
    pub fn format_size(&self, size: Size) -> String {
        let rounded = size.inner().trunc_with_scale(self.sz_decimals);
        strip_trailing_zeros(rounded)
    }

    /// Amount after exchange rounding.
    pub fn round_size(&self, size: Size) -> Size {
        Size::new(size.inner().trunc_with_scale(self.sz_decimals))
    }
}

/// Truncate toward zero keeping `sig_figs` significant digits.
fn truncate_sig_figs(value: Decimal, sig_figs: u32) -> Decimal {
    if value.is_zero() || sig_figs == 0 {
        return Decimal::ZERO;
    }
    let magnitude = order_of_magnitude(value.abs());
    let keep = sig_figs as i64 - magnitude - 1;
    if keep >= 0 {
        value.trunc_with_scale(keep as u32)
    } else {
        let factor = Decimal::from(10i64.pow((-keep) as u32));
        (value / factor).trunc() * factor
    }
}

/// Power of ten of the leading digit: 12345 -> 4, 0.00123 -> -3.
fn order_of_magnitude(value: Decimal) -> i64 {
    let mut magnitude = 0i64;
    let mut v = value;
    let ten = Decimal::TEN;
    if v >= Decimal::ONE {
        while v >= ten {
            v /= ten;
            magnitude += 1;
        }
    } else {
        while v < Decimal::ONE && !v.is_zero() {
            v *= ten;
            magnitude -= 1;
        }
    }
    magnitude
}

fn strip_trailing_zeros(value: Decimal) -> String {
    value.normalize().to_string()
}
