//! Core domain types for the HypeBot reconciliation engine.
//!
//! This crate provides the types shared by every other crate:
//! - `Bot`, `BotId`: operator-declared directional exposure per pair
//! - `Pair`, `Market`: trading pair symbols and exchange precision rules
//! - `Price`, `Size`: precision-safe numeric types
//! - `Position`, `Ticker`, `Balance`, `OpenOrder`: read-only views of exchange state

pub mod bot;
pub mod decimal;
pub mod error;
pub mod market;
pub mod order;
pub mod types;

pub use bot::{Bot, BotId, BotUpdate, NewBot};
pub use decimal::{Price, Size};
pub use error::{CoreError, Result};
pub use market::{Market, Pair, DEFAULT_TICK_SIZE, MAX_SIG_FIGS, SETTLEMENT_ASSET};
pub use order::{ClientOrderId, OrderId, OrderSide, PositionSide};
pub use types::{Balance, CurrencyBalance, OpenOrder, OrderAck, OrderStatus, Position, Ticker};
