//! Order and position sides plus order identifiers.

use crate::error::CoreError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Side that moves exposure by a signed notional delta.
    ///
    /// Positive deltas buy, zero or negative deltas sell.
    pub fn for_delta(delta: Decimal) -> Self {
        if delta > Decimal::ZERO {
            Self::Buy
        } else {
            Self::Sell
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, Self::Buy)
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

impl FromStr for OrderSide {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buy" | "b" => Ok(Self::Buy),
            "sell" | "a" => Ok(Self::Sell),
            other => Err(CoreError::InvalidSide(other.to_string())),
        }
    }
}

/// Side of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// +1 for long, -1 for short.
    pub fn sign(&self) -> Decimal {
        match self {
            Self::Long => Decimal::ONE,
            Self::Short => Decimal::NEGATIVE_ONE,
        }
    }

    /// Order side that reduces this position.
    pub fn closing_side(&self) -> OrderSide {
        match self {
            Self::Long => OrderSide::Sell,
            Self::Short => OrderSide::Buy,
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "long"),
            Self::Short => write!(f, "short"),
        }
    }
}

/// Exchange-assigned order identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client order ID attached to every submission.
///
/// Format: `0x` followed by 32 hex characters (a 128-bit value).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientOrderId(String);

impl ClientOrderId {
    /// Create a new unique client order ID.
    pub fn new() -> Self {
        Self(format!("0x{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientOrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_order_side_opposite() {
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
        assert_eq!(OrderSide::Sell.opposite(), OrderSide::Buy);
    }

    #[test]
    fn test_order_side_for_delta() {
        assert_eq!(OrderSide::for_delta(dec!(5000)), OrderSide::Buy);
        assert_eq!(OrderSide::for_delta(dec!(-0.01)), OrderSide::Sell);
    }

    #[test]
    fn test_order_side_parse() {
        assert_eq!("BUY".parse::<OrderSide>().unwrap(), OrderSide::Buy);
        assert_eq!("a".parse::<OrderSide>().unwrap(), OrderSide::Sell);
        assert!("hold".parse::<OrderSide>().is_err());
    }

    #[test]
    fn test_position_side_closing() {
        assert_eq!(PositionSide::Long.closing_side(), OrderSide::Sell);
        assert_eq!(PositionSide::Short.closing_side(), OrderSide::Buy);
        assert_eq!(PositionSide::Short.sign(), dec!(-1));
    }

    #[test]
    fn test_client_order_id_format() {
        let id = ClientOrderId::new();
        assert!(id.as_str().starts_with("0x"));
        assert_eq!(id.as_str().len(), 34);
        assert_ne!(id, ClientOrderId::new());
    }
}
