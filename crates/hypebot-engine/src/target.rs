//! Target notional and deadband.
//!
//! `target = direction * base_leverage * collateral`
//! `deadband = collateral * base_leverage / divisor`

use rust_decimal::Decimal;

/// System-wide sizing constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetParams {
    pub base_leverage: Decimal,
    /// Deadband is `1 / divisor` of the maximum notional.
    pub deadband_divisor: Decimal,
}

impl Default for TargetParams {
    fn default() -> Self {
        Self {
            base_leverage: Decimal::from(5),
            deadband_divisor: Decimal::TEN,
        }
    }
}

impl TargetParams {
    pub fn target_notional(&self, direction: Decimal, collateral: Decimal) -> Decimal {
        target_notional(direction, self.base_leverage, collateral)
    }

    pub fn deadband(&self, collateral: Decimal) -> Decimal {
        deadband(self.base_leverage, collateral, self.deadband_divisor)
    }
}

/// Signed notional the bot should hold.
pub fn target_notional(direction: Decimal, base_leverage: Decimal, collateral: Decimal) -> Decimal {
    direction * base_leverage * collateral
}

/// Corrections smaller than this are skipped. Zero for a zero divisor.
pub fn deadband(base_leverage: Decimal, collateral: Decimal, divisor: Decimal) -> Decimal {
    (collateral * base_leverage)
        .checked_div(divisor)
        .unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_target_notional() {
        assert_eq!(target_notional(dec!(1), dec!(5), dec!(1000)), dec!(5000));
        assert_eq!(target_notional(dec!(-0.5), dec!(5), dec!(1000)), dec!(-2500));
        assert_eq!(target_notional(dec!(0), dec!(5), dec!(1000)), dec!(0));
    }

    #[test]
    fn test_deadband_is_tenth_of_max_notional() {
        let params = TargetParams::default();
        assert_eq!(params.deadband(dec!(1000)), dec!(500));
        assert_eq!(deadband(dec!(5), dec!(1000), dec!(0)), dec!(0));
    }
}
