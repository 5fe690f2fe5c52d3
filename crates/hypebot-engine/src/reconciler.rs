//! One reconciliation step for one bot.
//!
//! The decision is made by [`plan`], a pure function over the position,
//! collateral and bot direction. [`Reconciler`] gathers those inputs through
//! the exchange facade, executes the plan and reports whether the bot had
//! already converged.

use std::sync::Arc;
use std::time::Instant;

use hypebot_core::{Bot, OrderAck, OrderSide, Position, Size};
use hypebot_exchange::{ExchangeError, ExchangeFacade};
use hypebot_telemetry::Metrics;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::error::EngineResult;
use crate::target::TargetParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerConfig {
    pub target: TargetParams,
    /// Leverage applied to every submitted order.
    pub order_leverage: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            target: TargetParams::default(),
            order_leverage: 5,
        }
    }
}

/// What a reconciliation should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcilePlan {
    /// Flat bot with no position.
    AlreadyFlat,
    /// Directional bot close enough to its target.
    WithinDeadband { delta: Decimal, deadband: Decimal },
    /// Flat bot holding a position: close all of it.
    Close { side: OrderSide, amount: Size },
    /// Directional bot outside the deadband: trade `notional` USD on `side`.
    Adjust { side: OrderSide, notional: Decimal },
}

impl ReconcilePlan {
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::AlreadyFlat | Self::WithinDeadband { .. })
    }
}

/// Decide the corrective action for a bot.
///
/// Flat bots ignore the deadband and close whatever is open.
pub fn plan(
    desired_direction: Decimal,
    position: Option<&Position>,
    collateral: Decimal,
    params: &TargetParams,
) -> ReconcilePlan {
    if desired_direction.is_zero() {
        return match position {
            None => ReconcilePlan::AlreadyFlat,
            Some(p) => ReconcilePlan::Close {
                side: p.side.closing_side(),
                amount: p.close_amount(),
            },
        };
    }

    let current = position.map(Position::signed_notional).unwrap_or_default();
    let wanted = params.target_notional(desired_direction, collateral);
    let delta = wanted - current;
    let deadband = params.deadband(collateral);

    if delta.is_zero() || delta.abs() < deadband {
        return ReconcilePlan::WithinDeadband { delta, deadband };
    }

    ReconcilePlan::Adjust {
        side: OrderSide::for_delta(delta),
        notional: delta.abs(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    AlreadyFlat,
    WithinDeadband { delta: Decimal, deadband: Decimal },
    OrderPlaced { ack: OrderAck, cancelled: usize },
}

impl ReconcileOutcome {
    /// True when no order was needed.
    pub fn is_converged(&self) -> bool {
        !matches!(self, Self::OrderPlaced { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::AlreadyFlat => "already_flat",
            Self::WithinDeadband { .. } => "within_deadband",
            Self::OrderPlaced { .. } => "order_placed",
        }
    }
}

#[derive(Clone)]
pub struct Reconciler {
    exchange: Arc<ExchangeFacade>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(exchange: Arc<ExchangeFacade>, config: ReconcilerConfig) -> Self {
        Self { exchange, config }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub fn exchange(&self) -> &Arc<ExchangeFacade> {
        &self.exchange
    }

    /// Move `bot` one step toward its target.
    ///
    /// Resting orders on the pair are cancelled before any submission, so at
    /// most one reconciliation order rests per pair.
    pub async fn reconcile(&self, bot: &Bot) -> EngineResult<ReconcileOutcome> {
        let started = Instant::now();
        let result = self.step(bot).await;
        let outcome = match &result {
            Ok(outcome) => outcome.label(),
            Err(e) => e.kind().as_str(),
        };
        Metrics::reconcile_duration(bot.pair.as_str(), outcome, started.elapsed().as_secs_f64());
        result
    }

    async fn step(&self, bot: &Bot) -> EngineResult<ReconcileOutcome> {
        let pair = &bot.pair;

        let (position, collateral) = tokio::try_join!(
            self.exchange.position(pair),
            self.exchange.account_collateral()
        )?;

        let plan = plan(
            bot.desired_direction,
            position.as_ref(),
            collateral,
            &self.config.target,
        );
        debug!(
            bot_id = %bot.id,
            pair = %pair,
            direction = %bot.desired_direction,
            collateral = %collateral,
            current = %position.as_ref().map(Position::signed_notional).unwrap_or_default(),
            plan = ?plan,
            "Reconciliation planned"
        );

        let (side, amount) = match plan {
            ReconcilePlan::AlreadyFlat => return Ok(ReconcileOutcome::AlreadyFlat),
            ReconcilePlan::WithinDeadband { delta, deadband } => {
                return Ok(ReconcileOutcome::WithinDeadband { delta, deadband })
            }
            ReconcilePlan::Close { side, amount } => (side, amount),
            ReconcilePlan::Adjust { side, notional } => {
                let price = self.exchange.price(pair, side).await?;
                let amount = Size::from_notional(notional, price).ok_or_else(|| {
                    ExchangeError::PriceUnavailable {
                        pair: pair.clone(),
                        side,
                    }
                })?;
                (side, amount)
            }
        };

        let cancelled = self.exchange.cancel_all_orders(pair).await?;
        let ack = self
            .exchange
            .place_order(pair, side, amount, self.config.order_leverage)
            .await?;

        info!(
            bot_id = %bot.id,
            pair = %pair,
            side = %side,
            amount = %ack.amount,
            price = %ack.price,
            cancelled,
            "Corrective order submitted"
        );

        Ok(ReconcileOutcome::OrderPlaced { ack, cancelled })
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hypebot_core::{BotId, NewBot, Pair, PositionSide};
    use hypebot_exchange::{FacadeConfig, MockExchange};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn btc() -> Pair {
        Pair::perp("BTC")
    }

    fn bot(direction: Decimal) -> Bot {
        let mut bot = NewBot::new("btc", btc()).into_bot(BotId::new(), Utc::now());
        bot.desired_direction = direction;
        bot
    }

    fn long(notional: Decimal, contracts: Decimal) -> Position {
        Position {
            pair: btc(),
            side: PositionSide::Long,
            contracts: Size::new(contracts),
            contract_size: dec!(1),
            notional,
            entry_price: None,
        }
    }

    fn setup() -> (Arc<MockExchange>, Reconciler) {
        let mock = Arc::new(MockExchange::new());
        mock.add_market(btc(), 3, Some(dec!(0.01)));
        mock.set_ticker(&btc(), Some(dec!(50)), Some(dec!(50.5)));
        mock.set_collateral(dec!(1000));
        let facade = Arc::new(ExchangeFacade::new(mock.clone(), FacadeConfig::default()));
        (mock, Reconciler::new(facade, ReconcilerConfig::default()))
    }

    #[test]
    fn test_plan_flat_closes_inverse_side() {
        let params = TargetParams::default();
        let short = Position {
            side: PositionSide::Short,
            contracts: Size::new(dec!(4)),
            contract_size: dec!(0.5),
            ..long(dec!(100), dec!(4))
        };

        assert_eq!(
            plan(dec!(0), Some(&short), dec!(1000), &params),
            ReconcilePlan::Close {
                side: OrderSide::Buy,
                amount: Size::new(dec!(2)),
            }
        );
        assert_eq!(
            plan(dec!(0), None, dec!(1000), &params),
            ReconcilePlan::AlreadyFlat
        );
    }

    #[test]
    fn test_plan_flat_ignores_deadband() {
        // Tiny position, far below the deadband: still closed.
        let tiny = long(dec!(1), dec!(0.02));
        assert!(matches!(
            plan(dec!(0), Some(&tiny), dec!(1000), &TargetParams::default()),
            ReconcilePlan::Close { side: OrderSide::Sell, .. }
        ));
    }

    #[test]
    fn test_plan_directional() {
        let params = TargetParams::default();

        assert_eq!(
            plan(dec!(1), None, dec!(1000), &params),
            ReconcilePlan::Adjust {
                side: OrderSide::Buy,
                notional: dec!(5000),
            }
        );

        let held = long(dec!(4900), dec!(98));
        assert_eq!(
            plan(dec!(1), Some(&held), dec!(1000), &params),
            ReconcilePlan::WithinDeadband {
                delta: dec!(100),
                deadband: dec!(500),
            }
        );

        // Long 5000 but wants short 2500: sell 7500.
        let full = long(dec!(5000), dec!(100));
        assert_eq!(
            plan(dec!(-0.5), Some(&full), dec!(1000), &params),
            ReconcilePlan::Adjust {
                side: OrderSide::Sell,
                notional: dec!(7500),
            }
        );
    }

    #[test]
    fn test_plan_exact_deadband_trades() {
        let held = long(dec!(4500), dec!(90));
        assert!(matches!(
            plan(dec!(1), Some(&held), dec!(1000), &TargetParams::default()),
            ReconcilePlan::Adjust { notional, .. } if notional == dec!(500)
        ));
    }

    #[test]
    fn test_plan_zero_collateral_is_converged() {
        let plan = plan(dec!(1), None, dec!(0), &TargetParams::default());
        assert!(plan.is_converged());
    }

    #[tokio::test]
    async fn test_buys_full_target_from_flat() {
        let (mock, reconciler) = setup();

        let outcome = reconciler.reconcile(&bot(dec!(1))).await.unwrap();
        assert!(!outcome.is_converged());

        let placed = mock.placed_orders();
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].side, OrderSide::Buy);
        assert_eq!(placed[0].amount.inner(), dec!(100));
        assert_eq!(placed[0].price.inner(), dec!(49.95));
        assert_eq!(placed[0].leverage, 5);
    }

    #[tokio::test]
    async fn test_every_attempt_is_timed() {
        use hypebot_telemetry::metrics::RECONCILE_DURATION_SECONDS;
        let timed = |outcome: &str| {
            RECONCILE_DURATION_SECONDS
                .with_label_values(&[btc().as_str(), outcome])
                .get_sample_count()
        };
        let (mock, reconciler) = setup();

        let before = timed("within_deadband");
        mock.set_position(long(dec!(5000), dec!(100)));
        reconciler.reconcile(&bot(dec!(1))).await.unwrap();
        assert!(timed("within_deadband") > before);

        let before = timed("market_data");
        reconciler.exchange().invalidate_all();
        mock.fail_reads(true);
        assert!(reconciler.reconcile(&bot(dec!(1))).await.is_err());
        assert!(timed("market_data") > before);
    }

    #[tokio::test]
    async fn test_within_deadband_places_nothing() {
        let (mock, reconciler) = setup();
        mock.set_position(long(dec!(4900), dec!(98)));

        let outcome = reconciler.reconcile(&bot(dec!(1))).await.unwrap();
        assert!(outcome.is_converged());
        assert!(matches!(outcome, ReconcileOutcome::WithinDeadband { .. }));
        assert!(mock.placed_orders().is_empty());
        assert_eq!(mock.calls("fetch_open_orders"), 0);
    }

    #[tokio::test]
    async fn test_flat_bot_closes_position() {
        let (mock, reconciler) = setup();
        mock.set_position(long(dec!(1500), dec!(30)));

        let outcome = reconciler.reconcile(&bot(dec!(0))).await.unwrap();
        assert!(!outcome.is_converged());

        let placed = mock.placed_orders();
        assert_eq!(placed[0].side, OrderSide::Sell);
        assert_eq!(placed[0].amount.inner(), dec!(30));
        // Sells quote off the ask.
        assert_eq!(placed[0].price.inner(), dec!(50.55));
    }

    #[tokio::test]
    async fn test_flat_without_position_is_converged() {
        let (mock, reconciler) = setup();
        let outcome = reconciler.reconcile(&bot(dec!(0))).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::AlreadyFlat);
        assert_eq!(mock.calls("create_order"), 0);
    }

    #[tokio::test]
    async fn test_successive_attempts_leave_one_resting_order() {
        let (mock, reconciler) = setup();
        let bot = bot(dec!(1));

        reconciler.reconcile(&bot).await.unwrap();
        let second = reconciler.reconcile(&bot).await.unwrap();

        assert!(matches!(
            second,
            ReconcileOutcome::OrderPlaced { cancelled: 1, .. }
        ));
        assert_eq!(mock.placed_orders().len(), 2);
        assert_eq!(mock.cancelled_orders().len(), 1);
        assert_eq!(mock.resting_orders().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_order_propagates() {
        let (mock, reconciler) = setup();
        mock.reject_orders(Some("insufficient margin"));

        let err = reconciler.reconcile(&bot(dec!(1))).await.unwrap_err();
        assert_eq!(err.kind(), crate::FailureKind::OrderRejection);
    }

    #[tokio::test]
    async fn test_missing_book_side_is_market_data_error() {
        let (mock, reconciler) = setup();
        mock.set_ticker(&btc(), None, Some(dec!(50.5)));

        let err = reconciler.reconcile(&bot(dec!(1))).await.unwrap_err();
        assert_eq!(err.kind(), crate::FailureKind::MarketData);
        assert!(mock.placed_orders().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_proceeds_on_stale_cache() {
        let (mock, reconciler) = setup();
        mock.set_position(long(dec!(4900), dec!(98)));
        reconciler.reconcile(&bot(dec!(1))).await.unwrap();

        tokio::time::advance(Duration::from_secs(120)).await;
        mock.fail_reads(true);

        let outcome = reconciler.reconcile(&bot(dec!(1))).await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::WithinDeadband { .. }));
    }
}
