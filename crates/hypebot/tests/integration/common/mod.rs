//! Shared harness.

use std::sync::Arc;

use hypebot::{AppConfig, Application};
use hypebot_core::{Pair, Position, PositionSide, Size};
use hypebot_exchange::MockExchange;
use hypebot_store::{BotStore, InMemoryBotStore};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub fn sol() -> Pair {
    Pair::perp("SOL")
}

/// SOL at 50 / 50.1, 1000 USDC collateral, no positions.
pub fn harness() -> (Arc<MockExchange>, Application) {
    let mock = Arc::new(MockExchange::new());
    mock.add_market(sol(), 2, Some(dec!(0.001)));
    mock.set_ticker(&sol(), Some(dec!(50)), Some(dec!(50.1)));
    mock.set_collateral(dec!(1000));

    let store: Arc<dyn BotStore> = Arc::new(InMemoryBotStore::new());
    let app = Application::with_components(AppConfig::default(), mock.clone(), store);
    (mock, app)
}

pub fn long(notional: Decimal, tokens: Decimal) -> Position {
    Position {
        pair: sol(),
        side: PositionSide::Long,
        contracts: Size::new(tokens),
        contract_size: Decimal::ONE,
        notional,
        entry_price: None,
    }
}
