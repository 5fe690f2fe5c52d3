//! Bot CRUD on top of the store, wired to the scheduler.

use std::sync::Arc;

use hypebot_core::{Bot, BotId, BotUpdate, NewBot};
use hypebot_store::BotStore;
use serde::Serialize;
use tracing::info;

use crate::error::EngineResult;
use crate::scheduler::{ExecutionStatus, Scheduler};

/// Stored bot after an update, plus the execution it triggered.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateOutcome {
    pub bot: Bot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionStatus>,
}

#[derive(Clone)]
pub struct BotService {
    store: Arc<dyn BotStore>,
    scheduler: Scheduler,
}

impl BotService {
    pub fn new(store: Arc<dyn BotStore>, scheduler: Scheduler) -> Self {
        Self { store, scheduler }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub async fn list(&self) -> EngineResult<Vec<Bot>> {
        Ok(self.store.list().await?)
    }

    pub async fn get(&self, id: BotId) -> EngineResult<Bot> {
        Ok(self.store.get(id).await?)
    }

    /// Create a flat bot. Name and pair are required.
    pub async fn create(&self, bot: NewBot) -> EngineResult<Bot> {
        bot.validate()?;
        let bot = self.store.create(bot).await?;
        info!(bot_id = %bot.id, name = %bot.name, pair = %bot.pair, "Bot created");
        Ok(bot)
    }

    /// Apply a partial update. A direction change reconciles immediately.
    pub async fn update(&self, id: BotId, update: BotUpdate) -> EngineResult<UpdateOutcome> {
        update.validate()?;
        let bot = self.store.update(id, update.clone()).await?;
        info!(
            bot_id = %id,
            direction = %bot.desired_direction,
            "Bot updated"
        );

        let execution = if update.touches_direction() {
            Some(self.scheduler.execute_bot(id).await)
        } else {
            None
        };
        Ok(UpdateOutcome { bot, execution })
    }

    pub async fn delete(&self, id: BotId) -> EngineResult<()> {
        self.store.delete(id).await?;
        info!(bot_id = %id, "Bot deleted");
        Ok(())
    }
}

impl std::fmt::Debug for BotService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotService")
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::reconciler::{Reconciler, ReconcilerConfig};
    use crate::scheduler::SchedulerConfig;
    use hypebot_core::{OrderSide, Pair};
    use hypebot_exchange::{ExchangeFacade, FacadeConfig, MockExchange};
    use hypebot_store::InMemoryBotStore;
    use rust_decimal_macros::dec;

    fn setup() -> (Arc<MockExchange>, BotService) {
        let mock = Arc::new(MockExchange::new());
        mock.add_market(Pair::perp("SOL"), 2, None);
        mock.set_ticker(&Pair::perp("SOL"), Some(dec!(100)), Some(dec!(100.2)));
        mock.set_collateral(dec!(500));

        let store: Arc<dyn BotStore> = Arc::new(InMemoryBotStore::new());
        let facade = Arc::new(ExchangeFacade::new(mock.clone(), FacadeConfig::default()));
        let scheduler = Scheduler::new(
            Arc::clone(&store),
            Reconciler::new(facade, ReconcilerConfig::default()),
            SchedulerConfig::default(),
        );
        (mock, BotService::new(store, scheduler))
    }

    #[tokio::test]
    async fn test_create_starts_flat() {
        let (mock, service) = setup();
        let bot = service
            .create(NewBot::new("sol", Pair::perp("SOL")))
            .await
            .unwrap();

        assert!(bot.is_flat());
        assert_eq!(service.list().await.unwrap(), vec![bot]);
        assert_eq!(mock.calls("create_order"), 0);
    }

    #[tokio::test]
    async fn test_create_requires_name_and_pair() {
        let (_mock, service) = setup();
        assert!(matches!(
            service.create(NewBot::new("", Pair::perp("SOL"))).await,
            Err(EngineError::Invalid(_))
        ));
        assert!(service
            .create(NewBot::new("x", Pair::new("")))
            .await
            .is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_direction_update_executes() {
        let (mock, service) = setup();
        let bot = service
            .create(NewBot::new("sol", Pair::perp("SOL")))
            .await
            .unwrap();

        let outcome = service
            .update(bot.id, BotUpdate::direction(dec!(-0.5)))
            .await
            .unwrap();
        assert_eq!(outcome.bot.desired_direction, dec!(-0.5));
        assert_eq!(outcome.execution, Some(ExecutionStatus::Pending));

        // Target -1250 USD, sold off the ask.
        let placed = mock.placed_orders();
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].side, OrderSide::Sell);
        assert_eq!(placed[0].amount.inner(), dec!(12.47));
        service.scheduler().shutdown();
    }

    #[tokio::test]
    async fn test_rename_does_not_execute() {
        let (mock, service) = setup();
        let bot = service
            .create(NewBot::new("sol", Pair::perp("SOL")))
            .await
            .unwrap();

        let update = BotUpdate {
            name: Some("sol swing".to_string()),
            ..Default::default()
        };
        let outcome = service.update(bot.id, update).await.unwrap();
        assert_eq!(outcome.bot.name, "sol swing");
        assert!(outcome.execution.is_none());
        assert_eq!(mock.calls("fetch_positions"), 0);
    }

    #[tokio::test]
    async fn test_delete() {
        let (_mock, service) = setup();
        let bot = service
            .create(NewBot::new("sol", Pair::perp("SOL")))
            .await
            .unwrap();

        service.delete(bot.id).await.unwrap();
        assert!(service.get(bot.id).await.unwrap_err().is_not_found());
    }
}
