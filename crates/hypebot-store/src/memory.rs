//! In-process bot store.

use std::collections::HashMap;

use chrono::Utc;
use hypebot_core::{Bot, BotId, BotUpdate, NewBot};
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::store::{BotStore, BoxFuture};

#[derive(Debug, Default)]
pub struct InMemoryBotStore {
    bots: RwLock<HashMap<BotId, Bot>>,
}

impl InMemoryBotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated store.
    pub fn with_bots(bots: impl IntoIterator<Item = Bot>) -> Self {
        Self {
            bots: RwLock::new(bots.into_iter().map(|b| (b.id, b)).collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.bots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bots.read().is_empty()
    }
}

impl BotStore for InMemoryBotStore {
    fn list(&self) -> BoxFuture<'_, StoreResult<Vec<Bot>>> {
        Box::pin(async move {
            let mut bots: Vec<Bot> = self.bots.read().values().cloned().collect();
            bots.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
            Ok(bots)
        })
    }

    fn get(&self, id: BotId) -> BoxFuture<'_, StoreResult<Bot>> {
        Box::pin(async move {
            self.bots
                .read()
                .get(&id)
                .cloned()
                .ok_or(StoreError::NotFound(id))
        })
    }

    fn create(&self, bot: NewBot) -> BoxFuture<'_, StoreResult<Bot>> {
        Box::pin(async move {
            bot.validate()?;
            let bot = bot.into_bot(BotId::new(), Utc::now());
            self.bots.write().insert(bot.id, bot.clone());
            debug!(bot_id = %bot.id, pair = %bot.pair, "Bot created");
            Ok(bot)
        })
    }

    fn update(&self, id: BotId, update: BotUpdate) -> BoxFuture<'_, StoreResult<Bot>> {
        Box::pin(async move {
            update.validate()?;
            let mut bots = self.bots.write();
            let bot = bots.get_mut(&id).ok_or(StoreError::NotFound(id))?;
            bot.apply(&update, Utc::now());
            Ok(bot.clone())
        })
    }

    fn delete(&self, id: BotId) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            self.bots
                .write()
                .remove(&id)
                .map(|_| ())
                .ok_or(StoreError::NotFound(id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hypebot_core::Pair;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_create_get_update_delete() {
        let store = InMemoryBotStore::new();
        let bot = store
            .create(NewBot::new("sol trend", Pair::perp("SOL")))
            .await
            .unwrap();
        assert!(bot.is_flat());

        let fetched = store.get(bot.id).await.unwrap();
        assert_eq!(fetched, bot);

        let updated = store
            .update(bot.id, BotUpdate::direction(dec!(-1)))
            .await
            .unwrap();
        assert_eq!(updated.desired_direction, dec!(-1));
        assert!(updated.updated_at >= bot.updated_at);

        store.delete(bot.id).await.unwrap();
        assert!(store.get(bot.id).await.unwrap_err().is_not_found());
        assert!(store.delete(bot.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let now = Utc::now();
        let old = NewBot::new("old", Pair::perp("BTC")).into_bot(BotId::new(), now);
        let new = NewBot::new("new", Pair::perp("ETH"))
            .into_bot(BotId::new(), now + chrono::Duration::seconds(10));
        let store = InMemoryBotStore::with_bots([old.clone(), new.clone()]);

        let names: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn test_rejects_invalid_input() {
        let store = InMemoryBotStore::new();
        assert!(matches!(
            store.create(NewBot::new(" ", Pair::perp("BTC"))).await,
            Err(StoreError::Invalid(_))
        ));
        assert!(store.is_empty());

        let missing = store.update(BotId::new(), BotUpdate::direction(dec!(1))).await;
        assert!(missing.unwrap_err().is_not_found());
    }
}
