//! The bot store seam.

use std::pin::Pin;

use hypebot_core::{Bot, BotId, BotUpdate, NewBot};

use crate::error::StoreResult;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Persistent bot records.
pub trait BotStore: Send + Sync {
    /// All bots, newest first.
    fn list(&self) -> BoxFuture<'_, StoreResult<Vec<Bot>>>;

    /// One bot. Missing ids are `StoreError::NotFound`.
    fn get(&self, id: BotId) -> BoxFuture<'_, StoreResult<Bot>>;

    fn create(&self, bot: NewBot) -> BoxFuture<'_, StoreResult<Bot>>;

    /// Apply a partial update and return the stored result.
    fn update(&self, id: BotId, update: BotUpdate) -> BoxFuture<'_, StoreResult<Bot>>;

    fn delete(&self, id: BotId) -> BoxFuture<'_, StoreResult<()>>;
}
