//! Single-flight guard keyed by bot ID.

use std::collections::HashSet;
use std::sync::Arc;

use hypebot_core::BotId;
use hypebot_telemetry::Metrics;
use parking_lot::Mutex;

/// Bots with a reconciliation in flight.
#[derive(Debug, Default)]
pub struct RunningSet {
    ids: Mutex<HashSet<BotId>>,
}

impl RunningSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` as running.
    ///
    /// Returns `None` if it already is. The mark is removed when the guard
    /// drops, on every exit path including panics and cancellation.
    pub fn try_acquire(self: &Arc<Self>, id: BotId) -> Option<RunningGuard> {
        if !self.ids.lock().insert(id) {
            return None;
        }
        Metrics::bot_started();
        Some(RunningGuard {
            set: Arc::clone(self),
            id,
        })
    }

    pub fn contains(&self, id: BotId) -> bool {
        self.ids.lock().contains(&id)
    }

    pub fn snapshot(&self) -> Vec<BotId> {
        let mut ids: Vec<BotId> = self.ids.lock().iter().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.lock().is_empty()
    }
}

/// RAII membership in a [`RunningSet`].
#[derive(Debug)]
pub struct RunningGuard {
    set: Arc<RunningSet>,
    id: BotId,
}

impl RunningGuard {
    pub fn id(&self) -> BotId {
        self.id
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.set.ids.lock().remove(&self.id);
        Metrics::bot_finished();
    }
}
