//! Nonce generation for signed actions.
//!
//! The exchange expects nonces close to the current time in milliseconds and
//! rejects reuse, so each nonce is `max(last + 1, now_ms)`.

use std::sync::atomic::{AtomicU64, Ordering};

/// Source of wall-clock time in milliseconds since the Unix epoch.
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default()
    }
}

/// Strictly increasing, time-tracking nonces. Safe to share across tasks.
pub struct NonceManager<C: Clock = SystemClock> {
    last: AtomicU64,
    clock: C,
}

impl<C: Clock> NonceManager<C> {
    pub fn new(clock: C) -> Self {
        Self {
            last: AtomicU64::new(0),
            clock,
        }
    }

    pub fn next(&self) -> u64 {
        let now = self.clock.now_ms();
        loop {
            let current = self.last.load(Ordering::Acquire);
            let next = current.saturating_add(1).max(now);
            if self
                .last
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return next;
            }
        }
    }
}

impl Default for NonceManager<SystemClock> {
    fn default() -> Self {
        Self::new(SystemClock)
    }
}
