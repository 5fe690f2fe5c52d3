//! Execution scheduler.
//!
//! Per bot: `idle -> running -> idle | retry pending -> running`.
//!
//! - `execute_bot` is single-flight per bot ID (see [`RunningSet`])
//! - a non-converged attempt schedules a delayed re-attempt on the tokio timer,
//!   at most one per bot however many callers reach it
//! - the driver re-scans every bot on a fixed interval
//! - `shutdown` stops the driver and drops every pending retry

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use hypebot_core::BotId;
use hypebot_store::{BotStore, BoxFuture};
use hypebot_telemetry::Metrics;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{EngineError, EngineResult, FailureKind};
use crate::reconciler::{ReconcileOutcome, Reconciler};
use crate::running::RunningSet;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Delay before re-attempting a bot that did not converge.
    pub retry_delay: Duration,
    /// Interval of the full re-scan.
    pub scan_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(60),
            scan_interval: Duration::from_secs(60),
        }
    }
}

/// Result of one `execute_bot` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "failure", rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Another reconciliation for this bot was in flight.
    Skipped,
    /// No order was needed.
    Converged,
    /// An order was placed; a re-attempt is scheduled.
    Pending,
    /// The bot no longer exists; nothing is scheduled.
    Missing,
    /// The attempt failed; a re-attempt is scheduled.
    Failed(FailureKind),
}

impl ExecutionStatus {
    fn needs_retry(&self) -> bool {
        matches!(self, Self::Pending | Self::Failed(_))
    }
}

/// Tally of one full scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub bots: usize,
    pub converged: usize,
    pub pending: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ScanSummary {
    fn record(&mut self, status: ExecutionStatus) {
        match status {
            ExecutionStatus::Converged => self.converged += 1,
            ExecutionStatus::Pending => self.pending += 1,
            ExecutionStatus::Skipped => self.skipped += 1,
            ExecutionStatus::Missing | ExecutionStatus::Failed(_) => self.failed += 1,
        }
    }
}

struct Inner {
    store: Arc<dyn BotStore>,
    reconciler: Reconciler,
    running: Arc<RunningSet>,
    /// Bots with a retry timer armed.
    retries: Mutex<HashSet<BotId>>,
    config: SchedulerConfig,
    shutdown: CancellationToken,
}

#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn BotStore>, reconciler: Reconciler, config: SchedulerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                reconciler,
                running: Arc::new(RunningSet::new()),
                retries: Mutex::new(HashSet::new()),
                config,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.inner.reconciler
    }

    /// Reconcile one bot unless it is already running.
    ///
    /// Never returns an error: failures are logged, counted and retried
    /// after `retry_delay`.
    pub async fn execute_bot(&self, id: BotId) -> ExecutionStatus {
        run(Arc::clone(&self.inner), id).await
    }

    /// Execute every stored bot concurrently.
    pub async fn execute_all(&self) -> EngineResult<ScanSummary> {
        let bots = self.inner.store.list().await?;
        let mut summary = ScanSummary {
            bots: bots.len(),
            ..Default::default()
        };
        if bots.is_empty() {
            debug!("No bots to execute");
            return Ok(summary);
        }

        let statuses = join_all(bots.iter().map(|bot| self.execute_bot(bot.id))).await;
        for status in statuses {
            summary.record(status);
        }

        info!(
            bots = summary.bots,
            converged = summary.converged,
            pending = summary.pending,
            skipped = summary.skipped,
            failed = summary.failed,
            "Scan complete"
        );
        Ok(summary)
    }

    /// Run `execute_all` every `scan_interval` until shutdown.
    ///
    /// The first scan runs immediately.
    pub fn spawn_driver(&self) -> JoinHandle<()> {
        let scheduler = self.clone();
        let token = self.inner.shutdown.clone();
        let period = self.inner.config.scan_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(interval_secs = period.as_secs(), "Scan driver started");

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        info!("Scan driver stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = scheduler.execute_all().await {
                            error!(error = %e, "Scan failed to list bots");
                        }
                    }
                }
            }
        })
    }

    /// Bots currently reconciling.
    pub fn running_bots(&self) -> Vec<BotId> {
        self.inner.running.snapshot()
    }

    /// Bots waiting on a retry timer, sorted.
    pub fn pending_retries(&self) -> Vec<BotId> {
        let mut ids: Vec<BotId> = self.inner.retries.lock().iter().copied().collect();
        ids.sort();
        ids
    }

    /// Stop the driver and every pending retry. In-flight reconciliations
    /// finish on their own.
    pub fn shutdown(&self) {
        info!("Scheduler shutting down");
        self.inner.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.inner.config)
            .field("running", &self.inner.running.len())
            .field("retries", &self.inner.retries.lock().len())
            .finish_non_exhaustive()
    }
}

// Boxed so the retry task can call back into `run`.
fn run(inner: Arc<Inner>, id: BotId) -> BoxFuture<'static, ExecutionStatus> {
    Box::pin(async move {
        let Some(guard) = inner.running.try_acquire(id) else {
            Metrics::execution_skipped();
            debug!(bot_id = %id, "Bot already running, skipping");
            return ExecutionStatus::Skipped;
        };

        let status = match attempt(&inner, id).await {
            Ok(outcome) => {
                Metrics::reconciliation(outcome.label());
                if outcome.is_converged() {
                    debug!(bot_id = %id, outcome = outcome.label(), "Bot converged");
                    ExecutionStatus::Converged
                } else {
                    ExecutionStatus::Pending
                }
            }
            Err(e) if e.is_not_found() => {
                warn!(bot_id = %id, "Bot not found, dropping");
                ExecutionStatus::Missing
            }
            Err(e) => {
                let kind = e.kind();
                Metrics::reconciliation(kind.as_str());
                warn!(bot_id = %id, kind = %kind, error = %e, "Reconciliation failed");
                ExecutionStatus::Failed(kind)
            }
        };
        drop(guard);

        if status.needs_retry() {
            schedule_retry(inner, id);
        }
        status
    })
}

async fn attempt(inner: &Inner, id: BotId) -> Result<ReconcileOutcome, EngineError> {
    let bot = inner.store.get(id).await?;
    inner.reconciler.reconcile(&bot).await
}

fn schedule_retry(inner: Arc<Inner>, id: BotId) {
    if inner.shutdown.is_cancelled() {
        return;
    }
    if !inner.retries.lock().insert(id) {
        debug!(bot_id = %id, "Retry already pending");
        return;
    }
    let delay = inner.config.retry_delay;
    Metrics::retry_scheduled();
    debug!(bot_id = %id, delay_secs = delay.as_secs(), "Retry scheduled");

    tokio::spawn(async move {
        let token = inner.shutdown.clone();
        tokio::select! {
            _ = token.cancelled() => {
                inner.retries.lock().remove(&id);
                debug!(bot_id = %id, "Retry dropped on shutdown");
            }
            _ = tokio::time::sleep(delay) => {
                // Cleared before the attempt so its own outcome can re-arm.
                inner.retries.lock().remove(&id);
                run(inner, id).await;
            }
        }
    });
}
