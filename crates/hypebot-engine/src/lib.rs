//! Reconciliation engine for HypeBot.
//!
//! - `target`: pure target-notional and deadband arithmetic
//! - `Reconciler`: one corrective step from current position toward target
//! - `RunningSet`: per-bot single-flight guard
//! - `Scheduler`: execute, retry after a delay, periodic full scan
//! - `BotService`: bot CRUD with execution on direction changes

pub mod error;
pub mod reconciler;
pub mod running;
pub mod scheduler;
pub mod service;
pub mod target;

pub use error::{EngineError, EngineResult, FailureKind};
pub use reconciler::{plan, ReconcileOutcome, ReconcilePlan, Reconciler, ReconcilerConfig};
pub use running::{RunningGuard, RunningSet};
pub use scheduler::{ExecutionStatus, ScanSummary, Scheduler, SchedulerConfig};
pub use service::{BotService, UpdateOutcome};
pub use target::{deadband, target_notional, TargetParams};
