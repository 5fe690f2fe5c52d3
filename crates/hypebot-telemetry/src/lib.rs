//! Prometheus metrics and structured logging for HypeBot.
//!
//! - Structured logging with tracing (JSON in production, pretty otherwise)
//! - Prometheus counters for reconciliation outcomes, orders and cache health

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::{encode_metrics, Metrics};
