//! HypeBot application.
//!
//! Wires the exchange facade, bot store and scheduler together and exposes
//! them through a CLI and an ops HTTP server.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod ops;

pub use app::{AccountSummary, Application};
pub use cli::{Cli, Command};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
