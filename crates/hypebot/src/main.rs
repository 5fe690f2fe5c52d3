//! HypeBot entry point.

use anyhow::Result;
use clap::Parser;
use hypebot::{AppConfig, Application, Cli, Command};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    hypebot_telemetry::init_logging()?;

    info!("Starting HypeBot v{}", env!("CARGO_PKG_VERSION"));

    let config_path = AppConfig::resolve_path(cli.config);
    info!(config_path = %config_path, "Loading configuration");

    let config = AppConfig::load(&config_path)?;
    info!(
        api_url = %config.exchange.api_url,
        store = ?config.store.backend,
        base_leverage = %config.engine.base_leverage,
        "Configuration loaded"
    );

    let app = Application::new(config)?;
    hypebot::cli::dispatch(&app, cli.command.unwrap_or(Command::Run)).await?;

    Ok(())
}
