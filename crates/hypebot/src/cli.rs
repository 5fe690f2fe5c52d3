//! Command line interface.

use clap::{Parser, Subcommand};
use hypebot_core::{BotId, BotUpdate, NewBot, Pair};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::app::Application;
use crate::error::AppResult;

/// Keeps Hyperliquid positions aligned with declared bot exposure.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (can also be set via HYPEBOT_CONFIG env var)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the scan driver and ops server until ctrl-c (default)
    Run,
    /// Execute every bot once
    Scan,
    /// Execute one bot once
    Execute { id: BotId },
    /// Manage bots
    Bots {
        #[command(subcommand)]
        action: BotsCommand,
    },
    /// Show account collateral and open positions
    Account,
    /// Show market metadata for a pair (`BTC` or `BTC/USDC:USDC`)
    Market { pair: Pair },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum BotsCommand {
    List,
    /// Create a flat bot
    Create { name: String, pair: Pair },
    /// Update a bot; changing the direction executes it immediately
    Update {
        id: BotId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        pair: Option<Pair>,
        #[arg(long, allow_hyphen_values = true)]
        direction: Option<Decimal>,
    },
    Delete { id: BotId },
}

/// Run a one-shot command against a built application.
pub async fn dispatch(app: &Application, command: Command) -> AppResult<()> {
    let service = app.service();
    match command {
        Command::Run => app.run().await?,
        Command::Scan => print_json(&app.scheduler().execute_all().await?)?,
        Command::Execute { id } => {
            service.get(id).await?;
            print_json(&app.scheduler().execute_bot(id).await)?;
        }
        Command::Bots { action } => match action {
            BotsCommand::List => print_json(&service.list().await?)?,
            BotsCommand::Create { name, pair } => {
                print_json(&service.create(NewBot::new(name, pair)).await?)?
            }
            BotsCommand::Update {
                id,
                name,
                pair,
                direction,
            } => {
                let update = BotUpdate {
                    name,
                    pair,
                    desired_direction: direction,
                };
                print_json(&service.update(id, update).await?)?;
            }
            BotsCommand::Delete { id } => {
                service.delete(id).await?;
                print_json(&serde_json::json!({ "deleted": id }))?;
            }
        },
        Command::Account => print_json(&app.account().await?)?,
        Command::Market { pair } => print_json(&app.market(&pair).await?)?,
    }
    // One-shot commands leave no retries behind.
    app.shutdown();
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_to_run() {
        let cli = Cli::parse_from(["hypebot"]);
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_parses_bot_update() {
        let id = BotId::new();
        let cli = Cli::parse_from([
            "hypebot",
            "--config",
            "prod.toml",
            "bots",
            "update",
            &id.to_string(),
            "--direction",
            "-0.5",
        ]);

        assert_eq!(cli.config.as_deref(), Some("prod.toml"));
        assert_eq!(
            cli.command,
            Some(Command::Bots {
                action: BotsCommand::Update {
                    id,
                    name: None,
                    pair: None,
                    direction: Some(dec!(-0.5)),
                }
            })
        );
    }

    #[test]
    fn test_market_accepts_bare_coin() {
        let cli = Cli::parse_from(["hypebot", "market", "ETH"]);
        assert_eq!(
            cli.command,
            Some(Command::Market {
                pair: Pair::perp("ETH")
            })
        );
    }

    #[test]
    fn test_rejects_bad_id() {
        assert!(Cli::try_parse_from(["hypebot", "execute", "nope"]).is_err());
    }
}
