//! Application wiring.

use std::sync::Arc;

use chrono::Utc;
use hypebot_core::{BotId, Market, NewBot, Pair, Position};
use hypebot_engine::{BotService, Reconciler, Scheduler};
use hypebot_exchange::{Credentials, Exchange, ExchangeFacade, HyperliquidClient};
use hypebot_store::{BotStore, InMemoryBotStore, SupabaseBotStore, SupabaseConfig};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{AppConfig, StoreBackend, StoreSettings};
use crate::error::AppResult;
use crate::ops::{self, OpsState};

/// Account state as the engine sees it.
#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub collateral: Decimal,
    pub positions: Vec<Position>,
}

pub struct Application {
    config: AppConfig,
    facade: Arc<ExchangeFacade>,
    scheduler: Scheduler,
    service: BotService,
    shutdown: CancellationToken,
}

impl Application {
    /// Build against Hyperliquid with credentials from the environment.
    ///
    /// Fails fast when credentials or the store backend are misconfigured.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let credentials = Credentials::from_env()?;
        let client = HyperliquidClient::new(&config.exchange.hyperliquid(), &credentials)?;
        let store = build_store(&config.store)?;
        Ok(Self::with_components(config, Arc::new(client), store))
    }

    pub fn with_components(
        config: AppConfig,
        exchange: Arc<dyn Exchange>,
        store: Arc<dyn BotStore>,
    ) -> Self {
        let facade = Arc::new(ExchangeFacade::new(exchange, config.exchange.facade()));
        let reconciler = Reconciler::new(Arc::clone(&facade), config.reconciler());
        let scheduler = Scheduler::new(Arc::clone(&store), reconciler, config.scheduler());
        let service = BotService::new(store, scheduler.clone());

        Self {
            config,
            facade,
            scheduler,
            service,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn service(&self) -> &BotService {
        &self.service
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn ops_state(&self) -> OpsState {
        OpsState::new(self.service.clone())
    }

    /// Run the scan driver and the ops server until ctrl-c.
    pub async fn run(&self) -> AppResult<()> {
        let server = if self.config.server.enabled {
            let listener = tokio::net::TcpListener::bind(self.config.server.address()).await?;
            info!(address = %self.config.server.address(), "Ops server listening");
            Some(tokio::spawn(ops::serve(
                listener,
                self.ops_state(),
                self.shutdown.clone(),
            )))
        } else {
            None
        };

        let driver = self.scheduler.spawn_driver();

        tokio::signal::ctrl_c().await?;
        info!("Shutdown signal received");
        self.shutdown();

        if let Err(e) = driver.await {
            error!(error = %e, "Scan driver task failed");
        }
        if let Some(server) = server {
            match server.await {
                Ok(Err(e)) => error!(error = %e, "Ops server failed"),
                Err(e) => error!(error = %e, "Ops server task failed"),
                Ok(Ok(())) => {}
            }
        }

        info!("Shutdown complete");
        Ok(())
    }

    /// Stop the driver, pending retries and the ops server.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
        self.shutdown.cancel();
    }

    pub async fn account(&self) -> AppResult<AccountSummary> {
        let (collateral, positions) =
            tokio::try_join!(self.facade.account_collateral(), self.facade.positions())?;
        Ok(AccountSummary {
            collateral,
            positions,
        })
    }

    pub async fn market(&self, pair: &Pair) -> AppResult<Market> {
        Ok(self.facade.market(pair).await?)
    }
}

fn build_store(settings: &StoreSettings) -> AppResult<Arc<dyn BotStore>> {
    match settings.backend {
        StoreBackend::Memory => {
            let now = Utc::now();
            let bots = settings.bots.iter().map(|seed| {
                let mut bot = NewBot::new(seed.name.clone(), seed.pair.clone())
                    .into_bot(BotId::new(), now);
                bot.desired_direction = seed.desired_direction;
                bot
            });
            let store = InMemoryBotStore::with_bots(bots);
            info!(bots = store.len(), "Using in-memory bot store");
            Ok(Arc::new(store))
        }
        StoreBackend::Supabase => {
            if !settings.bots.is_empty() {
                warn!(
                    count = settings.bots.len(),
                    "store.bots is ignored by the supabase backend"
                );
            }
            let config = SupabaseConfig::from_env(settings.supabase_url.as_deref(), &settings.table)?;
            Ok(Arc::new(SupabaseBotStore::new(config)?))
        }
    }
}
