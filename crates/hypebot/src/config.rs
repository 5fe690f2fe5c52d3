//! Application configuration.
//!
//! Loaded from a TOML file, then overridden by `HYPEBOT__SECTION__KEY`
//! environment variables. Credentials are never read from here; see
//! `hypebot_exchange::Credentials` and `hypebot_store::SupabaseConfig`.

use std::path::Path;
use std::time::Duration;

use hypebot_core::Pair;
use hypebot_engine::{ReconcilerConfig, SchedulerConfig, TargetParams};
use hypebot_exchange::{FacadeConfig, HyperliquidConfig, MAINNET_API_URL};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const ENV_CONFIG_PATH: &str = "HYPEBOT_CONFIG";
const ENV_PREFIX: &str = "HYPEBOT";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub exchange: ExchangeSettings,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

/// Exchange connection and order placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeSettings {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_is_mainnet")]
    pub is_mainnet: bool,
    /// Freshness window of every cached exchange read.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_order_leverage")]
    pub order_leverage: u32,
    /// Ticks between the book and the limit price.
    #[serde(default = "default_limit_offset_ticks")]
    pub limit_offset_ticks: u32,
    #[serde(default)]
    pub vault_address: Option<String>,
}

fn default_api_url() -> String {
    MAINNET_API_URL.to_string()
}

fn default_is_mainnet() -> bool {
    true
}

fn default_cache_ttl_secs() -> u64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_order_leverage() -> u32 {
    5
}

fn default_limit_offset_ticks() -> u32 {
    5
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            is_mainnet: default_is_mainnet(),
            cache_ttl_secs: default_cache_ttl_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            order_leverage: default_order_leverage(),
            limit_offset_ticks: default_limit_offset_ticks(),
            vault_address: None,
        }
    }
}

impl ExchangeSettings {
    pub fn hyperliquid(&self) -> HyperliquidConfig {
        HyperliquidConfig {
            api_url: self.api_url.clone(),
            is_mainnet: self.is_mainnet,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            vault_address: self.vault_address.clone().filter(|v| !v.trim().is_empty()),
        }
    }

    pub fn facade(&self) -> FacadeConfig {
        FacadeConfig {
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            limit_offset_ticks: self.limit_offset_ticks,
        }
    }
}

/// Sizing and scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Leverage at `desired_direction = 1`.
    #[serde(default = "default_base_leverage")]
    pub base_leverage: Decimal,
    /// Deadband is max notional divided by this.
    #[serde(default = "default_deadband_divisor")]
    pub deadband_divisor: Decimal,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,
}

fn default_base_leverage() -> Decimal {
    Decimal::from(5)
}

fn default_deadband_divisor() -> Decimal {
    Decimal::TEN
}

fn default_retry_delay_secs() -> u64 {
    60
}

fn default_scan_interval_secs() -> u64 {
    60
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            base_leverage: default_base_leverage(),
            deadband_divisor: default_deadband_divisor(),
            retry_delay_secs: default_retry_delay_secs(),
            scan_interval_secs: default_scan_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local; seeded from `store.bots`.
    #[default]
    Memory,
    Supabase,
}

/// A bot created at startup by the memory backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedBot {
    pub name: String,
    pub pair: Pair,
    #[serde(default)]
    pub desired_direction: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Overrides `SUPABASE_URL`.
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default)]
    pub bots: Vec<SeedBot>,
}

fn default_table() -> String {
    "bots".to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            supabase_url: None,
            table: default_table(),
            bots: Vec::new(),
        }
    }
}

/// Ops HTTP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_server_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_server_enabled() -> bool {
    true
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            enabled: default_server_enabled(),
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl AppConfig {
    /// Resolve the config path: explicit argument, then `HYPEBOT_CONFIG`,
    /// then [`DEFAULT_CONFIG_PATH`].
    pub fn resolve_path(explicit: Option<String>) -> String {
        explicit
            .or_else(|| std::env::var(ENV_CONFIG_PATH).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }

    /// Load `path` (if present) and apply environment overrides.
    pub fn load(path: &str) -> AppResult<Self> {
        if !Path::new(path).exists() {
            tracing::warn!(path = %path, "Config file not found, using defaults");
        }

        let config: Self = config::Config::builder()
            .add_source(config::File::from(Path::new(path)).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.engine.base_leverage <= Decimal::ZERO {
            return Err(AppError::Config("engine.base_leverage must be positive".to_string()));
        }
        if self.engine.deadband_divisor <= Decimal::ZERO {
            return Err(AppError::Config(
                "engine.deadband_divisor must be positive".to_string(),
            ));
        }
        if self.engine.retry_delay_secs == 0 || self.engine.scan_interval_secs == 0 {
            return Err(AppError::Config(
                "engine retry and scan intervals must be positive".to_string(),
            ));
        }
        if self.exchange.order_leverage == 0 {
            return Err(AppError::Config(
                "exchange.order_leverage must be at least 1".to_string(),
            ));
        }
        for seed in &self.store.bots {
            seed.pair.validate()?;
        }
        Ok(())
    }

    pub fn reconciler(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            target: TargetParams {
                base_leverage: self.engine.base_leverage,
                deadband_divisor: self.engine.deadband_divisor,
            },
            order_leverage: self.exchange.order_leverage,
        }
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            retry_delay: Duration::from_secs(self.engine.retry_delay_secs),
            scan_interval: Duration::from_secs(self.engine.scan_interval_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.reconciler(), ReconcilerConfig::default());
        assert_eq!(config.scheduler().retry_delay, Duration::from_secs(60));
        assert_eq!(config.exchange.facade().cache_ttl, Duration::from_secs(60));
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.server.address(), "0.0.0.0:3000");
    }

    #[test]
    fn test_shipped_config_parses() {
        let raw = include_str!("../../../config/default.toml");
        let config: AppConfig = toml::from_str(raw).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine.base_leverage, dec!(5));
        assert_eq!(config.exchange.order_leverage, 5);
    }

    #[test]
    fn test_partial_sections_take_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [engine]
            base_leverage = "3"

            [[store.bots]]
            name = "eth"
            pair = "ETH/USDC:USDC"
            desired_direction = "-0.5"
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.base_leverage, dec!(3));
        assert_eq!(config.engine.deadband_divisor, dec!(10));
        assert_eq!(config.store.bots[0].desired_direction, dec!(-0.5));
        assert_eq!(config.store.table, "bots");
    }

    #[test]
    fn test_rejects_nonsense() {
        let mut config = AppConfig::default();
        config.engine.deadband_divisor = Decimal::ZERO;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        let mut config = AppConfig::default();
        config.exchange.order_leverage = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = AppConfig::load("does/not/exist.toml").unwrap();
        assert_eq!(config.engine.retry_delay_secs, 60);
    }
}
