//! Hyperliquid REST client.
//!
//! Reads go to `POST {api_url}/info`, signed actions to
//! `POST {api_url}/exchange`. Positions and balance are read for the trading
//! account (`HYPERLIQUID_USER`); actions are signed by the API wallet.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use dashmap::DashMap;
use hypebot_core::{
    Balance, Market, OpenOrder, OrderAck, OrderId, OrderStatus, Pair, Position, Price, Ticker,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::credentials::Credentials;
use crate::error::{ExchangeError, ExchangeResult};
use crate::exchange::{BoxFuture, Exchange, OrderRequest};
use crate::nonce::NonceManager;
use crate::signer::{parse_address, Action, CancelWire, OrderTypeWire, OrderWire, Signer};
use crate::wire::{
    ActionStatus, ClearinghouseState, ExchangeResponse, InfoRequest, L2Book, MetaAndAssetCtxs,
    OpenOrderData,
};

pub const MAINNET_API_URL: &str = "https://api.hyperliquid.xyz";
pub const TESTNET_API_URL: &str = "https://api.hyperliquid-testnet.xyz";

#[derive(Debug, Clone)]
pub struct HyperliquidConfig {
    pub api_url: String,
    pub is_mainnet: bool,
    pub request_timeout: Duration,
    /// Trade on behalf of a vault or subaccount.
    pub vault_address: Option<String>,
}

impl Default for HyperliquidConfig {
    fn default() -> Self {
        Self {
            api_url: MAINNET_API_URL.to_string(),
            is_mainnet: true,
            request_timeout: Duration::from_secs(10),
            vault_address: None,
        }
    }
}

pub struct HyperliquidClient {
    http: Client,
    info_url: String,
    exchange_url: String,
    user: Address,
    signer: Signer,
    nonces: NonceManager,
    /// Coin name to asset index, filled by `fetch_markets`.
    assets: DashMap<String, u32>,
}

impl HyperliquidClient {
    pub fn new(config: &HyperliquidConfig, credentials: &Credentials) -> ExchangeResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ExchangeError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        let vault_address = config
            .vault_address
            .as_deref()
            .map(parse_address)
            .transpose()
            .map_err(|e| ExchangeError::Configuration(format!("vault_address: {e}")))?;

        let keys = Arc::new(credentials.key_manager()?);
        let signer = Signer::new(keys, config.is_mainnet, vault_address);

        let base = config.api_url.trim_end_matches('/');
        info!(
            api_url = %base,
            is_mainnet = config.is_mainnet,
            user = %credentials.user,
            api_wallet = %signer.address(),
            "Hyperliquid client configured"
        );

        Ok(Self {
            http,
            info_url: format!("{base}/info"),
            exchange_url: format!("{base}/exchange"),
            user: credentials.user,
            signer,
            nonces: NonceManager::default(),
            assets: DashMap::new(),
        })
    }

    fn user(&self) -> String {
        self.user.to_string().to_lowercase()
    }

    async fn info<T: DeserializeOwned>(&self, request: &InfoRequest) -> ExchangeResult<T> {
        let response = self
            .http
            .post(&self.info_url)
            .json(request)
            .send()
            .await
            .map_err(|e| ExchangeError::MarketData(format!("info request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExchangeError::MarketData(format!("HTTP {status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| ExchangeError::MarketData(format!("Failed to parse info response: {e}")))
    }

    async fn post_action(&self, action: Action) -> ExchangeResult<ExchangeResponse> {
        let action_type = action.action_type.clone();
        let nonce = self.nonces.next();
        let signed = self.signer.sign(action, nonce).await?;

        debug!(action = %action_type, nonce, "Posting signed action");

        let response = self
            .http
            .post(&self.exchange_url)
            .json(&signed)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExchangeError::OrderRejected(format!(
                "{action_type}: HTTP {status}: {body}"
            )));
        }

        Ok(response.json().await?)
    }

    /// Asset index for a pair, loading markets on a miss.
    async fn asset_index(&self, pair: &Pair) -> ExchangeResult<u32> {
        if let Some(asset) = self.assets.get(pair.base()) {
            return Ok(*asset);
        }
        self.load_markets().await?;
        self.assets
            .get(pair.base())
            .map(|a| *a)
            .ok_or_else(|| ExchangeError::MarketNotFound(pair.clone()))
    }

    async fn load_markets(&self) -> ExchangeResult<Vec<Market>> {
        let meta: MetaAndAssetCtxs = self.info(&InfoRequest::MetaAndAssetCtxs).await?;
        let markets = meta.into_markets();
        for market in &markets {
            self.assets.insert(market.coin.clone(), market.asset);
        }
        debug!(count = markets.len(), "Loaded markets");
        Ok(markets)
    }

    async fn clearinghouse_state(&self) -> ExchangeResult<ClearinghouseState> {
        self.info(&InfoRequest::ClearinghouseState { user: self.user() })
            .await
    }

    async fn place(&self, request: OrderRequest) -> ExchangeResult<OrderAck> {
        let market = &request.market;

        self.post_action(Action::update_leverage(market.asset, request.leverage))
            .await?
            .into_ok()?;

        let wire = OrderWire {
            asset: market.asset,
            is_buy: request.side.is_buy(),
            limit_px: market.format_price(request.price),
            sz: market.format_size(request.amount),
            reduce_only: false,
            order_type: OrderTypeWire::gtc(),
            cloid: Some(request.client_id.to_string()),
        };

        info!(
            pair = %market.pair,
            side = %request.side,
            size = %wire.sz,
            price = %wire.limit_px,
            leverage = request.leverage,
            cloid = %request.client_id,
            "Submitting limit order"
        );

        let statuses = self
            .post_action(Action::order(vec![wire]))
            .await?
            .into_statuses()?;

        let status = match statuses.into_iter().next() {
            Some(ActionStatus::Resting { resting }) => (OrderId(resting.oid), OrderStatus::Resting),
            Some(ActionStatus::Filled { filled }) => (
                OrderId(filled.oid),
                OrderStatus::Filled {
                    avg_price: Price::new(filled.avg_px),
                },
            ),
            Some(ActionStatus::Error { error }) => return Err(ExchangeError::OrderRejected(error)),
            Some(ActionStatus::Success(other)) => {
                return Err(ExchangeError::OrderRejected(format!(
                    "unexpected order status: {other}"
                )))
            }
            None => {
                return Err(ExchangeError::OrderRejected(
                    "order response carried no status".to_string(),
                ))
            }
        };

        Ok(OrderAck {
            id: status.0,
            client_id: request.client_id,
            pair: request.market.pair.clone(),
            side: request.side,
            amount: request.amount,
            price: request.price,
            status: status.1,
        })
    }

    async fn cancel(&self, id: OrderId, pair: &Pair) -> ExchangeResult<()> {
        let asset = self.asset_index(pair).await?;
        let statuses = self
            .post_action(Action::cancel(vec![CancelWire { asset, oid: id.0 }]))
            .await?
            .into_statuses()?;

        for status in statuses {
            if let ActionStatus::Error { error } = status {
                warn!(pair = %pair, order_id = %id, error = %error, "Cancel rejected");
                return Err(ExchangeError::OrderRejected(error));
            }
        }
        debug!(pair = %pair, order_id = %id, "Order cancelled");
        Ok(())
    }
}

impl Exchange for HyperliquidClient {
    fn fetch_markets(&self) -> BoxFuture<'_, ExchangeResult<Vec<Market>>> {
        Box::pin(self.load_markets())
    }

    fn fetch_ticker<'a>(&'a self, pair: &'a Pair) -> BoxFuture<'a, ExchangeResult<Ticker>> {
        Box::pin(async move {
            let book: L2Book = self
                .info(&InfoRequest::L2Book {
                    coin: pair.base().to_string(),
                })
                .await?;
            Ok(Ticker {
                pair: pair.clone(),
                bid: book.best_bid(),
                ask: book.best_ask(),
                timestamp: book.timestamp(),
            })
        })
    }

    fn fetch_balance(&self) -> BoxFuture<'_, ExchangeResult<Balance>> {
        Box::pin(async move { Ok(self.clearinghouse_state().await?.balance()) })
    }

    fn fetch_positions(&self) -> BoxFuture<'_, ExchangeResult<Vec<Position>>> {
        Box::pin(async move { Ok(self.clearinghouse_state().await?.positions()) })
    }

    fn fetch_open_orders<'a>(
        &'a self,
        pair: &'a Pair,
    ) -> BoxFuture<'a, ExchangeResult<Vec<OpenOrder>>> {
        Box::pin(async move {
            let orders: Vec<OpenOrderData> = self
                .info(&InfoRequest::OpenOrders { user: self.user() })
                .await?;
            orders
                .into_iter()
                .filter(|o| o.coin == pair.base())
                .map(OpenOrderData::into_open_order)
                .collect()
        })
    }

    fn create_order(&self, request: OrderRequest) -> BoxFuture<'_, ExchangeResult<OrderAck>> {
        Box::pin(self.place(request))
    }

    fn cancel_order<'a>(&'a self, id: OrderId, pair: &'a Pair) -> BoxFuture<'a, ExchangeResult<()>> {
        Box::pin(self.cancel(id, pair))
    }
}

impl std::fmt::Debug for HyperliquidClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperliquidClient")
            .field("info_url", &self.info_url)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const API_USER: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const USER: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

    fn credentials() -> Credentials {
        Credentials::new(KEY, API_USER, USER).unwrap()
    }

    #[test]
    fn test_client_builds_endpoint_urls() {
        let config = HyperliquidConfig {
            api_url: format!("{TESTNET_API_URL}/"),
            is_mainnet: false,
            ..Default::default()
        };
        let client = HyperliquidClient::new(&config, &credentials()).unwrap();

        assert_eq!(client.info_url, "https://api.hyperliquid-testnet.xyz/info");
        assert_eq!(
            client.exchange_url,
            "https://api.hyperliquid-testnet.xyz/exchange"
        );
        assert_eq!(client.user(), USER.to_lowercase());
    }

    #[test]
    fn test_invalid_vault_is_configuration_error() {
        let config = HyperliquidConfig {
            vault_address: Some("0xnope".to_string()),
            ..Default::default()
        };
        let err = HyperliquidClient::new(&config, &credentials()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_unreachable_venue_is_market_data_error() {
        let config = HyperliquidConfig {
            api_url: "http://127.0.0.1:9".to_string(),
            request_timeout: Duration::from_millis(200),
            ..Default::default()
        };
        let client = HyperliquidClient::new(&config, &credentials()).unwrap();

        let result = client.fetch_ticker(&Pair::perp("BTC")).await;
        assert!(matches!(result, Err(ExchangeError::MarketData(_))));
    }
}
