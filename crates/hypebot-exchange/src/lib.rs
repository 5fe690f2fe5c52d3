//! Exchange access for HypeBot.
//!
//! - `Exchange`: raw, uncached operations against a venue
//! - `HyperliquidClient`: REST implementation (info + signed exchange endpoint)
//! - `ExchangeFacade`: typed, TTL-cached operations used by the engine
//! - `MockExchange`: scriptable in-memory venue for tests

pub mod cache;
pub mod credentials;
pub mod error;
pub mod exchange;
pub mod facade;
pub mod hyperliquid;
pub mod mock;
pub mod nonce;
pub mod signer;
pub mod wire;

pub use cache::{CacheGeneration, TtlCache};
pub use credentials::{Credentials, ENV_API_PRIVATE_KEY, ENV_API_USER, ENV_USER};
pub use error::{ExchangeError, ExchangeResult};
pub use exchange::{BoxFuture, Exchange, OrderRequest};
pub use facade::{ExchangeFacade, FacadeConfig};
pub use hyperliquid::{HyperliquidClient, HyperliquidConfig, MAINNET_API_URL, TESTNET_API_URL};
pub use mock::MockExchange;
pub use nonce::{Clock, NonceManager, SystemClock};
pub use signer::{KeyError, KeyManager, Signer, SignerError};
