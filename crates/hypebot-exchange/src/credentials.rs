//! Exchange credentials from the environment.

use std::fmt;

use alloy::primitives::Address;
use zeroize::Zeroizing;

use crate::error::{ExchangeError, ExchangeResult};
use crate::signer::{parse_address, KeyManager};

/// Private key of the API wallet that signs actions.
pub const ENV_API_PRIVATE_KEY: &str = "HYPERLIQUID_API_PRIVATE_KEY";
/// Address of the API wallet. Must match the private key.
pub const ENV_API_USER: &str = "HYPERLIQUID_API_USER";
/// Address of the trading account whose positions and balance are read.
pub const ENV_USER: &str = "HYPERLIQUID_USER";

/// Validated credentials. Construction fails if anything is missing.
pub struct Credentials {
    private_key: Zeroizing<String>,
    pub api_user: Address,
    pub user: Address,
}

impl Credentials {
    pub fn new(private_key: &str, api_user: &str, user: &str) -> ExchangeResult<Self> {
        let creds = Self {
            private_key: Zeroizing::new(required(ENV_API_PRIVATE_KEY, private_key)?.to_string()),
            api_user: parse(ENV_API_USER, required(ENV_API_USER, api_user)?)?,
            user: parse(ENV_USER, required(ENV_USER, user)?)?,
        };
        // Fail now rather than on the first order.
        creds.key_manager()?;
        Ok(creds)
    }

    pub fn from_env() -> ExchangeResult<Self> {
        let read = |name: &str| Zeroizing::new(std::env::var(name).unwrap_or_default());
        let private_key = read(ENV_API_PRIVATE_KEY);
        let api_user = read(ENV_API_USER);
        let user = read(ENV_USER);
        Self::new(&private_key, &api_user, &user)
    }

    /// Key manager bound to the API wallet address.
    pub fn key_manager(&self) -> ExchangeResult<KeyManager> {
        KeyManager::from_hex(&self.private_key, Some(self.api_user)).map_err(|e| {
            ExchangeError::Configuration(format!("{ENV_API_PRIVATE_KEY}: {e}"))
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_user", &self.api_user)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

fn required<'a>(name: &str, value: &'a str) -> ExchangeResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ExchangeError::Configuration(format!("{name} is not set")));
    }
    Ok(trimmed)
}

fn parse(name: &str, value: &str) -> ExchangeResult<Address> {
    parse_address(value).map_err(|e| ExchangeError::Configuration(format!("{name}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const API_USER: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const USER: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

    #[test]
    fn test_valid_credentials() {
        let creds = Credentials::new(KEY, API_USER, USER).unwrap();
        assert_eq!(creds.key_manager().unwrap().address(), creds.api_user);
        assert!(!format!("{creds:?}").contains("ac0974"));
    }

    #[test]
    fn test_missing_values_are_configuration_errors() {
        for (key, api, user) in [("", API_USER, USER), (KEY, " ", USER), (KEY, API_USER, "")] {
            let err = Credentials::new(key, api, user).unwrap_err();
            assert!(err.is_configuration(), "{err}");
        }
    }

    #[test]
    fn test_key_must_match_api_user() {
        let err = Credentials::new(KEY, USER, USER).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains(ENV_API_PRIVATE_KEY));
    }
}
