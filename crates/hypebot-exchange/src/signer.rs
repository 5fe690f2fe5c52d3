//! L1 action signing for the Hyperliquid exchange endpoint.
//!
//! Signing is two-stage:
//! 1. `action_hash = keccak256(msgpack(action) || nonce_be || vault_tag)`
//! 2. EIP-712 signature over the phantom agent `{source, connectionId: action_hash}`
//!
//! Key material lives only inside `KeyManager`. Never log keys or signatures.

use std::fmt;
use std::sync::Arc;

use alloy::primitives::{keccak256, Address, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer as AlloySigner;
use alloy::sol;
use alloy::sol_types::{eip712_domain, SolStruct};
use serde::Serialize;
use thiserror::Error;
use zeroize::Zeroizing;

// =============================================================================
// Keys
// =============================================================================

/// Holds the API wallet used to sign actions.
pub struct KeyManager {
    signer: PrivateKeySigner,
}

impl KeyManager {
    /// Parse a hex private key (with or without `0x`) and optionally check
    /// that it derives `expected_address`.
    pub fn from_hex(secret: &str, expected_address: Option<Address>) -> Result<Self, KeyError> {
        let trimmed = secret.trim().trim_start_matches("0x");
        let bytes = Zeroizing::new(hex::decode(trimmed)?);
        Self::from_bytes(&bytes, expected_address)
    }

    pub fn from_bytes(secret: &[u8], expected_address: Option<Address>) -> Result<Self, KeyError> {
        let signer = PrivateKeySigner::from_slice(secret)
            .map_err(|e| KeyError::InvalidKey(e.to_string()))?;

        if let Some(expected) = expected_address {
            if signer.address() != expected {
                return Err(KeyError::AddressMismatch {
                    expected,
                    actual: signer.address(),
                });
            }
        }

        Ok(Self { signer })
    }

    /// Address of the signing wallet.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

impl fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyManager")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Key loading errors.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Failed to decode hex: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Address mismatch: expected {expected}, got {actual}")]
    AddressMismatch { expected: Address, actual: Address },
}

/// Parse a `0x` address.
pub fn parse_address(value: &str) -> Result<Address, KeyError> {
    value
        .trim()
        .parse::<Address>()
        .map_err(|_| KeyError::InvalidAddress(value.to_string()))
}

// =============================================================================
// Wire format
// =============================================================================

/// L1 action.
///
/// Field order is the msgpack key order and therefore part of the hash.
/// `None` fields are omitted, never serialized as nil.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub orders: Option<Vec<OrderWire>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancels: Option<Vec<CancelWire>>,

    /// `"na"` for plain orders.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grouping: Option<String>,

    /// Asset index for `updateLeverage`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<u32>,

    #[serde(rename = "isCross", skip_serializing_if = "Option::is_none")]
    pub is_cross: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub leverage: Option<u32>,
}

impl Action {
    fn empty(action_type: &str) -> Self {
        Self {
            action_type: action_type.to_string(),
            orders: None,
            cancels: None,
            grouping: None,
            asset: None,
            is_cross: None,
            leverage: None,
        }
    }

    pub fn order(orders: Vec<OrderWire>) -> Self {
        Self {
            orders: Some(orders),
            grouping: Some("na".to_string()),
            ..Self::empty("order")
        }
    }

    pub fn cancel(cancels: Vec<CancelWire>) -> Self {
        Self {
            cancels: Some(cancels),
            ..Self::empty("cancel")
        }
    }

    /// Set cross-margin leverage for one asset.
    pub fn update_leverage(asset: u32, leverage: u32) -> Self {
        Self {
            asset: Some(asset),
            is_cross: Some(true),
            leverage: Some(leverage),
            ..Self::empty("updateLeverage")
        }
    }
}

/// One order inside an `order` action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderWire {
    #[serde(rename = "a")]
    pub asset: u32,
    #[serde(rename = "b")]
    pub is_buy: bool,
    #[serde(rename = "p")]
    pub limit_px: String,
    #[serde(rename = "s")]
    pub sz: String,
    #[serde(rename = "r")]
    pub reduce_only: bool,
    #[serde(rename = "t")]
    pub order_type: OrderTypeWire,
    #[serde(rename = "c", skip_serializing_if = "Option::is_none")]
    pub cloid: Option<String>,
}

/// `{"limit": {"tif": "Gtc"}}` and friends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderTypeWire {
    pub limit: LimitOrderType,
}

impl OrderTypeWire {
    pub fn gtc() -> Self {
        Self::with_tif("Gtc")
    }

    #[cfg(test)]
    pub fn ioc() -> Self {
        Self::with_tif("Ioc")
    }

    fn with_tif(tif: &str) -> Self {
        Self {
            limit: LimitOrderType {
                tif: tif.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LimitOrderType {
    pub tif: String,
}

/// `{"a": asset, "o": oid}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CancelWire {
    #[serde(rename = "a")]
    pub asset: u32,
    #[serde(rename = "o")]
    pub oid: u64,
}

// =============================================================================
// Hashing
// =============================================================================

/// Everything that goes into the action hash.
#[derive(Debug, Clone)]
pub struct SigningInput {
    pub action: Action,
    pub nonce: u64,
    pub vault_address: Option<Address>,
}

impl SigningInput {
    /// `keccak256(msgpack(action) || nonce (8 bytes BE) || vault tag)`.
    ///
    /// The vault tag is `0x00` without a vault, `0x01 || address` with one.
    pub fn action_hash(&self) -> Result<B256, SignerError> {
        let mut data = rmp_serde::to_vec_named(&self.action)
            .map_err(|e| SignerError::SerializationFailed(e.to_string()))?;
        data.extend_from_slice(&self.nonce.to_be_bytes());

        match &self.vault_address {
            None => data.push(0x00),
            Some(addr) => {
                data.push(0x01);
                data.extend_from_slice(addr.as_slice());
            }
        }

        Ok(keccak256(&data))
    }
}

// =============================================================================
// EIP-712
// =============================================================================

pub const EIP712_DOMAIN_NAME: &str = "Exchange";
pub const EIP712_DOMAIN_VERSION: &str = "1";
pub const EIP712_CHAIN_ID: u64 = 1337;
pub const EIP712_VERIFYING_CONTRACT: Address = Address::ZERO;

sol! {
    #[derive(Debug)]
    struct Agent {
        string source;
        bytes32 connectionId;
    }
}

/// EIP-712 signing target: `source` is `"a"` on mainnet, `"b"` on testnet.
#[derive(Debug, Clone)]
pub struct PhantomAgent {
    pub source: String,
    pub connection_id: B256,
}

impl PhantomAgent {
    pub fn new(action_hash: B256, is_mainnet: bool) -> Self {
        Self {
            source: if is_mainnet { "a" } else { "b" }.to_string(),
            connection_id: action_hash,
        }
    }

    fn signing_hash(&self) -> B256 {
        let domain = eip712_domain! {
            name: EIP712_DOMAIN_NAME,
            version: EIP712_DOMAIN_VERSION,
            chain_id: EIP712_CHAIN_ID,
            verifying_contract: EIP712_VERIFYING_CONTRACT,
        };
        let agent = Agent {
            source: self.source.clone(),
            connectionId: self.connection_id,
        };
        agent.eip712_signing_hash(&domain)
    }
}

/// Signature as sent on the wire. `v` is 27 or 28.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionSignature {
    pub r: String,
    pub s: String,
    pub v: u8,
}

/// Body of a `POST /exchange` request.
#[derive(Debug, Clone, Serialize)]
pub struct SignedAction {
    pub action: Action,
    pub nonce: u64,
    pub signature: ActionSignature,
    #[serde(rename = "vaultAddress", skip_serializing_if = "Option::is_none")]
    pub vault_address: Option<String>,
}

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("Signing failed: {0}")]
    SigningFailed(#[from] alloy::signers::Error),

    #[error("Action serialization failed: {0}")]
    SerializationFailed(String),
}

/// Signs actions for one network, optionally on behalf of a vault.
pub struct Signer {
    keys: Arc<KeyManager>,
    is_mainnet: bool,
    vault_address: Option<Address>,
}

impl Signer {
    pub fn new(keys: Arc<KeyManager>, is_mainnet: bool, vault_address: Option<Address>) -> Self {
        Self {
            keys,
            is_mainnet,
            vault_address,
        }
    }

    pub fn address(&self) -> Address {
        self.keys.address()
    }

    pub async fn sign(&self, action: Action, nonce: u64) -> Result<SignedAction, SignerError> {
        let input = SigningInput {
            action,
            nonce,
            vault_address: self.vault_address,
        };
        let hash = input.action_hash()?;
        let agent = PhantomAgent::new(hash, self.is_mainnet);
        let signature = self.keys.signer().sign_hash(&agent.signing_hash()).await?;

        Ok(SignedAction {
            action: input.action,
            nonce,
            signature: ActionSignature {
                r: format!("0x{}", hex::encode(signature.r().to_be_bytes::<32>())),
                s: format!("0x{}", hex::encode(signature.s().to_be_bytes::<32>())),
                // y_parity (0/1) to recovery id (27/28)
                v: 27 + signature.v() as u8,
            },
            vault_address: self.vault_address.map(|a| a.to_string().to_lowercase()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known development key. Never fund it.
    const TEST_PRIVATE_KEY: &str =
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    fn sample_order() -> OrderWire {
        OrderWire {
            asset: 110027,
            is_buy: true,
            limit_px: "105.00".to_string(),
            sz: "0.2".to_string(),
            reduce_only: false,
            order_type: OrderTypeWire::ioc(),
            cloid: Some("0x0de3e244a8f44fc28a6b7bc852d66d19".to_string()),
        }
    }

    #[test]
    fn test_key_manager_from_hex() {
        let expected = parse_address(TEST_ADDRESS).unwrap();
        let keys = KeyManager::from_hex(TEST_PRIVATE_KEY, Some(expected)).unwrap();
        assert_eq!(keys.address(), expected);
        assert!(!format!("{keys:?}").contains("ac0974"));
    }

    #[test]
    fn test_key_manager_address_mismatch() {
        let result = KeyManager::from_hex(TEST_PRIVATE_KEY, Some(Address::ZERO));
        assert!(matches!(result, Err(KeyError::AddressMismatch { .. })));
    }

    #[test]
    fn test_key_manager_rejects_garbage() {
        assert!(matches!(
            KeyManager::from_hex("not-hex", None),
            Err(KeyError::HexDecode(_))
        ));
        assert!(parse_address("0x1234").is_err());
    }

    #[test]
    fn test_order_msgpack_matches_reference_encoding() {
        let action = Action::order(vec![sample_order()]);
        let bytes = rmp_serde::to_vec_named(&action).unwrap();

        let expected = "83a474797065a56f72646572a66f72646572739187a161ce0001adcba162c3a170a63130352e3030a173a3302e32a172c2a17481a56c696d697481a3746966a3496f63a163d92230783064653365323434613866343466633238613662376263383532643636643139a867726f7570696e67a26e61";
        assert_eq!(hex::encode(&bytes), expected);

        let input = SigningInput {
            action,
            nonce: 1769339470576,
            vault_address: None,
        };
        assert_eq!(
            hex::encode(input.action_hash().unwrap().as_slice()),
            "904c57b8f4b75ac9da005b49298dc39af735ed8c3a89b241f5f1e061e0207868"
        );
    }

    #[test]
    fn test_update_leverage_key_order() {
        let json = serde_json::to_string(&Action::update_leverage(3, 5)).unwrap();
        assert_eq!(
            json,
            r#"{"type":"updateLeverage","asset":3,"isCross":true,"leverage":5}"#
        );
    }

    #[test]
    fn test_cancel_omits_order_fields() {
        let json = serde_json::to_string(&Action::cancel(vec![CancelWire {
            asset: 5,
            oid: 123,
        }]))
        .unwrap();
        assert_eq!(json, r#"{"type":"cancel","cancels":[{"a":5,"o":123}]}"#);
    }

    #[test]
    fn test_vault_changes_hash() {
        let action = Action::cancel(vec![CancelWire { asset: 5, oid: 1 }]);
        let plain = SigningInput {
            action: action.clone(),
            nonce: 1000,
            vault_address: None,
        };
        let vault = SigningInput {
            action,
            nonce: 1000,
            vault_address: Some(Address::repeat_byte(0x42)),
        };
        assert_ne!(plain.action_hash().unwrap(), vault.action_hash().unwrap());
    }

    #[test]
    fn test_phantom_agent_source() {
        let hash = B256::repeat_byte(0xab);
        assert_eq!(PhantomAgent::new(hash, true).source, "a");
        assert_eq!(PhantomAgent::new(hash, false).source, "b");
    }

    #[tokio::test]
    async fn test_phantom_agent_signature_is_deterministic() {
        let keys = KeyManager::from_hex(TEST_PRIVATE_KEY, None).unwrap();
        let action_hash = B256::from_slice(
            &hex::decode("f01fa6eaca0b8cbd2afe65f8852a2e00d35eae3d19560ece9b8a28614646e849")
                .unwrap(),
        );
        let agent = PhantomAgent::new(action_hash, false);
        let signature = keys.signer().sign_hash(&agent.signing_hash()).await.unwrap();

        assert_eq!(
            hex::encode(signature.r().to_be_bytes::<32>()),
            "a9e728f2faea4febc0b6eb9c3dbbac04b375eb3869f051030d205318425faebc"
        );
        assert_eq!(
            hex::encode(signature.s().to_be_bytes::<32>()),
            "7b21be7030bb979352b71494708b99d789266f0d0e1242a21e74905b683e4698"
        );
        assert!(!signature.v());
    }

    #[tokio::test]
    async fn test_signed_action_payload() {
        let keys = Arc::new(KeyManager::from_hex(TEST_PRIVATE_KEY, None).unwrap());
        let signer = Signer::new(keys, true, None);

        let signed = signer
            .sign(Action::update_leverage(0, 5), 1_700_000_000_000)
            .await
            .unwrap();

        assert!(signed.signature.v == 27 || signed.signature.v == 28);
        assert!(signed.signature.r.starts_with("0x"));
        let json = serde_json::to_string(&signed).unwrap();
        assert!(json.starts_with(r#"{"action":{"type":"updateLeverage""#));
        assert!(!json.contains("vaultAddress"));
    }
}
