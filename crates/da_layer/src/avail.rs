//! Avail backend.
//!
//! Avail needs no local light node. The operator identity (an sr25519
//! mnemonic and its SS58 address) is generated in-process and kept in
//! `avail.toml` inside the light-node store. Balances are read from the
//! `System.Account` storage of the Avail node.

use async_trait::async_trait;
use chain_client::{ChainClient, ChainRequest};
use roller_config::{fs, DaBackend, DaData, NodeType, RollappConfig};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sp_core::crypto::Ss58Codec;
use sp_core::hashing::{blake2_128, twox_128};
use sp_core::{sr25519, Pair};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{DaError, DaStatus, DataLayer, KeyInfo, NotFundedAddress, Result};

pub const KEY_NAME: &str = "avail";
pub const CONFIG_FILE: &str = "avail.toml";
pub const DENOM: &str = "aAVL";

/// 1 AVL in base units.
pub const MIN_BALANCE: u128 = 1_000_000_000_000_000_000;

/// Persisted Avail identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailIdentity {
    pub mnemonic: String,
    pub address: String,
    #[serde(default)]
    pub app_id: u32,
    pub rpc_endpoint: String,
}

/// A fresh sr25519 key as `(mnemonic, ss58 address)`.
fn generate_key() -> (String, String) {
    let (pair, phrase, _) = sr25519::Pair::generate_with_phrase(None);
    (phrase, pair.public().to_ss58check())
}

/// Storage key of `System.Account` for `address`.
pub fn account_storage_key(address: &str) -> Result<String> {
    let account = sr25519::Public::from_ss58check(address).map_err(|e| DaError::Malformed {
        what: "SS58 address",
        reason: format!("{address}: {e:?}"),
    })?;

    let mut key = Vec::with_capacity(80);
    key.extend_from_slice(&twox_128(b"System"));
    key.extend_from_slice(&twox_128(b"Account"));
    key.extend_from_slice(&blake2_128(&account.0));
    key.extend_from_slice(&account.0);
    Ok(format!("0x{}", hex::encode(key)))
}

/// Free balance out of a SCALE-encoded `AccountInfo`.
///
/// `null` means the account was never funded.
fn parse_free_balance(raw: &str) -> Result<u128> {
    let malformed = |reason: String| DaError::Malformed {
        what: "System.Account",
        reason,
    };

    let Some(encoded) = serde_json::from_str::<Option<String>>(raw)? else {
        return Ok(0);
    };
    let bytes = hex::decode(encoded.trim_start_matches("0x"))
        .map_err(|e| malformed(format!("{encoded}: {e}")))?;

    // nonce, consumers, providers and sufficients (u32 each) precede data.free
    let free: [u8; 16] = bytes
        .get(16..32)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| malformed(format!("{} bytes is too short", bytes.len())))?;
    Ok(u128::from_le_bytes(free))
}

pub struct Avail {
    client: Arc<dyn ChainClient>,
    config_path: PathBuf,
    da: DaData,
}

impl Avail {
    pub fn new(config: &RollappConfig, client: Arc<dyn ChainClient>) -> Self {
        Self {
            client,
            config_path: config.light_node_dir().join(CONFIG_FILE),
            da: config.da.clone(),
        }
    }

    /// The stored identity, if one was created.
    pub fn identity(&self) -> Result<Option<AvailIdentity>> {
        let contents = match std::fs::read_to_string(&self.config_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(DaError::io(&self.config_path, e)),
        };
        Ok(Some(toml::from_str(&contents)?))
    }

    fn require_identity(&self) -> Result<AvailIdentity> {
        self.identity()?
            .ok_or_else(|| DaError::MissingKey(KEY_NAME.to_string()))
    }

    async fn free_balance(&self, address: &str) -> Result<u128> {
        let request = ChainRequest::json_rpc(
            &self.da.api_url,
            "state_getStorage",
            json!([account_storage_key(address)?]),
        );
        parse_free_balance(&self.client.request(&request).await?)
    }
}

#[async_trait]
impl DataLayer for Avail {
    fn backend(&self) -> DaBackend {
        DaBackend::Avail
    }

    fn key_name(&self) -> &str {
        KEY_NAME
    }

    async fn da_account_address(&self) -> Result<KeyInfo> {
        let identity = self.require_identity()?;
        Ok(KeyInfo {
            name: KEY_NAME.to_string(),
            address: identity.address,
        })
    }

    async fn initialize_light_node_config(&mut self) -> Result<Option<String>> {
        if let Some(identity) = self.identity()? {
            debug!("Reusing Avail identity {}", identity.address);
            return Ok(None);
        }

        let (mnemonic, address) = generate_key();
        info!("Generated Avail identity {}", address);

        let identity = AvailIdentity {
            mnemonic,
            address,
            app_id: self.da.app_id.unwrap_or_default(),
            rpc_endpoint: self.da.rpc_url.clone(),
        };
        let contents = toml::to_string(&identity)?;
        fs::write_atomic(&self.config_path, contents.as_bytes())
            .map_err(|e| DaError::io(&self.config_path, e))?;

        Ok(Some(identity.mnemonic))
    }

    async fn check_da_balance(&self) -> Result<Vec<NotFundedAddress>> {
        let identity = self.require_identity()?;
        let balance = self.free_balance(&identity.address).await?;

        debug!("{} has {}{}", identity.address, balance, DENOM);
        if balance >= MIN_BALANCE {
            return Ok(Vec::new());
        }

        Ok(vec![NotFundedAddress {
            key_name: KEY_NAME.to_string(),
            address: identity.address,
            current_balance: balance,
            required_balance: MIN_BALANCE,
            denom: DENOM.to_string(),
            network: self.da.id.clone(),
        }])
    }

    async fn sequencer_da_config(&mut self, _node_type: NodeType) -> Result<String> {
        let identity = self.require_identity()?;
        Ok(json!({
            "seed": identity.mnemonic,
            "api_url": identity.rpc_endpoint,
            "app_id": identity.app_id,
            "tip": 0,
        })
        .to_string())
    }

    fn namespace_id(&self) -> String {
        String::new()
    }

    fn app_id(&self) -> u32 {
        match self.identity() {
            Ok(Some(identity)) => identity.app_id,
            _ => self.da.app_id.unwrap_or_default(),
        }
    }

    async fn status(&self) -> DaStatus {
        let request = ChainRequest::json_rpc(&self.da.api_url, "system_health", json!([]));
        match self.client.request(&request).await {
            Ok(_) => DaStatus::Active,
            Err(e) => {
                warn!("Avail health check failed: {}", e);
                DaStatus::Inactive
            }
        }
    }

    fn light_node_endpoint(&self) -> Result<String> {
        Ok(match self.identity()? {
            Some(identity) => identity.rpc_endpoint,
            None => self.da.rpc_url.clone(),
        })
    }

    fn light_client_config_path(&self) -> Option<PathBuf> {
        None
    }
}
