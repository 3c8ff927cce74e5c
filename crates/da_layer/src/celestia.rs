//! Celestia light-node backend.

use async_trait::async_trait;
use chain_client::{ChainClient, ChainRequest};
use chain_queries::{extract_namespace_from_state_path, SequencerRegistry};
use rand::RngCore;
use roller_config::{
    DaBackend, DaData, Executables, HubData, KeyringBackend, NodeType, RollappConfig, KEYS_DIR,
};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{DaError, DaStatus, DataLayer, KeyInfo, NotFundedAddress, Result};

/// Key holding the light node's account.
pub const KEY_NAME: &str = "my_celes_key";

/// Denom balances are checked in.
pub const DENOM: &str = "utia";

/// Minimum balance (in utia) the light node needs.
pub const MIN_BALANCE: u128 = 1;

/// Light-node config file, relative to the store.
pub const CONFIG_FILE: &str = "config.toml";

const NAMESPACE_LEN: usize = 10;
const MAINNET_GAS_PRICE: f64 = 0.0045;
const TESTNET_GAS_PRICE: f64 = 0.02;

/// Kind of light-node auth token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthTokenKind {
    Admin,
    Read,
}

impl AuthTokenKind {
    fn as_str(&self) -> &'static str {
        match self {
            AuthTokenKind::Admin => "admin",
            AuthTokenKind::Read => "read",
        }
    }
}

#[derive(Deserialize)]
struct BalancesResponse {
    #[serde(default)]
    balances: Vec<Coin>,
}

#[derive(Deserialize)]
struct Coin {
    denom: String,
    amount: String,
}

/// Celestia DA through a local `celestia light` node.
pub struct Celestia {
    client: Arc<dyn ChainClient>,
    bins: Executables,
    store: PathBuf,
    rollapp_id: String,
    environment: String,
    keyring_backend: KeyringBackend,
    hub: HubData,
    da: DaData,
    namespace_id: Option<String>,
}

impl Celestia {
    pub fn new(config: &RollappConfig, client: Arc<dyn ChainClient>, bins: &Executables) -> Self {
        Self {
            client,
            bins: bins.clone(),
            store: config.light_node_dir(),
            rollapp_id: config.rollapp_id.clone(),
            environment: config.environment.clone(),
            keyring_backend: config.keyring_backend,
            hub: config.hub_data.clone(),
            da: config.da.clone(),
            namespace_id: config.da.namespace_id.clone().filter(|ns| !ns.is_empty()),
        }
    }

    fn store_arg(&self) -> String {
        self.store.display().to_string()
    }

    /// Fetch a light-node auth token of the given kind.
    pub async fn auth_token(&self, kind: AuthTokenKind) -> Result<String> {
        let request = ChainRequest::exec(
            &self.bins.celestia,
            [
                "light".to_string(),
                "auth".to_string(),
                kind.as_str().to_string(),
                "--p2p.network".to_string(),
                self.da.id.clone(),
                "--node.store".to_string(),
                self.store_arg(),
            ],
        );
        let out = self.client.request(&request).await?;
        Ok(out.trim().to_string())
    }

    fn gas_price(&self) -> f64 {
        if self.environment == "mainnet" {
            MAINNET_GAS_PRICE
        } else {
            TESTNET_GAS_PRICE
        }
    }

    /// Namespace of the rollapp's first settled state.
    async fn settled_namespace(&self) -> Result<String> {
        info!("Checking for state update of {}", self.rollapp_id);
        let registry = SequencerRegistry::new(self.client.clone(), &self.bins.dymension);
        let entry = registry
            .latest_settled_state_entry(&self.rollapp_id, &self.hub)
            .await?
            .ok_or_else(|| DaError::NoSettledState(self.rollapp_id.clone()))?;

        Ok(extract_namespace_from_state_path(&entry.da_path)?)
    }
}

/// The 24-word mnemonic printed after the `MNEMONIC` marker of `light init`.
pub fn extract_mnemonic(output: &str) -> Option<String> {
    let words: Vec<String> = output
        .lines()
        .skip_while(|line| !line.starts_with("MNEMONIC"))
        .skip(1)
        .map(|line| line.split_whitespace().collect::<Vec<_>>())
        .filter(|words| words.len() == 24)
        .map(|words| words.join(" "))
        .collect();

    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

/// Random `0x`-prefixed namespace.
pub fn generate_namespace_id() -> String {
    let mut bytes = [0u8; NAMESPACE_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("0x{}", hex::encode(bytes))
}

/// Port of the light node's RPC server, read from its config file.
fn rpc_port(config_toml: &str) -> Result<String> {
    let table: toml::Table = toml::from_str(config_toml)?;
    match table.get("RPC").and_then(|rpc| rpc.get("Port")) {
        Some(toml::Value::String(port)) if !port.is_empty() => Ok(port.clone()),
        Some(toml::Value::Integer(port)) => Ok(port.to_string()),
        _ => Err(DaError::Malformed {
            what: "light node config",
            reason: "RPC.Port is not set".to_string(),
        }),
    }
}

#[async_trait]
impl DataLayer for Celestia {
    fn backend(&self) -> DaBackend {
        DaBackend::Celestia
    }

    fn key_name(&self) -> &str {
        KEY_NAME
    }

    async fn da_account_address(&self) -> Result<KeyInfo> {
        let keyring_dir = self.store.join(KEYS_DIR);
        let request = ChainRequest::exec(
            &self.bins.cel_key,
            [
                "show".to_string(),
                KEY_NAME.to_string(),
                "--node.type".to_string(),
                "light".to_string(),
                "--keyring-dir".to_string(),
                keyring_dir.display().to_string(),
                "--keyring-backend".to_string(),
                self.keyring_backend.as_str().to_string(),
                "--output".to_string(),
                "json".to_string(),
            ],
        );

        let out = match self.client.request(&request).await {
            Ok(out) => out,
            Err(e) if e.output_contains("not found") => {
                return Err(DaError::MissingKey(KEY_NAME.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let mut key: KeyInfo = serde_json::from_str(&out)?;
        if key.name.is_empty() {
            key.name = KEY_NAME.to_string();
        }
        Ok(key)
    }

    async fn initialize_light_node_config(&mut self) -> Result<Option<String>> {
        let request = ChainRequest::exec(
            &self.bins.celestia,
            [
                "light".to_string(),
                "init".to_string(),
                "--p2p.network".to_string(),
                self.da.id.clone(),
                "--node.store".to_string(),
                self.store_arg(),
                "--keyring.backend".to_string(),
                self.keyring_backend.as_str().to_string(),
            ],
        );

        let out = self.client.request(&request).await?;
        let mnemonic = extract_mnemonic(&out);
        if mnemonic.is_none() {
            debug!("Reusing existing light node key in {}", self.store.display());
        }
        Ok(mnemonic)
    }

    async fn check_da_balance(&self) -> Result<Vec<NotFundedAddress>> {
        let key = self.da_account_address().await?;
        let request = ChainRequest::exec(
            &self.bins.celestia_app,
            [
                "q",
                "bank",
                "balances",
                key.address.as_str(),
                "--node",
                self.da.rpc_url.as_str(),
                "--chain-id",
                self.da.id.as_str(),
                "-o",
                "json",
            ],
        );

        let out = self.client.request(&request).await?;
        let response: BalancesResponse = serde_json::from_str(&out)?;
        let balance = match response.balances.iter().find(|c| c.denom == DENOM) {
            Some(coin) => coin.amount.parse::<u128>().map_err(|e| DaError::Malformed {
                what: "balance",
                reason: format!("{:?}: {e}", coin.amount),
            })?,
            None => 0,
        };

        debug!("{} has {}{}", key.address, balance, DENOM);
        if balance >= MIN_BALANCE {
            return Ok(Vec::new());
        }

        Ok(vec![NotFundedAddress {
            key_name: KEY_NAME.to_string(),
            address: key.address,
            current_balance: balance,
            required_balance: MIN_BALANCE,
            denom: DENOM.to_string(),
            network: self.da.id.clone(),
        }])
    }

    async fn sequencer_da_config(&mut self, node_type: NodeType) -> Result<String> {
        let endpoint = self.light_node_endpoint()?;

        let token_kind = match node_type {
            NodeType::Sequencer => {
                if self.namespace_id.is_none() {
                    let namespace = generate_namespace_id();
                    info!("Generated namespace {}", namespace);
                    self.namespace_id = Some(namespace);
                }
                AuthTokenKind::Admin
            }
            NodeType::FullNode => {
                if self.namespace_id.is_none() {
                    self.namespace_id = Some(self.settled_namespace().await?);
                }
                AuthTokenKind::Read
            }
        };
        let auth_token = self.auth_token(token_kind).await?;

        let config = json!({
            "base_url": endpoint,
            "timeout": 60_000_000_000u64,
            "gas_prices": self.gas_price(),
            "gas_adjustment": 1.3,
            "namespace_id": self.namespace_id(),
            "auth_token": auth_token,
            "backoff": {
                "initial_delay": 6_000_000_000u64,
                "max_delay": 6_000_000_000u64,
                "growth_factor": 2,
            },
            "retry_attempts": 4,
            "retry_delay": 3_000_000_000u64,
        });
        Ok(config.to_string())
    }

    fn namespace_id(&self) -> String {
        self.namespace_id.clone().unwrap_or_default()
    }

    fn app_id(&self) -> u32 {
        0
    }

    async fn status(&self) -> DaStatus {
        let ready = async {
            let endpoint = self.light_node_endpoint()?;
            let token = self.auth_token(AuthTokenKind::Read).await?;
            let request =
                ChainRequest::json_rpc(endpoint, "node.Ready", json!([])).with_auth_token(token);
            Ok::<_, DaError>(self.client.request(&request).await?)
        };

        match ready.await {
            Ok(out) if out.trim() == "true" => DaStatus::Active,
            Ok(out) => {
                debug!("Light node not ready: {}", out);
                DaStatus::Inactive
            }
            Err(e) => {
                warn!("Light node status check failed: {}", e);
                DaStatus::Inactive
            }
        }
    }

    fn light_node_endpoint(&self) -> Result<String> {
        if let Some(remote) = self.da.remote.as_deref().filter(|r| !r.is_empty()) {
            return Ok(remote.to_string());
        }
        let path = self.store.join(CONFIG_FILE);
        let contents = std::fs::read_to_string(&path).map_err(|e| DaError::io(&path, e))?;
        Ok(format!("http://localhost:{}", rpc_port(&contents)?))
    }

    fn light_client_config_path(&self) -> Option<PathBuf> {
        Some(self.store.join(CONFIG_FILE))
    }
}
