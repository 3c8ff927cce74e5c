//! DA backend capability interface.
//!
//! Every DA network a rollapp can post to is driven through [`DataLayer`]:
//! - resolving the operator account and its funding state
//! - creating the local light-node identity
//! - producing the DA config blob the rollapp engine starts with
//! - probing liveness
//!
//! [`DaManager`] picks the implementation for the configured backend and is the
//! only place that knows about concrete backends.

pub mod avail;
pub mod celestia;
pub mod manager;
pub mod mock;

use async_trait::async_trait;
use chain_client::ChainClientError;
use chain_queries::QueryError;
use roller_config::{ConfigError, DaBackend, NodeType};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub use avail::Avail;
pub use celestia::Celestia;
pub use manager::DaManager;
pub use mock::MockDa;

/// Errors that can occur while driving a DA backend.
#[derive(Error, Debug)]
pub enum DaError {
    #[error("chain request failed: {0}")]
    Chain(#[from] ChainClientError),
    #[error("query failed: {0}")]
    Query(#[from] QueryError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("failed to encode TOML: {0}")]
    TomlEncode(#[from] toml::ser::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("DA backend {0} is not supported")]
    Unsupported(DaBackend),
    #[error("no key found for {0}, initialize the light node first")]
    MissingKey(String),
    #[error("malformed {what}: {reason}")]
    Malformed { what: &'static str, reason: String },
    #[error("rollapp {0} has no settled state to take the namespace from")]
    NoSettledState(String),
}

impl DaError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DaError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for DA backend operations.
pub type Result<T> = std::result::Result<T, DaError>;

/// A named DA account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeyInfo {
    #[serde(default)]
    pub name: String,
    pub address: String,
}

/// An account whose balance is below what the backend needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotFundedAddress {
    pub key_name: String,
    pub address: String,
    /// Balance in base units of `denom`.
    pub current_balance: u128,
    pub required_balance: u128,
    pub denom: String,
    pub network: String,
}

/// Liveness of the DA connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaStatus {
    Active,
    Inactive,
}

impl fmt::Display for DaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaStatus::Active => f.write_str("Active"),
            DaStatus::Inactive => f.write_str("Inactive"),
        }
    }
}

/// Capabilities every DA backend provides.
///
/// Implementations must not assume a running light-node process, and every
/// method may be called any number of times. The only ordering requirement is
/// that [`DataLayer::initialize_light_node_config`] runs before
/// [`DataLayer::da_account_address`] can succeed.
#[async_trait]
pub trait DataLayer: Send + Sync {
    fn backend(&self) -> DaBackend;

    /// Name of the key holding the DA account.
    fn key_name(&self) -> &str;

    /// The account that pays for blob submission.
    async fn da_account_address(&self) -> Result<KeyInfo>;

    /// Create the local node identity, or reuse the existing one.
    ///
    /// Returns the mnemonic only when a new identity was created.
    async fn initialize_light_node_config(&mut self) -> Result<Option<String>>;

    /// Accounts that are below the backend's minimum balance. Empty when
    /// everything is funded.
    async fn check_da_balance(&self) -> Result<Vec<NotFundedAddress>>;

    /// JSON DA config for the rollapp engine, shaped for `node_type`.
    async fn sequencer_da_config(&mut self, node_type: NodeType) -> Result<String>;

    /// Namespace rollapp blobs are posted under. Empty if the backend has none.
    fn namespace_id(&self) -> String;

    /// Application ID rollapp blobs are posted under. Zero if unused.
    fn app_id(&self) -> u32;

    /// Best-effort liveness probe.
    async fn status(&self) -> DaStatus;

    /// Endpoint the rollapp engine talks to.
    fn light_node_endpoint(&self) -> Result<String>;

    /// Light-client config file holding the trust anchor, for backends that
    /// have one.
    fn light_client_config_path(&self) -> Option<PathBuf>;
}
