//! Rollapp configuration.
//!
//! This crate owns `roller.toml`, the per-rollapp configuration file that
//! names the hub, the selected DA backend and its connection parameters. It
//! also carries the built-in DA network presets and the paths of the chain
//! binaries the other crates shell out to.

pub mod backend;
pub mod executables;
pub mod fs;
pub mod presets;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub use backend::DaBackend;
pub use executables::{light_node_dir, Executables, DA_LIGHT_NODE_DIR, KEYS_DIR, ROLLER_CONFIG_FILE};
pub use presets::NetworkPresets;

/// Errors that can occur while loading or saving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to encode config: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("unknown DA backend: {0}")]
    UnknownBackend(String),
    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),
    #[error("no {backend} DA network known for environment {environment}")]
    NoNetwork {
        environment: String,
        backend: DaBackend,
    },
    #[error("unknown node type: {0}")]
    UnknownNodeType(String),
}

/// Role of the local rollapp node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Sequencer,
    FullNode,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Sequencer => f.write_str("sequencer"),
            NodeType::FullNode => f.write_str("fullnode"),
        }
    }
}

impl std::str::FromStr for NodeType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequencer" => Ok(NodeType::Sequencer),
            "fullnode" | "full-node" => Ok(NodeType::FullNode),
            _ => Err(ConfigError::UnknownNodeType(s.to_string())),
        }
    }
}

/// Keyring backend used for the DA light-node key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyringBackend {
    #[default]
    Test,
    Os,
}

impl KeyringBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyringBackend::Test => "test",
            KeyringBackend::Os => "os",
        }
    }
}

/// Connection data for the settlement hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubData {
    /// Chain ID.
    pub id: String,
    /// Tendermint RPC endpoint.
    pub rpc_url: String,
    /// REST endpoint.
    #[serde(default)]
    pub api_url: String,
    /// Hub environment (`playground`, `mainnet`, `mock`, ...).
    pub environment: String,
}

/// Connection parameters of the selected DA network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaData {
    pub backend: DaBackend,
    /// DA network ID (e.g. `mocha-4`).
    pub id: String,
    #[serde(default)]
    pub api_url: String,
    /// Consensus RPC used for block and balance queries.
    #[serde(default)]
    pub rpc_url: String,
    /// Consensus node the light node connects to.
    #[serde(default)]
    pub current_state_node: String,
    #[serde(default)]
    pub state_nodes: Vec<String>,
    #[serde(default)]
    pub gas_price: String,
    /// Namespace under which rollapp blobs are posted, once chosen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_id: Option<String>,
    /// Application ID for backends that address blobs by number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<u32>,
    /// Externally run light node to use instead of the local one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
}

/// The `roller.toml` of one rollapp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollappConfig {
    /// Rollapp home directory. Not persisted; set from the load location.
    #[serde(skip)]
    pub home: PathBuf,
    pub rollapp_id: String,
    pub environment: String,
    pub node_type: NodeType,
    #[serde(default)]
    pub keyring_backend: KeyringBackend,
    pub hub_data: HubData,
    pub da: DaData,
}

impl RollappConfig {
    /// Path of `roller.toml` under `home`.
    pub fn path_in(home: &Path) -> PathBuf {
        home.join(ROLLER_CONFIG_FILE)
    }

    /// Load `roller.toml` from `home`.
    pub fn load(home: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let home = home.as_ref();
        let path = Self::path_in(home);
        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;

        let mut config: RollappConfig =
            toml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })?;
        config.home = home.to_path_buf();

        debug!(
            "Loaded config for {} ({} on {})",
            config.rollapp_id, config.da.backend, config.da.id
        );
        Ok(config)
    }

    /// Write this config back to `<home>/roller.toml`.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path_in(&self.home);
        let contents = toml::to_string(self)?;
        fs::write_atomic(&path, contents.as_bytes())
            .map_err(|source| ConfigError::Io { path, source })
    }

    /// The light-node store of this rollapp.
    pub fn light_node_dir(&self) -> PathBuf {
        light_node_dir(&self.home)
    }
}
