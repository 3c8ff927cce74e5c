//! Locations of the external binaries and on-disk directories.

use std::path::{Path, PathBuf};

/// Default directory holding the chain binaries.
pub const DEFAULT_BIN_DIR: &str = "/usr/local/bin/roller_bins";

/// Directory (under the rollapp home) holding the DA light-node store.
pub const DA_LIGHT_NODE_DIR: &str = "da-light-node";

/// Keyring directory inside the light-node store.
pub const KEYS_DIR: &str = "keys";

/// Name of the rollapp configuration file.
pub const ROLLER_CONFIG_FILE: &str = "roller.toml";

/// Paths of the chain binaries driven through the chain client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executables {
    /// Celestia light node.
    pub celestia: PathBuf,
    /// Celestia consensus app, used for block and balance queries.
    pub celestia_app: PathBuf,
    /// Celestia key management.
    pub cel_key: PathBuf,
    /// Hub (dymension) daemon.
    pub dymension: PathBuf,
}

impl Executables {
    /// Resolve all binaries inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            celestia: dir.join("celestia"),
            celestia_app: dir.join("celestia-appd"),
            cel_key: dir.join("cel-key"),
            dymension: dir.join("dymd"),
        }
    }
}

impl Default for Executables {
    fn default() -> Self {
        Self::in_dir(DEFAULT_BIN_DIR)
    }
}

/// The light-node store of the rollapp at `home`.
pub fn light_node_dir(home: &Path) -> PathBuf {
    home.join(DA_LIGHT_NODE_DIR)
}
