//! DA light-client setup.
//!
//! - [`bootstrap`]: picks the trust checkpoint from hub and DA chain state
//! - [`checkpoint`]: writes it into the light-client config
//! - [`funding`]: waits until the DA account is funded
//! - [`prompt`]: operator interaction, interactive or not
//!
//! [`initialize_light_client`] runs the whole sequence for a fresh node.

pub mod bootstrap;
pub mod checkpoint;
pub mod funding;
pub mod prompt;

use da_layer::{DaError, DaManager, KeyInfo};
use roller_config::RollappConfig;
use thiserror::Error;
use tracing::info;

pub use bootstrap::{
    BootstrapError, Bootstrapped, CheckpointSource, RpcRecoveryPolicy, TrustBootstrap,
};
pub use checkpoint::{update_trust_anchor, CheckpointError, TrustCheckpoint};
pub use funding::{render_funding_table, FundingError, FundingGate};
pub use prompt::{NonInteractivePrompter, Prompter, ScriptedPrompter, StdinPrompter};

#[derive(Error, Debug)]
pub enum InitError {
    #[error(transparent)]
    Da(#[from] DaError),
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
}

/// Outcome of [`initialize_light_client`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightClientInit {
    /// The DA account that needs funding.
    pub key: KeyInfo,
    /// Set only when a new identity was created.
    pub mnemonic: Option<String>,
    /// Set for backends whose light client takes a trust anchor.
    pub bootstrap: Option<Bootstrapped>,
}

/// Prepare the light-node store, create the identity and anchor the light
/// client.
pub async fn initialize_light_client(
    config: &mut RollappConfig,
    da: &mut DaManager,
    bootstrap: &TrustBootstrap,
) -> Result<LightClientInit, InitError> {
    if da.prepare_store()? {
        info!("Light-node store of a previous DA backend was removed");
    }

    let mnemonic = da.initialize_light_node_config().await?;

    let bootstrapped = match da.light_client_config_path() {
        Some(path) => Some(bootstrap.run(config, &path).await?),
        None => None,
    };

    let key = da.da_account_address().await?;
    info!("Initialized {} light client for {}", da.backend(), key.address);

    Ok(LightClientInit {
        key,
        mnemonic,
        bootstrap: bootstrapped,
    })
}
