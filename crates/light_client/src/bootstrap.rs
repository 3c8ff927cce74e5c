//! Trust checkpoint selection.
//!
//! A fresh light client is anchored at one of two DA blocks:
//! - the current DA head, when the rollapp has no sequencer or has not
//!   settled any state yet
//! - the DA block its first settled state was posted at, otherwise
//!
//! The head is always fetched first. An unreachable DA RPC is the only
//! recoverable failure: the operator may supply a replacement URL, which is
//! persisted before retrying.

use chain_client::ChainClient;
use chain_queries::{
    extract_height_from_state_path, BlockInfo, BlockInfoResolver, QueryError, SequencerRegistry,
};
use roller_config::{ConfigError, Executables, RollappConfig};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::checkpoint::{update_trust_anchor, CheckpointError, TrustCheckpoint};
use crate::prompt::Prompter;

/// Default number of replacement RPC URLs asked for.
pub const DEFAULT_MAX_RPC_ATTEMPTS: u32 = 3;

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("DA RPC unreachable after {attempts} replacement attempts: {last}")]
    RpcUnavailable {
        attempts: u32,
        #[source]
        last: QueryError,
    },
    #[error("DA returned block {returned} when asked for block {requested}")]
    HeightMismatch { requested: u64, returned: u64 },
    #[error("settled DA height {height} is ahead of the latest DA height {latest}")]
    CheckpointAhead { height: u64, latest: u64 },
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("failed to persist replacement RPC: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to write trust anchor: {0}")]
    Write(#[from] CheckpointError),
}

/// How many times the operator is asked for a replacement DA RPC.
///
/// Zero disables prompting entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpcRecoveryPolicy {
    pub max_attempts: u32,
}

impl Default for RpcRecoveryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RPC_ATTEMPTS,
        }
    }
}

/// Why a checkpoint was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointSource {
    /// No sequencer is registered; the DA head was used.
    NoSequencers,
    /// Sequencers exist but nothing was settled; the DA head was used.
    NoSettledState,
    /// The block the first settled state was posted at.
    SettledState { da_path: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bootstrapped {
    pub checkpoint: TrustCheckpoint,
    pub source: CheckpointSource,
}

/// Decides and persists the light client's trust checkpoint.
pub struct TrustBootstrap {
    blocks: BlockInfoResolver,
    registry: SequencerRegistry,
    prompter: Arc<dyn Prompter>,
    policy: RpcRecoveryPolicy,
}

impl TrustBootstrap {
    pub fn new(
        client: Arc<dyn ChainClient>,
        bins: &Executables,
        prompter: Arc<dyn Prompter>,
        policy: RpcRecoveryPolicy,
    ) -> Self {
        Self {
            blocks: BlockInfoResolver::new(client.clone(), &bins.celestia_app),
            registry: SequencerRegistry::new(client, &bins.dymension),
            prompter,
            policy,
        }
    }

    /// Resolve the checkpoint and write it into `light_client_config`.
    ///
    /// Nothing is written unless every query succeeded.
    pub async fn run(
        &self,
        config: &mut RollappConfig,
        light_client_config: &Path,
    ) -> Result<Bootstrapped, BootstrapError> {
        let bootstrapped = self.resolve(config).await?;
        update_trust_anchor(light_client_config, &bootstrapped.checkpoint)?;
        Ok(bootstrapped)
    }

    /// Resolve the checkpoint without writing it.
    ///
    /// `config` is only modified (and saved) when the operator replaces an
    /// unreachable DA RPC.
    pub async fn resolve(&self, config: &mut RollappConfig) -> Result<Bootstrapped, BootstrapError> {
        let latest = self.latest_block(config).await?;

        let sequencers = self
            .registry
            .registered_sequencers(&config.rollapp_id, &config.hub_data)
            .await?;
        if sequencers.is_empty() {
            info!("No sequencers registered for {}, using latest DA height", config.rollapp_id);
            return Ok(Bootstrapped {
                checkpoint: latest.into(),
                source: CheckpointSource::NoSequencers,
            });
        }

        let entry = self
            .registry
            .latest_settled_state_entry(&config.rollapp_id, &config.hub_data)
            .await?;
        let Some(entry) = entry else {
            info!("No state found for {}, using latest DA height", config.rollapp_id);
            return Ok(Bootstrapped {
                checkpoint: latest.into(),
                source: CheckpointSource::NoSettledState,
            });
        };

        let height = extract_height_from_state_path(&entry.da_path)?;
        if height > latest.height {
            return Err(BootstrapError::CheckpointAhead {
                height,
                latest: latest.height,
            });
        }
        let block = self.blocks.block_by_height(height, &config.da).await?;
        if block.height != height {
            return Err(BootstrapError::HeightMismatch {
                requested: height,
                returned: block.height,
            });
        }
        info!(
            "First state of {} has DA height {} with hash {}",
            config.rollapp_id, block.height, block.hash
        );

        Ok(Bootstrapped {
            checkpoint: block.into(),
            source: CheckpointSource::SettledState {
                da_path: entry.da_path,
            },
        })
    }

    async fn latest_block(&self, config: &mut RollappConfig) -> Result<BlockInfo, BootstrapError> {
        let mut attempts = 0;
        loop {
            let err = match self.blocks.latest_block(&config.da).await {
                Ok(block) => return Ok(block),
                Err(e) if e.is_transport() => e,
                Err(e) => return Err(e.into()),
            };

            warn!("DA RPC {} failed: {}", config.da.rpc_url, err);
            if attempts >= self.policy.max_attempts {
                return Err(BootstrapError::RpcUnavailable {
                    attempts,
                    last: err,
                });
            }
            attempts += 1;

            let message = format!(
                "DA RPC {} is not responding, enter a replacement RPC URL",
                config.da.rpc_url
            );
            let Some(rpc_url) = self.prompter.input(&message).await else {
                return Err(BootstrapError::RpcUnavailable {
                    attempts,
                    last: err,
                });
            };

            info!("Switching DA RPC to {}", rpc_url);
            config.da.rpc_url = rpc_url;
            config.save()?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::{NonInteractivePrompter, ScriptedPrompter};
    use chain_client::fake::FakeChainClient;
    use roller_config::{DaBackend, HubData, KeyringBackend, NetworkPresets, NodeType};

    const DEAD_RPC: &str = "http://dead:26657";
    const LIVE_RPC: &str = "http://live:26657";

    fn config(home: &Path) -> RollappConfig {
        let mut da = NetworkPresets::builtin()
            .lookup("playground", DaBackend::Celestia)
            .unwrap()
            .clone();
        da.rpc_url = LIVE_RPC.to_string();
        RollappConfig {
            home: home.to_path_buf(),
            rollapp_id: "ra_1-1".to_string(),
            environment: "playground".to_string(),
            node_type: NodeType::Sequencer,
            keyring_backend: KeyringBackend::Test,
            hub_data: HubData {
                id: "dymension_100-1".to_string(),
                rpc_url: "http://hub:36657".to_string(),
                api_url: String::new(),
                environment: "playground".to_string(),
            },
            da,
        }
    }

    fn block_json(height: u64, hash: &str) -> String {
        serde_json::json!({
            "block_id": { "hash": hash },
            "block": { "header": { "height": height.to_string() } }
        })
        .to_string()
    }

    const ONE_SEQUENCER: &str = r#"{"sequencers":[{"address":"dym1seq","metadata":{}}]}"#;
    const NO_SEQUENCERS: &str = r#"{"sequencers":[]}"#;

    fn state(da_path: &str) -> String {
        format!("stateInfo:\n  DAPath: \"{da_path}\"\n  status: FINALIZED\n")
    }

    fn bootstrap(fake: &Arc<FakeChainClient>, prompter: Arc<dyn Prompter>) -> TrustBootstrap {
        TrustBootstrap::new(
            fake.clone(),
            &Executables::in_dir("/bins"),
            prompter,
            RpcRecoveryPolicy::default(),
        )
    }

    fn light_client_config(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("config.toml");
        std::fs::write(
            &path,
            "[SomeOtherSection]\nFoo = \"bar\"\n\n[DASer]\nSampleFrom = 1\n\n[Header]\nTrustedHash = \"\"\n",
        )
        .unwrap();
        path
    }

    fn read(path: &Path) -> toml::Table {
        toml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_no_sequencers_uses_latest_block() {
        let home = tempfile::tempdir().unwrap();
        let path = light_client_config(home.path());
        let fake = Arc::new(FakeChainClient::new());
        fake.respond("q block --node", block_json(1000, "HASHA"))
            .respond("show-sequencers-by-rollapp", NO_SEQUENCERS)
            .respond("q rollapp state", state("celestia|777|abc"));

        let mut config = config(home.path());
        let result = bootstrap(&fake, Arc::new(NonInteractivePrompter))
            .run(&mut config, &path)
            .await
            .unwrap();

        assert_eq!(
            result,
            Bootstrapped {
                checkpoint: TrustCheckpoint {
                    height: 1000,
                    hash: "HASHA".to_string()
                },
                source: CheckpointSource::NoSequencers,
            }
        );
        assert_eq!(fake.call_count("q rollapp state"), 0);

        let written = read(&path);
        assert_eq!(written["DASer"]["SampleFrom"].as_integer(), Some(1000));
        assert_eq!(written["Header"]["TrustedHash"].as_str(), Some("HASHA"));
        assert_eq!(written["SomeOtherSection"]["Foo"].as_str(), Some("bar"));
    }

    #[tokio::test]
    async fn test_settled_state_uses_its_da_height() {
        let home = tempfile::tempdir().unwrap();
        let path = light_client_config(home.path());
        let fake = Arc::new(FakeChainClient::new());
        fake.respond("q block --node", block_json(1000, "HASHA"))
            .respond("q block 777 --node", block_json(777, "HASHB"))
            .respond("show-sequencers-by-rollapp", ONE_SEQUENCER)
            .respond("q rollapp state ra_1-1 --index 1", state("celestia|777|abc"));

        let mut config = config(home.path());
        let result = bootstrap(&fake, Arc::new(NonInteractivePrompter))
            .run(&mut config, &path)
            .await
            .unwrap();

        assert_eq!(
            result.checkpoint,
            TrustCheckpoint {
                height: 777,
                hash: "HASHB".to_string()
            }
        );
        assert_eq!(
            result.source,
            CheckpointSource::SettledState {
                da_path: "celestia|777|abc".to_string()
            }
        );

        let written = read(&path);
        assert_eq!(written["DASer"]["SampleFrom"].as_integer(), Some(777));
        assert_eq!(written["Header"]["TrustedHash"].as_str(), Some("HASHB"));
    }

    #[tokio::test]
    async fn test_state_height_is_taken_from_second_segment() {
        let home = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeChainClient::new());
        fake.respond("q block --node", block_json(1000, "HASHA"))
            .respond("q block 42 --node", block_json(42, "HASH42"))
            .respond("show-sequencers-by-rollapp", ONE_SEQUENCER)
            .respond("q rollapp state", state("x|42|y"));

        let mut config = config(home.path());
        let result = bootstrap(&fake, Arc::new(NonInteractivePrompter))
            .resolve(&mut config)
            .await
            .unwrap();
        assert_eq!(result.checkpoint.height, 42);
        assert_eq!(result.checkpoint.hash, "HASH42");
    }

    #[tokio::test]
    async fn test_state_not_found_uses_latest_block() {
        let home = tempfile::tempdir().unwrap();
        let path = light_client_config(home.path());
        let fake = Arc::new(FakeChainClient::new());
        fake.respond("q block --node", block_json(1000, "HASHA"))
            .respond("show-sequencers-by-rollapp", ONE_SEQUENCER)
            .fail("q rollapp state", "Error: rpc error: code = NotFound desc = not found");

        let mut config = config(home.path());
        let result = bootstrap(&fake, Arc::new(NonInteractivePrompter))
            .run(&mut config, &path)
            .await
            .unwrap();

        assert_eq!(result.source, CheckpointSource::NoSettledState);
        assert_eq!(result.checkpoint.height, 1000);
        assert_eq!(result.checkpoint.hash, "HASHA");
        assert_eq!(fake.call_count("q block 1000"), 0);
    }

    #[tokio::test]
    async fn test_same_inputs_same_checkpoint() {
        let home = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeChainClient::new());
        fake.respond("q block --node", block_json(1000, "HASHA"))
            .respond("q block 777 --node", block_json(777, "HASHB"))
            .respond("show-sequencers-by-rollapp", ONE_SEQUENCER)
            .respond("q rollapp state", state("celestia|777|abc"));

        let bootstrap = bootstrap(&fake, Arc::new(NonInteractivePrompter));
        let mut config = config(home.path());
        let first = bootstrap.resolve(&mut config).await.unwrap();
        let second = bootstrap.resolve(&mut config).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_malformed_da_path_aborts_without_writing() {
        let home = tempfile::tempdir().unwrap();
        let path = light_client_config(home.path());
        let before = std::fs::read_to_string(&path).unwrap();
        let fake = Arc::new(FakeChainClient::new());
        fake.respond("q block --node", block_json(1000, "HASHA"))
            .respond("show-sequencers-by-rollapp", ONE_SEQUENCER)
            .respond("q rollapp state", state("onlyonefield"));

        let mut config = config(home.path());
        let err = bootstrap(&fake, Arc::new(NonInteractivePrompter))
            .run(&mut config, &path)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BootstrapError::Query(QueryError::Malformed { field: "DAPath", .. })
        ));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn test_settled_height_ahead_of_latest_is_rejected() {
        let home = tempfile::tempdir().unwrap();
        let path = light_client_config(home.path());
        let before = std::fs::read_to_string(&path).unwrap();
        let fake = Arc::new(FakeChainClient::new());
        fake.respond("q block --node", block_json(1000, "HASHA"))
            .respond("q block 5000 --node", block_json(5000, "HASHF"))
            .respond("show-sequencers-by-rollapp", ONE_SEQUENCER)
            .respond("q rollapp state", state("celestia|5000|x"));

        let mut config = config(home.path());
        let err = bootstrap(&fake, Arc::new(NonInteractivePrompter))
            .run(&mut config, &path)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BootstrapError::CheckpointAhead {
                height: 5000,
                latest: 1000
            }
        ));
        assert_eq!(fake.call_count("q block 5000"), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn test_block_for_wrong_height_is_rejected() {
        let home = tempfile::tempdir().unwrap();
        let path = light_client_config(home.path());
        let before = std::fs::read_to_string(&path).unwrap();
        let fake = Arc::new(FakeChainClient::new());
        fake.respond("q block --node", block_json(1000, "HASHA"))
            .respond("q block 777 --node", block_json(778, "HASHC"))
            .respond("show-sequencers-by-rollapp", ONE_SEQUENCER)
            .respond("q rollapp state", state("celestia|777|abc"));

        let mut config = config(home.path());
        let err = bootstrap(&fake, Arc::new(NonInteractivePrompter))
            .run(&mut config, &path)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BootstrapError::HeightMismatch {
                requested: 777,
                returned: 778
            }
        ));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn test_malformed_block_is_not_retried() {
        let home = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeChainClient::new());
        fake.respond("q block --node", r#"{"block": {"header": {"height": "5"}}}"#);
        let prompter = Arc::new(ScriptedPrompter::new().with_inputs([LIVE_RPC]));

        let mut config = config(home.path());
        let err = bootstrap(&fake, prompter.clone())
            .resolve(&mut config)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BootstrapError::Query(QueryError::MissingField("block_id.hash"))
        ));
        assert!(prompter.asked().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_block_query_does_not_ask_for_rpc() {
        let home = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeChainClient::new());
        fake.fail("q block --node", "Error: invalid chain-id on InitChain");
        let prompter = Arc::new(ScriptedPrompter::new().with_inputs([LIVE_RPC]));

        let mut config = config(home.path());
        let err = bootstrap(&fake, prompter.clone())
            .resolve(&mut config)
            .await
            .unwrap_err();

        assert!(matches!(err, BootstrapError::Query(QueryError::Chain(_))));
        assert!(prompter.asked().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_rpc_is_replaced_and_persisted() {
        let home = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeChainClient::new());
        fake.fail(format!("q block --node {DEAD_RPC}"), "connection refused")
            .respond(format!("q block --node {LIVE_RPC}"), block_json(1000, "HASHA"))
            .respond("show-sequencers-by-rollapp", NO_SEQUENCERS);
        let prompter = Arc::new(ScriptedPrompter::new().with_inputs([LIVE_RPC]));

        let mut config = config(home.path());
        config.da.rpc_url = DEAD_RPC.to_string();
        config.save().unwrap();

        let result = bootstrap(&fake, prompter.clone())
            .resolve(&mut config)
            .await
            .unwrap();

        assert_eq!(result.checkpoint.height, 1000);
        assert_eq!(prompter.asked().len(), 1);
        assert_eq!(config.da.rpc_url, LIVE_RPC);
        assert_eq!(
            RollappConfig::load(home.path()).unwrap().da.rpc_url,
            LIVE_RPC
        );
    }

    #[tokio::test]
    async fn test_rpc_recovery_is_bounded() {
        let home = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeChainClient::new());
        fake.time_out("q block --node");
        let prompter = Arc::new(ScriptedPrompter::new().with_inputs([DEAD_RPC, DEAD_RPC, DEAD_RPC]));

        let mut config = config(home.path());
        let err = TrustBootstrap::new(
            fake.clone(),
            &Executables::in_dir("/bins"),
            prompter.clone(),
            RpcRecoveryPolicy { max_attempts: 2 },
        )
        .resolve(&mut config)
        .await
        .unwrap_err();

        assert!(matches!(err, BootstrapError::RpcUnavailable { attempts: 2, .. }));
        assert_eq!(prompter.asked().len(), 2);
        assert_eq!(fake.call_count("q block --node"), 3);
        assert_eq!(fake.call_count("show-sequencers-by-rollapp"), 0);
    }

    #[tokio::test]
    async fn test_non_interactive_gives_up_on_dead_rpc() {
        let home = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeChainClient::new());
        fake.fail("q block --node", "connection refused");

        let mut config = config(home.path());
        let err = bootstrap(&fake, Arc::new(NonInteractivePrompter))
            .resolve(&mut config)
            .await
            .unwrap_err();

        assert!(matches!(err, BootstrapError::RpcUnavailable { attempts: 1, .. }));
        assert_eq!(config.da.rpc_url, LIVE_RPC);
        assert_eq!(fake.call_count("q block --node"), 1);
    }

    #[tokio::test]
    async fn test_write_failure_is_fatal() {
        let home = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeChainClient::new());
        fake.respond("q block --node", block_json(1000, "HASHA"))
            .respond("show-sequencers-by-rollapp", NO_SEQUENCERS);

        let mut config = config(home.path());
        let err = bootstrap(&fake, Arc::new(NonInteractivePrompter))
            .run(&mut config, &home.path().join("absent").join("config.toml"))
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::Write(_)));
    }
}
