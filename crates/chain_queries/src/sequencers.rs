//! Hub sequencer and settled-state queries.

use chain_client::{ChainClient, ChainRequest};
use roller_config::HubData;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::Result;

/// Output fragments the hub binary uses to report a missing state entry.
///
/// The hub only signals this through the error text, so it is matched
/// literally.
pub const STATE_NOT_FOUND_MARKERS: [&str; 2] = ["NotFound", "key not found"];

/// A sequencer registered for a rollapp on the hub.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SequencerRecord {
    pub address: String,
    #[serde(default, rename = "rollappId")]
    pub rollapp_id: String,
    #[serde(default)]
    pub metadata: SequencerMetadata,
    #[serde(default)]
    pub proposer: bool,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SequencerMetadata {
    #[serde(default)]
    pub moniker: String,
    #[serde(default)]
    pub p2p_seeds: Vec<String>,
    #[serde(default)]
    pub rpcs: Vec<String>,
    #[serde(default)]
    pub snapshots: Vec<SnapshotInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SnapshotInfo {
    #[serde(default)]
    pub snapshot_url: String,
    /// Rollapp height of the snapshot, as reported by the hub.
    #[serde(default)]
    pub height: String,
    #[serde(default)]
    pub checksum: String,
}

#[derive(Deserialize)]
struct SequencersResponse {
    #[serde(default)]
    sequencers: Vec<SequencerRecord>,
}

/// One settled rollapp state, as stored on the hub.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StateIndexEntry {
    /// Where the state's data was posted: `<da>|<height>|...`.
    #[serde(rename = "DAPath")]
    pub da_path: String,
    #[serde(default, rename = "creationHeight")]
    pub creation_height: String,
    #[serde(default, rename = "startHeight")]
    pub start_height: String,
    #[serde(default, rename = "numBlocks")]
    pub num_blocks: String,
    #[serde(default)]
    pub sequencer: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Deserialize)]
struct RollappStateResponse {
    #[serde(rename = "stateInfo")]
    state_info: StateIndexEntry,
}

/// Hub-side view of a rollapp's sequencers and settled states.
pub struct SequencerRegistry {
    client: Arc<dyn ChainClient>,
    dymension: PathBuf,
}

impl SequencerRegistry {
    pub fn new(client: Arc<dyn ChainClient>, dymension: impl Into<PathBuf>) -> Self {
        Self {
            client,
            dymension: dymension.into(),
        }
    }

    /// All sequencers registered for `rollapp_id`. Empty when none are.
    pub async fn registered_sequencers(
        &self,
        rollapp_id: &str,
        hub: &HubData,
    ) -> Result<Vec<SequencerRecord>> {
        let request = ChainRequest::exec(
            &self.dymension,
            [
                "q",
                "sequencer",
                "show-sequencers-by-rollapp",
                rollapp_id,
                "-o",
                "json",
                "--node",
                hub.rpc_url.as_str(),
                "--chain-id",
                hub.id.as_str(),
            ],
        );

        let out = self.client.request(&request).await?;
        let response: SequencersResponse = serde_json::from_str(&out)?;

        debug!(
            "{} sequencers registered for {}",
            response.sequencers.len(),
            rollapp_id
        );
        Ok(response.sequencers)
    }

    /// The first settled state (index 1) of `rollapp_id`.
    ///
    /// Returns `Ok(None)` when the hub reports that no such state exists yet.
    /// Any other failure is an error.
    pub async fn latest_settled_state_entry(
        &self,
        rollapp_id: &str,
        hub: &HubData,
    ) -> Result<Option<StateIndexEntry>> {
        let request = ChainRequest::exec(
            &self.dymension,
            [
                "q",
                "rollapp",
                "state",
                rollapp_id,
                "--index",
                "1",
                "--node",
                hub.rpc_url.as_str(),
                "--chain-id",
                hub.id.as_str(),
            ],
        );

        let out = match self.client.request(&request).await {
            Ok(out) => out,
            Err(e)
                if STATE_NOT_FOUND_MARKERS
                    .iter()
                    .any(|marker| e.output_contains(marker)) =>
            {
                info!("No settled state found for {}", rollapp_id);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let response: RollappStateResponse = serde_yaml::from_str(&out)?;
        Ok(Some(response.state_info))
    }

    /// The snapshot with the highest height across all sequencers.
    pub async fn latest_snapshot(
        &self,
        rollapp_id: &str,
        hub: &HubData,
    ) -> Result<Option<SnapshotInfo>> {
        let sequencers = self.registered_sequencers(rollapp_id, hub).await?;

        Ok(sequencers
            .into_iter()
            .flat_map(|s| s.metadata.snapshots)
            .filter_map(|snapshot| {
                let height = snapshot.height.parse::<u64>().ok()?;
                Some((height, snapshot))
            })
            .max_by_key(|(height, _)| *height)
            .map(|(_, snapshot)| snapshot))
    }

    /// P2P peers to bootstrap a full node from.
    ///
    /// With several sequencers only the first seed of each is used; a lone
    /// sequencer contributes all of its seeds.
    pub async fn p2p_peers(&self, rollapp_id: &str, hub: &HubData) -> Result<Vec<String>> {
        let sequencers = self.registered_sequencers(rollapp_id, hub).await?;

        if sequencers.len() == 1 {
            return Ok(sequencers[0].metadata.p2p_seeds.clone());
        }
        Ok(sequencers
            .iter()
            .filter_map(|s| s.metadata.p2p_seeds.first().cloned())
            .collect())
    }
}
